//! Indexed triangle mesh shape.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection and
//! Sutherland-Hodgman polygon clipping for tight per-node primitive bounds.

use crate::error::{KdTreeError, KdTreeResult};
use crate::shape::{PrimitiveHit, Shape, SurfaceInteraction};
use lumen_math::{DVec3, Aabb, Mat4, Ray, Vec2, Vec3};

/// Clipping can add one vertex per plane to the input triangle.
const MAX_CLIP_VERTICES: usize = 3 + 6;

/// A mesh consisting of vertex positions, optional UVs and triangle indices.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    /// Vertex positions (one Vec3 per vertex)
    positions: Vec<Vec3>,

    /// UV coordinates (optional - one per vertex)
    uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    indices: Vec<u32>,

    /// Axis-aligned bounding box
    bounds: Aabb,
}

impl TriangleMesh {
    /// Create a new mesh from positions and triangle indices.
    ///
    /// Fails if the index buffer is not a whole number of triangles or
    /// references a vertex that does not exist.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> KdTreeResult<Self> {
        Self::new_with_uvs(positions, indices, None)
    }

    /// Create a new mesh with per-vertex UV coordinates.
    pub fn new_with_uvs(
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        uvs: Option<Vec<Vec2>>,
    ) -> KdTreeResult<Self> {
        if indices.len() % 3 != 0 {
            return Err(KdTreeError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(KdTreeError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad,
                positions.len()
            )));
        }
        if let Some(uvs) = &uvs {
            if uvs.len() != positions.len() {
                return Err(KdTreeError::InvalidMesh(format!(
                    "{} UVs for {} vertices",
                    uvs.len(),
                    positions.len()
                )));
            }
        }

        let bounds = Self::compute_bounds(&positions);
        Ok(Self {
            positions,
            uvs,
            indices,
            bounds,
        })
    }

    /// Create a mesh from a triangle soup (no vertex sharing).
    pub fn from_triangles(triangles: &[[Vec3; 3]]) -> Self {
        let positions: Vec<Vec3> = triangles.iter().flatten().copied().collect();
        let indices = (0..positions.len() as u32).collect();
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Axis-aligned box `[center - half, center + half]` made of 12 triangles
    /// with outward-facing winding.
    pub fn cuboid(center: Vec3, half: Vec3) -> Self {
        let corner = |i: u32| {
            Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            ) + center
        };
        let positions = (0..8).map(corner).collect();

        // Corner bit layout: x = 1, y = 2, z = 4
        #[rustfmt::skip]
        let indices = vec![
            0, 4, 6,  0, 6, 2, // -x
            1, 3, 7,  1, 7, 5, // +x
            0, 1, 5,  0, 5, 4, // -y
            2, 6, 7,  2, 7, 3, // +y
            0, 2, 3,  0, 3, 1, // -z
            4, 5, 7,  4, 7, 6, // +z
        ];

        let bounds = Aabb::new(center - half, center + half);
        Self {
            positions,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Bake `transform` into the vertex positions.
    pub fn transformed(mut self, transform: &Mat4) -> Self {
        for p in &mut self.positions {
            *p = transform.transform_point3(*p);
        }
        self.bounds = Self::compute_bounds(&self.positions);
        self
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// The three vertices of triangle `index`.
    #[inline]
    pub fn triangle(&self, index: u32) -> [Vec3; 3] {
        let base = index as usize * 3;
        [
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
            self.positions[self.indices[base + 2] as usize],
        ]
    }

    /// Compute the bounding box from vertex positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        positions.iter().fold(Aabb::EMPTY, |mut acc, &p| {
            acc.expand_point(p);
            acc
        })
    }
}

impl Shape for TriangleMesh {
    fn bbox(&self) -> Aabb {
        self.bounds
    }

    fn primitive_count(&self) -> u32 {
        self.triangle_count() as u32
    }

    fn primitive_bbox(&self, index: u32) -> Aabb {
        let [v0, v1, v2] = self.triangle(index);
        Aabb::new(v0.min(v1).min(v2), v0.max(v1).max(v2))
    }

    /// Clip the triangle against the six planes of `clip` in double
    /// precision and bound whatever polygon remains.
    fn primitive_bbox_clipped(&self, index: u32, clip: &Aabb) -> Aabb {
        let [v0, v1, v2] = self.triangle(index);
        let mut poly = [DVec3::ZERO; MAX_CLIP_VERTICES];
        poly[0] = v0.as_dvec3();
        poly[1] = v1.as_dvec3();
        poly[2] = v2.as_dvec3();
        let mut count = 3;

        let lo = clip.min.as_dvec3();
        let hi = clip.max.as_dvec3();
        for axis in 0..3 {
            count = clip_polygon(&mut poly, count, axis, lo[axis], true);
            count = clip_polygon(&mut poly, count, axis, hi[axis], false);
            if count == 0 {
                return Aabb::EMPTY;
            }
        }

        let mut result = Aabb::EMPTY;
        for p in &poly[..count] {
            result.expand_point(p.as_vec3());
        }
        // Rounding back to f32 may step outside the clip region
        result.intersect(clip)
    }

    /// Möller-Trumbore ray-triangle intersection algorithm.
    fn intersect_primitive(&self, index: u32, ray: &Ray) -> Option<PrimitiveHit> {
        let [v0, v1, v2] = self.triangle(index);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction().cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle (or the triangle is degenerate)
        if a.abs() < 1e-12 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - v0;
        let u = f * s.dot(h);

        // Check if intersection is outside triangle (u parameter)
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);

        // Check if intersection is outside triangle (v parameter)
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t < ray.mint || t > ray.maxt {
            return None;
        }

        Some(PrimitiveHit {
            t,
            uv: Vec2::new(u, v),
        })
    }

    fn surface_interaction(&self, index: u32, ray: &Ray, hit: &PrimitiveHit) -> SurfaceInteraction {
        let [v0, v1, v2] = self.triangle(index);
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();

        let (b1, b2) = (hit.uv.x, hit.uv.y);
        let b0 = 1.0 - b1 - b2;
        let uv = match &self.uvs {
            Some(uvs) => {
                let base = index as usize * 3;
                let [i0, i1, i2] = [
                    self.indices[base] as usize,
                    self.indices[base + 1] as usize,
                    self.indices[base + 2] as usize,
                ];
                uvs[i0] * b0 + uvs[i1] * b1 + uvs[i2] * b2
            }
            None => hit.uv,
        };

        let mut si = SurfaceInteraction::new(ray, hit.t, normal, uv);
        // Interpolate instead of ray.at(t) to stay on the triangle's plane
        si.p = v0 * b0 + v1 * b1 + v2 * b2;
        si
    }
}

/// Clip the convex polygon `poly[..count]` against one axis-aligned plane,
/// keeping the half-space `p[axis] >= value` (`keep_above`) or
/// `p[axis] <= value`. Returns the new vertex count.
fn clip_polygon(
    poly: &mut [DVec3; MAX_CLIP_VERTICES],
    count: usize,
    axis: usize,
    value: f64,
    keep_above: bool,
) -> usize {
    if count == 0 {
        return 0;
    }

    let inside = |p: &DVec3| {
        if keep_above {
            p[axis] >= value
        } else {
            p[axis] <= value
        }
    };

    let input = *poly;
    let mut out = 0;
    for i in 0..count {
        let cur = input[i];
        let next = input[(i + 1) % count];
        let cur_in = inside(&cur);
        let next_in = inside(&next);

        if cur_in {
            poly[out] = cur;
            out += 1;
        }
        if cur_in != next_in && out < MAX_CLIP_VERTICES {
            let t = (value - cur[axis]) / (next[axis] - cur[axis]);
            let mut p = cur + (next - cur) * t;
            // Snap onto the plane to avoid drifting off by rounding
            p[axis] = value;
            poly[out] = p;
            out += 1;
        }
    }
    out
}
