//! Shape capability trait and the records produced by ray queries.

use lumen_math::{Aabb, Ray, Vec2, Vec3};

/// Result of a primitive-level intersection test.
///
/// Only the data needed to pick the closest hit is carried; the full
/// [`SurfaceInteraction`] is computed once for the winning primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveHit {
    /// Parametric distance along the ray
    pub t: f32,
    /// Primitive-local parameterization (barycentrics for triangles)
    pub uv: Vec2,
}

/// Closest-hit result of a kd-tree query before shading attributes are
/// computed.
///
/// A miss is encoded as [`PreliminaryIntersection::NONE`] (`t = +inf`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreliminaryIntersection {
    /// Parametric distance of the hit, `+inf` on a miss
    pub t: f32,
    /// Primitive-local parameterization of the hit
    pub prim_uv: Vec2,
    /// Index of the owning shape in registration order
    pub shape_index: u32,
    /// Index of the primitive within its shape
    pub prim_index: u32,
    /// Global primitive id (see [`crate::PrimitiveMap`])
    pub global_index: u32,
}

impl PreliminaryIntersection {
    /// The "no hit" sentinel.
    pub const NONE: PreliminaryIntersection = PreliminaryIntersection {
        t: f32::INFINITY,
        prim_uv: Vec2::ZERO,
        shape_index: u32::MAX,
        prim_index: u32::MAX,
        global_index: u32::MAX,
    };

    /// True if this records an actual hit.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.t.is_finite()
    }
}

impl Default for PreliminaryIntersection {
    fn default() -> Self {
        Self::NONE
    }
}

/// Full description of a ray-surface hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInteraction {
    /// Point of intersection
    pub p: Vec3,
    /// Geometric normal (always points against the ray)
    pub normal: Vec3,
    /// UV surface coordinates
    pub uv: Vec2,
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    pub shape_index: u32,
    pub prim_index: u32,
}

impl SurfaceInteraction {
    /// Create an interaction at `t` along `ray` with the given outward
    /// normal and surface coordinates. Ids are filled in by the caller.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, uv: Vec2) -> Self {
        let mut si = Self {
            p: ray.at(t),
            normal: outward_normal,
            uv,
            t,
            front_face: true,
            shape_index: u32::MAX,
            prim_index: u32::MAX,
        };
        si.set_face_normal(ray, outward_normal);
        si
    }

    /// Set the face normal based on ray direction and outward normal.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        // If the ray and normal point in the same direction, we're inside
        self.front_face = ray.direction().dot(outward_normal) < 0.0;

        // Normal always points against the ray
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }
}

/// Geometry that can be registered with a kd-tree.
///
/// A shape contributes `primitive_count()` sub-primitives (triangles of a
/// mesh, or a single implicit surface). The tree only ever talks to shapes
/// through this trait: bounds at build time, primitive tests in leaves.
pub trait Shape: Send + Sync {
    /// World-space bounds of the whole shape.
    fn bbox(&self) -> Aabb;

    /// Number of sub-primitives.
    fn primitive_count(&self) -> u32;

    /// World-space bounds of one primitive.
    fn primitive_bbox(&self, index: u32) -> Aabb;

    /// Bounds of the part of primitive `index` that lies inside `clip`.
    ///
    /// Returns an invalid box when the primitive does not touch `clip`. The
    /// default clips the primitive's box, which is always conservative;
    /// shapes override it with exact geometric clipping.
    fn primitive_bbox_clipped(&self, index: u32, clip: &Aabb) -> Aabb {
        self.primitive_bbox(index).intersect(clip)
    }

    /// Intersect primitive `index` with `ray`.
    ///
    /// Only hits with `t` in `[ray.mint, ray.maxt]` are reported.
    fn intersect_primitive(&self, index: u32, ray: &Ray) -> Option<PrimitiveHit>;

    /// Compute position, normal and UV for a hit previously reported by
    /// [`Shape::intersect_primitive`].
    fn surface_interaction(&self, index: u32, ray: &Ray, hit: &PrimitiveHit) -> SurfaceInteraction;
}
