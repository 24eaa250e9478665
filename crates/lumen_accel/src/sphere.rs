//! Analytic sphere shape.
//!
//! A sphere is a single implicit primitive, which makes it the simplest
//! example of a non-mesh shape sharing a kd-tree with triangle meshes.

use crate::shape::{PrimitiveHit, Shape, SurfaceInteraction};
use lumen_math::{Aabb, Ray, Vec2, Vec3};
use std::f32::consts::PI;

/// A sphere primitive.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::new(center - rvec, center + rvec);

        Self {
            center,
            radius,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y
        // phi: angle around Y axis from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        Vec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Shape for Sphere {
    fn bbox(&self) -> Aabb {
        self.bbox
    }

    fn primitive_count(&self) -> u32 {
        1
    }

    fn primitive_bbox(&self, _index: u32) -> Aabb {
        self.bbox
    }

    fn intersect_primitive(&self, _index: u32, ray: &Ray) -> Option<PrimitiveHit> {
        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 || a == 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if root < ray.mint || root > ray.maxt {
            root = (h + sqrtd) / a;
            if root < ray.mint || root > ray.maxt {
                return None;
            }
        }

        Some(PrimitiveHit {
            t: root,
            uv: Vec2::ZERO,
        })
    }

    fn surface_interaction(&self, _index: u32, ray: &Ray, hit: &PrimitiveHit) -> SurfaceInteraction {
        let p = ray.at(hit.t);
        let outward_normal = if self.radius > 0.0 {
            (p - self.center) / self.radius
        } else {
            Vec3::ZERO
        };
        SurfaceInteraction::new(ray, hit.t, outward_normal, Self::sphere_uv(outward_normal))
    }
}
