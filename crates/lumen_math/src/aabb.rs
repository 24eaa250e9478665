use crate::Vec3;

/// Axis-Aligned Bounding Box for spatial acceleration structures.
///
/// Stored as a min/max corner pair. Unlike a mesh display box this is never
/// padded: a flat primitive has a zero-width extent and the kd-tree builder
/// relies on that to classify planar primitives exactly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB from its corners. No reordering is performed.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Grow the box to contain `p`.
    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow the box to contain `other`.
    pub fn expand(&mut self, other: &Aabb) {
        *self = Self::surrounding(self, other);
    }

    /// Overlap of two boxes. Invalid when they are disjoint.
    pub fn intersect(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// A box is valid when `min <= max` on every axis (NaN fails).
    ///
    /// Zero-width extents are valid.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Valid and free of infinities.
    pub fn is_finite(&self) -> bool {
        self.is_valid() && self.min.is_finite() && self.max.is_finite()
    }

    /// Extent along each axis.
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Total surface area. Zero for invalid boxes.
    pub fn surface_area(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let d = self.extents();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// True if `p` lies inside or on the boundary.
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Set the minimum coordinate on `axis`.
    pub fn set_min(&mut self, axis: usize, value: f32) {
        match axis {
            0 => self.min.x = value,
            1 => self.min.y = value,
            _ => self.min.z = value,
        }
    }

    /// Set the maximum coordinate on `axis`.
    pub fn set_max(&mut self, axis: usize, value: f32) {
        match axis {
            0 => self.max.x = value,
            1 => self.max.y = value,
            _ => self.max.z = value,
        }
    }

    /// Split the box with the plane `x[axis] = position`.
    pub fn split(&self, axis: usize, position: f32) -> (Aabb, Aabb) {
        let mut left = *self;
        let mut right = *self;
        left.set_max(axis, position);
        right.set_min(axis, position);
        (left, right)
    }

    /// Contains nothing; the identity for [`Aabb::expand`].
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::new(Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0));
        let box2 = Aabb::new(Vec3::new(3.0, 3.0, 3.0), Vec3::new(10.0, 10.0, 10.0));
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.min.x, 0.0);
        assert_eq!(surrounding.max.x, 10.0);

        // The empty box is the identity for union
        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &box1), box1);
    }

    #[test]
    fn test_aabb_validity() {
        assert!(!Aabb::EMPTY.is_valid());
        assert!(Aabb::new(Vec3::ZERO, Vec3::ONE).is_valid());
        assert!(!Aabb::new(Vec3::ONE, Vec3::ZERO).is_valid());

        // Flat boxes are valid
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert!(flat.is_valid());
        assert_eq!(flat.surface_area(), 2.0);

        let nan = Aabb::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE);
        assert!(!nan.is_valid());
        let unbounded = Aabb::new(Vec3::NEG_INFINITY, Vec3::ZERO);
        assert!(unbounded.is_valid());
        assert!(!unbounded.is_finite());
    }

    #[test]
    fn test_aabb_surface_area() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.surface_area(), 22.0);
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_aabb_split() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(4.0));
        let (left, right) = aabb.split(1, 1.0);

        assert_eq!(left.max.y, 1.0);
        assert_eq!(right.min.y, 1.0);
        assert_eq!(left.min, aabb.min);
        assert_eq!(right.max, aabb.max);
    }

    #[test]
    fn test_aabb_contains_point() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::splat(4.0));
        assert!(outer.contains_point(Vec3::ZERO));
        assert!(outer.contains_point(Vec3::splat(4.0)));
        assert!(!outer.contains_point(Vec3::splat(4.1)));
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(aabb.centroid(), Vec3::new(5.0, 5.0, 5.0));
    }
}
