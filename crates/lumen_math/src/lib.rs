//! Lumen math types.
//!
//! Thin layer over glam with the geometric primitives shared by the
//! acceleration structure and its shapes: axis-aligned bounding boxes and
//! rays carrying their own valid range.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod ray;

pub use aabb::Aabb;
pub use ray::Ray;

/// Component `axis` (0=X, 1=Y, 2=Z) of a vector.
///
/// Kept as a free function because glam's indexing panics on out of range
/// values, and axis values here come from packed node data.
#[inline]
pub fn axis_component(v: Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_component() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(axis_component(v, 0), 1.0);
        assert_eq!(axis_component(v, 1), 2.0);
        assert_eq!(axis_component(v, 2), 3.0);
    }
}
