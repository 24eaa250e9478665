use crate::Vec3;

/// A ray in 3D space with origin, direction, valid parametric range and time.
///
/// Points on the ray are `origin + t * direction` for `t` in `[mint, maxt]`.
/// The reciprocal direction is cached because every slab and split-plane test
/// divides by a direction component.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    direction: Vec3,
    d_rcp: Vec3,
    pub mint: f32,
    pub maxt: f32,
    pub time: f32,
}

impl Ray {
    /// Create a new unbounded ray (`mint = 0`, `maxt = +inf`).
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self {
            origin,
            direction,
            d_rcp: direction.recip(),
            mint: 0.0,
            maxt: f32::INFINITY,
            time,
        }
    }

    /// Create a ray at time 0 restricted to `[mint, maxt]`.
    pub fn segment(origin: Vec3, direction: Vec3, mint: f32, maxt: f32) -> Self {
        Self::new(origin, direction, 0.0).with_range(mint, maxt)
    }

    /// Returns a copy of this ray restricted to `[mint, maxt]`.
    #[inline]
    pub fn with_range(mut self, mint: f32, maxt: f32) -> Self {
        self.mint = mint;
        self.maxt = maxt;
        self
    }

    /// Returns a copy of this ray with a new far limit.
    #[inline]
    pub fn with_maxt(mut self, maxt: f32) -> Self {
        self.maxt = maxt;
        self
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the direction vector of the ray (not necessarily normalized).
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Component-wise reciprocal of the direction.
    ///
    /// Zero components map to an infinity carrying the zero's sign.
    #[inline]
    pub fn d_rcp(&self) -> Vec3 {
        self.d_rcp
    }

    /// Replace the direction, keeping the reciprocal in sync.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction;
        self.d_rcp = direction.recip();
    }

    /// Get the time value of the ray (used for motion blur).
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
