//! Lane abstraction letting one traversal routine serve single rays and
//! 4-wide packets.
//!
//! All decisions go through comparisons and `select` rather than
//! `min`/`max`, so a NaN operand (origin on a split plane of an axis the
//! ray is parallel to) always falls through to "visit both children".

use glam::{BVec4A, Vec4};
use std::ops::{BitAnd, BitOr, Mul, Not, Sub};

/// Boolean mask with one flag per lane.
pub trait LaneMask: Copy + BitAnd<Output = Self> + BitOr<Output = Self> + Not<Output = Self> {
    fn none() -> Self;
    fn from_fn(f: impl Fn(usize) -> bool) -> Self;
    fn any(self) -> bool;
    fn lane(self, i: usize) -> bool;
}

/// Scalar or SIMD float with per-lane comparison and blending.
pub trait Lanes: Copy + Sub<Output = Self> + Mul<Output = Self> {
    type Mask: LaneMask;

    const WIDTH: usize;

    fn splat(v: f32) -> Self;
    fn lt(self, rhs: Self) -> Self::Mask;
    fn le(self, rhs: Self) -> Self::Mask;
    fn gt(self, rhs: Self) -> Self::Mask;
    fn ge(self, rhs: Self) -> Self::Mask;
    fn is_nan(self) -> Self::Mask;
    /// Per lane: `if_true` where `mask` is set, `if_false` elsewhere.
    fn select(mask: Self::Mask, if_true: Self, if_false: Self) -> Self;
    fn lane(self, i: usize) -> f32;
    fn set_lane(&mut self, i: usize, v: f32);
}

impl LaneMask for bool {
    #[inline]
    fn none() -> Self {
        false
    }

    #[inline]
    fn from_fn(f: impl Fn(usize) -> bool) -> Self {
        f(0)
    }

    #[inline]
    fn any(self) -> bool {
        self
    }

    #[inline]
    fn lane(self, _i: usize) -> bool {
        self
    }
}

impl Lanes for f32 {
    type Mask = bool;

    const WIDTH: usize = 1;

    #[inline]
    fn splat(v: f32) -> Self {
        v
    }

    #[inline]
    fn lt(self, rhs: Self) -> bool {
        self < rhs
    }

    #[inline]
    fn le(self, rhs: Self) -> bool {
        self <= rhs
    }

    #[inline]
    fn gt(self, rhs: Self) -> bool {
        self > rhs
    }

    #[inline]
    fn ge(self, rhs: Self) -> bool {
        self >= rhs
    }

    #[inline]
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }

    #[inline]
    fn select(mask: bool, if_true: Self, if_false: Self) -> Self {
        if mask {
            if_true
        } else {
            if_false
        }
    }

    #[inline]
    fn lane(self, _i: usize) -> f32 {
        self
    }

    #[inline]
    fn set_lane(&mut self, _i: usize, v: f32) {
        *self = v;
    }
}

impl LaneMask for BVec4A {
    #[inline]
    fn none() -> Self {
        BVec4A::splat(false)
    }

    #[inline]
    fn from_fn(f: impl Fn(usize) -> bool) -> Self {
        BVec4A::new(f(0), f(1), f(2), f(3))
    }

    #[inline]
    fn any(self) -> bool {
        BVec4A::any(self)
    }

    #[inline]
    fn lane(self, i: usize) -> bool {
        (self.bitmask() >> i) & 1 != 0
    }
}

impl Lanes for Vec4 {
    type Mask = BVec4A;

    const WIDTH: usize = 4;

    #[inline]
    fn splat(v: f32) -> Self {
        Vec4::splat(v)
    }

    #[inline]
    fn lt(self, rhs: Self) -> BVec4A {
        self.cmplt(rhs)
    }

    #[inline]
    fn le(self, rhs: Self) -> BVec4A {
        self.cmple(rhs)
    }

    #[inline]
    fn gt(self, rhs: Self) -> BVec4A {
        self.cmpgt(rhs)
    }

    #[inline]
    fn ge(self, rhs: Self) -> BVec4A {
        self.cmpge(rhs)
    }

    #[inline]
    fn is_nan(self) -> BVec4A {
        self.cmpne(self)
    }

    #[inline]
    fn select(mask: BVec4A, if_true: Self, if_false: Self) -> Self {
        Vec4::select(mask, if_true, if_false)
    }

    #[inline]
    fn lane(self, i: usize) -> f32 {
        self[i]
    }

    #[inline]
    fn set_lane(&mut self, i: usize, v: f32) {
        self[i] = v;
    }
}
