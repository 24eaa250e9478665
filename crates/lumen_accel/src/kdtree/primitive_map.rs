//! Global primitive numbering across registered shapes.

use std::ops::Range;

use crate::error::{KdTreeError, KdTreeResult};

/// Largest global primitive id plus one. `u32::MAX` is kept free as the
/// miss sentinel in [`crate::PreliminaryIntersection`].
pub const MAX_PRIMITIVES: u32 = u32::MAX;

/// Maps a global primitive id to `(shape_index, local_index)`.
///
/// Shapes receive contiguous id ranges in registration order. Internally
/// this is an inclusive prefix sum: `offsets[i]` is the first global id of
/// shape `i` and the final entry is the total primitive count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveMap {
    offsets: Vec<u32>,
}

impl PrimitiveMap {
    /// Empty map with no shapes.
    pub fn new() -> Self {
        Self { offsets: vec![0] }
    }

    /// Register a shape with `count` primitives and return its index.
    pub fn push(&mut self, count: u32) -> KdTreeResult<u32> {
        let total = self.primitive_count();
        let new_total = total
            .checked_add(count)
            .filter(|&n| n < MAX_PRIMITIVES)
            .ok_or(KdTreeError::LimitExceeded {
                what: "primitive",
                count: total as usize + count as usize,
                limit: MAX_PRIMITIVES as usize - 1,
            })?;

        let shape_index = self.shape_count();
        self.offsets.push(new_total);
        Ok(shape_index)
    }

    /// Number of registered shapes.
    pub fn shape_count(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    /// Total number of primitives over all shapes.
    pub fn primitive_count(&self) -> u32 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Global id range owned by `shape`.
    pub fn range(&self, shape: u32) -> Range<u32> {
        let s = shape as usize;
        self.offsets[s]..self.offsets[s + 1]
    }

    /// Global id of primitive `local` in `shape`.
    #[inline]
    pub fn global(&self, shape: u32, local: u32) -> u32 {
        self.offsets[shape as usize] + local
    }

    /// Resolve a global id to `(shape_index, local_index)`.
    ///
    /// `global` must be below [`PrimitiveMap::primitive_count`]. Shapes
    /// without primitives own no ids and are never returned.
    #[inline]
    pub fn resolve(&self, global: u32) -> (u32, u32) {
        debug_assert!(global < self.primitive_count());
        // Number of shapes whose range ends at or before `global`
        let shape = self.offsets[1..].partition_point(|&end| end <= global);
        (shape as u32, global - self.offsets[shape])
    }
}

impl Default for PrimitiveMap {
    fn default() -> Self {
        Self::new()
    }
}
