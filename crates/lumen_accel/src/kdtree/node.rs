//! Compact kd-tree node layout.

use bytemuck::{Pod, Zeroable};

/// Largest child index or index-array offset a node can hold.
pub const MAX_NODE_PAYLOAD: u32 = (1 << 30) - 1;

const LEAF_TAG: u32 = 3;

/// An 8-byte kd-tree node.
///
/// The low two bits of `data` hold the split axis (0..=2) or the leaf tag
/// (3); the remaining 30 bits hold the right child index for interior
/// nodes or the first index-array slot for leaves. `payload` is the split
/// coordinate (as raw bits) or the leaf's primitive count.
///
/// The left child of an interior node is always stored directly after it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct KdNode {
    data: u32,
    payload: u32,
}

impl KdNode {
    /// Interior node splitting `axis` at `split`.
    pub(crate) fn interior(axis: usize, split: f32, right_child: u32) -> Self {
        debug_assert!(axis < 3);
        debug_assert!(right_child <= MAX_NODE_PAYLOAD);
        Self {
            data: (right_child << 2) | axis as u32,
            payload: split.to_bits(),
        }
    }

    /// Leaf referencing `count` entries of the index array from `offset`.
    pub(crate) fn leaf(offset: u32, count: u32) -> Self {
        debug_assert!(offset <= MAX_NODE_PAYLOAD);
        Self {
            data: (offset << 2) | LEAF_TAG,
            payload: count,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.data & 3 == LEAF_TAG
    }

    /// Split axis of an interior node.
    #[inline]
    pub fn axis(&self) -> usize {
        (self.data & 3) as usize
    }

    /// Split coordinate of an interior node.
    #[inline]
    pub fn split(&self) -> f32 {
        f32::from_bits(self.payload)
    }

    /// Index of the right child of an interior node.
    #[inline]
    pub fn right_child(&self) -> usize {
        (self.data >> 2) as usize
    }

    /// First index-array slot of a leaf.
    #[inline]
    pub fn primitive_offset(&self) -> usize {
        (self.data >> 2) as usize
    }

    /// Number of primitives in a leaf.
    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.payload as usize
    }
}
