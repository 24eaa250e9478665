//! Per-task scratch state for the builder.

use lumen_math::Aabb;

use super::stats::SplitCounters;

/// A primitive reference during construction: its global id and its box
/// restricted to the node currently holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PrimRef {
    pub index: u32,
    pub bbox: Aabb,
}

/// Event kinds in sweep order: at equal positions, primitives ending there
/// come before planar ones, which come before primitives starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EventKind {
    End,
    Planar,
    Start,
}

/// A primitive boundary on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EdgeEvent {
    pub position: f32,
    pub kind: EventKind,
}

/// Scratch buffers and counters owned by one build task.
///
/// The builder never shares a context between threads: the right half of
/// a forked subtree starts a fresh one and merges its counters back when
/// the join completes.
pub struct BuildContext {
    /// Per-axis histogram of primitive minima, `3 * bins` entries
    pub(crate) min_bins: Vec<u32>,
    /// Per-axis histogram of primitive maxima, `3 * bins` entries
    pub(crate) max_bins: Vec<u32>,
    pub(crate) bins: usize,
    /// Sorted edge events for the exact sweep
    pub(crate) events: Vec<EdgeEvent>,
    pub(crate) counters: SplitCounters,
}

impl BuildContext {
    pub fn new(bins: usize) -> Self {
        Self {
            min_bins: vec![0; 3 * bins],
            max_bins: vec![0; 3 * bins],
            bins,
            events: Vec::new(),
            counters: SplitCounters::default(),
        }
    }

    /// Zero the min-max histograms.
    pub(crate) fn reset_bins(&mut self) {
        self.min_bins.fill(0);
        self.max_bins.fill(0);
    }

    /// Histogram slices for one axis.
    pub(crate) fn axis_bins(&self, axis: usize) -> (&[u32], &[u32]) {
        let range = axis * self.bins..(axis + 1) * self.bins;
        (&self.min_bins[range.clone()], &self.max_bins[range])
    }
}
