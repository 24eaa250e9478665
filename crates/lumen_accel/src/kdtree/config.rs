//! Build configuration for [`KdTree`](super::KdTree).

use serde::{Deserialize, Serialize};

use super::sah::SurfaceAreaHeuristic;
use crate::error::{KdTreeError, KdTreeResult};

/// Hard upper bound on tree depth.
///
/// Traversal keeps a fixed-size stack of `2 * MAX_DEPTH` entries on the
/// call stack, so no query ever allocates.
pub const MAX_DEPTH: usize = 64;

/// Tuning knobs for kd-tree construction.
///
/// Set once before `build()`; the tree keeps its own copy afterwards.
/// Deserializes from JSON with any subset of fields present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdTreeConfig {
    /// SAH cost of testing one primitive
    pub intersection_cost: f32,
    /// SAH cost of traversing one interior node
    pub traversal_cost: f32,
    /// Multiplier in (0, 1] on the intersection cost of splits that leave
    /// one side empty
    pub empty_space_bonus: f32,
    /// Nodes with at most this many primitives become leaves
    pub stop_primitives: usize,
    /// Maximum depth; 0 picks `8 + 1.3 * log2(N)`
    pub max_depth: usize,
    /// Bins per axis for the approximate split search
    pub min_max_bins: usize,
    /// Clip straddling primitives to the child boxes
    pub clip_primitives: bool,
    /// Replace subtrees that turn out more expensive than a leaf
    pub retract_bad_splits: bool,
    /// Non-improving splits tolerated along one path before forcing a leaf
    pub max_bad_refines: usize,
    /// Nodes with more primitives than this use min-max binning
    pub exact_primitive_threshold: usize,
    /// Upper bound on leaf references as a multiple of the primitive
    /// count; splits that would duplicate straddlers past it become leaves
    pub max_duplication: f32,
    /// Fork subtree builds onto the rayon pool
    pub parallel_build: bool,
    /// Smallest subtree (in primitives) that gets its own task
    pub parallel_threshold: usize,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            intersection_cost: 20.0,
            traversal_cost: 15.0,
            empty_space_bonus: 0.9,
            stop_primitives: 6,
            max_depth: 0,
            min_max_bins: 128,
            clip_primitives: true,
            retract_bad_splits: true,
            max_bad_refines: 3,
            exact_primitive_threshold: 65536,
            max_duplication: 4.0,
            parallel_build: true,
            parallel_threshold: 8192,
        }
    }
}

impl KdTreeConfig {
    /// Set the SAH intersection and traversal costs.
    pub fn with_costs(mut self, intersection_cost: f32, traversal_cost: f32) -> Self {
        self.intersection_cost = intersection_cost;
        self.traversal_cost = traversal_cost;
        self
    }

    /// Set the empty-space bonus.
    pub fn with_empty_space_bonus(mut self, bonus: f32) -> Self {
        self.empty_space_bonus = bonus;
        self
    }

    /// Set the leaf size threshold.
    pub fn with_stop_primitives(mut self, count: usize) -> Self {
        self.stop_primitives = count;
        self
    }

    /// Set the maximum depth (0 = automatic).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the number of min-max bins per axis.
    pub fn with_min_max_bins(mut self, bins: usize) -> Self {
        self.min_max_bins = bins;
        self
    }

    /// Enable or disable primitive clipping.
    pub fn with_clip_primitives(mut self, clip: bool) -> Self {
        self.clip_primitives = clip;
        self
    }

    /// Enable or disable bad split retraction.
    pub fn with_retract_bad_splits(mut self, retract: bool) -> Self {
        self.retract_bad_splits = retract;
        self
    }

    /// Set the count above which min-max binning replaces the exact sweep.
    pub fn with_exact_primitive_threshold(mut self, threshold: usize) -> Self {
        self.exact_primitive_threshold = threshold;
        self
    }

    /// Set the reference budget as a multiple of the primitive count.
    pub fn with_max_duplication(mut self, factor: f32) -> Self {
        self.max_duplication = factor;
        self
    }

    /// Enable or disable parallel construction.
    pub fn with_parallel_build(mut self, parallel: bool) -> Self {
        self.parallel_build = parallel;
        self
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> KdTreeResult<()> {
        let positive = |name: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(KdTreeError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        };
        positive("intersection_cost", self.intersection_cost)?;
        positive("traversal_cost", self.traversal_cost)?;

        if !(self.empty_space_bonus > 0.0 && self.empty_space_bonus <= 1.0) {
            return Err(KdTreeError::InvalidConfig(format!(
                "empty_space_bonus must lie in (0, 1], got {}",
                self.empty_space_bonus
            )));
        }
        if !(self.max_duplication.is_finite() && self.max_duplication >= 1.0) {
            return Err(KdTreeError::InvalidConfig(format!(
                "max_duplication must be finite and at least 1, got {}",
                self.max_duplication
            )));
        }
        if self.max_depth > MAX_DEPTH {
            return Err(KdTreeError::LimitExceeded {
                what: "max depth",
                count: self.max_depth,
                limit: MAX_DEPTH,
            });
        }
        if self.min_max_bins < 2 {
            return Err(KdTreeError::InvalidConfig(format!(
                "min_max_bins must be at least 2, got {}",
                self.min_max_bins
            )));
        }
        Ok(())
    }

    /// Depth limit for a tree over `primitive_count` primitives.
    pub fn resolved_max_depth(&self, primitive_count: usize) -> usize {
        if self.max_depth > 0 {
            return self.max_depth.min(MAX_DEPTH);
        }
        let log2 = (primitive_count.max(1) as f32).log2();
        ((8.0 + 1.3 * log2).round() as usize).min(MAX_DEPTH)
    }

    /// Most leaf references a tree over `primitive_count` primitives may hold.
    pub fn reference_budget(&self, primitive_count: usize) -> usize {
        let budget = (primitive_count as f64 * f64::from(self.max_duplication)).floor();
        (budget as usize).max(primitive_count)
    }

    /// Cost model described by this configuration.
    pub fn sah(&self) -> SurfaceAreaHeuristic {
        SurfaceAreaHeuristic::new(
            self.intersection_cost,
            self.traversal_cost,
            self.empty_space_bonus,
        )
    }
}
