//! Build statistics.

use serde::Serialize;
use std::time::Duration;

/// Leaves with at least this many primitives share the last histogram bin.
pub const HISTOGRAM_BINS: usize = 16;

/// Summary of a finished kd-tree build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildStats {
    pub primitives: usize,
    pub interior_nodes: usize,
    pub leaf_nodes: usize,
    pub nonempty_leaves: usize,
    /// Total length of the leaf index array
    pub indices: usize,
    /// Deepest leaf, root is depth 0
    pub max_depth: usize,
    /// Subtrees collapsed back into a leaf because they were more
    /// expensive than the leaf they replaced
    pub retracted_splits: usize,
    /// Primitive references dropped by clipping
    pub pruned_primitives: usize,
    /// Splits accepted although they did not beat the leaf cost
    pub bad_refines: usize,
    /// Nodes turned into leaves because splitting them would have exceeded
    /// the reference budget
    pub duplication_leaves: usize,
    /// Expected SAH cost of the whole tree
    pub sah_cost: f32,
    /// `leaf_histogram[n]` is the number of leaves with `n` primitives
    pub leaf_histogram: Vec<usize>,
    #[serde(serialize_with = "serialize_duration")]
    pub build_time: Duration,
}

impl BuildStats {
    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.interior_nodes + self.leaf_nodes
    }

    /// Mean number of primitives in non-empty leaves.
    pub fn average_leaf_size(&self) -> f32 {
        if self.nonempty_leaves == 0 {
            0.0
        } else {
            self.indices as f32 / self.nonempty_leaves as f32
        }
    }

    pub(crate) fn record_leaf(&mut self, count: usize, depth: usize) {
        self.leaf_nodes += 1;
        self.indices += count;
        if count > 0 {
            self.nonempty_leaves += 1;
        }
        self.max_depth = self.max_depth.max(depth);

        if self.leaf_histogram.is_empty() {
            self.leaf_histogram = vec![0; HISTOGRAM_BINS];
        }
        self.leaf_histogram[count.min(HISTOGRAM_BINS - 1)] += 1;
    }

    /// Write the summary to the log.
    pub fn log(&self) {
        log::info!(
            "kd-tree built in {:.2}ms: {} primitives, {} nodes ({} interior, {} leaves, {} non-empty)",
            self.build_time.as_secs_f64() * 1000.0,
            self.primitives,
            self.node_count(),
            self.interior_nodes,
            self.leaf_nodes,
            self.nonempty_leaves
        );
        log::info!(
            "  depth {}, {} indices ({:.2} per leaf), SAH cost {:.2}",
            self.max_depth,
            self.indices,
            self.average_leaf_size(),
            self.sah_cost
        );
        log::debug!(
            "  retracted {} splits, accepted {} bad refines, pruned {} references",
            self.retracted_splits,
            self.bad_refines,
            self.pruned_primitives
        );
        if self.duplication_leaves > 0 {
            log::debug!(
                "  {} nodes stopped at the duplication limit",
                self.duplication_leaves
            );
        }
        for (count, leaves) in self.leaf_histogram.iter().enumerate() {
            if *leaves > 0 {
                let suffix = if count == HISTOGRAM_BINS - 1 { "+" } else { "" };
                log::debug!("  leaves with {count}{suffix} primitives: {leaves}");
            }
        }
    }
}

/// Counters collected while splitting, before the tree is flattened.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SplitCounters {
    pub retracted_splits: usize,
    pub pruned_primitives: usize,
    pub bad_refines: usize,
    pub duplication_leaves: usize,
}

impl SplitCounters {
    pub fn merge(&mut self, other: &SplitCounters) {
        self.retracted_splits += other.retracted_splits;
        self.pruned_primitives += other.pruned_primitives;
        self.bad_refines += other.bad_refines;
        self.duplication_leaves += other.duplication_leaves;
    }
}

fn serialize_duration<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_leaf() {
        let mut stats = BuildStats::default();
        stats.record_leaf(0, 3);
        stats.record_leaf(4, 5);
        stats.record_leaf(40, 2);

        assert_eq!(stats.leaf_nodes, 3);
        assert_eq!(stats.nonempty_leaves, 2);
        assert_eq!(stats.indices, 44);
        assert_eq!(stats.max_depth, 5);
        assert_eq!(stats.leaf_histogram[0], 1);
        assert_eq!(stats.leaf_histogram[4], 1);
        assert_eq!(stats.leaf_histogram[HISTOGRAM_BINS - 1], 1);
        assert!((stats.average_leaf_size() - 22.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = BuildStats {
            build_time: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["build_time"], 1.5);
        assert_eq!(json["leaf_nodes"], 0);
    }
}
