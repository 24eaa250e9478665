//! Recursive SAH kd-tree construction.
//!
//! The tree is first built as a boxed binary tree so that subtrees can be
//! constructed on separate rayon tasks, then flattened depth-first into
//! the compact node array used for traversal.

use std::sync::Arc;
use std::time::Instant;

use lumen_math::{axis_component, Aabb};
use rayon::prelude::*;

use super::config::KdTreeConfig;
use super::context::{BuildContext, PrimRef};
use super::node::{KdNode, MAX_NODE_PAYLOAD};
use super::primitive_map::PrimitiveMap;
use super::sah::SurfaceAreaHeuristic;
use super::split::{find_binned, find_exact, SplitCandidate};
use super::stats::BuildStats;
use crate::error::{KdTreeError, KdTreeResult};
use crate::shape::Shape;

/// Leaves below this size are forced when a non-improving split is more
/// than four times the leaf cost.
const BAD_SPLIT_LEAF_SIZE: usize = 16;

/// Node of the intermediate tree.
pub(crate) enum BuildNode {
    Interior {
        axis: usize,
        split: f32,
        children: Box<[BuildNode; 2]>,
    },
    Leaf {
        indices: Vec<u32>,
    },
}

/// A finished subtree and its expected SAH cost.
struct Subtree {
    node: BuildNode,
    cost: f32,
}

/// Output of a successful build.
pub(crate) struct BuiltTree {
    pub nodes: Vec<KdNode>,
    pub indices: Vec<u32>,
    pub stats: BuildStats,
}

/// Recursive kd-tree builder over a fixed set of shapes.
pub(crate) struct Builder<'a> {
    config: &'a KdTreeConfig,
    sah: SurfaceAreaHeuristic,
    shapes: &'a [Arc<dyn Shape>],
    map: &'a PrimitiveMap,
    max_depth: usize,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a KdTreeConfig, shapes: &'a [Arc<dyn Shape>], map: &'a PrimitiveMap) -> Self {
        Self {
            config,
            sah: config.sah(),
            shapes,
            map,
            max_depth: config.resolved_max_depth(map.primitive_count() as usize),
        }
    }

    /// Build the tree over every registered primitive inside `bbox`.
    pub fn build(&self, bbox: Aabb) -> KdTreeResult<BuiltTree> {
        let start = Instant::now();
        let total = self.map.primitive_count() as usize;

        let prims = self.primitive_refs(&bbox);
        log::debug!(
            "kd-tree: {} primitive references, max depth {}",
            prims.len(),
            self.max_depth
        );

        let mut ctx = BuildContext::new(self.config.min_max_bins);
        ctx.counters.pruned_primitives += total - prims.len();
        let budget = self.config.reference_budget(prims.len());
        let root = self.build_node(&mut ctx, prims, bbox, 0, 0, budget);

        let mut tree = BuiltTree {
            nodes: Vec::new(),
            indices: Vec::new(),
            stats: BuildStats {
                primitives: total,
                sah_cost: root.cost,
                retracted_splits: ctx.counters.retracted_splits,
                pruned_primitives: ctx.counters.pruned_primitives,
                bad_refines: ctx.counters.bad_refines,
                duplication_leaves: ctx.counters.duplication_leaves,
                ..Default::default()
            },
        };
        flatten(root.node, 0, &mut tree)?;
        tree.stats.build_time = start.elapsed();
        Ok(tree)
    }

    /// Bounds of every primitive, clipped to the scene box.
    ///
    /// Primitives whose bounds are empty or invalid can never be hit and
    /// are left out.
    fn primitive_refs(&self, bbox: &Aabb) -> Vec<PrimRef> {
        (0..self.map.primitive_count())
            .into_par_iter()
            .filter_map(|index| {
                let (shape, local) = self.map.resolve(index);
                let prim_box = self.shapes[shape as usize].primitive_bbox(local).intersect(bbox);
                prim_box.is_valid().then_some(PrimRef {
                    index,
                    bbox: prim_box,
                })
            })
            .collect()
    }

    fn make_leaf(prims: &[PrimRef], cost: f32) -> Subtree {
        Subtree {
            node: BuildNode::Leaf {
                indices: prims.iter().map(|p| p.index).collect(),
            },
            cost,
        }
    }

    /// Leaf over the union of two child lists, each primitive once.
    fn merged_leaf(left: Vec<PrimRef>, right: Vec<PrimRef>, cost: f32) -> Subtree {
        let mut indices: Vec<u32> = left.iter().chain(&right).map(|p| p.index).collect();
        indices.sort_unstable();
        indices.dedup();
        Subtree {
            node: BuildNode::Leaf { indices },
            cost,
        }
    }

    fn find_split(&self, ctx: &mut BuildContext, prims: &[PrimRef], bbox: &Aabb) -> Option<SplitCandidate> {
        if prims.len() > self.config.exact_primitive_threshold {
            find_binned(ctx, prims, bbox, &self.sah)
        } else {
            find_exact(ctx, prims, bbox, &self.sah)
        }
    }

    fn build_node(
        &self,
        ctx: &mut BuildContext,
        prims: Vec<PrimRef>,
        bbox: Aabb,
        depth: usize,
        mut bad_refines: usize,
        budget: usize,
    ) -> Subtree {
        let count = prims.len();
        let leaf_cost = self.sah.leaf_cost(count);
        let area = bbox.surface_area();

        if count <= self.config.stop_primitives || depth >= self.max_depth || !(area > 0.0) {
            return Self::make_leaf(&prims, leaf_cost);
        }

        let Some(split) = self.find_split(ctx, &prims, &bbox) else {
            return Self::make_leaf(&prims, leaf_cost);
        };

        if split.cost >= leaf_cost {
            if (split.cost > 4.0 * leaf_cost && count < BAD_SPLIT_LEAF_SIZE)
                || bad_refines >= self.config.max_bad_refines
            {
                return Self::make_leaf(&prims, leaf_cost);
            }
            bad_refines += 1;
            ctx.counters.bad_refines += 1;
        }

        let (left_box, right_box) = bbox.split(split.axis, split.position);
        let (left, right) = self.partition(ctx, prims, split.axis, split.position, &left_box, &right_box);

        if left.len() + right.len() > budget {
            ctx.counters.duplication_leaves += 1;
            return Self::merged_leaf(left, right, leaf_cost);
        }
        let (left_budget, right_budget) = split_budget(budget, left.len(), right.len());

        let (left_tree, right_tree) =
            if self.config.parallel_build && count >= self.config.parallel_threshold {
                let (left_tree, (right_tree, counters)) = rayon::join(
                    || self.build_node(ctx, left, left_box, depth + 1, bad_refines, left_budget),
                    || {
                        let mut right_ctx = BuildContext::new(self.config.min_max_bins);
                        let tree = self.build_node(
                            &mut right_ctx,
                            right,
                            right_box,
                            depth + 1,
                            bad_refines,
                            right_budget,
                        );
                        (tree, right_ctx.counters)
                    },
                );
                ctx.counters.merge(&counters);
                (left_tree, right_tree)
            } else {
                let left_tree = self.build_node(ctx, left, left_box, depth + 1, bad_refines, left_budget);
                let right_tree = self.build_node(ctx, right, right_box, depth + 1, bad_refines, right_budget);
                (left_tree, right_tree)
            };

        let cost = self.sah.interior_cost(
            area,
            left_box.surface_area(),
            left_tree.cost,
            right_box.surface_area(),
            right_tree.cost,
        );

        if self.config.retract_bad_splits && cost >= leaf_cost {
            ctx.counters.retracted_splits += 1;
            let mut indices = Vec::with_capacity(count);
            collect_indices(left_tree.node, &mut indices);
            collect_indices(right_tree.node, &mut indices);
            indices.sort_unstable();
            indices.dedup();
            return Subtree {
                node: BuildNode::Leaf { indices },
                cost: leaf_cost,
            };
        }

        debug_assert!(
            split.position >= axis_component(bbox.min, split.axis)
                && split.position <= axis_component(bbox.max, split.axis)
        );
        Subtree {
            node: BuildNode::Interior {
                axis: split.axis,
                split: split.position,
                children: Box::new([left_tree.node, right_tree.node]),
            },
            cost,
        }
    }

    /// Distribute `prims` over the two children of a split.
    ///
    /// Primitives entirely at or below the plane go left (including planar
    /// ones lying on it), those at or above go right, and straddlers are
    /// clipped into both. The left list reuses the parent's allocation.
    fn partition(
        &self,
        ctx: &mut BuildContext,
        mut prims: Vec<PrimRef>,
        axis: usize,
        position: f32,
        left_box: &Aabb,
        right_box: &Aabb,
    ) -> (Vec<PrimRef>, Vec<PrimRef>) {
        let mut right = Vec::with_capacity(prims.len() / 2);
        let mut kept = 0;

        for i in 0..prims.len() {
            let prim = prims[i];
            let lo = axis_component(prim.bbox.min, axis);
            let hi = axis_component(prim.bbox.max, axis);

            if hi <= position {
                prims[kept] = prim;
                kept += 1;
            } else if lo >= position {
                right.push(prim);
            } else {
                match self.clip(&prim, left_box) {
                    Some(clipped) => {
                        prims[kept] = clipped;
                        kept += 1;
                    }
                    None => ctx.counters.pruned_primitives += 1,
                }
                match self.clip(&prim, right_box) {
                    Some(clipped) => right.push(clipped),
                    None => ctx.counters.pruned_primitives += 1,
                }
            }
        }

        prims.truncate(kept);
        (prims, right)
    }

    /// Restrict a straddling primitive to a child box. `None` when the
    /// primitive does not actually reach into the child.
    fn clip(&self, prim: &PrimRef, child: &Aabb) -> Option<PrimRef> {
        let bbox = if self.config.clip_primitives {
            let (shape, local) = self.map.resolve(prim.index);
            self.shapes[shape as usize]
                .primitive_bbox_clipped(local, child)
                .intersect(&prim.bbox)
        } else {
            prim.bbox.intersect(child)
        };
        bbox.is_valid().then_some(PrimRef {
            index: prim.index,
            bbox,
        })
    }
}

/// Share a node's reference budget between its children in proportion to
/// their sizes. Each child gets at least its own reference count.
fn split_budget(budget: usize, left: usize, right: usize) -> (usize, usize) {
    let total = left + right;
    let spare = budget - total;
    let left_spare = if total == 0 {
        spare / 2
    } else {
        (spare as f64 * left as f64 / total as f64) as usize
    };
    let left_budget = left + left_spare.min(spare);
    (left_budget, budget - left_budget)
}

/// Every primitive index referenced below `node`, unordered and possibly
/// repeated.
fn collect_indices(node: BuildNode, out: &mut Vec<u32>) {
    match node {
        BuildNode::Leaf { indices } => out.extend(indices),
        BuildNode::Interior { children, .. } => {
            let [left, right] = *children;
            collect_indices(left, out);
            collect_indices(right, out);
        }
    }
}

/// Append `node` and its subtree to the flat arrays in depth-first order.
fn flatten(node: BuildNode, depth: usize, tree: &mut BuiltTree) -> KdTreeResult<()> {
    match node {
        BuildNode::Leaf { indices } => {
            let offset = tree.indices.len();
            if offset > MAX_NODE_PAYLOAD as usize {
                return Err(KdTreeError::LimitExceeded {
                    what: "leaf index",
                    count: offset,
                    limit: MAX_NODE_PAYLOAD as usize,
                });
            }
            tree.stats.record_leaf(indices.len(), depth);
            tree.nodes.push(KdNode::leaf(offset as u32, indices.len() as u32));
            tree.indices.extend_from_slice(&indices);
            Ok(())
        }
        BuildNode::Interior { axis, split, children } => {
            let index = tree.nodes.len();
            tree.stats.interior_nodes += 1;
            // Patched once the right child's position is known
            tree.nodes.push(KdNode::leaf(0, 0));

            let [left, right] = *children;
            flatten(left, depth + 1, tree)?;

            let right_index = tree.nodes.len();
            if right_index > MAX_NODE_PAYLOAD as usize {
                return Err(KdTreeError::LimitExceeded {
                    what: "node",
                    count: right_index,
                    limit: MAX_NODE_PAYLOAD as usize,
                });
            }
            tree.nodes[index] = KdNode::interior(axis, split, right_index as u32);
            flatten(right, depth + 1, tree)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use lumen_math::Vec3;

    fn grid_mesh(n: usize) -> TriangleMesh {
        // n x n grid of small separated triangles in the z = 0 plane
        let mut tris = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let o = Vec3::new(i as f32 * 2.0, j as f32 * 2.0, 0.0);
                tris.push([o, o + Vec3::X, o + Vec3::Y]);
            }
        }
        TriangleMesh::from_triangles(&tris)
    }

    fn build(shapes: &[Arc<dyn Shape>], config: &KdTreeConfig) -> BuiltTree {
        let mut map = PrimitiveMap::new();
        let mut bbox = Aabb::EMPTY;
        for shape in shapes {
            map.push(shape.primitive_count()).unwrap();
            bbox.expand(&shape.bbox());
        }
        Builder::new(config, shapes, &map).build(bbox).unwrap()
    }

    /// Walk the flat tree and check every leaf's primitives overlap its box.
    fn check_containment(tree: &BuiltTree, shapes: &[Arc<dyn Shape>], node: usize, bbox: Aabb) {
        let n = tree.nodes[node];
        if n.is_leaf() {
            for &global in &tree.indices[n.primitive_offset()..n.primitive_offset() + n.primitive_count()] {
                let prim_box = shapes[0].primitive_bbox(global);
                assert!(prim_box.intersect(&bbox).is_valid());
            }
            return;
        }
        let (left, right) = bbox.split(n.axis(), n.split());
        assert!(n.split() >= axis_component(bbox.min, n.axis()));
        assert!(n.split() <= axis_component(bbox.max, n.axis()));
        check_containment(tree, shapes, node + 1, left);
        check_containment(tree, shapes, n.right_child(), right);
    }

    #[test]
    fn test_small_input_is_single_leaf() {
        let shapes: Vec<Arc<dyn Shape>> = vec![Arc::new(grid_mesh(2))];
        let tree = build(&shapes, &KdTreeConfig::default());
        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].is_leaf());
        assert_eq!(tree.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_grid_splits_and_contains() {
        let mesh = grid_mesh(16);
        let bbox = mesh.bbox();
        let shapes: Vec<Arc<dyn Shape>> = vec![Arc::new(mesh)];
        let tree = build(&shapes, &KdTreeConfig::default());

        assert!(tree.stats.interior_nodes > 0);
        assert_eq!(tree.stats.node_count(), tree.nodes.len());
        assert_eq!(tree.stats.indices, tree.indices.len());
        check_containment(&tree, &shapes, 0, bbox);

        // Every primitive is referenced at least once
        let mut seen = vec![false; 256];
        for &i in &tree.indices {
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_binned_and_parallel_paths() {
        let mesh = grid_mesh(24);
        let bbox = mesh.bbox();
        let shapes: Vec<Arc<dyn Shape>> = vec![Arc::new(mesh)];
        let mut config = KdTreeConfig::default()
            .with_exact_primitive_threshold(64)
            .with_min_max_bins(32);
        config.parallel_threshold = 32;

        let tree = build(&shapes, &config);
        check_containment(&tree, &shapes, 0, bbox);

        // Parallel and sequential builds produce the same tree
        let sequential = build(&shapes, &config.clone().with_parallel_build(false));
        assert_eq!(tree.nodes, sequential.nodes);
        assert_eq!(tree.indices, sequential.indices);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let shapes: Vec<Arc<dyn Shape>> = vec![Arc::new(grid_mesh(16))];
        let config = KdTreeConfig::default().with_max_depth(3).with_stop_primitives(1);
        let tree = build(&shapes, &config);
        assert!(tree.stats.max_depth <= 3);
    }

    #[test]
    fn test_split_budget() {
        assert_eq!(split_budget(40, 10, 10), (20, 20));
        assert_eq!(split_budget(30, 15, 5), (22, 8));
        assert_eq!(split_budget(7, 4, 3), (4, 3));
        assert_eq!(split_budget(5, 0, 0), (2, 3));
    }

    #[test]
    fn test_duplication_cap() {
        // Long thin triangles crossing the whole scene straddle every split
        let tris: Vec<_> = (0..64)
            .map(|i| {
                let y = i as f32 * 0.25;
                [Vec3::new(0.0, y, 0.0), Vec3::new(32.0, y + 0.1, 0.0), Vec3::new(32.0, y, 1.0)]
            })
            .collect();
        let shapes: Vec<Arc<dyn Shape>> = vec![Arc::new(TriangleMesh::from_triangles(&tris))];
        let config = KdTreeConfig::default()
            .with_stop_primitives(1)
            .with_max_duplication(1.25);
        let tree = build(&shapes, &config);

        assert!(tree.indices.len() <= 80);
        let mut seen = vec![false; 64];
        for &i in &tree.indices {
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_empty_input() {
        let shapes: Vec<Arc<dyn Shape>> = Vec::new();
        let tree = build(&shapes, &KdTreeConfig::default());
        assert_eq!(tree.nodes, vec![KdNode::leaf(0, 0)]);
        assert!(tree.indices.is_empty());
        assert_eq!(tree.stats.sah_cost, 0.0);
    }
}
