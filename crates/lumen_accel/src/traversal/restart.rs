//! Stackless kd-restart traversal.
//!
//! Each pass descends from the root to the first leaf the ray's remaining
//! segment enters, tests it, and moves the segment start to the leaf's
//! exit distance. Planes at exactly the segment start send the ray to the
//! far side, which guarantees every pass makes progress.
//!
//! A ray lying inside a split plane has no defined side of it. Such lanes
//! trace both children as independent restart traversals over the node's
//! range and then rejoin the outer pass as if that node had been a leaf.

use lumen_math::Ray;

use super::{ordered_children, root_interval, split_distance, LaneMask, Lanes, QueryState, RayLanes, TreeView};

pub(super) fn traverse<L: Lanes>(
    view: &TreeView<'_>,
    ray: &RayLanes<L>,
    rays: &[Ray],
    active: L::Mask,
    negative: [bool; 3],
    state: &mut QueryState<L>,
) {
    let (t_min, scene_max) = root_interval(&view.bbox, ray);
    let restart = Restart {
        view,
        ray,
        rays,
        negative,
    };
    restart.subtree(0, active & t_min.le(scene_max), t_min, scene_max, state);
}

struct Restart<'a, 'v, L: Lanes> {
    view: &'a TreeView<'v>,
    ray: &'a RayLanes<L>,
    rays: &'a [Ray],
    negative: [bool; 3],
}

impl<L: Lanes> Restart<'_, '_, L> {
    /// Trace `lanes` through the subtree rooted at `root` over
    /// `[t_min, t_end]`, restarting from `root` after every leaf.
    fn subtree(&self, root: usize, lanes: L::Mask, mut t_min: L, t_end: L, state: &mut QueryState<L>) {
        let mut pending = lanes;

        loop {
            pending = pending & !state.finished(t_min);
            if !pending.any() {
                break;
            }

            let mut index = root;
            let mut t_max = t_end;
            let mut active = pending;
            let mut visited = <L::Mask as LaneMask>::none();

            while active.any() {
                let node = self.view.nodes[index];
                if node.is_leaf() {
                    self.view.intersect_leaf(&node, self.rays, active, state);
                    visited = visited | active;
                    break;
                }

                let t_split = split_distance(&node, self.ray);
                let (near, far) = ordered_children(index, &node, self.negative);

                let in_plane = active & t_split.is_nan();
                if in_plane.any() {
                    self.subtree(near, in_plane, t_min, t_max, state);
                    self.subtree(far, in_plane, t_min, t_max, state);
                    visited = visited | in_plane;
                    active = active & !in_plane;
                }

                // Lanes whose segment starts at or beyond the plane skip the
                // near side; the packet follows the near side if any lane needs
                // it and the rest wait for a later pass.
                let wants_near = active & !t_split.le(t_min);
                if wants_near.any() {
                    t_max = L::select(wants_near & t_split.lt(t_max), t_split, t_max);
                    active = wants_near;
                    index = near;
                } else {
                    index = far;
                }
            }

            let settled = state.settled_in_leaf(visited, t_max);
            let exhausted = visited & t_max.ge(t_end);
            pending = pending & !(settled | exhausted);
            t_min = L::select(visited, t_max, t_min);
        }
    }
}
