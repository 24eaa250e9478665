//! Front-to-back traversal with an explicit stack of deferred far
//! children.

use lumen_math::Ray;

use super::{ordered_children, root_interval, split_distance, LaneMask, Lanes, QueryState, RayLanes, TreeView};
use crate::kdtree::MAX_DEPTH;

/// One push per interior node on the current path, so twice the depth
/// limit leaves ample headroom.
const STACK_SIZE: usize = 2 * MAX_DEPTH;

#[derive(Clone, Copy)]
struct StackEntry<L: Lanes> {
    node: usize,
    t_min: L,
    t_max: L,
    active: L::Mask,
}

pub(super) fn traverse<L: Lanes>(
    view: &TreeView<'_>,
    ray: &RayLanes<L>,
    rays: &[Ray],
    active: L::Mask,
    negative: [bool; 3],
    state: &mut QueryState<L>,
) {
    let (mut t_min, mut t_max) = root_interval(&view.bbox, ray);
    let mut active = active & t_min.le(t_max);

    let empty = StackEntry {
        node: 0,
        t_min,
        t_max,
        active: <L::Mask as LaneMask>::none(),
    };
    let mut stack = [empty; STACK_SIZE];
    let mut depth = 0;
    let mut index = 0;

    loop {
        active = active & !state.finished(t_min);

        if active.any() {
            let node = view.nodes[index];

            if !node.is_leaf() {
                let t_split = split_distance(&node, ray);
                let (near, far) = ordered_children(index, &node, negative);

                // NaN distances fail both tests and visit both children
                let wants_near = active & !t_split.lt(t_min);
                let wants_far = active & !t_split.gt(t_max);

                if !wants_far.any() {
                    index = near;
                    active = wants_near;
                } else if !wants_near.any() {
                    index = far;
                    active = wants_far;
                } else {
                    stack[depth] = StackEntry {
                        node: far,
                        t_min: L::select(t_split.gt(t_min), t_split, t_min),
                        t_max,
                        active: wants_far,
                    };
                    depth += 1;

                    index = near;
                    t_max = L::select(t_split.lt(t_max), t_split, t_max);
                    active = wants_near;
                }
                continue;
            }

            view.intersect_leaf(&node, rays, active, state);
        }

        if depth == 0 {
            break;
        }
        depth -= 1;
        let entry = stack[depth];
        index = entry.node;
        t_min = entry.t_min;
        t_max = entry.t_max;
        active = entry.active;
    }
}
