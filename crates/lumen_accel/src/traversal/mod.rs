//! Ray queries against a built kd-tree.
//!
//! Two traversal disciplines are provided and both work on single rays
//! and on 4-wide packets:
//!
//! - [`StackDiscipline::Stack`]: front-to-back descent that pushes the far
//!   child with its parametric range and pops it once the near side is
//!   exhausted.
//! - [`StackDiscipline::Restart`]: stackless descent that restarts from the
//!   root after each leaf with the ray's range advanced past that leaf.
//!
//! Closest-hit and any-hit queries share the same loops; they differ only
//! in when a lane is considered finished.

mod lanes;
mod packet;
mod restart;
mod stack;

use std::sync::Arc;

use glam::{BVec4A, Vec4};
use lumen_math::{axis_component, Aabb, Ray};
use serde::{Deserialize, Serialize};

use crate::kdtree::{KdNode, PrimitiveMap};
use crate::shape::{PreliminaryIntersection, Shape};
pub(crate) use lanes::{LaneMask, Lanes};
pub(crate) use packet::RayLanes;
pub use packet::{RayPacket, PACKET_WIDTH};

/// How the traversal remembers the far children it still has to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StackDiscipline {
    /// Explicit fixed-size stack of deferred far children
    #[default]
    Stack,
    /// No stack: restart from the root past the last visited leaf
    Restart,
}

impl StackDiscipline {
    pub const ALL: [StackDiscipline; 2] = [StackDiscipline::Stack, StackDiscipline::Restart];
}

/// What a query is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryKind {
    /// Nearest hit in the ray's range
    Closest,
    /// Any hit in the ray's range
    Any,
}

/// Per-lane progress of a query.
pub(crate) struct QueryState<L: Lanes> {
    kind: QueryKind,
    pub best_t: L,
    pub occluded: L::Mask,
    pub hits: [PreliminaryIntersection; PACKET_WIDTH],
}

impl<L: Lanes> QueryState<L> {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            best_t: L::splat(f32::INFINITY),
            occluded: <L::Mask as LaneMask>::none(),
            hits: [PreliminaryIntersection::NONE; PACKET_WIDTH],
        }
    }

    /// Lanes that no longer need a node whose range starts at `t_min`.
    #[inline]
    fn finished(&self, t_min: L) -> L::Mask {
        match self.kind {
            QueryKind::Closest => self.best_t.lt(t_min),
            QueryKind::Any => self.occluded,
        }
    }

    /// Active lanes whose query is settled by a leaf ending at `t_max`.
    #[inline]
    fn settled_in_leaf(&self, active: L::Mask, t_max: L) -> L::Mask {
        match self.kind {
            QueryKind::Closest => active & self.best_t.le(t_max),
            QueryKind::Any => active & self.occluded,
        }
    }
}

/// Borrowed view of a built tree, shared by all traversal routines.
pub(crate) struct TreeView<'a> {
    pub nodes: &'a [KdNode],
    pub indices: &'a [u32],
    pub shapes: &'a [Arc<dyn Shape>],
    pub map: &'a PrimitiveMap,
    pub bbox: Aabb,
}

impl TreeView<'_> {
    /// Trace a single ray.
    pub fn trace(&self, ray: &Ray, discipline: StackDiscipline, kind: QueryKind) -> QueryState<f32> {
        let mut state = QueryState::new(kind);
        if self.bbox.is_valid() {
            let lanes = RayLanes::from_ray(ray);
            let octant = packet::octant(ray);
            self.dispatch(&lanes, std::slice::from_ref(ray), true, octant, discipline, &mut state);
        }
        state
    }

    /// Trace a packet, one pass per direction octant present in it.
    pub fn trace_packet(
        &self,
        packet: &RayPacket,
        discipline: StackDiscipline,
        kind: QueryKind,
    ) -> QueryState<Vec4> {
        let mut state = QueryState::new(kind);
        if !self.bbox.is_valid() {
            return state;
        }

        let lanes = packet.lanes();
        let mut remaining: u8 = (1 << PACKET_WIDTH) - 1;
        while remaining != 0 {
            let octant = packet.octant(remaining.trailing_zeros() as usize);
            let group = (0..PACKET_WIDTH)
                .filter(|&i| remaining & (1 << i) != 0 && packet.octant(i) == octant)
                .fold(0u8, |mask, i| mask | (1 << i));
            remaining &= !group;

            let active = <BVec4A as LaneMask>::from_fn(|i| group & (1 << i) != 0);
            self.dispatch(&lanes, &packet.rays, active, octant, discipline, &mut state);
        }
        state
    }

    fn dispatch<L: Lanes>(
        &self,
        lanes: &RayLanes<L>,
        rays: &[Ray],
        active: L::Mask,
        octant: u8,
        discipline: StackDiscipline,
        state: &mut QueryState<L>,
    ) {
        let negative = [octant & 1 != 0, octant & 2 != 0, octant & 4 != 0];
        match discipline {
            StackDiscipline::Stack => stack::traverse(self, lanes, rays, active, negative, state),
            StackDiscipline::Restart => restart::traverse(self, lanes, rays, active, negative, state),
        }
    }

    /// Test the primitives of a leaf against every active lane.
    fn intersect_leaf<L: Lanes>(&self, node: &KdNode, rays: &[Ray], active: L::Mask, state: &mut QueryState<L>) {
        let start = node.primitive_offset();
        let prims = &self.indices[start..start + node.primitive_count()];
        if prims.is_empty() {
            return;
        }

        let mut occluded_bits = 0u32;
        for (lane, source) in rays.iter().enumerate().take(L::WIDTH) {
            if !active.lane(lane) {
                continue;
            }
            let mut ray = *source;
            let best = state.best_t.lane(lane);
            if best < ray.maxt {
                ray.maxt = best;
            }

            for &global in prims {
                let (shape, local) = self.map.resolve(global);
                let Some(hit) = self.shapes[shape as usize].intersect_primitive(local, &ray) else {
                    continue;
                };
                match state.kind {
                    QueryKind::Any => {
                        occluded_bits |= 1 << lane;
                        break;
                    }
                    QueryKind::Closest => {
                        if hit.t < state.best_t.lane(lane) {
                            state.best_t.set_lane(lane, hit.t);
                            state.hits[lane] = PreliminaryIntersection {
                                t: hit.t,
                                prim_uv: hit.uv,
                                shape_index: shape,
                                prim_index: local,
                                global_index: global,
                            };
                            ray.maxt = hit.t;
                        }
                    }
                }
            }
        }

        if occluded_bits != 0 {
            state.occluded = state.occluded | <L::Mask as LaneMask>::from_fn(|i| occluded_bits & (1 << i) != 0);
        }
    }
}

/// Parametric range each lane spends inside `bbox`, clipped to the rays'
/// own ranges. Empty lanes come back with `t_min > t_max`.
pub(crate) fn root_interval<L: Lanes>(bbox: &Aabb, ray: &RayLanes<L>) -> (L, L) {
    let mut t_min = ray.mint;
    let mut t_max = ray.maxt;
    for axis in 0..3 {
        let t0 = (L::splat(axis_component(bbox.min, axis)) - ray.origin[axis]) * ray.d_rcp[axis];
        let t1 = (L::splat(axis_component(bbox.max, axis)) - ray.origin[axis]) * ray.d_rcp[axis];
        // Unordered lanes run inside a slab boundary and are not constrained
        let ordered = t0.le(t1) | t0.gt(t1);
        let near = L::select(t0.lt(t1), t0, t1);
        let far = L::select(t0.gt(t1), t0, t1);
        t_min = L::select(ordered & near.gt(t_min), near, t_min);
        t_max = L::select(ordered & far.lt(t_max), far, t_max);
    }
    (t_min, t_max)
}

/// Parametric distance to the split plane of `node` for every lane.
#[inline]
pub(crate) fn split_distance<L: Lanes>(node: &KdNode, ray: &RayLanes<L>) -> L {
    let axis = node.axis();
    (L::splat(node.split()) - ray.origin[axis]) * ray.d_rcp[axis]
}

/// `(near, far)` child indices of the interior node at `index`.
#[inline]
pub(crate) fn ordered_children(index: usize, node: &KdNode, negative: [bool; 3]) -> (usize, usize) {
    let (left, right) = (index + 1, node.right_child());
    if negative[node.axis()] {
        (right, left)
    } else {
        (left, right)
    }
}
