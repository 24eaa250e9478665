//! Split plane search.
//!
//! Two strategies share the same cost model: an exact sweep over sorted
//! primitive boundaries for small and medium nodes, and min-max binning
//! for the large nodes near the root where sorting would dominate.

use lumen_math::{axis_component, Aabb};

use super::context::{BuildContext, EdgeEvent, EventKind, PrimRef};
use super::sah::SurfaceAreaHeuristic;

/// Best split plane found for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SplitCandidate {
    pub axis: usize,
    pub position: f32,
    pub cost: f32,
    pub left_count: usize,
    pub right_count: usize,
}

#[inline]
fn keep_best(best: &mut Option<SplitCandidate>, candidate: SplitCandidate) {
    if best.map_or(true, |b| candidate.cost < b.cost) {
        *best = Some(candidate);
    }
}

/// Map a node-relative coordinate (already scaled to bin units) to a bin.
#[inline]
fn bin_index(scaled: f32, bins: usize) -> usize {
    if scaled > 0.0 {
        (scaled as usize).min(bins - 1)
    } else {
        0
    }
}

/// Approximate SAH split using per-axis histograms of primitive minima
/// and maxima.
///
/// Candidate planes are the interior bin boundaries. Primitives whose
/// minimum falls in an earlier bin count as left, those whose maximum
/// falls in the boundary's bin or later count as right.
pub(crate) fn find_binned(
    ctx: &mut BuildContext,
    prims: &[PrimRef],
    bbox: &Aabb,
    sah: &SurfaceAreaHeuristic,
) -> Option<SplitCandidate> {
    let bins = ctx.bins;
    let count = prims.len();
    let parent_area = bbox.surface_area();
    let extents = bbox.extents();

    let mut scale = [0.0f32; 3];
    for (axis, s) in scale.iter_mut().enumerate() {
        let extent = axis_component(extents, axis);
        if extent > 0.0 {
            *s = bins as f32 / extent;
        }
    }

    ctx.reset_bins();
    for prim in prims {
        for axis in 0..3 {
            if scale[axis] == 0.0 {
                continue;
            }
            let origin = axis_component(bbox.min, axis);
            let lo = bin_index((axis_component(prim.bbox.min, axis) - origin) * scale[axis], bins);
            let hi = bin_index((axis_component(prim.bbox.max, axis) - origin) * scale[axis], bins);
            ctx.min_bins[axis * bins + lo] += 1;
            ctx.max_bins[axis * bins + hi] += 1;
        }
    }

    let mut best = None;
    for axis in 0..3 {
        if scale[axis] == 0.0 {
            continue;
        }
        let lo = axis_component(bbox.min, axis);
        let hi = axis_component(bbox.max, axis);
        let width = (hi - lo) / bins as f32;
        let (mins, maxs) = ctx.axis_bins(axis);

        let mut left_count = 0usize;
        let mut ended = 0usize;
        for i in 1..bins {
            left_count += mins[i - 1] as usize;
            ended += maxs[i - 1] as usize;
            let right_count = count - ended;

            let position = lo + width * i as f32;
            if !(position > lo && position < hi) {
                continue;
            }
            let (left, right) = bbox.split(axis, position);
            let cost = sah.split_cost(
                parent_area,
                left.surface_area(),
                left_count,
                right.surface_area(),
                right_count,
            );
            keep_best(
                &mut best,
                SplitCandidate {
                    axis,
                    position,
                    cost,
                    left_count,
                    right_count,
                },
            );
        }
    }
    best
}

/// Exact SAH split by sweeping sorted primitive boundaries on each axis.
///
/// Planar primitives lying on a candidate plane are counted on the left,
/// matching how the node is partitioned afterwards.
pub(crate) fn find_exact(
    ctx: &mut BuildContext,
    prims: &[PrimRef],
    bbox: &Aabb,
    sah: &SurfaceAreaHeuristic,
) -> Option<SplitCandidate> {
    let count = prims.len();
    let parent_area = bbox.surface_area();
    let mut best = None;

    for axis in 0..3 {
        let lo = axis_component(bbox.min, axis);
        let hi = axis_component(bbox.max, axis);
        if !(hi > lo) {
            continue;
        }

        ctx.events.clear();
        for prim in prims {
            // Adding zero folds -0.0 into +0.0 so equal planes group together
            let a = axis_component(prim.bbox.min, axis) + 0.0;
            let b = axis_component(prim.bbox.max, axis) + 0.0;
            if a == b {
                ctx.events.push(EdgeEvent {
                    position: a,
                    kind: EventKind::Planar,
                });
            } else {
                ctx.events.push(EdgeEvent {
                    position: a,
                    kind: EventKind::Start,
                });
                ctx.events.push(EdgeEvent {
                    position: b,
                    kind: EventKind::End,
                });
            }
        }
        ctx.events.sort_unstable_by(|x, y| {
            x.position
                .total_cmp(&y.position)
                .then(x.kind.cmp(&y.kind))
        });

        let events = &ctx.events;
        let mut left_count = 0usize;
        let mut right_count = count;
        let mut i = 0;
        while i < events.len() {
            let position = events[i].position;
            let mut tally = [0usize; 3];
            while i < events.len() && events[i].position == position {
                tally[events[i].kind as usize] += 1;
                i += 1;
            }
            let [ending, planar, starting] = tally;

            right_count -= ending + planar;
            if position > lo && position < hi {
                let (left, right) = bbox.split(axis, position);
                let cost = sah.split_cost(
                    parent_area,
                    left.surface_area(),
                    left_count + planar,
                    right.surface_area(),
                    right_count,
                );
                keep_best(
                    &mut best,
                    SplitCandidate {
                        axis,
                        position,
                        cost,
                        left_count: left_count + planar,
                        right_count,
                    },
                );
            }
            left_count += starting + planar;
        }
    }
    best
}
