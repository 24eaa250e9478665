//! Surface area heuristic cost model.

/// Expected cost of a kd-tree node under the surface area heuristic.
///
/// The probability of a random ray crossing a child given that it crosses
/// the parent is the ratio of their surface areas. A split costs one
/// traversal step plus the expected number of primitive tests on each
/// side. When one side is empty the expected primitive tests are scaled
/// by `empty_space_bonus`; the traversal step is not discounted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceAreaHeuristic {
    intersection_cost: f32,
    traversal_cost: f32,
    empty_space_bonus: f32,
}

impl SurfaceAreaHeuristic {
    pub fn new(intersection_cost: f32, traversal_cost: f32, empty_space_bonus: f32) -> Self {
        Self {
            intersection_cost,
            traversal_cost,
            empty_space_bonus,
        }
    }

    pub fn intersection_cost(&self) -> f32 {
        self.intersection_cost
    }

    pub fn traversal_cost(&self) -> f32 {
        self.traversal_cost
    }

    pub fn empty_space_bonus(&self) -> f32 {
        self.empty_space_bonus
    }

    /// Cost of a leaf holding `count` primitives.
    #[inline]
    pub fn leaf_cost(&self, count: usize) -> f32 {
        self.intersection_cost * count as f32
    }

    /// Cost of splitting a node of area `parent_area` into children with
    /// the given areas and primitive counts.
    ///
    /// Returns `+inf` for a parent without area, since no ray is expected
    /// to hit such a node in the first place.
    #[inline]
    pub fn split_cost(
        &self,
        parent_area: f32,
        left_area: f32,
        left_count: usize,
        right_area: f32,
        right_count: usize,
    ) -> f32 {
        if !(parent_area > 0.0) {
            return f32::INFINITY;
        }
        let inv_area = 1.0 / parent_area;
        let p_left = left_area * inv_area;
        let p_right = right_area * inv_area;

        let bonus = if left_count == 0 || right_count == 0 {
            self.empty_space_bonus
        } else {
            1.0
        };
        self.traversal_cost
            + self.intersection_cost * bonus * (p_left * left_count as f32 + p_right * right_count as f32)
    }

    /// Cost of an interior node whose finished subtrees cost `left_cost`
    /// and `right_cost`.
    #[inline]
    pub fn interior_cost(
        &self,
        parent_area: f32,
        left_area: f32,
        left_cost: f32,
        right_area: f32,
        right_cost: f32,
    ) -> f32 {
        if !(parent_area > 0.0) {
            return f32::INFINITY;
        }
        self.traversal_cost + (left_area * left_cost + right_area * right_cost) / parent_area
    }
}
