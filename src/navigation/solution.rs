//! The path the robot actually traveled, with cost accounting and
//! line-of-sight simplification.

use crate::common::Point2D;
use std::convert::Infallible;
use tracing::{debug, warn};

/// A visited point and its remaining distance to the end of the path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionEntry {
    pub point: Point2D,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Visit {
    point: Point2D,
    /// Path length from the first point up to this one
    traveled: f64,
}

/// Ordered sequence of distinct visited points.
///
/// Appending is constant time. Remaining costs are derived from the
/// distance traveled up to each point, so they never need a backward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    visits: Vec<Visit>,
}

impl Solution {
    pub fn new() -> Self {
        Solution::default()
    }

    /// Build a solution from a sequence of points
    pub fn from_points<I: IntoIterator<Item = Point2D>>(points: I) -> Self {
        let mut solution = Solution::new();
        for point in points {
            solution.add(point);
        }
        solution
    }

    /// Append a point unless it repeats the last one. Returns whether the
    /// point was appended.
    pub fn add(&mut self, point: Point2D) -> bool {
        let traveled = match self.visits.last() {
            Some(last) if last.point == point => return false,
            Some(last) => last.traveled + last.point.distance(&point),
            None => 0.0,
        };
        self.visits.push(Visit { point, traveled });
        true
    }

    /// Total path length, which is also the remaining cost of the first entry
    pub fn cost(&self) -> f64 {
        self.visits.last().map_or(0.0, |v| v.traveled)
    }

    pub fn total_cost(&self) -> f64 {
        self.cost()
    }

    fn remaining(&self, index: usize) -> f64 {
        self.cost() - self.visits[index].traveled
    }

    /// Every point with its remaining distance to the end of the path
    pub fn entries(&self) -> Vec<SolutionEntry> {
        let total = self.cost();
        self.visits
            .iter()
            .map(|v| SolutionEntry {
                point: v.point,
                cost: total - v.traveled,
            })
            .collect()
    }

    pub fn points(&self) -> Vec<Point2D> {
        self.visits.iter().map(|v| v.point).collect()
    }

    pub fn first(&self) -> Option<Point2D> {
        self.visits.first().map(|v| v.point)
    }

    pub fn last(&self) -> Option<Point2D> {
        self.visits.last().map(|v| v.point)
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn clear(&mut self) {
        self.visits.clear();
    }

    /// Greedy string-pulling with an infallible clear-path predicate
    pub fn simplify<F>(&mut self, mut is_clear: F)
    where
        F: FnMut(Point2D, Point2D) -> bool,
    {
        let result: Result<(), Infallible> = self.try_simplify(|a, b| Ok(is_clear(a, b)));
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Greedy string-pulling.
    ///
    /// From each retained point, jump to the later point with the lowest
    /// remaining cost (the farthest one on ties) that the predicate accepts.
    /// If nothing passes, the walked edge to the next point is kept. Paths of
    /// two points or fewer are left alone.
    pub fn try_simplify<F, E>(&mut self, mut is_clear: F) -> Result<(), E>
    where
        F: FnMut(Point2D, Point2D) -> Result<bool, E>,
    {
        if self.visits.len() <= 2 {
            return Ok(());
        }

        let last = self.visits.len() - 1;
        let mut kept = vec![self.visits[0].point];
        let mut i = 0;

        while i < last {
            let from = self.visits[i].point;
            let mut best: Option<usize> = None;
            for j in (i + 1)..=last {
                if !is_clear(from, self.visits[j].point)? {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some(b) => self.remaining(j) <= self.remaining(b),
                };
                if better {
                    best = Some(j);
                }
            }

            let next = match best {
                Some(j) => j,
                None => {
                    warn!(
                        "Solution: walked edge {} -> {} no longer clear, keeping it",
                        from,
                        self.visits[i + 1].point
                    );
                    i + 1
                }
            };
            kept.push(self.visits[next].point);
            i = next;
        }

        let before = self.visits.len();
        *self = Solution::from_points(kept);
        debug!(
            "Solution: simplified {} points to {} (length {:.3})",
            before,
            self.len(),
            self.total_cost()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::segment_polygon_distance;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn test_add_collapses_repeats() {
        let mut solution = Solution::new();
        assert!(solution.add(p(0.0, 0.0)));
        assert!(!solution.add(p(0.0, 0.0)));
        assert!(solution.add(p(1.0, 0.0)));
        assert!(solution.add(p(0.0, 0.0)));
        assert_eq!(solution.len(), 3);
    }

    #[test]
    fn test_cost_accumulates_backwards() {
        let solution = Solution::from_points([p(0.0, 0.0), p(3.0, 0.0), p(3.0, 4.0)]);
        assert_relative_eq!(solution.cost(), 7.0);
        let costs: Vec<f64> = solution.entries().iter().map(|e| e.cost).collect();
        assert_eq!(costs, vec![7.0, 4.0, 0.0]);
    }

    #[test]
    fn test_cost_follows_appends() {
        let mut solution = Solution::new();
        assert_eq!(solution.cost(), 0.0);
        solution.add(p(0.0, 0.0));
        solution.add(p(0.0, 2.0));
        assert_relative_eq!(solution.total_cost(), 2.0);
        solution.add(p(0.0, 2.0));
        solution.add(p(1.0, 2.0));

        let costs: Vec<f64> = solution.entries().iter().map(|e| e.cost).collect();
        assert_eq!(costs, vec![3.0, 1.0, 0.0]);
        solution.clear();
        assert_eq!(solution.total_cost(), 0.0);
    }

    #[test]
    fn test_short_paths_untouched() {
        let mut solution = Solution::from_points([p(0.0, 0.0), p(5.0, 5.0)]);
        solution.simplify(|_, _| false);
        assert_eq!(solution.points(), vec![p(0.0, 0.0), p(5.0, 5.0)]);
    }

    #[test]
    fn test_simplify_around_box() {
        let blocked = [p(1.0, 1.0), p(2.0, 1.0), p(2.0, 2.0), p(1.0, 2.0)];
        let mut solution =
            Solution::from_points([p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)]);
        solution.simplify(|a, b| segment_polygon_distance(a, b, &blocked) > 0.0);

        let points = solution.points();
        assert!(points.len() <= 4);
        assert_eq!(points.first(), Some(&p(0.0, 0.0)));
        assert_eq!(points.last(), Some(&p(0.0, 2.0)));
        for pair in points.windows(2) {
            assert!(segment_polygon_distance(pair[0], pair[1], &blocked) > 0.0);
        }
    }

    #[test]
    fn test_simplify_keeps_walked_edge_when_nothing_clear() {
        let mut solution = Solution::from_points([p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]);
        solution.simplify(|_, _| false);
        assert_eq!(solution.len(), 3);
    }

    #[test]
    fn test_try_simplify_propagates_errors() {
        let mut solution = Solution::from_points([p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]);
        let result = solution.try_simplify(|_, _| Err("map offline"));
        assert_eq!(result, Err("map offline"));
        assert_eq!(solution.len(), 3);
    }

    #[test]
    fn test_simplify_prefers_lowest_cost_on_detour() {
        // wandering path that comes back past its own start line
        let mut solution = Solution::from_points([
            p(0.0, 0.0),
            p(0.0, 3.0),
            p(4.0, 3.0),
            p(4.0, 0.0),
            p(8.0, 0.0),
        ]);
        solution.simplify(|_, _| true);
        assert_eq!(solution.points(), vec![p(0.0, 0.0), p(8.0, 0.0)]);
        assert_relative_eq!(solution.total_cost(), 8.0);
    }

    proptest! {
        #[test]
        fn prop_solution_invariants(
            raw in prop::collection::vec(((-5i32..5), (-5i32..5)), 1..40),
        ) {
            let points: Vec<Point2D> = raw.iter().map(|(x, y)| p(*x as f64, *y as f64)).collect();
            let solution = Solution::from_points(points);
            let entries = solution.entries();

            for pair in entries.windows(2) {
                prop_assert_ne!(pair[0].point, pair[1].point);
                prop_assert!(pair[0].cost >= pair[1].cost);
            }
            prop_assert_eq!(entries.last().map(|e| e.cost), Some(0.0));
        }

        #[test]
        fn prop_simplify_respects_predicate(
            raw in prop::collection::vec(((-6i32..6), (-6i32..6)), 1..25),
        ) {
            let blocked = [p(-1.5, -1.5), p(1.5, -1.5), p(1.5, 1.5), p(-1.5, 1.5)];
            let is_clear = |a: Point2D, b: Point2D| segment_polygon_distance(a, b, &blocked) > 0.0;

            let original = Solution::from_points(raw.iter().map(|(x, y)| p(*x as f64, *y as f64)));
            let mut simplified = original.clone();
            simplified.simplify(is_clear);

            prop_assert!(simplified.len() <= original.len());
            prop_assert_eq!(simplified.first(), original.first());
            prop_assert_eq!(simplified.last(), original.last());

            // every edge either passes the predicate or was walked originally
            let walked: Vec<(Point2D, Point2D)> = original
                .points()
                .windows(2)
                .map(|w| (w[0], w[1]))
                .collect();
            for pair in simplified.points().windows(2) {
                prop_assert!(is_clear(pair[0], pair[1]) || walked.contains(&(pair[0], pair[1])));
            }
        }
    }
}
