use prometheus_local_planner::common::geometry::point_in_polygon;
use prometheus_local_planner::navigation::{
    Candidate, Frontier, InMemoryObstacleMap, ObstacleMap, Planner, PlannerState, Solution,
    TargetSelection,
};
use prometheus_local_planner::perception::{DistanceSensor, RangeReading};
use prometheus_local_planner::{PlannerConfig, Point2D, Pose};
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

fn p(x: f64, y: f64) -> Point2D {
    Point2D::new(x, y)
}

/// Reports the same free-space sweep (ahead, left, behind) from any pose
struct ThreeRaySensor;

impl DistanceSensor for ThreeRaySensor {
    fn sense(&self, _pose: &Pose) -> Vec<RangeReading> {
        vec![
            RangeReading::new(0.0, 4.0),
            RangeReading::new(FRAC_PI_2, 4.0),
            RangeReading::new(PI, 4.0),
        ]
    }

    fn max_range(&self) -> f64 {
        4.0
    }
}

fn planner_on(map: Arc<InMemoryObstacleMap>) -> Planner {
    let mut planner = Planner::new(PlannerConfig::default(), map, Arc::new(ThreeRaySensor));
    planner.update_position(Pose::default());
    planner
}

#[test]
fn test_pop_skips_impossible_candidate() {
    let target = Point2D::ORIGIN;
    let mut frontier = Frontier::new();
    frontier.push_plateau();
    for c in [p(2.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)] {
        frontier.add(Candidate::scored(c, &target));
    }

    let first = frontier.pop().unwrap();
    assert_eq!(first.coordinate(), p(1.0, 0.0));
    frontier.mark_impossible(first);
    assert_eq!(frontier.pop().unwrap().coordinate(), p(0.0, 1.0));
    assert_eq!(frontier.pop().unwrap().coordinate(), p(2.0, 0.0));
    assert!(frontier.pop().is_none());
}

#[test]
fn test_simplify_routes_around_box() {
    let obstacle = [p(1.0, 1.0), p(2.0, 1.0), p(2.0, 2.0), p(1.0, 2.0)];
    // clear unless some sample of the segment lies strictly inside the box
    let crosses_box = |a: Point2D, b: Point2D| {
        (1..100).any(|i| {
            let t = i as f64 / 100.0;
            let s = a + (b - a) * t;
            s.x > 1.0 && s.x < 2.0 && s.y > 1.0 && s.y < 2.0 && point_in_polygon(s, &obstacle)
        })
    };

    let mut solution = Solution::from_points([
        p(0.0, 0.0),
        p(1.0, 0.0),
        p(2.0, 0.0),
        p(2.0, 2.0),
        p(0.0, 2.0),
    ]);
    let walked = solution.total_cost();
    solution.simplify(|a, b| !crosses_box(a, b));

    let points = solution.points();
    assert!(points.len() <= 4);
    assert_eq!(points.first(), Some(&p(0.0, 0.0)));
    assert_eq!(points.last(), Some(&p(0.0, 2.0)));
    for pair in points.windows(2) {
        assert!(!crosses_box(pair[0], pair[1]));
    }
    assert!(solution.total_cost() <= walked);
}

#[test]
fn test_new_target_promotes_nearby_candidate() {
    let map = Arc::new(InMemoryObstacleMap::new());
    map.record(p(5.0, 0.0), 0.5).unwrap();
    map.record(p(0.0, 6.0), 0.5).unwrap();
    let mut planner = planner_on(map);

    planner.set_target(p(10.0, 0.0));
    planner.change_current_position(Pose::default()).unwrap();
    let ahead = planner.select_target().unwrap().waypoint().unwrap();
    assert!((ahead.x - 3.6).abs() < 1e-9 && ahead.y.abs() < 1e-9);

    // (0, 3.6) is the least attractive candidate for the first target
    let left = planner
        .frontier()
        .candidates()
        .find(|c| c.coordinate().x.abs() < 1e-9 && c.coordinate().y > 0.0)
        .cloned()
        .unwrap();
    assert!(left.effective_cost() > 10.0);

    planner.set_target(p(0.0, 10.0));
    match planner.select_target().unwrap() {
        TargetSelection::Changed(next) => {
            assert!(next.x.abs() < 1e-9);
            assert!((next.y - 3.6).abs() < 1e-9);
        }
        other => panic!("expected a new waypoint, got {:?}", other),
    }
}

#[test]
fn test_visible_root_overrides_frontier() {
    let map = Arc::new(InMemoryObstacleMap::new());
    map.record(p(5.0, 0.0), 0.5).unwrap();
    let mut planner = planner_on(map);
    let root = p(10.0, 0.0);

    planner.set_target(root);
    planner.change_current_position(Pose::default()).unwrap();
    assert!(planner.step().unwrap());
    assert_ne!(planner.target(), Some(root));

    // from here the straight line to the root passes well clear of (5, 0)
    planner.update_position(Pose::new(5.0, 3.0, 0.0));
    assert!(!planner.frontier().is_empty());
    assert!(planner.step().unwrap());
    assert_eq!(planner.target(), Some(root));
    assert!(!planner.frontier().is_empty());
    assert_eq!(planner.state(), PlannerState::HasTarget);
}
