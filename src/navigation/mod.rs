//! Navigation module for the Prometheus local planner
pub mod frontier;
pub mod geometry_cache;
pub mod obstacle_map;
pub mod planner;
pub mod solution;

pub use self::frontier::{Candidate, Frontier, Plateau};
pub use self::geometry_cache::GeometryCache;
pub use self::obstacle_map::{InMemoryObstacleMap, Obstacle, ObstacleGeometry, ObstacleMap};
pub use self::planner::{
    Planner, PlannerEvent, PlannerHandle, PlannerState, Target, TargetSelection,
};
pub use self::solution::{Solution, SolutionEntry};

use crate::common::Point2D;
use crate::config::PlannerConfig;
use crate::control::Mover;
use crate::error::NavigationError;
use crate::perception::sensors::DistanceSensor;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a navigation episode that reached its target
#[derive(Debug, Clone)]
pub struct NavigationReport {
    /// Every distinct position visited
    pub solution: Solution,
    /// The traveled path after string-pulling against the final map
    pub simplified: Solution,
    /// Step budget consumed
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveOutcome {
    Reached,
    Blocked,
    Redirected,
}

/// Drives sense, select and move episodes for one robot
pub struct NavigationStack {
    planner: PlannerHandle,
    map: Arc<dyn ObstacleMap>,
    mover: Box<dyn Mover>,
    config: PlannerConfig,
}

impl NavigationStack {
    /// Create a navigation stack. The planner starts at the mover's pose.
    pub fn new(
        config: PlannerConfig,
        map: Arc<dyn ObstacleMap>,
        sensor: Arc<dyn DistanceSensor>,
        mover: Box<dyn Mover>,
    ) -> Self {
        let mut planner = Planner::new(config.clone(), Arc::clone(&map), sensor);
        planner.update_position(mover.position());
        NavigationStack {
            planner: PlannerHandle::new(planner),
            map,
            mover,
            config,
        }
    }

    /// Shared handle for redirecting or observing the planner from elsewhere
    pub fn planner_handle(&self) -> PlannerHandle {
        self.planner.clone()
    }

    pub fn map(&self) -> Arc<dyn ObstacleMap> {
        Arc::clone(&self.map)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Set `goal` as the root target and run the episode to completion
    pub fn navigate_to(&mut self, goal: Point2D) -> Result<NavigationReport, NavigationError> {
        info!("Navigation: heading for {}", goal);
        self.planner.set_target(goal)?;
        self.run()
    }

    /// Run the episode for whatever target the planner currently holds.
    ///
    /// Sensing happens at every decision point: at the start, after a
    /// waypoint is reached, after a blocked move and after a redirect. Each
    /// sweep and the selection that follows it happen under one planner
    /// lock. Intermediate motion toward a waypoint only folds positions into
    /// the solution.
    ///
    /// An episode that fails for any reason other than an unreachable target
    /// is abandoned, so the next goal starts fresh.
    pub fn run(&mut self) -> Result<NavigationReport, NavigationError> {
        let result = self.drive_episode();
        if let Err(NavigationError::Planner(_)) = &result {
            if let Ok(mut planner) = self.planner.lock() {
                planner.abandon();
            }
        }
        result
    }

    fn drive_episode(&mut self) -> Result<NavigationReport, NavigationError> {
        let mut steps = 0;
        let mut selection = self.planner.sense_and_select(self.mover.position())?;

        loop {
            let waypoint = match selection {
                TargetSelection::Arrived => return self.finish(steps),
                TargetSelection::Unreachable => {
                    let target = self.planner.root_target()?.ok_or(NavigationError::NoTarget)?;
                    warn!("Navigation: no path to {} after {} steps", target, steps);
                    return Err(NavigationError::Unreachable { target });
                }
                TargetSelection::Idle => return Err(NavigationError::NoTarget),
                TargetSelection::Changed(waypoint) => {
                    debug!("Navigation: new waypoint {}", waypoint);
                    waypoint
                }
                TargetSelection::Unchanged(waypoint) => waypoint,
            };

            let before = steps;
            let outcome = self.drive_to(waypoint, &mut steps)?;
            if steps == before {
                // a decision that produced no motion still costs a step
                self.charge(&mut steps)?;
            }

            let pose = self.mover.position();
            match outcome {
                DriveOutcome::Reached => debug!("Navigation: reached {}", waypoint),
                DriveOutcome::Blocked => {
                    warn!(
                        "Navigation: blocked at {} while heading for {}",
                        pose.position, waypoint
                    );
                    self.planner.mark_current_blocked()?;
                }
                DriveOutcome::Redirected => info!("Navigation: target redirected"),
            }
            selection = self.planner.sense_and_select(pose)?;
        }
    }

    fn charge(&self, steps: &mut usize) -> Result<(), NavigationError> {
        let budget = self.config.step_budget;
        if *steps >= budget {
            self.planner.lock()?.abandon();
            error!("Navigation: step budget of {} exhausted, aborting", budget);
            return Err(NavigationError::StepBudgetExceeded { budget });
        }
        *steps += 1;
        Ok(())
    }

    /// Move toward `waypoint` in increments of at most `max_step_length`
    fn drive_to(
        &mut self,
        waypoint: Point2D,
        steps: &mut usize,
    ) -> Result<DriveOutcome, NavigationError> {
        loop {
            let pose = self.mover.position();
            let offset = waypoint - pose.position;
            let distance = offset.norm();
            if distance <= self.config.arrival_tolerance {
                return Ok(DriveOutcome::Reached);
            }
            if self.planner.target()? != Some(waypoint) {
                return Ok(DriveOutcome::Redirected);
            }

            self.charge(steps)?;
            let motion = if distance > self.config.max_step_length {
                offset * (self.config.max_step_length / distance)
            } else {
                offset
            };
            let moved = self.mover.move_by(motion);
            if moved.position == pose.position {
                return Ok(DriveOutcome::Blocked);
            }
            self.planner.update_position(moved)?;
        }
    }

    fn finish(&self, steps: usize) -> Result<NavigationReport, NavigationError> {
        let solution = self.planner.solution()?;
        let mut simplified = solution.clone();
        let margin = self.config.path_margin;
        simplified.try_simplify(|a, b| self.map.is_clear_path(a, b, margin))?;

        info!(
            "Navigation: arrived after {} steps, path of {} points ({:.2} m) simplified to {} points ({:.2} m)",
            steps,
            solution.len(),
            solution.total_cost(),
            simplified.len(),
            simplified.total_cost()
        );
        Ok(NavigationReport {
            solution,
            simplified,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Pose;
    use crate::control::SimulatedMover;
    use crate::perception::sensors::SimulatedRangeSensor;
    use approx::assert_relative_eq;

    fn stack(world: Vec<Obstacle>, config: PlannerConfig) -> NavigationStack {
        let map: Arc<dyn ObstacleMap> = Arc::new(InMemoryObstacleMap::new());
        let sensor = Arc::new(SimulatedRangeSensor::new(world.clone(), 4.0, 16));
        let mover = Box::new(SimulatedMover::new(Pose::default(), world));
        NavigationStack::new(config, map, sensor, mover)
    }

    #[test]
    fn test_open_world_goes_straight() {
        let mut nav = stack(Vec::new(), PlannerConfig::default());
        let report = nav.navigate_to(Point2D::new(3.5, 0.0)).unwrap();

        // 1.0 + 1.0 + 1.0 + 0.5
        assert_eq!(report.steps, 4);
        assert_eq!(report.solution.first(), Some(Point2D::ORIGIN));
        let end = report.solution.last().unwrap();
        assert_relative_eq!(end.x, 3.5, epsilon = 1e-9);
        assert_relative_eq!(report.simplified.total_cost(), 3.5, epsilon = 1e-9);
        assert_eq!(report.simplified.len(), 2);
    }

    #[test]
    fn test_budget_exceeded() {
        let config = PlannerConfig {
            step_budget: 2,
            ..PlannerConfig::default()
        };
        let mut nav = stack(Vec::new(), config);
        let err = nav.navigate_to(Point2D::new(10.0, 0.0)).unwrap_err();
        assert!(matches!(err, NavigationError::StepBudgetExceeded { budget: 2 }));
        assert_eq!(nav.planner_handle().state().unwrap(), PlannerState::Idle);
    }

    #[test]
    fn test_goal_after_budget_abort_starts_fresh_episode() {
        let config = PlannerConfig {
            step_budget: 3,
            ..PlannerConfig::default()
        };
        let mut nav = stack(Vec::new(), config);
        assert!(nav.navigate_to(Point2D::new(10.0, 0.0)).is_err());

        let report = nav.navigate_to(Point2D::new(3.0, 1.0)).unwrap();
        assert_eq!(report.solution.first(), Some(Point2D::new(3.0, 0.0)));
        assert_eq!(report.steps, 1);
        assert_relative_eq!(report.solution.total_cost(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_run_without_target() {
        let mut nav = stack(Vec::new(), PlannerConfig::default());
        assert!(matches!(nav.run(), Err(NavigationError::NoTarget)));
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Obstacle {
        Obstacle::polygon(
            vec![
                Point2D::new(x0, y0),
                Point2D::new(x1, y0),
                Point2D::new(x1, y1),
                Point2D::new(x0, y1),
            ],
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_boxed_in_robot_reports_unreachable() {
        // a closed room too small to place any candidate in
        let room = vec![
            rect(-0.5, -0.5, 0.5, -0.3),
            rect(-0.5, 0.3, 0.5, 0.5),
            rect(-0.5, -0.3, -0.3, 0.3),
            rect(0.3, -0.3, 0.5, 0.3),
        ];
        let mut nav = stack(room, PlannerConfig::default());
        match nav.navigate_to(Point2D::new(5.0, 0.0)) {
            Err(NavigationError::Unreachable { target }) => {
                assert_eq!(target, Point2D::new(5.0, 0.0))
            }
            other => panic!("expected unreachable, got {:?}", other.map(|r| r.steps)),
        }
        let handle = nav.planner_handle();
        assert_eq!(handle.state().unwrap(), PlannerState::Unreachable);
        assert!(!nav.map().obstacles().unwrap().is_empty());
    }
}
