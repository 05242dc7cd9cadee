//! Planner state machine.
//!
//! The planner owns the root/current target, the robot's last known pose, the
//! frontier and the traveled solution. Each call to `select_target` either
//! short-circuits to the root target (when the map says the straight line is
//! clear) or pops the best frontier candidate as the next waypoint.

use super::frontier::{Candidate, Frontier};
use super::obstacle_map::ObstacleMap;
use super::solution::Solution;
use crate::common::{Point2D, Pose};
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::perception::fusion::{FusionOutcome, SensorFusion};
use crate::perception::sensors::DistanceSensor;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Lifecycle of a planning episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// No target set, or the last episode was abandoned
    Idle,
    /// Root and current target set, frontier seeded
    HasTarget,
    /// Within arrival tolerance of the root target
    Arrived,
    /// Frontier exhausted; terminal until a new target is set
    Unreachable,
}

/// Root destination and the waypoint currently being pursued
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub root: Point2D,
    pub current: Point2D,
}

/// Result of a target selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSelection {
    /// A different waypoint than last time
    Changed(Point2D),
    /// The previous waypoint was reconfirmed
    Unchanged(Point2D),
    Arrived,
    Unreachable,
    Idle,
}

impl TargetSelection {
    /// Waypoint to pursue, if any
    pub fn waypoint(&self) -> Option<Point2D> {
        match self {
            TargetSelection::Changed(p) | TargetSelection::Unchanged(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.waypoint().is_some()
    }
}

/// Telemetry emitted after every planner state change
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerEvent {
    TargetSet { root: Point2D },
    TargetSelected { target: Point2D, changed: bool, direct: bool },
    PositionChanged { pose: Pose },
    Sensed { pose: Pose, outcome: FusionOutcome },
    CandidateBlocked { coordinate: Point2D },
    Arrived { position: Point2D },
    Unreachable { root: Point2D },
    Abandoned { root: Point2D },
}

pub struct Planner {
    config: PlannerConfig,
    map: Arc<dyn ObstacleMap>,
    sensor: Arc<dyn DistanceSensor>,
    fusion: SensorFusion,
    state: PlannerState,
    target: Option<Target>,
    pose: Option<Pose>,
    frontier: Frontier,
    active_candidate: Option<Candidate>,
    last_selected: Option<Point2D>,
    solution: Solution,
    listeners: Vec<Sender<PlannerEvent>>,
}

impl Planner {
    pub fn new(
        config: PlannerConfig,
        map: Arc<dyn ObstacleMap>,
        sensor: Arc<dyn DistanceSensor>,
    ) -> Self {
        Planner {
            fusion: SensorFusion::new(&config),
            config,
            map,
            sensor,
            state: PlannerState::Idle,
            target: None,
            pose: None,
            frontier: Frontier::new(),
            active_candidate: None,
            last_selected: None,
            solution: Solution::new(),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    /// Waypoint currently pursued
    pub fn target(&self) -> Option<Point2D> {
        self.target.map(|t| t.current)
    }

    pub fn root_target(&self) -> Option<Point2D> {
        self.target.map(|t| t.root)
    }

    pub fn targets(&self) -> Option<Target> {
        self.target
    }

    pub fn pose(&self) -> Option<Pose> {
        self.pose
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn map(&self) -> Arc<dyn ObstacleMap> {
        Arc::clone(&self.map)
    }

    /// Register a listener. Events are sent without blocking; a dropped
    /// receiver is forgotten on the next event.
    pub fn subscribe(&mut self) -> Receiver<PlannerEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: PlannerEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Set a new root target.
    ///
    /// A plateau seeded with the current position is pushed and the whole
    /// frontier is rescaled against the new target. Setting a target while
    /// one is active redirects the episode and keeps the traveled solution
    /// and frontier; otherwise both start over from the current position.
    pub fn set_target(&mut self, root: Point2D) {
        if self.state != PlannerState::HasTarget {
            self.solution.clear();
            self.frontier.clear();
            if let Some(pose) = self.pose {
                self.solution.add(pose.position);
            }
        }

        self.target = Some(Target {
            root,
            current: root,
        });
        self.state = PlannerState::HasTarget;
        self.active_candidate = None;
        self.last_selected = None;

        self.frontier.push_plateau();
        if let Some(pose) = self.pose {
            self.frontier.add(Candidate::scored(pose.position, &root));
        }
        self.frontier.rescale(&root);

        info!(
            "Planner: target set to {} ({} candidates in {} plateaus)",
            root,
            self.frontier.len(),
            self.frontier.depth()
        );
        self.emit(PlannerEvent::TargetSet { root });
    }

    /// Redirect the running episode to `root`. Returns false, leaving the
    /// planner untouched, when no episode is in progress.
    pub fn redirect(&mut self, root: Point2D) -> bool {
        if self.state != PlannerState::HasTarget {
            return false;
        }
        self.set_target(root);
        true
    }

    /// Give up on the active target. The traveled solution stays readable
    /// and the next `set_target` starts a fresh episode.
    pub fn abandon(&mut self) -> Option<Point2D> {
        if self.state != PlannerState::HasTarget {
            return None;
        }
        let root = self.target.take().map(|t| t.root);
        self.state = PlannerState::Idle;
        self.active_candidate = None;
        self.last_selected = None;
        self.frontier.clear();
        if let Some(root) = root {
            warn!("Planner: abandoned target {}", root);
            self.emit(PlannerEvent::Abandoned { root });
        }
        root
    }

    /// Record a new pose without sensing
    pub fn update_position(&mut self, pose: Pose) {
        self.pose = Some(pose);
        self.solution.add(pose.position);
        self.emit(PlannerEvent::PositionChanged { pose });
    }

    /// Record a new pose and, while a target is active, fold a fresh sensor
    /// sweep into the map and a new frontier plateau
    pub fn change_current_position(&mut self, pose: Pose) -> Result<(), PlannerError> {
        self.update_position(pose);

        let root = match (self.state, self.target) {
            (PlannerState::HasTarget, Some(target)) => target.root,
            _ => return Ok(()),
        };

        let readings = self.sensor.sense(&pose);
        self.frontier.push_plateau();
        let outcome = self.fusion.integrate(
            &pose,
            &readings,
            self.sensor.max_range(),
            &root,
            self.map.as_ref(),
            &mut self.frontier,
        )?;
        self.emit(PlannerEvent::Sensed { pose, outcome });

        if self.root_is_visible(pose.position, root)? {
            if let Some(target) = self.target.as_mut() {
                target.current = root;
            }
            self.active_candidate = None;
        }
        Ok(())
    }

    fn root_is_visible(&self, position: Point2D, root: Point2D) -> Result<bool, PlannerError> {
        Ok(self
            .map
            .is_clear_path(position, root, self.config.path_margin)?)
    }

    /// Choose the next waypoint
    pub fn select_target(&mut self) -> Result<TargetSelection, PlannerError> {
        let root = match (self.state, self.target) {
            (PlannerState::Arrived, _) => return Ok(TargetSelection::Arrived),
            (PlannerState::Unreachable, _) => return Ok(TargetSelection::Unreachable),
            (PlannerState::HasTarget, Some(target)) => target.root,
            _ => return Ok(TargetSelection::Idle),
        };
        let position = self.pose.map(|p| p.position);

        if let Some(position) = position {
            if position.distance(&root) <= self.config.arrival_tolerance {
                self.state = PlannerState::Arrived;
                self.active_candidate = None;
                info!("Planner: arrived at {}", root);
                self.emit(PlannerEvent::Arrived { position });
                return Ok(TargetSelection::Arrived);
            }

            if self.root_is_visible(position, root)? {
                self.active_candidate = None;
                return Ok(self.commit(root, true));
            }
        }

        while let Some(candidate) = self.frontier.pop() {
            let coordinate = candidate.coordinate();
            let at_candidate = position.map_or(false, |p| {
                p.distance(&coordinate) <= self.config.arrival_tolerance
            });
            if at_candidate {
                debug!("Planner: discarding candidate at current position {}", coordinate);
                continue;
            }
            self.active_candidate = Some(candidate);
            return Ok(self.commit(coordinate, false));
        }

        self.state = PlannerState::Unreachable;
        self.active_candidate = None;
        warn!("Planner: frontier exhausted, {} is unreachable", root);
        self.emit(PlannerEvent::Unreachable { root });
        Ok(TargetSelection::Unreachable)
    }

    fn commit(&mut self, waypoint: Point2D, direct: bool) -> TargetSelection {
        let changed = self.last_selected != Some(waypoint);
        self.last_selected = Some(waypoint);
        if let Some(target) = self.target.as_mut() {
            target.current = waypoint;
        }
        debug!(
            "Planner: heading for {} (changed: {}, direct: {})",
            waypoint, changed, direct
        );
        self.emit(PlannerEvent::TargetSelected {
            target: waypoint,
            changed,
            direct,
        });
        if changed {
            TargetSelection::Changed(waypoint)
        } else {
            TargetSelection::Unchanged(waypoint)
        }
    }

    /// Sense at `pose` and choose the next waypoint in one go
    pub fn sense_and_select(&mut self, pose: Pose) -> Result<TargetSelection, PlannerError> {
        self.change_current_position(pose)?;
        self.select_target()
    }

    /// Select a target; false once there is nothing further to do
    pub fn step(&mut self) -> Result<bool, PlannerError> {
        Ok(self.select_target()?.is_active())
    }

    /// The mover could not reach the current waypoint. The candidate it came
    /// from is marked impossible so the next selection moves on.
    pub fn mark_current_blocked(&mut self) {
        match self.active_candidate.take() {
            Some(candidate) => {
                let coordinate = candidate.coordinate();
                debug!("Planner: candidate {} marked impossible", coordinate);
                self.frontier.mark_impossible(candidate);
                self.emit(PlannerEvent::CandidateBlocked { coordinate });
            }
            None => debug!("Planner: blocked on the direct route to the root target"),
        }
    }
}

/// Shared planner guarded by a single lock. Target changes and sense/select
/// calls from different activities never interleave.
#[derive(Clone)]
pub struct PlannerHandle {
    inner: Arc<Mutex<Planner>>,
}

impl PlannerHandle {
    pub fn new(planner: Planner) -> Self {
        PlannerHandle {
            inner: Arc::new(Mutex::new(planner)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Planner>, PlannerError> {
        self.inner.lock().map_err(|_| PlannerError::LockPoisoned)
    }

    pub fn set_target(&self, root: Point2D) -> Result<(), PlannerError> {
        self.lock()?.set_target(root);
        Ok(())
    }

    /// Redirect the running episode under the lock; false when none is running
    pub fn redirect(&self, root: Point2D) -> Result<bool, PlannerError> {
        Ok(self.lock()?.redirect(root))
    }

    pub fn abandon(&self) -> Result<Option<Point2D>, PlannerError> {
        Ok(self.lock()?.abandon())
    }

    pub fn select_target(&self) -> Result<TargetSelection, PlannerError> {
        self.lock()?.select_target()
    }

    pub fn sense_and_select(&self, pose: Pose) -> Result<TargetSelection, PlannerError> {
        self.lock()?.sense_and_select(pose)
    }

    pub fn step(&self) -> Result<bool, PlannerError> {
        self.lock()?.step()
    }

    pub fn change_current_position(&self, pose: Pose) -> Result<(), PlannerError> {
        self.lock()?.change_current_position(pose)
    }

    pub fn update_position(&self, pose: Pose) -> Result<(), PlannerError> {
        self.lock()?.update_position(pose);
        Ok(())
    }

    pub fn mark_current_blocked(&self) -> Result<(), PlannerError> {
        self.lock()?.mark_current_blocked();
        Ok(())
    }

    pub fn target(&self) -> Result<Option<Point2D>, PlannerError> {
        Ok(self.lock()?.target())
    }

    pub fn root_target(&self) -> Result<Option<Point2D>, PlannerError> {
        Ok(self.lock()?.root_target())
    }

    pub fn state(&self) -> Result<PlannerState, PlannerError> {
        Ok(self.lock()?.state())
    }

    pub fn solution(&self) -> Result<Solution, PlannerError> {
        Ok(self.lock()?.solution().clone())
    }

    pub fn subscribe(&self) -> Result<Receiver<PlannerEvent>, PlannerError> {
        Ok(self.lock()?.subscribe())
    }
}
