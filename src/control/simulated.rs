//! Simulated mover for demos and tests

use super::Mover;
use crate::common::{Heading, Point2D, Pose};
use crate::navigation::obstacle_map::Obstacle;
use tracing::trace;

/// Moves in straight lines through a fixed world, refusing any motion whose
/// segment touches an obstacle footprint
#[derive(Debug, Clone)]
pub struct SimulatedMover {
    pose: Pose,
    world: Vec<Obstacle>,
}

impl SimulatedMover {
    pub fn new(start: Pose, world: Vec<Obstacle>) -> Self {
        SimulatedMover { pose: start, world }
    }

    fn is_blocked(&self, from: Point2D, to: Point2D) -> bool {
        self.world
            .iter()
            .any(|obstacle| obstacle.gap_to_segment(from, to) <= 0.0)
    }
}

impl Mover for SimulatedMover {
    fn position(&self) -> Pose {
        self.pose
    }

    fn move_by(&mut self, displacement: Point2D) -> Pose {
        if displacement.norm() == 0.0 {
            return self.pose;
        }
        let from = self.pose.position;
        let to = from + displacement;
        if self.is_blocked(from, to) {
            trace!("SimulatedMover: motion {} -> {} blocked", from, to);
            return self.pose;
        }
        self.pose = Pose::at(to, Heading::new(from.bearing_to(&to)));
        self.pose
    }
}
