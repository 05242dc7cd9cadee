//! Control module: executes motion commands issued by the navigation stack
pub mod simulated;

use crate::common::{Point2D, Pose};

pub use self::simulated::SimulatedMover;

/// Executes relative motions and reports the resulting pose
pub trait Mover: Send {
    /// Current pose of the robot
    fn position(&self) -> Pose;

    /// Move by a world-frame displacement. A blocked motion leaves the pose
    /// unchanged.
    fn move_by(&mut self, displacement: Point2D) -> Pose;
}
