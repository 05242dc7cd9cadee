//! Incremental local planner for the Prometheus mobile robot.
//!
//! The robot never holds a global map. It senses, records what it hit,
//! picks the most promising reachable point from a layered frontier, moves,
//! and repeats until it reaches the target or runs out of options.

pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod navigation;
pub mod perception;

pub use crate::common::{Heading, Point2D, Pose};
pub use crate::config::{LocalPlannerConfig, PlannerConfig, SimulationConfig};
pub use crate::error::{ConfigError, MapError, NavigationError, PlannerError};
pub use crate::navigation::{NavigationReport, NavigationStack, Planner, PlannerHandle};
