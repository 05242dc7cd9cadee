//! Perception module for the local planner
pub mod fusion;
pub mod sensors;

pub use self::fusion::{FusionOutcome, SensorFusion};
pub use self::sensors::{DistanceSensor, RangeReading, SimulatedRangeSensor};
