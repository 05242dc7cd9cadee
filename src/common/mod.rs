//! Common utilities and types for the local planner

pub mod geometry;

pub use self::geometry::{normalize_angle, Heading, Point2D, Pose};
