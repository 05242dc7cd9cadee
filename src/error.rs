//! Error types for the local planner

use crate::common::Point2D;
use thiserror::Error;

/// Errors raised by an obstacle map implementation
#[derive(Debug, Error)]
pub enum MapError {
    #[error("malformed obstacle geometry: {0}")]
    MalformedGeometry(String),

    #[error("failed to lock {0}")]
    LockPoisoned(&'static str),
}

/// Errors raised by the planner state machine
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("planner lock poisoned")]
    LockPoisoned,
}

/// Errors that end a navigation episode
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no path to {target}: frontier exhausted")]
    Unreachable { target: Point2D },

    #[error("step budget of {budget} exceeded before reaching the target")]
    StepBudgetExceeded { budget: usize },

    #[error("no target set")]
    NoTarget,

    #[error(transparent)]
    Planner(#[from] PlannerError),
}

impl From<MapError> for NavigationError {
    fn from(err: MapError) -> Self {
        NavigationError::Planner(PlannerError::Map(err))
    }
}

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
