//! Configuration for the local planner
//!
//! Settings are grouped into sections and loaded from a TOML file. Every
//! field has a default, so an empty file (or no file at all) is valid. Numeric
//! overrides can also be applied by name through `configure`, which is how the
//! node binary forwards operator parameters.

use crate::error::{ConfigError, MapError};
use crate::navigation::geometry_cache::parse_wkt;
use crate::navigation::obstacle_map::Obstacle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Full configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalPlannerConfig {
    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl LocalPlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: LocalPlannerConfig = toml::from_str(text)?;
        config.planner.validate()?;
        config.simulation.validate()?;
        Ok(config)
    }
}

/// Planner tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Buffer recorded around every sensed hit (meters)
    pub clearance: f64,
    /// Extra margin required on top of each obstacle's own buffer
    pub path_margin: f64,
    /// How far short of a sensed hit a candidate is placed (meters)
    pub candidate_standoff: f64,
    /// Candidates closer than this to the robot are not worth visiting
    pub min_candidate_distance: f64,
    /// Distance to the root target that counts as arrival
    pub arrival_tolerance: f64,
    /// Longest single motion command issued to the mover
    pub max_step_length: f64,
    /// Hard ceiling on motion commands per episode
    pub step_budget: usize,
    /// Entries kept by the obstacle map's geometry cache
    pub geometry_cache_capacity: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            clearance: 0.3,
            path_margin: 0.0,
            candidate_standoff: 0.4,
            min_candidate_distance: 0.1,
            arrival_tolerance: 0.05,
            max_step_length: 1.0,
            step_budget: 500,
            geometry_cache_capacity: 64,
        }
    }
}

impl PlannerConfig {
    /// Configure the planner with named parameters
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        let mut updated = self.clone();

        if let Some(&clearance) = params.get("clearance") {
            updated.clearance = clearance;
        }

        if let Some(&margin) = params.get("path_margin") {
            updated.path_margin = margin;
        }

        if let Some(&standoff) = params.get("candidate_standoff") {
            updated.candidate_standoff = standoff;
        }

        if let Some(&min_distance) = params.get("min_candidate_distance") {
            updated.min_candidate_distance = min_distance;
        }

        if let Some(&tolerance) = params.get("arrival_tolerance") {
            updated.arrival_tolerance = tolerance;
        }

        if let Some(&step_length) = params.get("max_step_length") {
            updated.max_step_length = step_length;
        }

        if let Some(&budget) = params.get("step_budget") {
            updated.step_budget = whole_number("step_budget", budget)?;
        }

        if let Some(&capacity) = params.get("geometry_cache_capacity") {
            updated.geometry_cache_capacity = whole_number("geometry_cache_capacity", capacity)?;
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("clearance", self.clearance)?;
        non_negative("path_margin", self.path_margin)?;
        non_negative("candidate_standoff", self.candidate_standoff)?;
        non_negative("min_candidate_distance", self.min_candidate_distance)?;
        positive("arrival_tolerance", self.arrival_tolerance)?;
        positive("max_step_length", self.max_step_length)?;
        if self.step_budget == 0 {
            return Err(ConfigError::invalid("step_budget", "must be at least 1"));
        }
        if self.geometry_cache_capacity == 0 {
            return Err(ConfigError::invalid(
                "geometry_cache_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Simulated world used by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub sensor_max_range: f64,
    pub sensor_rays: usize,
    /// World obstacles as `POINT`/`POLYGON` text
    pub obstacles: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            sensor_max_range: 4.0,
            sensor_rays: 16,
            obstacles: vec!["POLYGON((4.8 -2, 5.2 -2, 5.2 2, 4.8 2, 4.8 -2))".to_string()],
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("sensor_max_range", self.sensor_max_range)?;
        if self.sensor_rays == 0 {
            return Err(ConfigError::invalid("sensor_rays", "must be at least 1"));
        }
        self.world()
            .map_err(|err| ConfigError::invalid("obstacles", err.to_string()))?;
        Ok(())
    }

    /// Parse the world obstacles. Their footprint is exactly the geometry.
    pub fn world(&self) -> Result<Vec<Obstacle>, MapError> {
        self.obstacles
            .iter()
            .map(|text| Obstacle::new(parse_wkt(text)?, 0.0))
            .collect()
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(field, "must be positive"));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(field, "must be non-negative"));
    }
    Ok(())
}

fn whole_number(field: &str, value: f64) -> Result<usize, ConfigError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ConfigError::invalid(field, "must be a whole number"));
    }
    Ok(value as usize)
}
