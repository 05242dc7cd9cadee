//! Sensor fusion: turns a range sweep into obstacle records and frontier
//! candidates.
//!
//! Candidates only ever come from sensor evidence. Each ray contributes one
//! candidate placed short of whatever it hit (or of its maximum range), so the
//! planner never selects a point it has not seen a way toward.

use crate::common::{Point2D, Pose};
use crate::config::PlannerConfig;
use crate::error::MapError;
use crate::navigation::frontier::{Candidate, Frontier};
use crate::navigation::obstacle_map::ObstacleMap;
use crate::perception::sensors::RangeReading;
use tracing::{debug, warn};

/// Counts from one sensing event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionOutcome {
    pub obstacles_recorded: usize,
    pub candidates_added: usize,
    /// Hits already covered by a recorded footprint
    pub hits_known: usize,
    pub readings_skipped: usize,
}

/// Folds range readings into the obstacle map and the frontier's top plateau
#[derive(Debug, Clone)]
pub struct SensorFusion {
    clearance: f64,
    standoff: f64,
    min_candidate_distance: f64,
}

impl SensorFusion {
    pub fn new(config: &PlannerConfig) -> Self {
        SensorFusion {
            clearance: config.clearance,
            standoff: config.candidate_standoff,
            min_candidate_distance: config.min_candidate_distance,
        }
    }

    /// Record hits and add candidates scored against `target`.
    ///
    /// Readings shorter than `max_range` are obstacle hits; readings at
    /// `max_range` are free-space rays that only contribute a candidate.
    pub fn integrate(
        &self,
        pose: &Pose,
        readings: &[RangeReading],
        max_range: f64,
        target: &Point2D,
        map: &dyn ObstacleMap,
        frontier: &mut Frontier,
    ) -> Result<FusionOutcome, MapError> {
        let mut outcome = FusionOutcome::default();

        for reading in readings {
            if !reading.is_finite() || reading.range < 0.0 {
                warn!("SensorFusion: ignoring invalid reading {:?}", reading);
                outcome.readings_skipped += 1;
                continue;
            }

            let range = reading.range.min(max_range);
            if range < max_range {
                let hit = pose.project(reading.bearing, range);
                if map.covers(hit, self.clearance)? {
                    outcome.hits_known += 1;
                } else {
                    map.record(hit, self.clearance)?;
                    outcome.obstacles_recorded += 1;
                }
            }

            let approach = range - self.standoff;
            if approach < self.min_candidate_distance {
                continue;
            }
            let coordinate = pose.project(reading.bearing, approach);
            if frontier.add(Candidate::scored(coordinate, target)) {
                outcome.candidates_added += 1;
            }
        }

        debug!(
            "SensorFusion: at {} recorded {} obstacles, added {} candidates",
            pose.position, outcome.obstacles_recorded, outcome.candidates_added
        );
        Ok(outcome)
    }
}
