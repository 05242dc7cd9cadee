//! Sensor interfaces for the local planner

use crate::common::{normalize_angle, Pose};
use crate::navigation::obstacle_map::Obstacle;
use std::f64::consts::TAU;

/// One range-bearing return. The bearing is relative to the robot heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeReading {
    pub bearing: f64,
    pub range: f64,
}

impl RangeReading {
    pub fn new(bearing: f64, range: f64) -> Self {
        RangeReading { bearing, range }
    }

    pub fn is_finite(&self) -> bool {
        self.bearing.is_finite() && self.range.is_finite()
    }
}

/// A range sensor sweeping around the robot
pub trait DistanceSensor: Send + Sync {
    /// Take a sweep from `pose`. Rays that hit nothing report `max_range()`.
    fn sense(&self, pose: &Pose) -> Vec<RangeReading>;

    /// Farthest distance the sensor can report
    fn max_range(&self) -> f64;
}

/// Ray-casting sensor over a fixed set of world obstacles
#[derive(Debug, Clone)]
pub struct SimulatedRangeSensor {
    world: Vec<Obstacle>,
    max_range: f64,
    rays: usize,
}

impl SimulatedRangeSensor {
    pub fn new(world: Vec<Obstacle>, max_range: f64, rays: usize) -> Self {
        SimulatedRangeSensor {
            world,
            max_range,
            rays: rays.max(1),
        }
    }

    /// Relative bearings of every ray, evenly spaced around the robot
    pub fn bearings(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.rays).map(move |i| normalize_angle(i as f64 * TAU / self.rays as f64))
    }
}

impl DistanceSensor for SimulatedRangeSensor {
    fn sense(&self, pose: &Pose) -> Vec<RangeReading> {
        self.bearings()
            .map(|bearing| {
                let absolute = pose.heading.rotated(bearing).radians();
                let range = self
                    .world
                    .iter()
                    .filter_map(|obstacle| obstacle.ray_intersection(pose.position, absolute))
                    .fold(self.max_range, f64::min);
                RangeReading::new(bearing, range)
            })
            .collect()
    }

    fn max_range(&self) -> f64 {
        self.max_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Point2D;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_empty_world_reports_max_range() {
        let sensor = SimulatedRangeSensor::new(Vec::new(), 3.0, 8);
        let readings = sensor.sense(&Pose::default());
        assert_eq!(readings.len(), 8);
        assert!(readings.iter().all(|r| r.range == 3.0));
    }

    #[test]
    fn test_bearings_are_relative_to_heading() {
        let wall = Obstacle::polygon(
            vec![
                Point2D::new(-1.0, 2.0),
                Point2D::new(1.0, 2.0),
                Point2D::new(1.0, 2.5),
                Point2D::new(-1.0, 2.5),
            ],
            0.0,
        )
        .unwrap();
        let sensor = SimulatedRangeSensor::new(vec![wall], 5.0, 4);
        // facing +y, so the forward ray (bearing 0) sees the wall
        let readings = sensor.sense(&Pose::new(0.0, 0.0, FRAC_PI_2));

        let forward = readings.iter().find(|r| r.bearing == 0.0).unwrap();
        assert_relative_eq!(forward.range, 2.0, epsilon = 1e-9);
        let behind = readings.iter().find(|r| (r.bearing - PI).abs() < 1e-9).unwrap();
        assert_eq!(behind.range, 5.0);
    }
}
