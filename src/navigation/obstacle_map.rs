//! Obstacle map capability and an in-memory implementation.
//!
//! The planner only ever talks to the `ObstacleMap` trait. Each recorded
//! obstacle is a point or polygon plus its own clearance buffer; a segment is
//! clear when it keeps at least `clearance` beyond every obstacle's buffer.

use crate::common::geometry::{
    point_polygon_distance, point_segment_distance, polygon_edges, ray_circle_intersection,
    ray_segment_intersection, segment_polygon_distance,
};
use crate::common::Point2D;
use crate::error::MapError;
use crate::navigation::geometry_cache::GeometryCache;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, RwLock};
use tracing::trace;

/// Sensed or configured obstacle shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObstacleGeometry {
    Point(Point2D),
    Polygon(Vec<Point2D>),
}

impl ObstacleGeometry {
    pub fn point(point: Point2D) -> Result<Self, MapError> {
        if !point.is_finite() {
            return Err(MapError::MalformedGeometry(format!(
                "non-finite point {:?}",
                point
            )));
        }
        Ok(ObstacleGeometry::Point(point))
    }

    /// Validate and build a polygon. A closing vertex equal to the first one
    /// is dropped.
    pub fn polygon(vertices: Vec<Point2D>) -> Result<Self, MapError> {
        let mut vertices = vertices;
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(MapError::MalformedGeometry(
                "polygon has non-finite vertices".to_string(),
            ));
        }
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(MapError::MalformedGeometry(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let doubled_area: f64 = polygon_edges(&vertices)
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        if doubled_area.abs() < 1e-12 {
            return Err(MapError::MalformedGeometry(
                "polygon has zero area".to_string(),
            ));
        }
        Ok(ObstacleGeometry::Polygon(vertices))
    }

    pub fn distance_to_point(&self, p: Point2D) -> f64 {
        match self {
            ObstacleGeometry::Point(center) => center.distance(&p),
            ObstacleGeometry::Polygon(vertices) => point_polygon_distance(p, vertices),
        }
    }

    pub fn distance_to_segment(&self, a: Point2D, b: Point2D) -> f64 {
        match self {
            ObstacleGeometry::Point(center) => point_segment_distance(*center, a, b),
            ObstacleGeometry::Polygon(vertices) => segment_polygon_distance(a, b, vertices),
        }
    }
}

/// A recorded obstacle: geometry plus its clearance buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub geometry: ObstacleGeometry,
    pub clearance: f64,
}

impl Obstacle {
    pub fn new(geometry: ObstacleGeometry, clearance: f64) -> Result<Self, MapError> {
        if !clearance.is_finite() || clearance < 0.0 {
            return Err(MapError::MalformedGeometry(format!(
                "clearance must be finite and non-negative, got {}",
                clearance
            )));
        }
        Ok(Obstacle {
            geometry,
            clearance,
        })
    }

    /// Circular obstacle centered on `center`
    pub fn circle(center: Point2D, radius: f64) -> Result<Self, MapError> {
        Obstacle::new(ObstacleGeometry::point(center)?, radius)
    }

    pub fn polygon(vertices: Vec<Point2D>, clearance: f64) -> Result<Self, MapError> {
        Obstacle::new(ObstacleGeometry::polygon(vertices)?, clearance)
    }

    /// Distance from `p` to the buffered footprint; 0 inside it
    pub fn distance_to_point(&self, p: Point2D) -> f64 {
        (self.geometry.distance_to_point(p) - self.clearance).max(0.0)
    }

    /// Whether a disc of radius `clearance` around `p` lies inside the
    /// buffered footprint
    pub fn covers(&self, p: Point2D, clearance: f64) -> bool {
        self.geometry.distance_to_point(p) + clearance <= self.clearance
    }

    /// Signed gap between the segment and the buffered footprint
    pub fn gap_to_segment(&self, a: Point2D, b: Point2D) -> f64 {
        self.geometry.distance_to_segment(a, b) - self.clearance
    }

    /// Distance along a ray to the buffered footprint. Polygon buffers are
    /// not inflated; the ray stops at the polygon's own edges.
    pub fn ray_intersection(&self, origin: Point2D, bearing: f64) -> Option<f64> {
        match &self.geometry {
            ObstacleGeometry::Point(center) => {
                ray_circle_intersection(origin, bearing, *center, self.clearance)
            }
            ObstacleGeometry::Polygon(vertices) => polygon_edges(vertices)
                .filter_map(|(a, b)| ray_segment_intersection(origin, bearing, a, b))
                .fold(None, |best: Option<f64>, t| {
                    Some(best.map_or(t, |b| b.min(t)))
                }),
        }
    }
}

/// Storage and clearance queries for sensed obstacles
pub trait ObstacleMap: Send + Sync {
    /// Record a point obstacle with its clearance buffer
    fn record(&self, point: Point2D, clearance: f64) -> Result<(), MapError> {
        self.record_geometry(ObstacleGeometry::point(point)?, clearance)
    }

    /// Record an arbitrary obstacle shape
    fn record_geometry(&self, geometry: ObstacleGeometry, clearance: f64) -> Result<(), MapError>;

    /// Whether segment `a`-`b` keeps at least `clearance` from every buffered obstacle
    fn is_clear_path(&self, a: Point2D, b: Point2D, clearance: f64) -> Result<bool, MapError>;

    /// Snapshot of every recorded obstacle
    fn obstacles(&self) -> Result<Vec<Obstacle>, MapError>;

    /// Distance to the closest buffered obstacle, infinite for an empty map
    fn nearest_obstacle_distance(&self, point: Point2D) -> Result<f64, MapError>;

    /// Whether recording `point` with `clearance` would add nothing to the
    /// footprint already stored
    fn covers(&self, point: Point2D, clearance: f64) -> Result<bool, MapError> {
        Ok(self
            .obstacles()?
            .iter()
            .any(|obstacle| obstacle.covers(point, clearance)))
    }
}

/// Append-only obstacle store kept in memory
#[derive(Debug)]
pub struct InMemoryObstacleMap {
    obstacles: RwLock<Vec<Obstacle>>,
    cache: Mutex<GeometryCache>,
}

impl Default for InMemoryObstacleMap {
    fn default() -> Self {
        InMemoryObstacleMap::new()
    }
}

impl InMemoryObstacleMap {
    pub fn new() -> Self {
        InMemoryObstacleMap::with_cache(GeometryCache::default())
    }

    /// Create a map that parses text geometry through `cache`
    pub fn with_cache(cache: GeometryCache) -> Self {
        InMemoryObstacleMap {
            obstacles: RwLock::new(Vec::new()),
            cache: Mutex::new(cache),
        }
    }

    /// Create a map pre-populated with obstacles
    pub fn from_obstacles(obstacles: Vec<Obstacle>) -> Self {
        let map = InMemoryObstacleMap::new();
        if let Ok(mut stored) = map.obstacles.write() {
            *stored = obstacles;
        }
        map
    }

    /// Parse `POINT(x y)` or `POLYGON((x y, ...))` text and record it
    pub fn record_wkt(&self, text: &str, clearance: f64) -> Result<(), MapError> {
        let geometry = {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| MapError::LockPoisoned("geometry cache"))?;
            cache.get_or_parse(text)?
        };
        self.record_geometry(geometry, clearance)
    }

    /// Drop every cached parse result
    pub fn clear_cache(&self) -> Result<(), MapError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| MapError::LockPoisoned("geometry cache"))?;
        cache.clear();
        Ok(())
    }

    /// (hits, misses) of the geometry cache
    pub fn cache_stats(&self) -> Result<(u64, u64), MapError> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| MapError::LockPoisoned("geometry cache"))?;
        Ok((cache.hits(), cache.misses()))
    }

    pub fn len(&self) -> Result<usize, MapError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, MapError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Obstacle>>, MapError> {
        self.obstacles
            .read()
            .map_err(|_| MapError::LockPoisoned("obstacle map"))
    }
}

impl ObstacleMap for InMemoryObstacleMap {
    fn record_geometry(&self, geometry: ObstacleGeometry, clearance: f64) -> Result<(), MapError> {
        let obstacle = Obstacle::new(geometry, clearance)?;
        let mut obstacles = self
            .obstacles
            .write()
            .map_err(|_| MapError::LockPoisoned("obstacle map"))?;
        trace!("ObstacleMap: recorded {:?}", obstacle.geometry);
        obstacles.push(obstacle);
        Ok(())
    }

    fn is_clear_path(&self, a: Point2D, b: Point2D, clearance: f64) -> Result<bool, MapError> {
        let obstacles = self.read()?;
        Ok(obstacles
            .iter()
            .all(|obstacle| obstacle.gap_to_segment(a, b) >= clearance))
    }

    fn obstacles(&self) -> Result<Vec<Obstacle>, MapError> {
        Ok(self.read()?.clone())
    }

    fn nearest_obstacle_distance(&self, point: Point2D) -> Result<f64, MapError> {
        Ok(self
            .read()?
            .iter()
            .map(|obstacle| obstacle.distance_to_point(point))
            .fold(f64::INFINITY, f64::min))
    }

    fn covers(&self, point: Point2D, clearance: f64) -> Result<bool, MapError> {
        Ok(self
            .read()?
            .iter()
            .any(|obstacle| obstacle.covers(point, clearance)))
    }
}
