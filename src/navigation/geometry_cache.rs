//! Bounded LRU cache for parsed obstacle geometry.
//!
//! Obstacle shapes arriving as text (`POINT(x y)`, `POLYGON((x y, ...))`) are
//! parsed once and reused. The cache is owned by whichever map needs it, so
//! tests can build a fresh one or `clear()` it between runs.

use crate::common::Point2D;
use crate::error::MapError;
use crate::navigation::obstacle_map::ObstacleGeometry;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct GeometryCache {
    capacity: usize,
    entries: HashMap<String, ObstacleGeometry>,
    // least recently used at the front
    recency: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for GeometryCache {
    fn default() -> Self {
        GeometryCache::new(DEFAULT_CAPACITY)
    }
}

impl GeometryCache {
    /// Create a cache holding at most `capacity` parsed shapes (minimum 1)
    pub fn new(capacity: usize) -> Self {
        GeometryCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached geometry for `text`, parsing it on a miss.
    /// Parse failures are not cached.
    pub fn get_or_parse(&mut self, text: &str) -> Result<ObstacleGeometry, MapError> {
        let key = text.trim();
        if let Some(geometry) = self.entries.get(key).cloned() {
            self.hits += 1;
            self.touch(key);
            return Ok(geometry);
        }

        self.misses += 1;
        let geometry = parse_wkt(key)?;
        self.entries.insert(key.to_string(), geometry.clone());
        self.recency.push_back(key.to_string());
        while self.entries.len() > self.capacity {
            match self.recency.pop_front() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                }
                None => break,
            }
        }
        Ok(geometry)
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Drop every entry and reset the counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

fn malformed(text: &str, reason: &str) -> MapError {
    MapError::MalformedGeometry(format!("{}: `{}`", reason, text))
}

fn strip_parens(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
}

fn parse_coordinate(text: &str, source: &str) -> Result<Point2D, MapError> {
    let mut parts = text.split_whitespace();
    let (x, y) = match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => (x, y),
        _ => return Err(malformed(source, "expected `x y` coordinate")),
    };
    let x: f64 = x
        .parse()
        .map_err(|_| malformed(source, "invalid x coordinate"))?;
    let y: f64 = y
        .parse()
        .map_err(|_| malformed(source, "invalid y coordinate"))?;
    Ok(Point2D::new(x, y))
}

/// Parse a `POINT` or single-ring `POLYGON` from well-known text
pub fn parse_wkt(text: &str) -> Result<ObstacleGeometry, MapError> {
    let trimmed = text.trim();
    let open = trimmed
        .find('(')
        .ok_or_else(|| malformed(text, "missing coordinate list"))?;
    let kind = trimmed[..open].trim().to_ascii_uppercase();
    let body = &trimmed[open..];

    match kind.as_str() {
        "POINT" => {
            let inner = strip_parens(body).ok_or_else(|| malformed(text, "unbalanced parentheses"))?;
            ObstacleGeometry::point(parse_coordinate(inner, text)?)
        }
        "POLYGON" => {
            let rings = strip_parens(body).ok_or_else(|| malformed(text, "unbalanced parentheses"))?;
            let ring = strip_parens(rings).ok_or_else(|| malformed(text, "unbalanced parentheses"))?;
            if ring.contains('(') || ring.contains(')') {
                return Err(malformed(text, "polygon holes are not supported"));
            }
            let vertices = ring
                .split(',')
                .map(|coord| parse_coordinate(coord, text))
                .collect::<Result<Vec<_>, _>>()?;
            ObstacleGeometry::polygon(vertices)
        }
        "" => Err(malformed(text, "missing geometry type")),
        _ => Err(malformed(text, "unsupported geometry type")),
    }
}
