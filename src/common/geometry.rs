//! Coordinate and position math.
//!
//! Everything in here is a plain value type or a pure function. Vector
//! arithmetic goes through nalgebra so the segment and ray helpers below read
//! the same way as the rest of the robot stack.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Tolerance used for degenerate-geometry checks
const EPSILON: f64 = 1e-12;

/// Normalize an angle to (-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// A point (or displacement) in the world frame, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ORIGIN: Point2D = Point2D { x: 0.0, y: 0.0 };

    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    /// Build a displacement from a bearing (radians) and a range
    pub fn from_polar(bearing: f64, range: f64) -> Self {
        let v = Rotation2::new(bearing) * Vector2::new(range, 0.0);
        Self::from_vector(v)
    }

    /// Split this displacement into (bearing, range)
    pub fn to_polar(&self) -> (f64, f64) {
        (Point2D::ORIGIN.bearing_to(self), self.norm())
    }

    pub fn from_vector(v: Vector2<f64>) -> Self {
        Point2D::new(v.x, v.y)
    }

    pub fn vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Length of this point viewed as a displacement
    pub fn norm(&self) -> f64 {
        self.vector().norm()
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point2D) -> f64 {
        (other.vector() - self.vector()).norm()
    }

    /// Bearing from this point to another. Coincident points give 0.
    pub fn bearing_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0.0 && dy == 0.0 {
            return 0.0;
        }
        dy.atan2(dx)
    }

    /// The point `range` meters away along `bearing`
    pub fn offset(&self, bearing: f64, range: f64) -> Point2D {
        *self + Point2D::from_polar(bearing, range)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Total order over coordinates (x first, then y)
    pub fn total_cmp(&self, other: &Point2D) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl Add for Point2D {
    type Output = Point2D;

    fn add(self, other: Point2D) -> Point2D {
        Point2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    fn sub(self, other: Point2D) -> Point2D {
        Point2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;

    fn mul(self, scale: f64) -> Point2D {
        Point2D::new(self.x * scale, self.y * scale)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Point2D::new(x, y)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Heading in radians, always within (-pi, pi]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Heading(f64);

impl Heading {
    pub fn new(radians: f64) -> Self {
        Heading(normalize_angle(radians))
    }

    pub fn radians(&self) -> f64 {
        self.0
    }

    /// Rotate by a relative angle
    pub fn rotated(&self, delta: f64) -> Heading {
        Heading::new(self.0 + delta)
    }
}

impl From<f64> for Heading {
    fn from(radians: f64) -> Self {
        Heading::new(radians)
    }
}

impl From<Heading> for f64 {
    fn from(heading: Heading) -> f64 {
        heading.0
    }
}

/// Position plus heading of the robot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point2D,
    pub heading: Heading,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose {
            position: Point2D::new(x, y),
            heading: Heading::new(theta),
        }
    }

    pub fn at(position: Point2D, heading: Heading) -> Self {
        Pose { position, heading }
    }

    /// World point seen at `bearing` (relative to the heading) and `range`
    pub fn project(&self, bearing: f64, range: f64) -> Point2D {
        self.position
            .offset(self.heading.rotated(bearing).radians(), range)
    }
}

fn cross(u: Vector2<f64>, v: Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Signed area of the triangle (o, a, b), doubled
fn orientation(o: Point2D, a: Point2D, b: Point2D) -> f64 {
    cross(a.vector() - o.vector(), b.vector() - o.vector())
}

fn within_bounds(p: Point2D, a: Point2D, b: Point2D) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Shortest distance from `p` to the segment `a`-`b`
pub fn point_segment_distance(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let ab = b.vector() - a.vector();
    let len_sq = ab.norm_squared();
    if len_sq < EPSILON {
        return p.distance(&a);
    }
    let t = ((p.vector() - a.vector()).dot(&ab) / len_sq).clamp(0.0, 1.0);
    let projection = a.vector() + ab * t;
    (p.vector() - projection).norm()
}

/// Whether the closed segments `a`-`b` and `c`-`d` touch
pub fn segments_intersect(a: Point2D, b: Point2D, c: Point2D, d: Point2D) -> bool {
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1.abs() < EPSILON && within_bounds(a, c, d))
        || (d2.abs() < EPSILON && within_bounds(b, c, d))
        || (d3.abs() < EPSILON && within_bounds(c, a, b))
        || (d4.abs() < EPSILON && within_bounds(d, a, b))
}

/// Shortest distance between segments `a`-`b` and `c`-`d`
pub fn segment_segment_distance(a: Point2D, b: Point2D, c: Point2D, d: Point2D) -> f64 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

/// Even-odd point-in-polygon test. The polygon is implicitly closed.
pub fn point_in_polygon(p: Point2D, vertices: &[Point2D]) -> bool {
    let mut inside = false;
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let vi = vertices[i];
        let vj = vertices[j];
        if (vi.y > p.y) != (vj.y > p.y) {
            let x_cross = (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Iterate the edges of an implicitly closed polygon
pub fn polygon_edges(vertices: &[Point2D]) -> impl Iterator<Item = (Point2D, Point2D)> + '_ {
    let n = vertices.len();
    (0..n).map(move |i| (vertices[i], vertices[(i + 1) % n]))
}

/// Distance from a point to a polygon; 0 inside
pub fn point_polygon_distance(p: Point2D, vertices: &[Point2D]) -> f64 {
    if point_in_polygon(p, vertices) {
        return 0.0;
    }
    polygon_edges(vertices)
        .map(|(a, b)| point_segment_distance(p, a, b))
        .fold(f64::INFINITY, f64::min)
}

/// Distance from segment `a`-`b` to a polygon; 0 when they overlap
pub fn segment_polygon_distance(a: Point2D, b: Point2D, vertices: &[Point2D]) -> f64 {
    if point_in_polygon(a, vertices) || point_in_polygon(b, vertices) {
        return 0.0;
    }
    polygon_edges(vertices)
        .map(|(c, d)| segment_segment_distance(a, b, c, d))
        .fold(f64::INFINITY, f64::min)
}

/// Distance along a ray to the segment `a`-`b`, if the ray hits it.
/// Parallel segments are treated as a miss.
pub fn ray_segment_intersection(
    origin: Point2D,
    bearing: f64,
    a: Point2D,
    b: Point2D,
) -> Option<f64> {
    let dir = Point2D::from_polar(bearing, 1.0).vector();
    let edge = b.vector() - a.vector();
    let denom = cross(dir, edge);
    if denom.abs() < EPSILON {
        return None;
    }
    let to_start = a.vector() - origin.vector();
    let t = cross(to_start, edge) / denom;
    let s = cross(to_start, dir) / denom;
    if t >= 0.0 && (0.0..=1.0).contains(&s) {
        Some(t)
    } else {
        None
    }
}

/// Distance along a ray to a circle, if the ray hits it
pub fn ray_circle_intersection(
    origin: Point2D,
    bearing: f64,
    center: Point2D,
    radius: f64,
) -> Option<f64> {
    let dir = Point2D::from_polar(bearing, 1.0).vector();
    let f = origin.vector() - center.vector();
    let b = f.dot(&dir);
    let c = f.norm_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let near = -b - root;
    let far = -b + root;
    if far < 0.0 {
        None
    } else {
        Some(near.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_normalize_angle_range() {
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
        assert_relative_eq!(normalize_angle(3.0 * FRAC_PI_2), -FRAC_PI_2);
        assert_relative_eq!(normalize_angle(-5.0 * PI / 2.0), -FRAC_PI_2);
        assert_relative_eq!(normalize_angle(0.25), 0.25);
    }

    #[test]
    fn test_bearing_between_coincident_points_is_zero() {
        let p = Point2D::new(1.5, -2.0);
        assert_eq!(p.bearing_to(&p), 0.0);
    }

    #[test]
    fn test_polar_round_trip() {
        let p = Point2D::from_polar(FRAC_PI_2, 2.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);

        let (bearing, range) = Point2D::new(-3.0, 0.0).to_polar();
        assert_relative_eq!(bearing, PI);
        assert_relative_eq!(range, 3.0);
    }

    #[test]
    fn test_pose_project_uses_heading() {
        let pose = Pose::new(1.0, 1.0, FRAC_PI_2);
        let seen = pose.project(0.0, 2.0);
        assert_relative_eq!(seen.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(seen.y, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_point_segment_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(2.0, 0.0);
        assert_relative_eq!(point_segment_distance(Point2D::new(1.0, 1.0), a, b), 1.0);
        assert_relative_eq!(point_segment_distance(Point2D::new(3.0, 0.0), a, b), 1.0);
        assert_relative_eq!(point_segment_distance(Point2D::new(1.0, 0.0), a, a), 1.0);
    }

    #[test]
    fn test_segments_intersect() {
        let o = Point2D::ORIGIN;
        assert!(segments_intersect(o, Point2D::new(2.0, 2.0), Point2D::new(0.0, 2.0), Point2D::new(2.0, 0.0)));
        assert!(!segments_intersect(o, Point2D::new(1.0, 0.0), Point2D::new(0.0, 1.0), Point2D::new(1.0, 1.0)));
        // touching endpoints count
        assert!(segments_intersect(o, Point2D::new(1.0, 0.0), Point2D::new(1.0, 0.0), Point2D::new(1.0, 1.0)));
    }

    #[test]
    fn test_segment_polygon_distance() {
        let square = [
            Point2D::new(1.0, 1.0),
            Point2D::new(2.0, 1.0),
            Point2D::new(2.0, 2.0),
            Point2D::new(1.0, 2.0),
        ];
        assert_eq!(segment_polygon_distance(Point2D::ORIGIN, Point2D::new(2.0, 2.0), &square), 0.0);
        assert_relative_eq!(
            segment_polygon_distance(Point2D::ORIGIN, Point2D::new(0.0, 2.0), &square),
            1.0
        );
        assert!(point_in_polygon(Point2D::new(1.5, 1.5), &square));
    }

    #[test]
    fn test_ray_intersections() {
        let hit = ray_segment_intersection(
            Point2D::ORIGIN,
            0.0,
            Point2D::new(3.0, -1.0),
            Point2D::new(3.0, 1.0),
        );
        assert_relative_eq!(hit.unwrap_or(f64::NAN), 3.0, epsilon = 1e-9);
        assert!(ray_segment_intersection(Point2D::ORIGIN, PI, Point2D::new(3.0, -1.0), Point2D::new(3.0, 1.0)).is_none());

        let circle = ray_circle_intersection(Point2D::ORIGIN, 0.0, Point2D::new(5.0, 0.0), 1.0);
        assert_relative_eq!(circle.unwrap_or(f64::NAN), 4.0, epsilon = 1e-9);
        assert!(ray_circle_intersection(Point2D::ORIGIN, FRAC_PI_2, Point2D::new(5.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_total_cmp_orders_x_then_y() {
        let a = Point2D::new(1.0, 5.0);
        let b = Point2D::new(1.0, 6.0);
        let c = Point2D::new(0.0, 9.0);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(c.total_cmp(&a), Ordering::Less);
    }
}
