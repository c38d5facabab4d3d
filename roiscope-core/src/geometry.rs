//! Planar geometry primitives shared by figures and coverage rasterization.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point in plane (pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point shifted by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Linear interpolation towards `other`.
    #[inline]
    #[must_use]
    pub fn lerp(&self, other: &Point, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Bounds spanned by two corners, in either order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Bounds of a point set; all-zero for an empty set.
    #[must_use]
    pub fn of_points(points: &[Point]) -> Self {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if !min_x.is_finite() || !min_y.is_finite() {
            Self::default()
        } else {
            Self {
                min_x,
                min_y,
                max_x,
                max_y,
            }
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn centre(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Closed containment test.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }
}

/// Twice the signed area of a closed polygon (positive when counter-clockwise).
#[must_use]
pub fn polygon_area2(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area
}

/// Length of an open polyline.
#[must_use]
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Perimeter of a closed polygon.
#[must_use]
pub fn polygon_perimeter(vertices: &[Point]) -> f64 {
    match vertices {
        [] | [_] => 0.0,
        [first, .., last] => polyline_length(vertices) + last.distance_to(first),
    }
}

/// Arithmetic mean of the vertices.
#[must_use]
pub fn vertex_centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Even-odd containment test for a closed polygon.
///
/// Edges are treated half-open in y so a point on a shared horizontal
/// boundary is claimed by exactly one of two adjacent polygons.
#[must_use]
pub fn point_in_polygon(point: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = vertices[i];
        let vj = vertices[j];
        if (vi.y > point.y) != (vj.y > point.y) {
            let x_cross = (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shortest distance from a point to the segment `a`-`b`.
#[must_use]
pub fn distance_point_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let ab_len_sq = abx * abx + aby * aby;
    if ab_len_sq <= f64::EPSILON {
        return point.distance_to(&a);
    }
    let t = ((point.x - a.x) * abx + (point.y - a.y) * aby) / ab_len_sq;
    let closest = a.lerp(&b, t.clamp(0.0, 1.0));
    point.distance_to(&closest)
}

/// Shortest distance from a point to an open polyline.
#[must_use]
pub fn distance_point_to_polyline(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance_to(only),
        _ => points
            .windows(2)
            .map(|w| distance_point_to_segment(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}
