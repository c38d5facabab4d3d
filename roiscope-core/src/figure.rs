//! Figure geometry: the closed set of shape kinds an ROI can take on a plane.

use crate::geometry::{
    distance_point_to_polyline, point_in_polygon, polygon_area2, polygon_perimeter,
    polyline_length, vertex_centroid, Bounds, Point,
};
use std::f64::consts::PI;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of straight segments used to flatten one cubic span.
pub const DEFAULT_BEZIER_SEGMENTS: usize = 16;

/// Number of vertices used to approximate an ellipse outline.
const ELLIPSE_OUTLINE_VERTICES: usize = 64;

/// One node of a bezier path.
///
/// Missing control points collapse onto the node, which makes the span
/// adjacent to the node straight on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BezierNode {
    pub point: Point,
    pub control_in: Option<Point>,
    pub control_out: Option<Point>,
}

impl BezierNode {
    /// A corner node without control points.
    #[must_use]
    pub fn corner(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y),
            control_in: None,
            control_out: None,
        }
    }

    /// A smooth node with explicit controls.
    #[must_use]
    pub fn smooth(point: Point, control_in: Point, control_out: Point) -> Self {
        Self {
            point,
            control_in: Some(control_in),
            control_out: Some(control_out),
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.point = self.point.translated(dx, dy);
        self.control_in = self.control_in.map(|p| p.translated(dx, dy));
        self.control_out = self.control_out.map(|p| p.translated(dx, dy));
    }

    fn points(&self) -> impl Iterator<Item = Point> {
        std::iter::once(self.point)
            .chain(self.control_in)
            .chain(self.control_out)
    }
}

/// Geometry of a shape on one plane.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Figure {
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    Line {
        start: Point,
        end: Point,
    },
    LineConnection {
        points: Vec<Point>,
    },
    /// Closed bezier path (polygon).
    ClosedBezier {
        nodes: Vec<BezierNode>,
    },
    /// Open bezier path (scribble).
    OpenBezier {
        nodes: Vec<BezierNode>,
    },
    Point {
        position: Point,
    },
    Text {
        position: Point,
        text: String,
    },
}

/// How a figure samples pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FigureCategory {
    /// Covers every pixel whose centre lies inside the region.
    Area,
    /// Samples pixels along a path, in path order.
    Line,
    /// Covers exactly one pixel.
    Point,
    /// Covers no pixels.
    Annotation,
}

/// Figure-type label stored in shape annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FigureType {
    Rectangle,
    Ellipse,
    Line,
    LineConnection,
    Polygon,
    Scribble,
    Point,
    Text,
}

impl FigureType {
    /// Human-readable label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rectangle => "Rectangle",
            Self::Ellipse => "Ellipse",
            Self::Line => "Line",
            Self::LineConnection => "Line Connection",
            Self::Polygon => "Polygon",
            Self::Scribble => "Scribble",
            Self::Point => "Point",
            Self::Text => "Text",
        }
    }
}

impl fmt::Display for FigureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Figure {
    /// Axis-aligned rectangle from its top-left corner and size.
    #[must_use]
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Rectangle {
            x,
            y,
            width,
            height,
        }
    }

    /// Axis-aligned ellipse from its centre and radii.
    #[must_use]
    pub fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> Self {
        Self::Ellipse { cx, cy, rx, ry }
    }

    /// Straight line segment.
    #[must_use]
    pub fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::Line {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
        }
    }

    /// Polygon with straight edges.
    #[must_use]
    pub fn polygon(vertices: &[(f64, f64)]) -> Self {
        Self::ClosedBezier {
            nodes: vertices.iter().map(|&(x, y)| BezierNode::corner(x, y)).collect(),
        }
    }

    /// Free-hand polyline.
    #[must_use]
    pub fn scribble(vertices: &[(f64, f64)]) -> Self {
        Self::OpenBezier {
            nodes: vertices.iter().map(|&(x, y)| BezierNode::corner(x, y)).collect(),
        }
    }

    /// Single point.
    #[must_use]
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point {
            position: Point::new(x, y),
        }
    }

    /// Sampling category of this figure.
    #[must_use]
    pub fn category(&self) -> FigureCategory {
        match self {
            Self::Rectangle { .. } | Self::Ellipse { .. } | Self::ClosedBezier { .. } => {
                FigureCategory::Area
            }
            Self::Line { .. } | Self::LineConnection { .. } | Self::OpenBezier { .. } => {
                FigureCategory::Line
            }
            Self::Point { .. } => FigureCategory::Point,
            Self::Text { .. } => FigureCategory::Annotation,
        }
    }

    /// Figure-type label.
    #[must_use]
    pub fn figure_type(&self) -> FigureType {
        match self {
            Self::Rectangle { .. } => FigureType::Rectangle,
            Self::Ellipse { .. } => FigureType::Ellipse,
            Self::Line { .. } => FigureType::Line,
            Self::LineConnection { .. } => FigureType::LineConnection,
            Self::ClosedBezier { .. } => FigureType::Polygon,
            Self::OpenBezier { .. } => FigureType::Scribble,
            Self::Point { .. } => FigureType::Point,
            Self::Text { .. } => FigureType::Text,
        }
    }

    /// Checks that the geometry is finite and non-degenerate for its kind.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.defining_points().iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return Err(format!("{} has non-finite coordinates", self.figure_type()));
        }
        match self {
            Self::Rectangle { width, height, .. } if !(*width >= 0.0 && *height >= 0.0) => {
                Err(format!("rectangle has negative size {width}x{height}"))
            }
            Self::Ellipse { rx, ry, .. } if !(*rx >= 0.0 && *ry >= 0.0) => {
                Err(format!("ellipse has negative radii {rx}, {ry}"))
            }
            Self::LineConnection { points } if points.len() < 2 => {
                Err("line connection needs at least 2 points".to_string())
            }
            Self::ClosedBezier { nodes } if nodes.len() < 3 => {
                Err("polygon needs at least 3 nodes".to_string())
            }
            Self::OpenBezier { nodes } if nodes.is_empty() => {
                Err("scribble needs at least 1 node".to_string())
            }
            _ => Ok(()),
        }
    }

    /// The points that define the geometry (including bezier controls).
    #[must_use]
    pub fn defining_points(&self) -> Vec<Point> {
        match self {
            Self::Rectangle {
                x,
                y,
                width,
                height,
            } => vec![Point::new(*x, *y), Point::new(x + width, y + height)],
            Self::Ellipse { cx, cy, rx, ry } => {
                vec![Point::new(cx - rx, cy - ry), Point::new(cx + rx, cy + ry)]
            }
            Self::Line { start, end } => vec![*start, *end],
            Self::LineConnection { points } => points.clone(),
            Self::ClosedBezier { nodes } | Self::OpenBezier { nodes } => {
                nodes.iter().flat_map(BezierNode::points).collect()
            }
            Self::Point { position } | Self::Text { position, .. } => vec![*position],
        }
    }

    /// Outline vertices of an area figure, or the path of a line figure.
    ///
    /// Beziers are flattened with `segments` straight pieces per cubic span.
    #[must_use]
    pub fn outline(&self, segments: usize) -> Vec<Point> {
        match self {
            Self::Rectangle {
                x,
                y,
                width,
                height,
            } => vec![
                Point::new(*x, *y),
                Point::new(x + width, *y),
                Point::new(x + width, y + height),
                Point::new(*x, y + height),
            ],
            Self::Ellipse { cx, cy, rx, ry } => (0..ELLIPSE_OUTLINE_VERTICES)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let theta = 2.0 * PI * i as f64 / ELLIPSE_OUTLINE_VERTICES as f64;
                    Point::new(cx + rx * theta.cos(), cy + ry * theta.sin())
                })
                .collect(),
            Self::Line { start, end } => vec![*start, *end],
            Self::LineConnection { points } => points.clone(),
            Self::ClosedBezier { nodes } => flatten_bezier(nodes, true, segments),
            Self::OpenBezier { nodes } => flatten_bezier(nodes, false, segments),
            Self::Point { position } | Self::Text { position, .. } => vec![*position],
        }
    }

    /// Bounding box of the figure.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Rectangle { .. } | Self::Ellipse { .. } => {
                let pts = self.defining_points();
                Bounds::from_corners(pts[0], pts[1])
            }
            _ => Bounds::of_points(&self.outline(DEFAULT_BEZIER_SEGMENTS)),
        }
    }

    /// Centre of the figure: box centre for rectangles and ellipses, vertex
    /// centroid otherwise.
    #[must_use]
    pub fn centre(&self) -> Point {
        match self {
            Self::Rectangle { .. } | Self::Ellipse { .. } => self.bounds().centre(),
            Self::Point { position } | Self::Text { position, .. } => *position,
            _ => vertex_centroid(&self.outline(DEFAULT_BEZIER_SEGMENTS)),
        }
    }

    /// Enclosed area in square pixels, for area figures.
    #[must_use]
    pub fn area(&self) -> Option<f64> {
        match self {
            Self::Rectangle { width, height, .. } => Some(width * height),
            Self::Ellipse { rx, ry, .. } => Some(PI * rx * ry),
            Self::ClosedBezier { nodes } => Some(
                (polygon_area2(&flatten_bezier(nodes, true, DEFAULT_BEZIER_SEGMENTS)) * 0.5).abs(),
            ),
            _ => None,
        }
    }

    /// Perimeter in pixels, for area figures.
    #[must_use]
    pub fn perimeter(&self) -> Option<f64> {
        match self {
            Self::Rectangle { width, height, .. } => Some(2.0 * (width + height)),
            Self::Ellipse { rx, ry, .. } => {
                // Ramanujan's second approximation.
                let h = ((rx - ry) / (rx + ry)).powi(2);
                if h.is_nan() {
                    return Some(0.0);
                }
                Some(PI * (rx + ry) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt())))
            }
            Self::ClosedBezier { .. } => {
                Some(polygon_perimeter(&self.outline(DEFAULT_BEZIER_SEGMENTS)))
            }
            _ => None,
        }
    }

    /// Path length in pixels, for line figures.
    #[must_use]
    pub fn length(&self) -> Option<f64> {
        match self.category() {
            FigureCategory::Line => Some(polyline_length(&self.outline(DEFAULT_BEZIER_SEGMENTS))),
            _ => None,
        }
    }

    /// Angle of a straight line in degrees, measured from the +x axis.
    #[must_use]
    pub fn angle(&self) -> Option<f64> {
        match self {
            Self::Line { start, end } => Some((end.y - start.y).atan2(end.x - start.x).to_degrees()),
            _ => None,
        }
    }

    /// First and last point of a line figure.
    #[must_use]
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        if self.category() != FigureCategory::Line {
            return None;
        }
        let path = self.outline(DEFAULT_BEZIER_SEGMENTS);
        Some((*path.first()?, *path.last()?))
    }

    /// Hit test: inside for area figures, within `tolerance` for the rest.
    #[must_use]
    pub fn hit(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Self::Rectangle { .. } => self.bounds().contains(point),
            Self::Ellipse { cx, cy, rx, ry } => {
                if *rx <= 0.0 || *ry <= 0.0 {
                    return false;
                }
                let dx = (point.x - cx) / rx;
                let dy = (point.y - cy) / ry;
                dx * dx + dy * dy <= 1.0
            }
            Self::ClosedBezier { nodes } => {
                point_in_polygon(point, &flatten_bezier(nodes, true, DEFAULT_BEZIER_SEGMENTS))
            }
            Self::Line { .. } | Self::LineConnection { .. } | Self::OpenBezier { .. } => {
                distance_point_to_polyline(point, &self.outline(DEFAULT_BEZIER_SEGMENTS))
                    <= tolerance
            }
            Self::Point { position } | Self::Text { position, .. } => {
                point.distance_to(position) <= tolerance
            }
        }
    }

    /// Moves the figure by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Self::Rectangle { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            Self::Ellipse { cx, cy, .. } => {
                *cx += dx;
                *cy += dy;
            }
            Self::Line { start, end } => {
                *start = start.translated(dx, dy);
                *end = end.translated(dx, dy);
            }
            Self::LineConnection { points } => {
                for p in points {
                    *p = p.translated(dx, dy);
                }
            }
            Self::ClosedBezier { nodes } | Self::OpenBezier { nodes } => {
                for node in nodes {
                    node.translate(dx, dy);
                }
            }
            Self::Point { position } | Self::Text { position, .. } => {
                *position = position.translated(dx, dy);
            }
        }
    }
}

/// Flattens a bezier node list into a polyline.
///
/// Spans whose two inner controls are both absent stay straight and
/// contribute only their end node. Closed paths do not repeat the first
/// node at the end.
#[must_use]
pub fn flatten_bezier(nodes: &[BezierNode], closed: bool, segments: usize) -> Vec<Point> {
    let Some(first) = nodes.first() else {
        return Vec::new();
    };
    let segments = segments.max(1);
    let mut out = vec![first.point];
    let span_count = if closed && nodes.len() > 1 {
        nodes.len()
    } else {
        nodes.len() - 1
    };
    for i in 0..span_count {
        let a = &nodes[i];
        let b = &nodes[(i + 1) % nodes.len()];
        let is_closing_span = closed && i + 1 == nodes.len();
        if a.control_out.is_none() && b.control_in.is_none() {
            if !is_closing_span {
                out.push(b.point);
            }
            continue;
        }
        let p0 = a.point;
        let p1 = a.control_out.unwrap_or(a.point);
        let p2 = b.control_in.unwrap_or(b.point);
        let p3 = b.point;
        let steps = if is_closing_span { segments - 1 } else { segments };
        for step in 1..=steps {
            #[allow(clippy::cast_precision_loss)]
            let t = step as f64 / segments as f64;
            out.push(cubic_point(p0, p1, p2, p3, t));
        }
    }
    out
}

fn cubic_point(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}
