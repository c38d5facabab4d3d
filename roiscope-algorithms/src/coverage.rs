//! Pixel coverage of figures on a plane.
//!
//! Area figures claim a pixel when its centre `(x + 0.5, y + 0.5)` lies inside
//! the region, with half-open boundaries so that adjacent figures never share
//! a pixel. Line figures are walked at a fixed arc-length step and keep the
//! order of the walk. Enumeration is deterministic for identical inputs.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use roiscope_core::{Figure, FigureCategory, Point, DEFAULT_BEZIER_SEGMENTS};
use std::ops::Range;

/// A pixel position on a plane.
///
/// Ordered row-major (by `y`, then `x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanePoint {
    /// Row.
    pub y: usize,
    /// Column.
    pub x: usize,
}

impl PlanePoint {
    /// Creates a plane point from column and row.
    #[must_use]
    pub fn new(x: usize, y: usize) -> Self {
        Self { y, x }
    }

    /// Array index for `[[y, x]]` access.
    #[must_use]
    pub fn index(&self) -> [usize; 2] {
        [self.y, self.x]
    }
}

/// Computes figure coverage on a `width` x `height` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rasterizer {
    width: usize,
    height: usize,
    sample_step: f64,
    bezier_segments: usize,
}

impl Rasterizer {
    /// Rasterizer with a unit sample step and default bezier resolution.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            sample_step: 1.0,
            bezier_segments: DEFAULT_BEZIER_SEGMENTS,
        }
    }

    /// Arc-length distance between samples on line figures.
    ///
    /// Non-positive or non-finite steps fall back to 1.
    #[must_use]
    pub fn with_sample_step(mut self, step: f64) -> Self {
        self.sample_step = if step.is_finite() && step > 0.0 {
            step
        } else {
            1.0
        };
        self
    }

    /// Straight pieces per cubic bezier span.
    #[must_use]
    pub fn with_bezier_segments(mut self, segments: usize) -> Self {
        self.bezier_segments = segments.max(1);
        self
    }

    /// Pixels sampled by `figure`, in traversal order.
    ///
    /// Area figures are enumerated row-major. Line figures follow the path
    /// from its first to its last vertex with consecutive repeats collapsed.
    /// Pixels outside the plane are dropped; text yields nothing.
    #[must_use]
    pub fn coverage(&self, figure: &Figure) -> Vec<PlanePoint> {
        match figure.category() {
            FigureCategory::Area => self.area_coverage(figure),
            FigureCategory::Line => self.line_coverage(&figure.outline(self.bezier_segments)),
            FigureCategory::Point => figure
                .defining_points()
                .first()
                .and_then(|p| self.pixel_at(*p))
                .into_iter()
                .collect(),
            FigureCategory::Annotation => Vec::new(),
        }
    }

    fn area_coverage(&self, figure: &Figure) -> Vec<PlanePoint> {
        match figure {
            Figure::Rectangle {
                x,
                y,
                width,
                height,
            } => {
                let (x0, x1) = ordered(*x, x + width);
                let (y0, y1) = ordered(*y, y + height);
                self.scan(x0, y0, x1, y1, |p| {
                    x0 <= p.x && p.x < x1 && y0 <= p.y && p.y < y1
                })
            }
            Figure::Ellipse { cx, cy, rx, ry } => {
                let (rx, ry) = (rx.abs(), ry.abs());
                if rx == 0.0 || ry == 0.0 {
                    return Vec::new();
                }
                self.scan(cx - rx, cy - ry, cx + rx, cy + ry, |p| {
                    let dx = (p.x - cx) / rx;
                    let dy = (p.y - cy) / ry;
                    dx * dx + dy * dy < 1.0
                })
            }
            _ => {
                let outline = figure.outline(self.bezier_segments);
                if outline.len() < 3 {
                    return Vec::new();
                }
                let bounds = figure.bounds();
                self.scan(
                    bounds.min_x,
                    bounds.min_y,
                    bounds.max_x,
                    bounds.max_y,
                    |p| roiscope_core::geometry::point_in_polygon(p, &outline),
                )
            }
        }
    }

    /// Row-major scan of pixels whose centres may fall in the given box.
    fn scan<F>(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64, inside: F) -> Vec<PlanePoint>
    where
        F: Fn(Point) -> bool,
    {
        let columns = clamp_range(min_x, max_x, self.width);
        let rows = clamp_range(min_y, max_y, self.height);
        let mut out = Vec::new();
        for y in rows {
            for x in columns.clone() {
                let centre = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if inside(centre) {
                    out.push(PlanePoint::new(x, y));
                }
            }
        }
        out
    }

    fn line_coverage(&self, path: &[Point]) -> Vec<PlanePoint> {
        let mut out: Vec<PlanePoint> = Vec::new();
        for sample in self.samples(path) {
            if let Some(pixel) = self.pixel_at(sample) {
                if out.last() != Some(&pixel) {
                    out.push(pixel);
                }
            }
        }
        out
    }

    /// Points every `sample_step` along the path, plus its final vertex.
    ///
    /// Only samples on the part of each segment that crosses the plane are
    /// produced, so the cost follows the covered length and not the path
    /// length. Sample positions are the same as for an unclipped walk.
    fn samples(&self, path: &[Point]) -> Vec<Point> {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return Vec::new();
        };
        let step = self.sample_step;
        let mut samples = vec![*first];
        // Distance already walked since the last sample.
        let mut walked = 0.0;
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = a.distance_to(&b);
            if length == 0.0 {
                continue;
            }
            // Arc-length of the first sample on this segment.
            let phase = step - walked;
            if let Some((enter, exit)) = self.clip(a, b) {
                // One step of slack on each side absorbs rounding at the edges.
                let lo = enter * length - step;
                let hi = (exit * length + step).min(length);
                let mut k = ((lo - phase) / step).ceil().max(0.0);
                while phase + k * step <= hi {
                    samples.push(a.lerp(&b, (phase + k * step) / length));
                    k += 1.0;
                }
            }
            walked = if phase <= length {
                let taken = ((length - phase) / step).floor();
                length - (phase + taken * step)
            } else {
                walked + length
            };
        }
        samples.push(*last);
        samples
    }

    /// Parameter interval of the segment `a -> b` inside `[0, w] x [0, h]`.
    fn clip(&self, a: Point, b: Point) -> Option<(f64, f64)> {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let (w, h) = (self.width as f64, self.height as f64);
        let mut enter: f64 = 0.0;
        let mut exit: f64 = 1.0;
        for (p, q) in [(-dx, a.x), (dx, w - a.x), (-dy, a.y), (dy, h - a.y)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
            } else if p < 0.0 {
                enter = enter.max(q / p);
            } else {
                exit = exit.min(q / p);
            }
        }
        (enter <= exit).then_some((enter, exit))
    }

    fn pixel_at(&self, point: Point) -> Option<PlanePoint> {
        let x = point.x.floor();
        let y = point.y.floor();
        let in_plane = x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64;
        in_plane.then(|| PlanePoint::new(x as usize, y as usize))
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Index range `floor(lo)..ceil(hi)` clamped to `0..limit`.
fn clamp_range(lo: f64, hi: f64, limit: usize) -> Range<usize> {
    if !(lo.is_finite() && hi.is_finite()) {
        return 0..0;
    }
    let limit_f = limit as f64;
    let start = lo.floor().clamp(0.0, limit_f) as usize;
    let end = hi.ceil().clamp(0.0, limit_f) as usize;
    start..end.max(start)
}
