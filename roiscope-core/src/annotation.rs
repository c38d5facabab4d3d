//! Typed per-shape annotations and derived measurements.

use crate::calibration::Calibration;
use crate::figure::{Figure, FigureType};
use crate::geometry::{Bounds, Point};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geometric measurements derived from a figure, in pixel units.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurements {
    pub bounds: Bounds,
    pub centre: Point,
    pub start: Option<Point>,
    pub end: Option<Point>,
    pub area: Option<f64>,
    pub perimeter: Option<f64>,
    pub length: Option<f64>,
    /// Line angle in degrees.
    pub angle: Option<f64>,
    /// Number of defining vertices (bezier nodes, connection points).
    pub point_count: usize,
}

impl Measurements {
    /// Derives measurements from figure geometry.
    #[must_use]
    pub fn of(figure: &Figure) -> Self {
        let (start, end) = figure.endpoints().unzip();
        let point_count = match figure {
            Figure::LineConnection { points } => points.len(),
            Figure::ClosedBezier { nodes } | Figure::OpenBezier { nodes } => nodes.len(),
            Figure::Line { .. } => 2,
            Figure::Rectangle { .. } | Figure::Ellipse { .. } => 0,
            Figure::Point { .. } | Figure::Text { .. } => 1,
        };
        Self {
            bounds: figure.bounds(),
            centre: figure.centre(),
            start,
            end,
            area: figure.area(),
            perimeter: figure.perimeter(),
            length: figure.length(),
            angle: figure.angle(),
            point_count,
        }
    }

    /// The same measurements expressed in microns where calibrated.
    #[must_use]
    pub fn in_microns(&self, calibration: &Calibration) -> CalibratedMeasurements {
        CalibratedMeasurements {
            width: calibration.distance_in_microns(self.bounds.width(), 0.0),
            height: calibration.distance_in_microns(0.0, self.bounds.height()),
            area: self.area.and_then(|a| calibration.area_in_microns(a)),
            perimeter: self.perimeter.and_then(|p| calibration.length_in_microns(p)),
            length: match (self.start, self.end, self.point_count) {
                // Straight lines convert exactly even for anisotropic pixels.
                (Some(s), Some(e), 2) => calibration.distance_in_microns(e.x - s.x, e.y - s.y),
                _ => self.length.and_then(|l| calibration.length_in_microns(l)),
            },
        }
    }
}

/// Measurements converted to microns; `None` where the axis is uncalibrated
/// or the measurement does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibratedMeasurements {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub area: Option<f64>,
    pub perimeter: Option<f64>,
    pub length: Option<f64>,
}

/// Annotations attached to one shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeAnnotations {
    pub description: Option<String>,
    pub figure_type: FigureType,
    pub measurements: Measurements,
    /// Free-form fields defined by the UI and not interpreted here.
    #[cfg_attr(feature = "serde", serde(default))]
    pub custom: BTreeMap<String, String>,
}

impl ShapeAnnotations {
    /// Fresh annotations for a figure.
    #[must_use]
    pub fn for_figure(figure: &Figure) -> Self {
        Self {
            description: None,
            figure_type: figure.figure_type(),
            measurements: Measurements::of(figure),
            custom: BTreeMap::new(),
        }
    }

    /// Recomputes the figure-derived fields, keeping user fields.
    pub fn refresh(&mut self, figure: &Figure) {
        self.figure_type = figure.figure_type();
        self.measurements = Measurements::of(figure);
    }
}
