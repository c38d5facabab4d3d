//! Per-channel intensity statistics and the result map.
#![allow(clippy::cast_precision_loss)]

use crate::coverage::PlanePoint;
use ndarray::ArrayView2;
use roiscope_core::{Coord3D, FigureType, RoiId, RoiShape, ShapeId};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Statistic selector for [`AnalysisResults::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatKind {
    /// Smallest sampled intensity.
    Min,
    /// Largest sampled intensity.
    Max,
    /// Sum of sampled intensities.
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Population standard deviation.
    StdDev,
    /// Sampled intensities in traversal order.
    PixelData,
    /// Intensity per plane point.
    PlanePoints,
}

impl StatKind {
    /// Every kind, scalars first.
    pub const ALL: [StatKind; 7] = [
        StatKind::Min,
        StatKind::Max,
        StatKind::Sum,
        StatKind::Mean,
        StatKind::StdDev,
        StatKind::PixelData,
        StatKind::PlanePoints,
    ];

    /// Scalar kinds, in report column order.
    pub const SCALARS: [StatKind; 5] = [
        StatKind::Min,
        StatKind::Max,
        StatKind::Sum,
        StatKind::Mean,
        StatKind::StdDev,
    ];

    /// Upper-case label used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Mean => "MEAN",
            Self::StdDev => "STDDEV",
            Self::PixelData => "PIXELDATA",
            Self::PlanePoints => "PIXEL_PLANEPOINT2D",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single statistic, borrowed from the results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue<'a> {
    /// MIN, MAX, SUM, MEAN or STDDEV.
    Scalar(f64),
    /// Ordered samples.
    PixelData(&'a [f64]),
    /// Point to intensity map.
    PlanePoints(&'a BTreeMap<PlanePoint, f64>),
}

impl StatValue<'_> {
    /// The scalar, if this is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::PixelData(_) | Self::PlanePoints(_) => None,
        }
    }
}

/// Statistics of one shape on one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatistics {
    /// Number of samples.
    pub pixel_count: usize,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Sum of samples.
    pub sum: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Samples in coverage order.
    pub pixel_data: Vec<f64>,
    /// Intensity keyed by pixel position.
    pub plane_points: BTreeMap<PlanePoint, f64>,
}

impl ChannelStatistics {
    /// Samples `plane` at `coverage`.
    ///
    /// Returns `None` when nothing is covered. Points outside the plane are
    /// skipped.
    #[must_use]
    pub fn from_coverage(coverage: &[PlanePoint], plane: ArrayView2<'_, f64>) -> Option<Self> {
        let mut pixel_data = Vec::with_capacity(coverage.len());
        let mut plane_points = BTreeMap::new();
        for point in coverage {
            if let Some(&value) = plane.get(point.index()) {
                pixel_data.push(value);
                plane_points.insert(*point, value);
            }
        }
        Self::from_samples(pixel_data, plane_points)
    }

    fn from_samples(pixel_data: Vec<f64>, plane_points: BTreeMap<PlanePoint, f64>) -> Option<Self> {
        if pixel_data.is_empty() {
            return None;
        }
        let n = pixel_data.len() as f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &pixel_data {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / n;
        let variance = pixel_data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            pixel_count: pixel_data.len(),
            min,
            max,
            sum,
            mean,
            std_dev: variance.sqrt(),
            pixel_data,
            plane_points,
        })
    }

    /// Looks up one statistic.
    #[must_use]
    pub fn value(&self, kind: StatKind) -> StatValue<'_> {
        match kind {
            StatKind::Min => StatValue::Scalar(self.min),
            StatKind::Max => StatValue::Scalar(self.max),
            StatKind::Sum => StatValue::Scalar(self.sum),
            StatKind::Mean => StatValue::Scalar(self.mean),
            StatKind::StdDev => StatValue::Scalar(self.std_dev),
            StatKind::PixelData => StatValue::PixelData(&self.pixel_data),
            StatKind::PlanePoints => StatValue::PlanePoints(&self.plane_points),
        }
    }
}

/// Statistics of one shape across the analysed channels.
///
/// Channels with no coverage, or whose plane could not be read, are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeStatistics {
    /// Measured shape.
    pub shape_id: ShapeId,
    /// Owning ROI.
    pub roi_id: RoiId,
    /// Plane of the shape.
    pub coord: Coord3D,
    /// Figure kind of the shape.
    pub figure_type: FigureType,
    /// Statistics per channel; channels with no covered pixels are absent.
    pub channels: BTreeMap<usize, ChannelStatistics>,
}

impl ShapeStatistics {
    pub(crate) fn for_shape(shape: &RoiShape) -> Self {
        Self {
            shape_id: shape.id(),
            roi_id: shape.roi_id(),
            coord: shape.coord(),
            figure_type: shape.figure().figure_type(),
            channels: BTreeMap::new(),
        }
    }

    /// Statistics of one channel.
    #[must_use]
    pub fn channel(&self, channel: usize) -> Option<&ChannelStatistics> {
        self.channels.get(&channel)
    }
}

/// Statistics of a batch, keyed by shape id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResults {
    shapes: BTreeMap<ShapeId, ShapeStatistics>,
}

impl AnalysisResults {
    /// Statistics of one shape.
    #[must_use]
    pub fn get(&self, shape_id: ShapeId) -> Option<&ShapeStatistics> {
        self.shapes.get(&shape_id)
    }

    /// Results in shape id order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapeStatistics> {
        self.shapes.values()
    }

    /// Number of shapes analysed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether no shape was analysed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// One statistic of one shape on one channel.
    #[must_use]
    pub fn value(&self, shape_id: ShapeId, kind: StatKind, channel: usize) -> Option<StatValue<'_>> {
        self.get(shape_id)?.channel(channel).map(|c| c.value(kind))
    }

    pub(crate) fn insert(&mut self, stats: ShapeStatistics) {
        self.shapes.insert(stats.shape_id, stats);
    }
}

impl<'a> IntoIterator for &'a AnalysisResults {
    type Item = &'a ShapeStatistics;
    type IntoIter = btree_map::Values<'a, ShapeId, ShapeStatistics>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.values()
    }
}
