//! Error types for pixel sources and the statistics engine.

use crate::statistics::AnalysisResults;
use roiscope_core::{Coord3D, ShapeId};
use thiserror::Error;

/// Failure to supply one plane of intensities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelSourceError {
    /// The channel index exceeds the image's channel count.
    #[error("channel {channel} out of range (image has {channel_count} channels)")]
    ChannelOutOfRange {
        /// Requested channel.
        channel: usize,
        /// Channels in the image.
        channel_count: usize,
    },

    /// The plane is not available for this channel.
    #[error("plane {coord} unavailable for channel {channel}")]
    PlaneUnavailable {
        /// Requested plane.
        coord: Coord3D,
        /// Requested channel.
        channel: usize,
    },

    /// Supplied plane dimensions do not match the image.
    #[error("plane is {found_width}x{found_height}, expected {width}x{height}")]
    DimensionMismatch {
        /// Expected width.
        width: usize,
        /// Expected height.
        height: usize,
        /// Width of the supplied plane.
        found_width: usize,
        /// Height of the supplied plane.
        found_height: usize,
    },

    /// Backend-specific failure (I/O, decoding).
    #[error("pixel source error: {0}")]
    Backend(String),
}

/// One (plane, channel) that could not be measured.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    /// Plane that could not be read.
    pub coord: Coord3D,
    /// Channel that could not be read.
    pub channel: usize,
    /// Shapes on that plane which lack this channel in the results.
    pub shapes: Vec<ShapeId>,
    /// Cause reported by the source.
    pub error: PixelSourceError,
}

/// Results that were computed before a batch stopped or partially failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialComputation {
    /// Statistics for everything that could be read.
    pub results: AnalysisResults,
    /// Plane and channel reads that failed.
    pub failures: Vec<ChannelFailure>,
}

/// Statistics engine errors.
#[derive(Error, Debug)]
pub enum StatisticsError {
    /// Some channels could not be measured; everything else was.
    #[error("{} channel(s) could not be measured", .0.failures.len())]
    Partial(PartialComputation),

    /// The batch was cancelled between shapes.
    #[error("analysis cancelled after {} shape(s)", .0.results.len())]
    Cancelled(PartialComputation),

    /// Engine configuration is unusable.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// Shape lookup failed.
    #[error("core error: {0}")]
    Core(#[from] roiscope_core::Error),
}

impl StatisticsError {
    /// Results salvaged from a partial or cancelled run.
    #[must_use]
    pub fn into_partial(self) -> Option<PartialComputation> {
        match self {
            Self::Partial(partial) | Self::Cancelled(partial) => Some(partial),
            Self::InvalidConfig(_) | Self::Core(_) => None,
        }
    }
}

/// Result type for statistics runs.
pub type Result<T> = std::result::Result<T, StatisticsError>;
