//! roiscope-algorithms: Pixel coverage and intensity statistics for ROI shapes.
//!
//! This crate provides:
//! - **Coverage** - rasterization of figures to ordered plane points
//! - **Statistics** - MIN/MAX/SUM/MEAN/STDDEV plus line profiles per channel
//! - **Engine** - batch analysis with per-plane caching, rayon parallelism,
//!   cancellation and partial-failure reporting
//!
#![warn(missing_docs)]

mod coverage;
mod engine;
mod error;
mod source;
mod statistics;

pub use coverage::{PlanePoint, Rasterizer};
pub use engine::{AnalysisConfig, StatisticsEngine};
pub use error::{ChannelFailure, PartialComputation, PixelSourceError, Result, StatisticsError};
pub use source::{InMemoryStack, PixelSource};
pub use statistics::{AnalysisResults, ChannelStatistics, ShapeStatistics, StatKind, StatValue};
