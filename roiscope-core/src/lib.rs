//! roiscope-core: Region-of-interest model for multi-dimensional microscopy images.
//!
//! This crate provides the plane coordinate type, figure geometry, shapes,
//! ROIs and the registry that owns them, including propagation of a shape
//! across Z/T plane ranges.
//!

pub mod annotation;
pub mod calibration;
pub mod coord;
pub mod error;
pub mod figure;
pub mod geometry;
pub mod registry;
pub mod roi;
pub mod shape;

pub use annotation::{CalibratedMeasurements, Measurements, ShapeAnnotations};
pub use calibration::Calibration;
pub use coord::{Coord3D, PlaneRange};
pub use error::{CreationError, Error, Result};
pub use figure::{BezierNode, Figure, FigureCategory, FigureType, DEFAULT_BEZIER_SEGMENTS};
pub use geometry::{Bounds, Point};
pub use registry::{RoiRecord, RoiRegistry, ShapeRecord, VolumeExtent};
pub use roi::{Roi, RoiMetadata};
pub use shape::{RoiId, RoiShape, ShapeId};
