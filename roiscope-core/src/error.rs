//! Error types for roiscope-core.

use crate::coord::Coord3D;
use crate::shape::{RoiId, ShapeId};
use thiserror::Error;

/// Result type alias for roiscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No ROI with the given id.
    #[error("ROI {0} not found")]
    RoiNotFound(RoiId),

    /// No shape with the given id.
    #[error("shape {0} not found")]
    ShapeNotFound(ShapeId),

    /// The ROI has no shape on the given plane.
    #[error("ROI {roi} has no shape on plane {coord}")]
    PlaneNotFound { roi: RoiId, coord: Coord3D },

    /// A shape was looked up on a plane it is not anchored to.
    #[error("shape {shape} is not anchored on plane {coord}")]
    ShapeNotOnPlane { shape: ShapeId, coord: Coord3D },

    /// Plane coordinates were negative or otherwise unusable.
    #[error("invalid plane coordinate: (z={z}, t={t})")]
    InvalidCoordinate { z: i64, t: i64 },

    /// A create or propagate request was rejected before any mutation.
    #[error("creation error: {0}")]
    Creation(#[from] CreationError),
}

impl Error {
    /// Whether this is one of the lookup-miss variants.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RoiNotFound(_)
                | Self::ShapeNotFound(_)
                | Self::PlaneNotFound { .. }
                | Self::ShapeNotOnPlane { .. }
        )
    }
}

/// Reasons a shape or ROI could not be created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationError {
    /// The ROI already holds a shape on this plane.
    #[error("ROI {roi} already has a shape on plane {coord}")]
    PlaneOccupied { roi: RoiId, coord: Coord3D },

    /// The plane lies outside the configured volume extent.
    #[error("plane {coord} lies outside the volume (size_z={size_z}, size_t={size_t})")]
    OutsideVolume {
        coord: Coord3D,
        size_z: u32,
        size_t: u32,
    },

    /// The figure geometry is unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A shape id is already registered.
    #[error("duplicate shape id {0}")]
    DuplicateShapeId(ShapeId),

    /// A ROI id is already registered.
    #[error("duplicate ROI id {0}")]
    DuplicateRoiId(RoiId),

    /// The identifier space is exhausted.
    #[error("identifier space exhausted")]
    IdOverflow,
}
