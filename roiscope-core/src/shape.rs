//! Shape identifiers and the per-plane shape type.

use crate::annotation::ShapeAnnotations;
use crate::coord::Coord3D;
use crate::figure::Figure;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Registry-unique shape identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ShapeId(pub u64);

/// Registry-unique ROI identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RoiId(pub u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The appearance of one ROI on one plane.
///
/// `roi_id` is a handle into the owning registry, not an owning reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiShape {
    id: ShapeId,
    roi_id: RoiId,
    coord: Coord3D,
    figure: Figure,
    annotations: ShapeAnnotations,
}

impl RoiShape {
    pub(crate) fn new(id: ShapeId, roi_id: RoiId, coord: Coord3D, figure: Figure) -> Self {
        let annotations = ShapeAnnotations::for_figure(&figure);
        Self {
            id,
            roi_id,
            coord,
            figure,
            annotations,
        }
    }

    pub(crate) fn with_annotations(
        id: ShapeId,
        roi_id: RoiId,
        coord: Coord3D,
        figure: Figure,
        mut annotations: ShapeAnnotations,
    ) -> Self {
        annotations.refresh(&figure);
        Self {
            id,
            roi_id,
            coord,
            figure,
            annotations,
        }
    }

    /// Copy of this shape under a new id on another plane.
    pub(crate) fn duplicate(&self, id: ShapeId, coord: Coord3D) -> Self {
        Self {
            id,
            roi_id: self.roi_id,
            coord,
            figure: self.figure.clone(),
            annotations: self.annotations.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    #[must_use]
    pub fn roi_id(&self) -> RoiId {
        self.roi_id
    }

    #[must_use]
    pub fn coord(&self) -> Coord3D {
        self.coord
    }

    #[must_use]
    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    #[must_use]
    pub fn annotations(&self) -> &ShapeAnnotations {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut ShapeAnnotations {
        &mut self.annotations
    }

    /// Replaces the geometry and recomputes derived annotations.
    pub(crate) fn set_figure(&mut self, figure: Figure) {
        self.annotations.refresh(&figure);
        self.figure = figure;
    }
}
