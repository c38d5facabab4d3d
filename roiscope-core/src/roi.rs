//! Regions of interest: one logical region tracked across planes.

use crate::coord::{Coord3D, PlaneRange};
use crate::shape::{RoiId, RoiShape, ShapeId};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptive metadata of an ROI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RoiMetadata {
    pub name: Option<String>,
    /// Workflow namespace the ROI was created under.
    pub namespace: Option<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
}

impl RoiMetadata {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }
}

/// A region of interest and its shapes, at most one per plane.
///
/// Shapes are ordered by plane so range walks are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    id: RoiId,
    shapes: BTreeMap<Coord3D, RoiShape>,
    metadata: RoiMetadata,
}

impl Roi {
    pub(crate) fn new(id: RoiId, metadata: RoiMetadata) -> Self {
        Self {
            id,
            shapes: BTreeMap::new(),
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> RoiId {
        self.id
    }

    #[must_use]
    pub fn metadata(&self) -> &RoiMetadata {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut RoiMetadata {
        &mut self.metadata
    }

    /// Shape on the given plane, if any.
    #[must_use]
    pub fn shape(&self, coord: Coord3D) -> Option<&RoiShape> {
        self.shapes.get(&coord)
    }

    /// Whether the ROI has a shape on the plane.
    #[must_use]
    pub fn contains_plane(&self, coord: Coord3D) -> bool {
        self.shapes.contains_key(&coord)
    }

    /// Shapes in plane order.
    pub fn shapes(&self) -> impl Iterator<Item = &RoiShape> {
        self.shapes.values()
    }

    /// Planes on which the ROI has shapes, in order.
    pub fn planes(&self) -> impl Iterator<Item = Coord3D> + '_ {
        self.shapes.keys().copied()
    }

    /// Shapes lying within a plane range, in plane order.
    pub fn shapes_in(&self, range: PlaneRange) -> impl Iterator<Item = &RoiShape> {
        self.shapes
            .range(range.start()..=range.end())
            .filter(move |(coord, _)| range.contains(**coord))
            .map(|(_, shape)| shape)
    }

    /// Ids of all shapes, in plane order.
    #[must_use]
    pub fn shape_ids(&self) -> Vec<ShapeId> {
        self.shapes.values().map(RoiShape::id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub(crate) fn shape_mut(&mut self, coord: Coord3D) -> Option<&mut RoiShape> {
        self.shapes.get_mut(&coord)
    }

    /// Inserts a shape, returning the one it replaced on that plane.
    pub(crate) fn insert(&mut self, shape: RoiShape) -> Option<RoiShape> {
        self.shapes.insert(shape.coord(), shape)
    }

    pub(crate) fn remove(&mut self, coord: Coord3D) -> Option<RoiShape> {
        self.shapes.remove(&coord)
    }
}
