//! The ROI registry: sole owner of every ROI and shape.
//!
//! Besides the ROI -> plane -> shape ownership tree, the registry keeps a
//! reverse index from each plane to the shapes drawn on it, so a viewer can
//! redraw one plane without walking every ROI. Every mutation validates its
//! input first and only then touches the tree and the index together, so a
//! rejected request leaves both unchanged.

mod propagation;
mod records;

pub use records::{RoiRecord, ShapeRecord};

use crate::calibration::Calibration;
use crate::coord::Coord3D;
use crate::error::{CreationError, Error, Result};
use crate::figure::Figure;
use crate::geometry::Point;
use crate::roi::{Roi, RoiMetadata};
use crate::shape::{RoiId, RoiShape, ShapeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of Z-sections and time-points of the image the ROIs belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeExtent {
    pub size_z: u32,
    pub size_t: u32,
}

impl VolumeExtent {
    #[must_use]
    pub fn new(size_z: u32, size_t: u32) -> Self {
        Self { size_z, size_t }
    }

    /// Whether the plane exists in the volume.
    #[must_use]
    pub fn contains(&self, coord: Coord3D) -> bool {
        coord.z < self.size_z && coord.t < self.size_t
    }
}

/// Owner of all ROIs, with a per-plane shape index.
#[derive(Debug, Clone, Default)]
pub struct RoiRegistry {
    rois: BTreeMap<RoiId, Roi>,
    plane_index: BTreeMap<Coord3D, BTreeSet<ShapeId>>,
    locations: HashMap<ShapeId, (RoiId, Coord3D)>,
    calibration: Calibration,
    extent: Option<VolumeExtent>,
    next_roi_id: u64,
    next_shape_id: u64,
}

impl RoiRegistry {
    /// Creates an empty registry with no volume bounds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_roi_id: 1,
            next_shape_id: 1,
            ..Self::default()
        }
    }

    /// Restrict shapes to planes inside `extent`.
    #[must_use]
    pub fn with_extent(mut self, extent: VolumeExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Set the pixel calibration.
    #[must_use]
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    #[must_use]
    pub fn extent(&self) -> Option<VolumeExtent> {
        self.extent
    }

    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn set_microns_per_pixel_x(&mut self, value: f64) {
        self.calibration = self.calibration.with_microns_per_pixel_x(value);
    }

    pub fn set_microns_per_pixel_y(&mut self, value: f64) {
        self.calibration = self.calibration.with_microns_per_pixel_y(value);
    }

    pub fn set_microns_per_pixel_z(&mut self, value: f64) {
        self.calibration = self.calibration.with_microns_per_pixel_z(value);
    }

    /// Creates a new ROI holding a single shape at `coord`.
    ///
    /// # Errors
    /// Returns [`CreationError`] if the figure is invalid or the plane lies
    /// outside the volume.
    pub fn create_roi(&mut self, figure: Figure, coord: Coord3D) -> Result<&Roi> {
        self.create_roi_with(figure, coord, RoiMetadata::default())
    }

    /// Creates a new ROI with metadata holding a single shape at `coord`.
    ///
    /// # Errors
    /// See [`RoiRegistry::create_roi`].
    pub fn create_roi_with(
        &mut self,
        figure: Figure,
        coord: Coord3D,
        metadata: RoiMetadata,
    ) -> Result<&Roi> {
        validate_figure(&figure)?;
        self.check_plane(coord)?;
        let roi_id = RoiId(self.next_roi_id);
        if self.rois.contains_key(&roi_id) {
            return Err(CreationError::DuplicateRoiId(roi_id).into());
        }
        let next_roi_id = bump(self.next_roi_id)?;
        let shape_id = self.peek_shape_id()?;

        // Commit.
        self.next_roi_id = next_roi_id;
        self.next_shape_id += 1;
        self.rois.insert(roi_id, Roi::new(roi_id, metadata));
        self.attach(RoiShape::new(shape_id, roi_id, coord, figure));
        log::debug!("created ROI {roi_id} with shape {shape_id} on {coord}");
        self.get_roi(roi_id)
    }

    /// Adds a shape to an existing ROI on a plane it does not occupy yet.
    ///
    /// # Errors
    /// Returns [`Error::RoiNotFound`] for an unknown ROI and
    /// [`CreationError::PlaneOccupied`] if the ROI already has a shape there.
    pub fn add_shape(&mut self, roi_id: RoiId, figure: Figure, coord: Coord3D) -> Result<ShapeId> {
        validate_figure(&figure)?;
        let roi = self.get_roi(roi_id)?;
        if roi.contains_plane(coord) {
            return Err(CreationError::PlaneOccupied { roi: roi_id, coord }.into());
        }
        self.check_plane(coord)?;
        let shape_id = self.peek_shape_id()?;

        self.next_shape_id += 1;
        self.attach(RoiShape::new(shape_id, roi_id, coord, figure));
        log::debug!("added shape {shape_id} to ROI {roi_id} on {coord}");
        Ok(shape_id)
    }

    /// Looks up an ROI.
    ///
    /// # Errors
    /// Returns [`Error::RoiNotFound`] if no such ROI exists.
    pub fn get_roi(&self, roi_id: RoiId) -> Result<&Roi> {
        self.rois.get(&roi_id).ok_or(Error::RoiNotFound(roi_id))
    }

    /// Looks up a shape by id.
    ///
    /// # Errors
    /// Returns [`Error::ShapeNotFound`] if no such shape exists.
    pub fn get_shape(&self, shape_id: ShapeId) -> Result<&RoiShape> {
        let (roi_id, coord) = self.locate(shape_id)?;
        self.rois
            .get(&roi_id)
            .and_then(|roi| roi.shape(coord))
            .ok_or(Error::ShapeNotFound(shape_id))
    }

    /// All shapes drawn on a plane, ordered by shape id. Empty when none.
    #[must_use]
    pub fn shape_list(&self, coord: Coord3D) -> Vec<&RoiShape> {
        self.plane_index
            .get(&coord)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get_shape(*id).ok())
            .collect()
    }

    /// Ids of the shapes drawn on a plane.
    #[must_use]
    pub fn shape_ids_on(&self, coord: Coord3D) -> Vec<ShapeId> {
        self.plane_index
            .get(&coord)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Shapes on a plane under `point`, topmost (most recent) first.
    #[must_use]
    pub fn shapes_at_point(&self, coord: Coord3D, point: Point, tolerance: f64) -> Vec<&RoiShape> {
        let mut hits: Vec<&RoiShape> = self
            .shape_list(coord)
            .into_iter()
            .filter(|shape| shape.figure().hit(point, tolerance))
            .collect();
        hits.reverse();
        hits
    }

    /// Removes the ROI's shape from one plane.
    ///
    /// The ROI itself is dropped once its last shape is gone.
    ///
    /// # Errors
    /// Returns [`Error::RoiNotFound`] or [`Error::PlaneNotFound`] if the
    /// pair does not exist.
    pub fn delete_shape(&mut self, roi_id: RoiId, coord: Coord3D) -> Result<RoiShape> {
        if !self.get_roi(roi_id)?.contains_plane(coord) {
            return Err(Error::PlaneNotFound { roi: roi_id, coord });
        }
        let removed = self
            .detach(roi_id, coord)
            .ok_or(Error::PlaneNotFound { roi: roi_id, coord })?;
        log::debug!("deleted shape {} of ROI {roi_id} on {coord}", removed.id());
        Ok(removed)
    }

    /// Removes one shape by id.
    ///
    /// # Errors
    /// Returns [`Error::ShapeNotFound`] if no such shape exists.
    pub fn delete_shape_by_id(&mut self, shape_id: ShapeId) -> Result<RoiShape> {
        let (roi_id, coord) = self.locate(shape_id)?;
        self.delete_shape(roi_id, coord)
    }

    /// Removes an ROI and all of its shapes.
    ///
    /// # Errors
    /// Returns [`Error::RoiNotFound`] if no such ROI exists.
    pub fn delete_roi(&mut self, roi_id: RoiId) -> Result<Roi> {
        let roi = self.rois.remove(&roi_id).ok_or(Error::RoiNotFound(roi_id))?;
        for shape in roi.shapes() {
            self.unindex(shape.id(), shape.coord());
        }
        log::debug!("deleted ROI {roi_id} ({} shapes)", roi.len());
        Ok(roi)
    }

    /// Replaces a shape's geometry and recomputes its measurements.
    ///
    /// # Errors
    /// Returns [`Error::ShapeNotFound`] for an unknown shape or
    /// [`CreationError::InvalidGeometry`] for a bad figure.
    pub fn modify_shape(&mut self, shape_id: ShapeId, figure: Figure) -> Result<()> {
        validate_figure(&figure)?;
        self.shape_mut(shape_id)?.set_figure(figure);
        Ok(())
    }

    /// Sets or clears a shape's description.
    ///
    /// # Errors
    /// Returns [`Error::ShapeNotFound`] for an unknown shape.
    pub fn set_shape_description(
        &mut self,
        shape_id: ShapeId,
        description: Option<String>,
    ) -> Result<()> {
        self.shape_mut(shape_id)?.annotations_mut().description = description;
        Ok(())
    }

    /// Sets a UI-defined annotation field on a shape.
    ///
    /// # Errors
    /// Returns [`Error::ShapeNotFound`] for an unknown shape.
    pub fn set_shape_custom(
        &mut self,
        shape_id: ShapeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.shape_mut(shape_id)?
            .annotations_mut()
            .custom
            .insert(key.into(), value.into());
        Ok(())
    }

    /// Replaces an ROI's metadata.
    ///
    /// # Errors
    /// Returns [`Error::RoiNotFound`] for an unknown ROI.
    pub fn set_roi_metadata(&mut self, roi_id: RoiId, metadata: RoiMetadata) -> Result<()> {
        let roi = self.rois.get_mut(&roi_id).ok_or(Error::RoiNotFound(roi_id))?;
        *roi.metadata_mut() = metadata;
        Ok(())
    }

    /// ROIs in id order.
    pub fn rois(&self) -> impl Iterator<Item = &Roi> {
        self.rois.values()
    }

    /// Every shape, ROI by ROI in plane order.
    pub fn shapes(&self) -> impl Iterator<Item = &RoiShape> {
        self.rois.values().flat_map(Roi::shapes)
    }

    /// ROIs carrying the given keyword.
    pub fn rois_with_keyword<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Roi> {
        self.rois
            .values()
            .filter(move |roi| roi.metadata().keywords.iter().any(|k| k == keyword))
    }

    /// Planes holding at least one shape, in order.
    pub fn planes(&self) -> impl Iterator<Item = Coord3D> + '_ {
        self.plane_index.keys().copied()
    }

    #[must_use]
    pub fn roi_count(&self) -> usize {
        self.rois.len()
    }

    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Removes every ROI. Calibration, extent and id counters are kept so
    /// ids are never reused.
    pub fn clear(&mut self) {
        self.rois.clear();
        self.plane_index.clear();
        self.locations.clear();
    }

    /// Verifies that the plane index and the ownership tree agree.
    #[must_use]
    pub fn check_consistency(&self) -> bool {
        let mut owned = 0usize;
        for roi in self.rois.values() {
            if roi.is_empty() {
                return false;
            }
            for shape in roi.shapes() {
                owned += 1;
                let indexed = self
                    .plane_index
                    .get(&shape.coord())
                    .is_some_and(|ids| ids.contains(&shape.id()));
                let located = self.locations.get(&shape.id()) == Some(&(roi.id(), shape.coord()));
                if !indexed || !located || shape.roi_id() != roi.id() {
                    return false;
                }
            }
        }
        let indexed: usize = self.plane_index.values().map(BTreeSet::len).sum();
        let no_empty_planes = self.plane_index.values().all(|ids| !ids.is_empty());
        owned == indexed && owned == self.locations.len() && no_empty_planes
    }

    fn locate(&self, shape_id: ShapeId) -> Result<(RoiId, Coord3D)> {
        self.locations
            .get(&shape_id)
            .copied()
            .ok_or(Error::ShapeNotFound(shape_id))
    }

    fn shape_mut(&mut self, shape_id: ShapeId) -> Result<&mut RoiShape> {
        let (roi_id, coord) = self.locate(shape_id)?;
        self.rois
            .get_mut(&roi_id)
            .and_then(|roi| roi.shape_mut(coord))
            .ok_or(Error::ShapeNotFound(shape_id))
    }

    fn check_plane(&self, coord: Coord3D) -> Result<()> {
        match self.extent {
            Some(extent) if !extent.contains(coord) => Err(CreationError::OutsideVolume {
                coord,
                size_z: extent.size_z,
                size_t: extent.size_t,
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Next shape id, checked but not consumed.
    fn peek_shape_id(&self) -> Result<ShapeId> {
        let id = ShapeId(self.next_shape_id);
        bump(self.next_shape_id)?;
        if self.locations.contains_key(&id) {
            return Err(CreationError::DuplicateShapeId(id).into());
        }
        Ok(id)
    }

    /// Inserts a shape into its ROI and the index, unindexing any shape it
    /// replaces. The ROI must exist.
    fn attach(&mut self, shape: RoiShape) -> Option<RoiShape> {
        let (id, roi_id, coord) = (shape.id(), shape.roi_id(), shape.coord());
        let replaced = self.rois.get_mut(&roi_id)?.insert(shape);
        if let Some(old) = &replaced {
            self.unindex(old.id(), old.coord());
        }
        self.plane_index.entry(coord).or_default().insert(id);
        self.locations.insert(id, (roi_id, coord));
        replaced
    }

    /// Removes a shape from its ROI and the index, dropping the ROI when it
    /// becomes empty.
    fn detach(&mut self, roi_id: RoiId, coord: Coord3D) -> Option<RoiShape> {
        let roi = self.rois.get_mut(&roi_id)?;
        let removed = roi.remove(coord)?;
        if roi.is_empty() {
            self.rois.remove(&roi_id);
            log::debug!("ROI {roi_id} is empty and was removed");
        }
        self.unindex(removed.id(), coord);
        Some(removed)
    }

    fn unindex(&mut self, shape_id: ShapeId, coord: Coord3D) {
        if let Some(ids) = self.plane_index.get_mut(&coord) {
            ids.remove(&shape_id);
            if ids.is_empty() {
                self.plane_index.remove(&coord);
            }
        }
        self.locations.remove(&shape_id);
    }
}

fn validate_figure(figure: &Figure) -> Result<()> {
    figure
        .validate()
        .map_err(|reason| CreationError::InvalidGeometry(reason).into())
}

fn bump(counter: u64) -> Result<u64> {
    counter
        .checked_add(1)
        .ok_or_else(|| CreationError::IdOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Figure {
        Figure::rectangle(1.0, 1.0, 4.0, 4.0)
    }

    #[test]
    fn test_create_and_get_roi() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let roi_id = registry.create_roi(rect(), coord).unwrap().id();
        let roi = registry.get_roi(roi_id).unwrap();
        assert_eq!(roi.len(), 1);
        let shape = roi.shape(coord).unwrap();
        assert_eq!(shape.roi_id(), roi_id);
        assert_eq!(registry.shape_list(coord).len(), 1);
        assert!(registry.check_consistency());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = RoiRegistry::new();
        let a = registry.create_roi(rect(), Coord3D::new(0, 0)).unwrap().id();
        let b = registry.create_roi(rect(), Coord3D::new(0, 0)).unwrap().id();
        assert_ne!(a, b);
        let shapes = registry.shape_ids_on(Coord3D::new(0, 0));
        assert_eq!(shapes.len(), 2);
        assert_ne!(shapes[0], shapes[1]);
    }

    #[test]
    fn test_shape_list_empty_plane() {
        let registry = RoiRegistry::new();
        assert!(registry.shape_list(Coord3D::new(7, 9)).is_empty());
    }

    #[test]
    fn test_add_shape_rejects_occupied_plane() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let roi_id = registry.create_roi(rect(), coord).unwrap().id();
        let err = registry.add_shape(roi_id, rect(), coord).unwrap_err();
        assert_eq!(err, Error::Creation(CreationError::PlaneOccupied { roi: roi_id, coord }));
        registry.add_shape(roi_id, rect(), Coord3D::new(1, 0)).unwrap();
        assert_eq!(registry.get_roi(roi_id).unwrap().len(), 2);
        assert!(registry.check_consistency());
    }

    #[test]
    fn test_extent_rejects_outside_plane() {
        let mut registry = RoiRegistry::new().with_extent(VolumeExtent::new(5, 2));
        let err = registry.create_roi(rect(), Coord3D::new(5, 0)).unwrap_err();
        assert!(matches!(err, Error::Creation(CreationError::OutsideVolume { .. })));
        assert!(registry.is_empty());
        assert!(registry.create_roi(rect(), Coord3D::new(4, 1)).is_ok());
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut registry = RoiRegistry::new();
        let err = registry
            .create_roi(Figure::point(f64::NAN, 1.0), Coord3D::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, Error::Creation(CreationError::InvalidGeometry(_))));
        assert!(registry.is_empty());
        assert!(registry.check_consistency());
    }

    #[test]
    fn test_delete_last_shape_removes_roi() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(2, 3);
        let roi_id = registry.create_roi(rect(), coord).unwrap().id();
        registry.delete_shape(roi_id, coord).unwrap();
        assert_eq!(registry.get_roi(roi_id).unwrap_err(), Error::RoiNotFound(roi_id));
        assert!(registry.shape_list(coord).is_empty());
        assert!(registry.check_consistency());
    }

    #[test]
    fn test_delete_missing_pair() {
        let mut registry = RoiRegistry::new();
        let roi_id = registry.create_roi(rect(), Coord3D::new(0, 0)).unwrap().id();
        let err = registry.delete_shape(roi_id, Coord3D::new(1, 0)).unwrap_err();
        assert!(err.is_not_found());
        let err = registry.delete_shape(RoiId(99), Coord3D::new(0, 0)).unwrap_err();
        assert_eq!(err, Error::RoiNotFound(RoiId(99)));
        assert_eq!(registry.shape_count(), 1);
    }

    #[test]
    fn test_modify_shape_refreshes_measurements() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let roi = registry.create_roi(rect(), coord).unwrap();
        let shape_id = roi.shape(coord).unwrap().id();
        registry
            .modify_shape(shape_id, Figure::rectangle(0.0, 0.0, 10.0, 2.0))
            .unwrap();
        let shape = registry.get_shape(shape_id).unwrap();
        assert_eq!(shape.annotations().measurements.area, Some(20.0));
        assert!(registry
            .modify_shape(ShapeId(404), rect())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_hit_test_topmost_first() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let below = registry.create_roi(rect(), coord).unwrap().id();
        let above = registry
            .create_roi(Figure::ellipse(3.0, 3.0, 1.0, 1.0), coord)
            .unwrap()
            .id();
        let hits = registry.shapes_at_point(coord, Point::new(3.0, 3.0), 0.5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].roi_id(), above);
        assert_eq!(hits[1].roi_id(), below);
        assert!(registry
            .shapes_at_point(coord, Point::new(20.0, 20.0), 0.5)
            .is_empty());
    }

    #[test]
    fn test_delete_roi_and_clear() {
        let mut registry = RoiRegistry::new();
        let roi_id = registry.create_roi(rect(), Coord3D::new(0, 0)).unwrap().id();
        registry.add_shape(roi_id, rect(), Coord3D::new(1, 0)).unwrap();
        let other = registry.create_roi(rect(), Coord3D::new(1, 0)).unwrap().id();
        let removed = registry.delete_roi(roi_id).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.shape_list(Coord3D::new(1, 0)).len(), 1);
        assert!(registry.check_consistency());

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get_roi(other).is_err());
        let fresh = registry.create_roi(rect(), Coord3D::new(0, 0)).unwrap().id();
        assert!(fresh > other);
    }

    #[test]
    fn test_calibration_setters() {
        let mut registry = RoiRegistry::new();
        registry.set_microns_per_pixel_x(0.2);
        registry.set_microns_per_pixel_y(0.3);
        registry.set_microns_per_pixel_z(1.5);
        let cal = registry.calibration();
        assert_eq!(cal.microns_per_pixel_x, Some(0.2));
        assert_eq!(cal.microns_per_pixel_y, Some(0.3));
        assert_eq!(cal.microns_per_pixel_z, Some(1.5));
    }

    #[test]
    fn test_keyword_lookup_and_annotations() {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let roi_id = registry
            .create_roi_with(rect(), coord, RoiMetadata::default().with_keyword("nucleus"))
            .unwrap()
            .id();
        registry.create_roi(rect(), coord).unwrap();
        let tagged: Vec<_> = registry.rois_with_keyword("nucleus").map(Roi::id).collect();
        assert_eq!(tagged, vec![roi_id]);

        let shape_id = registry.shape_ids_on(coord)[0];
        registry
            .set_shape_description(shape_id, Some("first".into()))
            .unwrap();
        registry.set_shape_custom(shape_id, "stain", "DAPI").unwrap();
        let ann = registry.get_shape(shape_id).unwrap().annotations();
        assert_eq!(ann.description.as_deref(), Some("first"));
        assert_eq!(ann.custom["stain"], "DAPI");
    }
}
