//! Copying a shape across a range of planes, and the inverse range delete.
//!
//! Propagation copies the source geometry unchanged onto every plane of the
//! range; there is no interpolation between the two ends of the range.

use super::RoiRegistry;
use crate::coord::{Coord3D, PlaneRange};
use crate::error::{CreationError, Error, Result};
use crate::shape::{RoiId, RoiShape, ShapeId};

impl RoiRegistry {
    /// Copies the shape anchored at `source` onto every plane of the range
    /// spanned by `current` and `target`, except `source` itself.
    ///
    /// The range runs from `current`, not from `source`: pass
    /// `current == source` to fill everything between the source and the
    /// target. A `current` on the far side of the source leaves the planes
    /// between them untouched.
    ///
    /// A plane where the ROI already has a shape is overwritten: the old
    /// shape is removed and the copy takes its place under a fresh id.
    /// Returns the ids of the new shapes in plane order.
    ///
    /// # Errors
    /// Returns a not-found error if `shape_id` is unknown or not anchored at
    /// `source`, and a [`CreationError`] if any target plane is outside the
    /// volume or the id space cannot hold the copies. The registry is left
    /// unchanged on error.
    pub fn propagate_shape(
        &mut self,
        shape_id: ShapeId,
        source: Coord3D,
        current: Coord3D,
        target: Coord3D,
    ) -> Result<Vec<ShapeId>> {
        let roi_id = self.resolve_anchor(shape_id, source)?;
        let range = PlaneRange::spanning(current, target);
        // The extent is a rectangle from the origin, so the far corner decides.
        self.check_plane(range.end())?;

        let first_id = self.next_shape_id;
        let count = u64::try_from(range.len())
            .unwrap_or(u64::MAX)
            .saturating_sub(u64::from(range.contains(source)));
        let end_id = first_id
            .checked_add(count)
            .ok_or(Error::Creation(CreationError::IdOverflow))?;
        if let Some(taken) = self
            .locations
            .keys()
            .filter(|id| (first_id..end_id).contains(&id.0))
            .min()
            .copied()
        {
            return Err(CreationError::DuplicateShapeId(taken).into());
        }
        let template = self.get_shape(shape_id)?.clone();

        // Commit.
        let planes = range.iter().filter(|coord| *coord != source);
        let mut created = Vec::new();
        let mut overwritten = 0usize;
        for (id, coord) in (first_id..end_id).map(ShapeId).zip(planes) {
            if self.attach(template.duplicate(id, coord)).is_some() {
                overwritten += 1;
            }
            created.push(id);
        }
        self.next_shape_id = end_id;
        log::debug!(
            "propagated shape {shape_id} of ROI {roi_id} over {} planes ({overwritten} overwritten)",
            created.len()
        );
        Ok(created)
    }

    /// Removes the ROI's shapes from every plane of the range spanned by
    /// `source` and `target`, keeping the shape on `source`.
    ///
    /// This is the inverse of [`RoiRegistry::propagate_shape`] with
    /// `current == source`. Returns the removed shapes in plane order.
    ///
    /// # Errors
    /// Returns a not-found error if `shape_id` is unknown or not anchored at
    /// `source`.
    pub fn delete_shape_range(
        &mut self,
        shape_id: ShapeId,
        source: Coord3D,
        target: Coord3D,
    ) -> Result<Vec<RoiShape>> {
        self.delete_range(shape_id, source, target, false)
    }

    /// Like [`RoiRegistry::delete_shape_range`] but also removes the shape on
    /// `source`. The ROI is dropped if nothing remains.
    ///
    /// # Errors
    /// See [`RoiRegistry::delete_shape_range`].
    pub fn delete_shape_range_inclusive(
        &mut self,
        shape_id: ShapeId,
        source: Coord3D,
        target: Coord3D,
    ) -> Result<Vec<RoiShape>> {
        self.delete_range(shape_id, source, target, true)
    }

    fn delete_range(
        &mut self,
        shape_id: ShapeId,
        source: Coord3D,
        target: Coord3D,
        include_source: bool,
    ) -> Result<Vec<RoiShape>> {
        let roi_id = self.resolve_anchor(shape_id, source)?;
        let range = PlaneRange::spanning(source, target);
        let planes: Vec<Coord3D> = self
            .get_roi(roi_id)?
            .shapes_in(range)
            .map(RoiShape::coord)
            .filter(|coord| include_source || *coord != source)
            .collect();

        let removed: Vec<RoiShape> = planes
            .into_iter()
            .filter_map(|coord| self.detach(roi_id, coord))
            .collect();
        log::debug!(
            "range delete for ROI {roi_id} removed {} shapes between {} and {}",
            removed.len(),
            range.start(),
            range.end()
        );
        Ok(removed)
    }

    /// The ROI owning `shape_id`, provided the shape sits on `source`.
    fn resolve_anchor(&self, shape_id: ShapeId, source: Coord3D) -> Result<RoiId> {
        let (roi_id, coord) = self.locate(shape_id)?;
        if coord != source {
            return Err(Error::ShapeNotOnPlane {
                shape: shape_id,
                coord: source,
            });
        }
        Ok(roi_id)
    }
}
