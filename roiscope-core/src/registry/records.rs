//! Flat records for enumerating and repopulating a registry.
//!
//! Storage back-ends serialize these instead of the registry itself, which
//! keeps the index and id counters private.

use super::RoiRegistry;
use crate::annotation::ShapeAnnotations;
use crate::coord::Coord3D;
use crate::error::{CreationError, Result};
use crate::figure::Figure;
use crate::roi::{Roi, RoiMetadata};
use crate::shape::{RoiId, RoiShape, ShapeId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One ROI and its shapes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiRecord {
    pub id: RoiId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: RoiMetadata,
    pub shapes: Vec<ShapeRecord>,
}

/// One shape on one plane.
///
/// A missing `id` is allocated on load; missing annotations are derived from
/// the figure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeRecord {
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<ShapeId>,
    pub coord: Coord3D,
    pub figure: Figure,
    #[cfg_attr(feature = "serde", serde(default))]
    pub annotations: Option<ShapeAnnotations>,
}

impl From<&RoiShape> for ShapeRecord {
    fn from(shape: &RoiShape) -> Self {
        Self {
            id: Some(shape.id()),
            coord: shape.coord(),
            figure: shape.figure().clone(),
            annotations: Some(shape.annotations().clone()),
        }
    }
}

impl From<&Roi> for RoiRecord {
    fn from(roi: &Roi) -> Self {
        Self {
            id: roi.id(),
            metadata: roi.metadata().clone(),
            shapes: roi.shapes().map(ShapeRecord::from).collect(),
        }
    }
}

impl RoiRegistry {
    /// Every ROI as a record, in id order.
    #[must_use]
    pub fn records(&self) -> Vec<RoiRecord> {
        self.rois().map(RoiRecord::from).collect()
    }

    /// Adds the ROIs described by `records`.
    ///
    /// Either every record is applied or none is. Records without shapes are
    /// skipped since an ROI cannot exist empty.
    ///
    /// # Errors
    /// Returns a [`CreationError`] for duplicate ROI or shape ids, two shapes
    /// of one ROI on the same plane, invalid geometry or planes outside the
    /// volume.
    pub fn load_records<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = RoiRecord>,
    {
        let mut staged = self.clone();
        let mut loaded = 0usize;
        for record in records {
            if staged.insert_record(record)? {
                loaded += 1;
            }
        }
        *self = staged;
        log::info!("loaded {loaded} ROIs ({} shapes total)", self.shape_count());
        Ok(loaded)
    }

    /// Builds a registry from records.
    ///
    /// # Errors
    /// See [`RoiRegistry::load_records`].
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RoiRecord>,
    {
        let mut registry = Self::new();
        registry.load_records(records)?;
        Ok(registry)
    }

    fn insert_record(&mut self, record: RoiRecord) -> Result<bool> {
        let roi_id = record.id;
        if record.shapes.is_empty() {
            log::warn!("skipping ROI {roi_id}: no shapes");
            return Ok(false);
        }
        if self.rois.contains_key(&roi_id) {
            return Err(CreationError::DuplicateRoiId(roi_id).into());
        }
        self.rois.insert(roi_id, Roi::new(roi_id, record.metadata));
        self.next_roi_id = self.next_roi_id.max(super::bump(roi_id.0)?);

        for shape in record.shapes {
            super::validate_figure(&shape.figure)?;
            self.check_plane(shape.coord)?;
            if self
                .rois
                .get(&roi_id)
                .is_some_and(|roi| roi.contains_plane(shape.coord))
            {
                return Err(CreationError::PlaneOccupied {
                    roi: roi_id,
                    coord: shape.coord,
                }
                .into());
            }
            let shape_id = match shape.id {
                Some(id) if self.locations.contains_key(&id) => {
                    return Err(CreationError::DuplicateShapeId(id).into());
                }
                Some(id) => id,
                None => self.peek_shape_id()?,
            };
            self.next_shape_id = self.next_shape_id.max(super::bump(shape_id.0)?);
            let built = match shape.annotations {
                Some(annotations) => {
                    RoiShape::with_annotations(shape_id, roi_id, shape.coord, shape.figure, annotations)
                }
                None => RoiShape::new(shape_id, roi_id, shape.coord, shape.figure),
            };
            self.attach(built);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VolumeExtent;

    fn sample_registry() -> RoiRegistry {
        let mut registry = RoiRegistry::new();
        let coord = Coord3D::new(0, 0);
        let roi_id = registry
            .create_roi_with(
                Figure::rectangle(0.0, 0.0, 2.0, 2.0),
                coord,
                RoiMetadata::default().with_name("cell"),
            )
            .unwrap()
            .id();
        registry
            .add_shape(roi_id, Figure::line(0.0, 0.0, 5.0, 5.0), Coord3D::new(1, 0))
            .unwrap();
        registry.create_roi(Figure::point(3.0, 3.0), coord).unwrap();
        registry
    }

    #[test]
    fn test_records_round_trip() {
        let registry = sample_registry();
        let records = registry.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].shapes.len(), 2);

        let rebuilt = RoiRegistry::from_records(records.clone()).unwrap();
        assert_eq!(rebuilt.records(), records);
        assert_eq!(rebuilt.shape_count(), 3);
        assert!(rebuilt.check_consistency());
    }

    #[test]
    fn test_load_continues_id_sequence() {
        let registry = sample_registry();
        let mut rebuilt = RoiRegistry::from_records(registry.records()).unwrap();
        let max_shape = registry.shapes().map(RoiShape::id).max().unwrap();
        let max_roi = registry.rois().map(Roi::id).max().unwrap();
        let roi = rebuilt
            .create_roi(Figure::point(1.0, 1.0), Coord3D::new(4, 4))
            .unwrap();
        assert!(roi.id() > max_roi);
        assert!(roi.shapes().next().unwrap().id() > max_shape);
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        let mut registry = sample_registry();
        let before = registry.records();
        let duplicate = before[0].clone();
        let fresh = RoiRecord {
            id: RoiId(50),
            metadata: RoiMetadata::default(),
            shapes: vec![ShapeRecord {
                id: None,
                coord: Coord3D::new(0, 0),
                figure: Figure::point(1.0, 1.0),
                annotations: None,
            }],
        };
        let err = registry.load_records(vec![fresh, duplicate]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Creation(CreationError::DuplicateRoiId(_))
        ));
        assert_eq!(registry.records(), before);
    }

    #[test]
    fn test_load_rejects_two_shapes_on_one_plane() {
        let shape = ShapeRecord {
            id: None,
            coord: Coord3D::new(0, 0),
            figure: Figure::point(1.0, 1.0),
            annotations: None,
        };
        let record = RoiRecord {
            id: RoiId(1),
            metadata: RoiMetadata::default(),
            shapes: vec![shape.clone(), shape],
        };
        assert!(RoiRegistry::from_records(vec![record]).is_err());
    }

    #[test]
    fn test_load_respects_extent_and_skips_empty() {
        let mut registry = RoiRegistry::new().with_extent(VolumeExtent::new(1, 1));
        let empty = RoiRecord {
            id: RoiId(3),
            metadata: RoiMetadata::default(),
            shapes: Vec::new(),
        };
        assert_eq!(registry.load_records(vec![empty]).unwrap(), 0);

        let outside = RoiRecord {
            id: RoiId(4),
            metadata: RoiMetadata::default(),
            shapes: vec![ShapeRecord {
                id: Some(ShapeId(10)),
                coord: Coord3D::new(1, 0),
                figure: Figure::point(0.0, 0.0),
                annotations: None,
            }],
        };
        assert!(registry.load_records(vec![outside]).is_err());
        assert!(registry.is_empty());
    }
}
