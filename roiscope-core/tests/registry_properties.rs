use roiscope_core::{
    Coord3D, CreationError, Error, Figure, PlaneRange, RoiRegistry, RoiShape, ShapeId,
    VolumeExtent,
};
use std::collections::HashSet;

/// Registry with a handful of ROIs spread over a 10 x 6 volume.
fn busy_registry() -> RoiRegistry {
    let mut registry = RoiRegistry::new().with_extent(VolumeExtent::new(10, 6));
    for i in 0..4u32 {
        let coord = Coord3D::new(i, i % 3);
        let figure = match i {
            0 => Figure::rectangle(1.0, 1.0, 5.0, 5.0),
            1 => Figure::ellipse(20.0, 20.0, 4.0, 2.0),
            2 => Figure::line(0.0, 0.0, 9.0, 9.0),
            _ => Figure::polygon(&[(0.0, 0.0), (6.0, 0.0), (3.0, 5.0)]),
        };
        let roi = registry.create_roi(figure, coord).unwrap();
        let shape = roi.shapes().next().unwrap().id();
        registry
            .propagate_shape(shape, coord, coord, Coord3D::new(i + 4, i % 3 + 2))
            .unwrap();
    }
    registry
}

fn ids(registry: &RoiRegistry) -> Vec<ShapeId> {
    registry.shapes().map(RoiShape::id).collect()
}

#[test]
fn test_shape_ids_unique_across_mutations() {
    let mut registry = busy_registry();
    let first = registry.shapes().next().unwrap().id();
    let source = registry.get_shape(first).unwrap().coord();
    registry
        .delete_shape_range(first, source, Coord3D::new(9, 5))
        .unwrap();
    registry
        .propagate_shape(first, source, source, Coord3D::new(9, 5))
        .unwrap();

    let all = ids(&registry);
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(all.len(), unique.len());
    assert!(registry.check_consistency());
}

#[test]
fn test_plane_index_matches_ownership() {
    let registry = busy_registry();
    for shape in registry.shapes() {
        let on_plane = registry.shape_ids_on(shape.coord());
        assert!(on_plane.contains(&shape.id()));
        let roi = registry.get_roi(shape.roi_id()).unwrap();
        assert_eq!(roi.shape(shape.coord()).map(RoiShape::id), Some(shape.id()));
    }
    let indexed: usize = registry
        .planes()
        .map(|coord| registry.shape_list(coord).len())
        .sum();
    assert_eq!(indexed, registry.shape_count());
}

#[test]
fn test_propagation_covers_range_except_source() {
    let mut registry = RoiRegistry::new();
    let source = Coord3D::new(2, 1);
    let target = Coord3D::new(4, 2);
    let roi_id = registry
        .create_roi(Figure::rectangle(0.0, 0.0, 3.0, 3.0), source)
        .unwrap()
        .id();
    let shape = registry.get_roi(roi_id).unwrap().shape_ids()[0];

    let created = registry
        .propagate_shape(shape, source, source, target)
        .unwrap();
    let range = PlaneRange::spanning(source, target);
    assert_eq!(created.len(), range.len() - 1);

    let roi = registry.get_roi(roi_id).unwrap();
    assert_eq!(roi.len(), range.len());
    for coord in range.iter() {
        let copy = roi.shape(coord).unwrap();
        assert_eq!(copy.figure(), &Figure::rectangle(0.0, 0.0, 3.0, 3.0));
    }
}

#[test]
fn test_range_delete_undoes_propagation() {
    let mut registry = busy_registry();
    let before = registry.records();

    let roi_id = registry
        .create_roi(Figure::point(4.0, 4.0), Coord3D::new(0, 5))
        .unwrap()
        .id();
    let shape = registry.get_roi(roi_id).unwrap().shape_ids()[0];
    let source = Coord3D::new(0, 5);
    let target = Coord3D::new(9, 5);
    registry.propagate_shape(shape, source, source, target).unwrap();
    assert_eq!(registry.get_roi(roi_id).unwrap().len(), 10);

    let removed = registry.delete_shape_range(shape, source, target).unwrap();
    assert_eq!(removed.len(), 9);
    assert_eq!(registry.get_roi(roi_id).unwrap().len(), 1);

    registry.delete_roi(roi_id).unwrap();
    assert_eq!(registry.records(), before);
    assert!(registry.check_consistency());
}

#[test]
fn test_inclusive_delete_drops_roi() {
    let mut registry = RoiRegistry::new();
    let source = Coord3D::new(0, 0);
    let roi_id = registry
        .create_roi(Figure::point(1.0, 1.0), source)
        .unwrap()
        .id();
    let shape = registry.get_roi(roi_id).unwrap().shape_ids()[0];
    registry
        .propagate_shape(shape, source, source, Coord3D::new(3, 0))
        .unwrap();

    let removed = registry
        .delete_shape_range_inclusive(shape, source, Coord3D::new(3, 0))
        .unwrap();
    assert_eq!(removed.len(), 4);
    assert!(matches!(registry.get_roi(roi_id), Err(Error::RoiNotFound(_))));
    assert!(registry.is_empty());
    assert!(registry.planes().next().is_none());
}

#[test]
fn test_rejected_mutations_leave_registry_unchanged() {
    let mut registry = busy_registry();
    let before = registry.records();
    let shape = registry.shapes().next().unwrap().id();
    let source = registry.get_shape(shape).unwrap().coord();

    let err = registry
        .propagate_shape(shape, source, source, Coord3D::new(10, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Creation(CreationError::OutsideVolume { .. })
    ));
    assert!(registry
        .create_roi(Figure::rectangle(0.0, 0.0, -1.0, 2.0), source)
        .is_err());
    assert!(registry
        .delete_shape_range(ShapeId(9999), source, source)
        .unwrap_err()
        .is_not_found());

    assert_eq!(registry.records(), before);
    assert!(registry.check_consistency());
}

#[test]
fn test_other_rois_untouched_by_range_ops() {
    let mut registry = busy_registry();
    let target_roi = registry.rois().next().unwrap().id();
    let others: Vec<_> = registry
        .records()
        .into_iter()
        .filter(|r| r.id != target_roi)
        .collect();

    let shape = registry.get_roi(target_roi).unwrap().shape_ids()[0];
    let source = registry.get_shape(shape).unwrap().coord();
    registry
        .delete_shape_range(shape, source, Coord3D::new(9, 5))
        .unwrap();

    let after: Vec<_> = registry
        .records()
        .into_iter()
        .filter(|r| r.id != target_roi)
        .collect();
    assert_eq!(after, others);
}
