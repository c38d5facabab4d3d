use approx::assert_relative_eq;
use roiscope_algorithms::{AnalysisConfig, StatisticsEngine, StatisticsError};
use roiscope_core::{Coord3D, Figure, RoiRegistry};
use roiscope_io::{load_registry, save_registry, RawPlaneStack, RawStackLayout, ReportWriter};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Two channels, three Z-sections, two time-points of 4x4 u16 samples.
/// Every sample of plane (z, c, t) holds `100 * t + 10 * c + z`.
fn write_stack() -> (NamedTempFile, RawStackLayout) {
    let layout = RawStackLayout::new(4, 4)
        .with_size_z(3)
        .with_size_c(2)
        .with_size_t(2);
    let mut file = NamedTempFile::new().unwrap();
    for t in 0..2u16 {
        for c in 0..2u16 {
            for z in 0..3u16 {
                let value = 100 * t + 10 * c + z;
                for _ in 0..16 {
                    file.write_all(&value.to_le_bytes()).unwrap();
                }
            }
        }
    }
    file.flush().unwrap();
    (file, layout)
}

#[test]
fn test_propagated_shapes_measured_from_raw_stack() {
    let (file, layout) = write_stack();
    let stack = RawPlaneStack::open(file.path(), layout.clone()).unwrap();

    let mut registry = RoiRegistry::new().with_extent(layout.extent().unwrap());
    let source = Coord3D::new(0, 1);
    let roi = registry
        .create_roi(Figure::rectangle(1.0, 1.0, 2.0, 2.0), source)
        .unwrap();
    let shape = roi.shapes().next().unwrap().id();
    let created = registry
        .propagate_shape(shape, source, source, Coord3D::new(2, 1))
        .unwrap();
    assert_eq!(created.len(), 2);

    let results = StatisticsEngine::default()
        .analyse(&stack, registry.shapes())
        .unwrap();
    assert_eq!(results.len(), 3);
    for stats in &results {
        let z = f64::from(stats.coord.z);
        assert_relative_eq!(stats.channel(0).unwrap().mean, 100.0 + z);
        assert_relative_eq!(stats.channel(1).unwrap().mean, 110.0 + z);
        assert_eq!(stats.channel(1).unwrap().pixel_count, 4);
    }
}

#[test]
fn test_shape_outside_stack_is_partial() {
    let (file, layout) = write_stack();
    let stack = RawPlaneStack::open(file.path(), layout).unwrap();

    // No extent on the registry, so a plane beyond the stack can be drawn on.
    let mut registry = RoiRegistry::new();
    registry
        .create_roi(Figure::point(1.0, 1.0), Coord3D::new(0, 0))
        .unwrap();
    registry
        .create_roi(Figure::point(1.0, 1.0), Coord3D::new(7, 0))
        .unwrap();

    let engine = StatisticsEngine::new(AnalysisConfig::default().with_channels([0])).unwrap();
    let Err(StatisticsError::Partial(partial)) = engine.analyse(&stack, registry.shapes()) else {
        panic!("expected partial results");
    };
    assert_eq!(partial.failures.len(), 1);
    assert_eq!(partial.failures[0].coord, Coord3D::new(7, 0));
    assert_eq!(partial.results.len(), 2);
}

#[test]
fn test_save_analyse_export() {
    let (file, layout) = write_stack();
    let stack = RawPlaneStack::open(file.path(), layout).unwrap();
    let dir = tempdir().unwrap();
    let doc_path = dir.path().join("rois.json");
    let csv_path = dir.path().join("stats.csv");

    let mut registry = RoiRegistry::new();
    registry
        .create_roi(Figure::line(0.5, 0.5, 3.5, 0.5), Coord3D::new(1, 0))
        .unwrap();
    save_registry(&registry, &doc_path).unwrap();

    let loaded = load_registry(&doc_path).unwrap();
    let results = StatisticsEngine::default()
        .analyse(&stack, loaded.shapes())
        .unwrap();
    let mut writer = ReportWriter::create(&csv_path).unwrap();
    writer.write_statistics_csv(&results).unwrap();

    let content = std::fs::read_to_string(&csv_path).unwrap();
    assert!(content.contains("1,1,1,0,Line,0,4,1,1,4,1,0"));
    assert!(content.contains("1,1,1,0,Line,1,4,11,11,44,11,0"));
}
