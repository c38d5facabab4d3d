#![allow(clippy::cast_precision_loss)]
use approx::assert_relative_eq;
use ndarray::{array, Array2};
use roiscope_algorithms::{
    AnalysisConfig, InMemoryStack, PixelSource, PixelSourceError, PlanePoint, StatKind,
    StatValue, StatisticsEngine, StatisticsError,
};
use roiscope_core::{Coord3D, Figure, RoiRegistry, ShapeId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn three_by_three(coord: Coord3D) -> InMemoryStack {
    InMemoryStack::new(3, 3, 1)
        .with_plane(
            coord,
            0,
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
        )
        .unwrap()
}

fn single_shape(figure: Figure, coord: Coord3D) -> (RoiRegistry, ShapeId) {
    let mut registry = RoiRegistry::new();
    let id = registry
        .create_roi(figure, coord)
        .unwrap()
        .shapes()
        .next()
        .unwrap()
        .id();
    (registry, id)
}

#[test]
fn test_rectangle_over_three_by_three() {
    let coord = Coord3D::new(0, 0);
    let (registry, id) = single_shape(Figure::rectangle(0.0, 0.0, 3.0, 3.0), coord);
    let results = StatisticsEngine::default()
        .analyse_registry(&three_by_three(coord), &registry, &[id])
        .unwrap();

    let scalar = |kind| results.value(id, kind, 0).and_then(|v| v.as_scalar()).unwrap();
    assert_relative_eq!(scalar(StatKind::Min), 1.0);
    assert_relative_eq!(scalar(StatKind::Max), 9.0);
    assert_relative_eq!(scalar(StatKind::Sum), 45.0);
    assert_relative_eq!(scalar(StatKind::Mean), 5.0);
    assert_relative_eq!(scalar(StatKind::StdDev), (60.0_f64 / 9.0).sqrt(), epsilon = 1e-12);

    match results.value(id, StatKind::PlanePoints, 0) {
        Some(StatValue::PlanePoints(points)) => {
            assert_eq!(points.len(), 9);
            assert_eq!(points[&PlanePoint::new(0, 2)], 7.0);
        }
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn test_shape_outside_plane_has_no_channel_entry() {
    let coord = Coord3D::new(0, 0);
    let (registry, id) = single_shape(Figure::rectangle(10.0, 10.0, 2.0, 2.0), coord);
    let results = StatisticsEngine::default()
        .analyse_registry(&three_by_three(coord), &registry, &[id])
        .unwrap();
    let shape = results.get(id).unwrap();
    assert!(shape.channels.is_empty());
    assert!(results.value(id, StatKind::Mean, 0).is_none());
}

#[test]
fn test_text_has_no_coverage() {
    let coord = Coord3D::new(0, 0);
    let text = Figure::Text {
        position: roiscope_core::Point::new(1.0, 1.0),
        text: "nucleus".into(),
    };
    let (registry, id) = single_shape(text, coord);
    let results = StatisticsEngine::default()
        .analyse_registry(&three_by_three(coord), &registry, &[id])
        .unwrap();
    assert!(results.get(id).unwrap().channels.is_empty());
}

#[test]
fn test_line_profile_is_ordered_and_repeatable() {
    let coord = Coord3D::new(0, 0);
    let (registry, id) = single_shape(Figure::line(0.5, 2.5, 2.5, 0.5), coord);
    let stack = three_by_three(coord);
    let engine = StatisticsEngine::default();

    let first = engine.analyse_registry(&stack, &registry, &[id]).unwrap();
    let second = engine.analyse_registry(&stack, &registry, &[id]).unwrap();
    assert_eq!(first, second);

    let profile = match first.value(id, StatKind::PixelData, 0) {
        Some(StatValue::PixelData(data)) => data.to_vec(),
        other => panic!("unexpected value {other:?}"),
    };
    // Walks from the bottom-left corner towards the top-right one.
    assert_eq!(profile.first(), Some(&7.0));
    assert_eq!(profile.last(), Some(&3.0));
    assert!(profile.contains(&5.0));
}

#[test]
fn test_bad_channel_keeps_other_channels() {
    let coord = Coord3D::new(0, 0);
    let (registry, id) = single_shape(Figure::rectangle(0.0, 0.0, 3.0, 3.0), coord);
    let engine = StatisticsEngine::new(AnalysisConfig::default().with_channels([0, 5])).unwrap();

    let err = engine
        .analyse_registry(&three_by_three(coord), &registry, &[id])
        .unwrap_err();
    let StatisticsError::Partial(partial) = err else {
        panic!("expected partial results");
    };
    assert_eq!(partial.failures.len(), 1);
    assert_eq!(partial.failures[0].channel, 5);
    assert_eq!(partial.failures[0].shapes, vec![id]);
    assert!(matches!(
        partial.failures[0].error,
        PixelSourceError::ChannelOutOfRange { channel: 5, .. }
    ));

    let shape = partial.results.get(id).unwrap();
    assert_relative_eq!(shape.channel(0).unwrap().sum, 45.0);
    assert!(shape.channel(5).is_none());
}

fn time_lapse(planes: u32) -> (RoiRegistry, InMemoryStack) {
    let mut registry = RoiRegistry::new();
    let mut stack = InMemoryStack::new(16, 16, 2);
    let roi = registry
        .create_roi(Figure::ellipse(8.0, 8.0, 5.0, 3.0), Coord3D::new(0, 0))
        .unwrap()
        .id();
    let line = registry
        .create_roi(Figure::line(1.0, 1.0, 14.0, 9.0), Coord3D::new(0, 0))
        .unwrap()
        .id();
    for t in 0..planes {
        let coord = Coord3D::new(0, t);
        if t > 0 {
            registry
                .add_shape(roi, Figure::rectangle(2.0, 2.0, 6.0 + f64::from(t), 4.0), coord)
                .unwrap();
            registry
                .add_shape(line, Figure::polygon(&[(0.0, 0.0), (9.0, 1.0), (4.0, 12.0)]), coord)
                .unwrap();
        }
        for c in 0..2 {
            stack.fill_plane(coord, c, |x, y| {
                ((x * 7 + y * 13 + c * 5) % 17) as f64 + f64::from(t)
            });
        }
    }
    (registry, stack)
}

#[test]
fn test_parallel_matches_sequential() {
    let (registry, stack) = time_lapse(12);
    let sequential = StatisticsEngine::default()
        .analyse(&stack, registry.shapes())
        .unwrap();
    let parallel = StatisticsEngine::new(AnalysisConfig::default().with_parallel(true))
        .unwrap()
        .analyse(&stack, registry.shapes())
        .unwrap();
    assert_eq!(sequential.len(), 24);
    assert_eq!(sequential, parallel);
}

/// Raises the abort flag on the second plane read.
struct TrippingSource<'a> {
    inner: InMemoryStack,
    reads: AtomicUsize,
    abort: &'a AtomicBool,
}

impl PixelSource for TrippingSource<'_> {
    fn channel_count(&self) -> usize {
        1
    }

    fn plane(&self, coord: Coord3D, channel: usize) -> Result<Array2<f64>, PixelSourceError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            self.abort.store(true, Ordering::SeqCst);
        }
        self.inner.plane(coord, channel)
    }
}

#[test]
fn test_cancellation_returns_finished_shapes() {
    let (registry, stack) = time_lapse(5);
    let abort = AtomicBool::new(false);
    let source = TrippingSource {
        inner: stack,
        reads: AtomicUsize::new(0),
        abort: &abort,
    };
    let err = StatisticsEngine::new(AnalysisConfig::default().with_channels([0]))
        .unwrap()
        .analyse_cancellable(&source, registry.shapes(), &abort)
        .unwrap_err();
    let StatisticsError::Cancelled(partial) = err else {
        panic!("expected cancellation");
    };
    // Only the first plane's two shapes were finished.
    assert_eq!(partial.results.len(), 2);
    assert!(partial
        .results
        .iter()
        .all(|s| s.coord == Coord3D::new(0, 0)));
}

#[test]
fn test_plane_read_once_per_channel() {
    struct CountingSource {
        inner: InMemoryStack,
        reads: AtomicUsize,
    }
    impl PixelSource for CountingSource {
        fn channel_count(&self) -> usize {
            self.inner.channel_count()
        }
        fn plane(&self, coord: Coord3D, channel: usize) -> Result<Array2<f64>, PixelSourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.plane(coord, channel)
        }
    }

    let (registry, stack) = time_lapse(3);
    let source = CountingSource {
        inner: stack,
        reads: AtomicUsize::new(0),
    };
    let results = StatisticsEngine::default()
        .analyse(&source, registry.shapes())
        .unwrap();
    assert_eq!(results.len(), 6);
    // Three planes, two channels, two shapes per plane.
    assert_eq!(source.reads.load(Ordering::SeqCst), 6);
}
