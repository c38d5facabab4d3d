//! Batch statistics over shapes and channels.

use crate::coverage::{PlanePoint, Rasterizer};
use crate::error::{ChannelFailure, PartialComputation, Result, StatisticsError};
use crate::source::PixelSource;
use crate::statistics::{AnalysisResults, ChannelStatistics, ShapeStatistics};
use ndarray::Array2;
use rayon::prelude::*;
use roiscope_core::{Coord3D, RoiRegistry, RoiShape, ShapeId, DEFAULT_BEZIER_SEGMENTS};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};

/// Configuration for a statistics run.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    /// Channels to measure. `None` measures every channel of the source.
    pub channels: Option<Vec<usize>>,
    /// Process plane groups on the rayon pool.
    pub parallel: bool,
    /// Arc-length step between samples on line figures, in pixels.
    pub sample_step: f64,
    /// Straight pieces per cubic bezier span.
    pub bezier_segments: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            channels: None,
            parallel: false,
            sample_step: 1.0,
            bezier_segments: DEFAULT_BEZIER_SEGMENTS,
        }
    }
}

impl AnalysisConfig {
    /// Restricts the run to the given channels.
    #[must_use]
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = usize>) -> Self {
        self.channels = Some(channels.into_iter().collect());
        self
    }

    /// Spreads plane groups over the rayon pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Arc-length step for line figures.
    #[must_use]
    pub fn with_sample_step(mut self, step: f64) -> Self {
        self.sample_step = step;
        self
    }

    /// Straight pieces per bezier span.
    #[must_use]
    pub fn with_bezier_segments(mut self, segments: usize) -> Self {
        self.bezier_segments = segments;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`StatisticsError::InvalidConfig`] for a non-positive sample
    /// step, zero bezier segments or an empty channel list.
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_step.is_finite() && self.sample_step > 0.0) {
            return Err(StatisticsError::InvalidConfig(format!(
                "sample step must be positive, got {}",
                self.sample_step
            )));
        }
        if self.bezier_segments == 0 {
            return Err(StatisticsError::InvalidConfig(
                "bezier segments must be at least 1".into(),
            ));
        }
        if self.channels.as_ref().is_some_and(Vec::is_empty) {
            return Err(StatisticsError::InvalidConfig("channel list is empty".into()));
        }
        Ok(())
    }

    fn rasterizer(&self, (rows, cols): (usize, usize)) -> Rasterizer {
        Rasterizer::new(cols, rows)
            .with_sample_step(self.sample_step)
            .with_bezier_segments(self.bezier_segments)
    }
}

/// Computes per-channel statistics for batches of shapes.
///
/// Shapes are grouped by plane and each plane is read from the
/// [`PixelSource`] once per channel. A plane that cannot be read drops that
/// channel from the affected shapes and the run continues; the failures are
/// reported through [`StatisticsError::Partial`] together with everything
/// that was computed.
#[derive(Clone, Debug, Default)]
pub struct StatisticsEngine {
    config: AnalysisConfig,
}

struct GroupOutcome {
    stats: Vec<ShapeStatistics>,
    failures: Vec<ChannelFailure>,
    cancelled: bool,
}

impl StatisticsEngine {
    /// Creates an engine.
    ///
    /// # Errors
    /// Returns [`StatisticsError::InvalidConfig`] if `config` fails
    /// [`AnalysisConfig::validate`].
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyses `shapes` against `source`.
    ///
    /// # Errors
    /// Returns [`StatisticsError::Partial`] when some (plane, channel) pairs
    /// could not be read.
    pub fn analyse<'a, S, I>(&self, source: &S, shapes: I) -> Result<AnalysisResults>
    where
        S: PixelSource + ?Sized,
        I: IntoIterator<Item = &'a RoiShape>,
    {
        self.analyse_cancellable(source, shapes, &AtomicBool::new(false))
    }

    /// Like [`StatisticsEngine::analyse`], but checks `abort` between shapes.
    ///
    /// # Errors
    /// Returns [`StatisticsError::Cancelled`] with the shapes finished so far
    /// once `abort` is set, or [`StatisticsError::Partial`] as for `analyse`.
    pub fn analyse_cancellable<'a, S, I>(
        &self,
        source: &S,
        shapes: I,
        abort: &AtomicBool,
    ) -> Result<AnalysisResults>
    where
        S: PixelSource + ?Sized,
        I: IntoIterator<Item = &'a RoiShape>,
    {
        let channels: Vec<usize> = match &self.config.channels {
            Some(channels) => channels.clone(),
            None => (0..source.channel_count()).collect(),
        };

        let mut groups: BTreeMap<Coord3D, BTreeMap<ShapeId, &RoiShape>> = BTreeMap::new();
        for shape in shapes {
            groups
                .entry(shape.coord())
                .or_default()
                .insert(shape.id(), shape);
        }
        let groups: Vec<(Coord3D, Vec<&RoiShape>)> = groups
            .into_iter()
            .map(|(coord, shapes)| (coord, shapes.into_values().collect()))
            .collect();

        let outcomes: Vec<GroupOutcome> = if self.config.parallel {
            groups
                .par_iter()
                .map(|(coord, shapes)| self.analyse_group(source, *coord, shapes, &channels, abort))
                .collect()
        } else {
            let mut outcomes = Vec::with_capacity(groups.len());
            for (coord, shapes) in &groups {
                let outcome = self.analyse_group(source, *coord, shapes, &channels, abort);
                let cancelled = outcome.cancelled;
                outcomes.push(outcome);
                if cancelled {
                    break;
                }
            }
            outcomes
        };

        let mut results = AnalysisResults::default();
        let mut failures = Vec::new();
        let mut cancelled = false;
        for outcome in outcomes {
            for stats in outcome.stats {
                results.insert(stats);
            }
            failures.extend(outcome.failures);
            cancelled |= outcome.cancelled;
        }

        let partial = PartialComputation { results, failures };
        if cancelled {
            log::info!(
                "statistics cancelled after {} shape(s)",
                partial.results.len()
            );
            return Err(StatisticsError::Cancelled(partial));
        }
        log::info!(
            "analysed {} shape(s) on {} plane(s) over {} channel(s)",
            partial.results.len(),
            groups.len(),
            channels.len()
        );
        if partial.failures.is_empty() {
            Ok(partial.results)
        } else {
            Err(StatisticsError::Partial(partial))
        }
    }

    /// Analyses the registry shapes named by `shape_ids`.
    ///
    /// # Errors
    /// Returns [`StatisticsError::Core`] if an id is unknown, otherwise as for
    /// [`StatisticsEngine::analyse`].
    pub fn analyse_registry<S>(
        &self,
        source: &S,
        registry: &RoiRegistry,
        shape_ids: &[ShapeId],
    ) -> Result<AnalysisResults>
    where
        S: PixelSource + ?Sized,
    {
        let shapes = shape_ids
            .iter()
            .map(|id| registry.get_shape(*id))
            .collect::<roiscope_core::Result<Vec<_>>>()?;
        self.analyse(source, shapes)
    }

    /// Analyses every shape on one plane.
    ///
    /// # Errors
    /// As for [`StatisticsEngine::analyse`].
    pub fn analyse_plane<S>(
        &self,
        source: &S,
        registry: &RoiRegistry,
        coord: Coord3D,
    ) -> Result<AnalysisResults>
    where
        S: PixelSource + ?Sized,
    {
        self.analyse(source, registry.shape_list(coord))
    }

    fn analyse_group<S>(
        &self,
        source: &S,
        coord: Coord3D,
        shapes: &[&RoiShape],
        channels: &[usize],
        abort: &AtomicBool,
    ) -> GroupOutcome
    where
        S: PixelSource + ?Sized,
    {
        let mut outcome = GroupOutcome {
            stats: Vec::with_capacity(shapes.len()),
            failures: Vec::new(),
            cancelled: false,
        };
        if abort.load(Relaxed) {
            outcome.cancelled = true;
            return outcome;
        }

        let mut planes: Vec<(usize, Array2<f64>)> = Vec::with_capacity(channels.len());
        for &channel in channels {
            match source.plane(coord, channel) {
                Ok(plane) => planes.push((channel, plane)),
                Err(error) => {
                    log::warn!("skipping channel {channel} on plane {coord}: {error}");
                    outcome.failures.push(ChannelFailure {
                        coord,
                        channel,
                        shapes: shapes.iter().map(|s| s.id()).collect(),
                        error,
                    });
                }
            }
        }

        for shape in shapes {
            if abort.load(Relaxed) {
                outcome.cancelled = true;
                break;
            }
            let mut stats = ShapeStatistics::for_shape(shape);
            // Coverage depends only on plane dimensions, which channels usually share.
            let mut cached: Option<((usize, usize), Vec<PlanePoint>)> = None;
            for (channel, plane) in &planes {
                let dims = plane.dim();
                if cached.as_ref().map_or(true, |(cached_dims, _)| *cached_dims != dims) {
                    let coverage = self.config.rasterizer(dims).coverage(shape.figure());
                    cached = Some((dims, coverage));
                }
                let Some((_, coverage)) = &cached else {
                    continue;
                };
                if let Some(channel_stats) = ChannelStatistics::from_coverage(coverage, plane.view())
                {
                    stats.channels.insert(*channel, channel_stats);
                }
            }
            outcome.stats.push(stats);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryStack;
    use approx::assert_relative_eq;
    use roiscope_core::Figure;

    fn registry_with(figures: &[Figure], coord: Coord3D) -> (RoiRegistry, Vec<ShapeId>) {
        let mut registry = RoiRegistry::new();
        let mut ids = Vec::new();
        for figure in figures {
            let roi = registry.create_roi(figure.clone(), coord).unwrap();
            ids.push(roi.shapes().next().unwrap().id());
        }
        (registry, ids)
    }

    #[allow(clippy::cast_precision_loss)]
    fn numbered_stack(coord: Coord3D, channels: usize) -> InMemoryStack {
        let mut stack = InMemoryStack::new(3, 3, channels);
        for c in 0..channels {
            stack.fill_plane(coord, c, |x, y| (3 * y + x + 1) as f64 * (c + 1) as f64);
        }
        stack
    }

    #[test]
    fn test_config_validation() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(matches!(
            StatisticsEngine::new(AnalysisConfig::default().with_sample_step(0.0)),
            Err(StatisticsError::InvalidConfig(_))
        ));
        assert!(StatisticsEngine::new(AnalysisConfig::default().with_bezier_segments(0)).is_err());
        assert!(StatisticsEngine::new(AnalysisConfig::default().with_channels([])).is_err());
    }

    #[test]
    fn test_all_channels_measured() {
        let coord = Coord3D::new(0, 0);
        let (registry, ids) = registry_with(&[Figure::rectangle(0.0, 0.0, 3.0, 3.0)], coord);
        let engine = StatisticsEngine::default();
        let results = engine
            .analyse_registry(&numbered_stack(coord, 2), &registry, &ids)
            .unwrap();
        let shape = results.get(ids[0]).unwrap();
        assert_relative_eq!(shape.channel(0).unwrap().sum, 45.0);
        assert_relative_eq!(shape.channel(1).unwrap().sum, 90.0);
        assert_relative_eq!(shape.channel(1).unwrap().mean, 10.0);
    }

    #[test]
    fn test_missing_plane_is_partial() {
        let coord = Coord3D::new(0, 0);
        let other = Coord3D::new(1, 0);
        let mut registry = RoiRegistry::new();
        let a = registry
            .create_roi(Figure::rectangle(0.0, 0.0, 2.0, 2.0), coord)
            .unwrap()
            .id();
        registry
            .add_shape(a, Figure::rectangle(0.0, 0.0, 2.0, 2.0), other)
            .unwrap();

        let engine = StatisticsEngine::default();
        let err = engine
            .analyse(&numbered_stack(coord, 1), registry.shapes())
            .unwrap_err();
        let partial = err.into_partial().unwrap();
        assert_eq!(partial.results.len(), 2);
        assert_eq!(partial.failures.len(), 1);
        assert_eq!(partial.failures[0].coord, other);
        let on_other = partial.failures[0].shapes[0];
        assert!(partial.results.get(on_other).unwrap().channels.is_empty());
    }

    #[test]
    fn test_analyse_plane_only_sees_that_plane() {
        let coord = Coord3D::new(0, 0);
        let (mut registry, _) = registry_with(
            &[Figure::point(0.5, 0.5), Figure::point(2.5, 2.5)],
            coord,
        );
        registry
            .create_roi(Figure::point(1.5, 1.5), Coord3D::new(0, 1))
            .unwrap();
        let results = StatisticsEngine::default()
            .analyse_plane(&numbered_stack(coord, 1), &registry, coord)
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_unknown_shape_id() {
        let registry = RoiRegistry::new();
        let err = StatisticsEngine::default()
            .analyse_registry(&numbered_stack(Coord3D::new(0, 0), 1), &registry, &[ShapeId(9)])
            .unwrap_err();
        assert!(matches!(err, StatisticsError::Core(e) if e.is_not_found()));
    }

    #[test]
    fn test_cancel_before_start() {
        let coord = Coord3D::new(0, 0);
        let (registry, _) = registry_with(&[Figure::point(0.5, 0.5)], coord);
        let abort = AtomicBool::new(true);
        let err = StatisticsEngine::default()
            .analyse_cancellable(&numbered_stack(coord, 1), registry.shapes(), &abort)
            .unwrap_err();
        match err {
            StatisticsError::Cancelled(partial) => assert!(partial.results.is_empty()),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
