//! roiscope CLI: ROI propagation and intensity measurement.
//!
//! Works on JSON ROI documents and headerless raw image stacks.
#![allow(clippy::too_many_lines)]

use clap::{Parser, Subcommand};

use roiscope_algorithms::{AnalysisConfig, AnalysisResults, StatisticsEngine, StatisticsError};
use roiscope_core::{Calibration, Coord3D, RoiRegistry, ShapeId};
use roiscope_io::{
    load_registry, save_registry, PixelType, RawPlaneStack, RawStackLayout, ReportWriter,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    RoiscopeIo(#[from] roiscope_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] roiscope_core::Error),

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Region-of-interest propagation and intensity measurement for image stacks.
#[derive(Parser)]
#[command(name = "roiscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Raw image stack layout arguments.
#[derive(clap::Args)]
struct StackArgs {
    /// Raw image stack (XYZCT sample order, little-endian)
    #[arg(long)]
    stack: PathBuf,

    /// Plane width in pixels
    #[arg(long)]
    size_x: usize,

    /// Plane height in pixels
    #[arg(long)]
    size_y: usize,

    /// Number of Z-sections
    #[arg(long, default_value = "1")]
    size_z: usize,

    /// Number of channels
    #[arg(long, default_value = "1")]
    size_c: usize,

    /// Number of time-points
    #[arg(long, default_value = "1")]
    size_t: usize,

    /// Sample type (u8, u16, f32)
    #[arg(long, default_value = "u16")]
    pixel_type: PixelType,

    /// Header bytes to skip
    #[arg(long, default_value = "0")]
    offset: usize,
}

impl StackArgs {
    fn layout(&self) -> RawStackLayout {
        RawStackLayout::new(self.size_x, self.size_y)
            .with_size_z(self.size_z)
            .with_size_c(self.size_c)
            .with_size_t(self.size_t)
            .with_pixel_type(self.pixel_type)
            .with_offset(self.offset)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show a summary of an ROI document
    Info {
        /// ROI document (JSON)
        rois: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy a shape onto every plane between two coordinates
    Propagate {
        /// ROI document (JSON)
        rois: PathBuf,

        /// Shape to copy
        #[arg(long)]
        shape: u64,

        /// Plane the shape is on, as `z,t`
        #[arg(long, value_parser = parse_coord)]
        source: Coord3D,

        /// Plane the range starts from, as `z,t` (defaults to the source)
        #[arg(long, value_parser = parse_coord)]
        current: Option<Coord3D>,

        /// Plane the range ends at, as `z,t`
        #[arg(long, value_parser = parse_coord)]
        target: Coord3D,

        /// Output document (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete the copies of a shape between two planes
    DeleteRange {
        /// ROI document (JSON)
        rois: PathBuf,

        /// Shape whose ROI is trimmed
        #[arg(long)]
        shape: u64,

        /// Plane the shape is on, as `z,t`
        #[arg(long, value_parser = parse_coord)]
        source: Coord3D,

        /// Plane the range ends at, as `z,t`
        #[arg(long, value_parser = parse_coord)]
        target: Coord3D,

        /// Also delete the shape on the source plane
        #[arg(long)]
        inclusive: bool,

        /// Output document (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute per-channel intensity statistics for every shape
    Analyse {
        /// ROI document (JSON)
        rois: PathBuf,

        #[command(flatten)]
        stack: StackArgs,

        /// Channels to measure (default: all)
        #[arg(long, value_delimiter = ',')]
        channels: Option<Vec<usize>>,

        /// Only shapes on this plane, as `z,t`
        #[arg(long, value_parser = parse_coord)]
        plane: Option<Coord3D>,

        /// Line sampling step in pixels
        #[arg(long, default_value = "1.0")]
        sample_step: f64,

        /// Process planes in parallel
        #[arg(long)]
        parallel: bool,

        /// Statistics CSV output
        #[arg(short, long)]
        output: PathBuf,

        /// Line profile (PIXELDATA) CSV output
        #[arg(long)]
        profiles: Option<PathBuf>,
    },

    /// Export shape measurements in pixels and microns
    Measure {
        /// ROI document (JSON)
        rois: PathBuf,

        /// Microns per pixel in X and Y (overrides the document calibration)
        #[arg(long)]
        microns_per_pixel: Option<f64>,

        /// Measurements CSV output (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parses `z,t` into a plane coordinate.
fn parse_coord(value: &str) -> std::result::Result<Coord3D, String> {
    let (z, t) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `z,t`, got '{value}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid index '{part}': {e}"))
    };
    Coord3D::try_new(parse(z)?, parse(t)?).map_err(|e| e.to_string())
}

fn save(registry: &RoiRegistry, input: &Path, output: Option<&PathBuf>) -> Result<()> {
    let path = output.map_or(input, PathBuf::as_path);
    save_registry(registry, path)?;
    log::info!("saved {} ROIs to {}", registry.roi_count(), path.display());
    Ok(())
}

/// Keeps whatever was computed when some channels failed.
fn salvage(outcome: std::result::Result<AnalysisResults, StatisticsError>) -> Result<AnalysisResults> {
    match outcome {
        Ok(results) => Ok(results),
        Err(StatisticsError::Partial(partial)) => {
            for failure in &partial.failures {
                log::warn!(
                    "channel {} on plane {} not measured for {} shape(s): {}",
                    failure.channel,
                    failure.coord,
                    failure.shapes.len(),
                    failure.error
                );
            }
            eprintln!(
                "Warning: {} plane/channel pair(s) could not be read",
                partial.failures.len()
            );
            Ok(partial.results)
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Info { rois, json } => {
            let registry = load_registry(&rois)?;
            if json {
                let summary = serde_json::json!({
                    "file": rois.display().to_string(),
                    "rois": registry.roi_count(),
                    "shapes": registry.shape_count(),
                    "planes": registry.planes().count(),
                    "extent": registry.extent().map(|e| [e.size_z, e.size_t]),
                    "calibration": {
                        "x": registry.calibration().microns_per_pixel_x,
                        "y": registry.calibration().microns_per_pixel_y,
                        "z": registry.calibration().microns_per_pixel_z,
                    },
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("File: {}", rois.display());
            println!("ROIs: {}", registry.roi_count());
            println!("Shapes: {}", registry.shape_count());
            println!("Planes with shapes: {}", registry.planes().count());
            if let Some(extent) = registry.extent() {
                println!("Extent: {} Z-sections x {} time-points", extent.size_z, extent.size_t);
            }
            let calibration = registry.calibration();
            if calibration.is_planar_calibrated() {
                println!(
                    "Pixel size: {} x {} um",
                    calibration.microns_per_pixel_x.unwrap_or_default(),
                    calibration.microns_per_pixel_y.unwrap_or_default()
                );
            }
            println!();
            println!("{:<8} {:<20} {:>7} {:>12} {:>12}", "ROI", "Name", "Shapes", "First", "Last");
            println!("{:-<63}", "");
            for roi in registry.rois() {
                let first = roi.planes().next().map(|c| c.to_string()).unwrap_or_default();
                let last = roi.planes().last().map(|c| c.to_string()).unwrap_or_default();
                println!(
                    "{:<8} {:<20} {:>7} {:>12} {:>12}",
                    roi.id().to_string(),
                    roi.metadata().name.as_deref().unwrap_or("-"),
                    roi.len(),
                    first,
                    last
                );
            }
        }

        Commands::Propagate {
            rois,
            shape,
            source,
            current,
            target,
            output,
        } => {
            let mut registry = load_registry(&rois)?;
            let created = registry.propagate_shape(
                ShapeId(shape),
                source,
                current.unwrap_or(source),
                target,
            )?;
            println!("Created {} shape(s)", created.len());
            save(&registry, &rois, output.as_ref())?;
        }

        Commands::DeleteRange {
            rois,
            shape,
            source,
            target,
            inclusive,
            output,
        } => {
            let mut registry = load_registry(&rois)?;
            let removed = if inclusive {
                registry.delete_shape_range_inclusive(ShapeId(shape), source, target)?
            } else {
                registry.delete_shape_range(ShapeId(shape), source, target)?
            };
            println!("Deleted {} shape(s)", removed.len());
            save(&registry, &rois, output.as_ref())?;
        }

        Commands::Analyse {
            rois,
            stack,
            channels,
            plane,
            sample_step,
            parallel,
            output,
            profiles,
        } => {
            let registry = load_registry(&rois)?;
            let source = RawPlaneStack::open(&stack.stack, stack.layout())?;

            let mut config = AnalysisConfig::default()
                .with_parallel(parallel)
                .with_sample_step(sample_step);
            if let Some(channels) = channels {
                config = config.with_channels(channels);
            }
            let engine = StatisticsEngine::new(config)?;

            let start = Instant::now();
            let outcome = match plane {
                Some(coord) => engine.analyse_plane(&source, &registry, coord),
                None => engine.analyse(&source, registry.shapes()),
            };
            let results = salvage(outcome)?;
            log::info!(
                "measured {} shape(s) in {:.2?}",
                results.len(),
                start.elapsed()
            );

            let mut writer = ReportWriter::create(&output)?;
            writer.write_statistics_csv(&results)?;
            println!("Statistics written to {}", output.display());
            if let Some(path) = profiles {
                let mut writer = ReportWriter::create(&path)?;
                writer.write_profiles_csv(&results)?;
                println!("Profiles written to {}", path.display());
            }
        }

        Commands::Measure {
            rois,
            microns_per_pixel,
            output,
        } => {
            let mut registry = load_registry(&rois)?;
            if let Some(size) = microns_per_pixel {
                let z = registry.calibration().microns_per_pixel_z;
                let mut calibration = Calibration::isotropic(size);
                calibration.microns_per_pixel_z = z;
                registry.set_calibration(calibration);
            }
            match output {
                Some(path) => {
                    let mut writer = ReportWriter::create(&path)?;
                    writer.write_measurements_csv(&registry)?;
                    println!("Measurements written to {}", path.display());
                }
                None => {
                    let mut writer = ReportWriter::new(std::io::stdout().lock());
                    writer.write_measurements_csv(&registry)?;
                }
            }
        }
    }

    Ok(())
}
