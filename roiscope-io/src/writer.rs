//! CSV reports for statistics, line profiles and shape measurements.

use crate::Result;
use roiscope_algorithms::{AnalysisResults, StatKind};
use roiscope_core::RoiRegistry;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for CSV reports.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl ReportWriter<BufWriter<File>> {
    /// Creates a report file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one row per (shape, channel) with the scalar statistics.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_statistics_csv(&mut self, results: &AnalysisResults) -> Result<()> {
        write!(self.writer, "shape_id,roi_id,z,t,figure_type,channel,pixel_count")?;
        for kind in StatKind::SCALARS {
            write!(self.writer, ",{}", kind.as_str().to_ascii_lowercase())?;
        }
        writeln!(self.writer)?;

        for shape in results {
            for (channel, stats) in &shape.channels {
                write!(
                    self.writer,
                    "{},{},{},{},{},{},{}",
                    shape.shape_id,
                    shape.roi_id,
                    shape.coord.z,
                    shape.coord.t,
                    shape.figure_type,
                    channel,
                    stats.pixel_count
                )?;
                for kind in StatKind::SCALARS {
                    let value = stats.value(kind).as_scalar().unwrap_or(f64::NAN);
                    write!(self.writer, ",{value}")?;
                }
                writeln!(self.writer)?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the ordered samples of every shape and channel.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_profiles_csv(&mut self, results: &AnalysisResults) -> Result<()> {
        writeln!(self.writer, "shape_id,channel,index,value")?;
        for shape in results {
            for (channel, stats) in &shape.channels {
                for (index, value) in stats.pixel_data.iter().enumerate() {
                    writeln!(self.writer, "{},{channel},{index},{value}", shape.shape_id)?;
                }
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes per-shape measurements in pixels and, where calibrated, microns.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_measurements_csv(&mut self, registry: &RoiRegistry) -> Result<()> {
        writeln!(
            self.writer,
            "roi_id,shape_id,z,t,figure_type,description,\
             width_px,height_px,area_px,perimeter_px,length_px,angle_deg,\
             width_um,height_um,area_um,perimeter_um,length_um"
        )?;

        let calibration = registry.calibration();
        for shape in registry.shapes() {
            let annotations = shape.annotations();
            let m = &annotations.measurements;
            let um = m.in_microns(calibration);
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                shape.roi_id(),
                shape.id(),
                shape.coord().z,
                shape.coord().t,
                annotations.figure_type,
                escape(annotations.description.as_deref().unwrap_or("")),
                m.bounds.width(),
                m.bounds.height(),
                optional(m.area),
                optional(m.perimeter),
                optional(m.length),
                optional(m.angle),
                optional(um.width),
                optional(um.height),
                optional(um.area),
                optional(um.perimeter),
                optional(um.length),
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
