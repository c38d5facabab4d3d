//! JSON ROI documents.

use crate::{Error, Result};
use roiscope_core::{Calibration, RoiRecord, RoiRegistry, VolumeExtent};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Serialized form of a registry: its ROIs plus image calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiDocument {
    pub version: u32,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<VolumeExtent>,
    pub rois: Vec<RoiRecord>,
}

impl RoiDocument {
    /// Snapshot of `registry`.
    #[must_use]
    pub fn from_registry(registry: &RoiRegistry) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            calibration: *registry.calibration(),
            extent: registry.extent(),
            rois: registry.records(),
        }
    }

    /// Rebuilds a registry from the document.
    ///
    /// # Errors
    /// Returns an error if the records are inconsistent (duplicate ids,
    /// two shapes of one ROI on a plane, planes outside the extent).
    pub fn into_registry(self) -> Result<RoiRegistry> {
        let mut registry = RoiRegistry::new().with_calibration(self.calibration);
        if let Some(extent) = self.extent {
            registry = registry.with_extent(extent);
        }
        registry.load_records(self.rois)?;
        Ok(registry)
    }

    /// Decodes a document.
    ///
    /// # Errors
    /// Returns an error for malformed JSON or a version newer than
    /// [`DOCUMENT_VERSION`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: Self = serde_json::from_reader(reader)?;
        if document.version > DOCUMENT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: document.version,
                supported: DOCUMENT_VERSION,
            });
        }
        Ok(document)
    }

    /// Encodes the document as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads a document from a file.
    ///
    /// # Errors
    /// See [`RoiDocument::from_reader`].
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let document = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "read {} ROIs from {}",
            document.rois.len(),
            path.as_ref().display()
        );
        Ok(document)
    }

    /// Writes the document to a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        log::debug!("wrote {} ROIs to {}", self.rois.len(), path.as_ref().display());
        Ok(())
    }
}

/// Loads a registry from a JSON document.
///
/// # Errors
/// See [`RoiDocument::read`] and [`RoiDocument::into_registry`].
pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<RoiRegistry> {
    RoiDocument::read(path)?.into_registry()
}

/// Saves a registry as a JSON document.
///
/// # Errors
/// See [`RoiDocument::write`].
pub fn save_registry<P: AsRef<Path>>(registry: &RoiRegistry, path: P) -> Result<()> {
    RoiDocument::from_registry(registry).write(path)
}
