//! roiscope-io: Persistence and image access for roiscope.
//!
//! This crate provides JSON ROI documents, memory-mapped raw image stacks
//! (via memmap2) that serve planes to the statistics engine, and CSV
//! reports of statistics, line profiles and measurements.
//!

pub mod document;
mod error;
pub mod stack;
mod writer;

pub use document::{load_registry, save_registry, RoiDocument, DOCUMENT_VERSION};
pub use error::{Error, Result};
pub use stack::{PixelType, RawPlaneStack, RawStackLayout};
pub use writer::ReportWriter;
