//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// ROI document written by a newer version.
    #[error("unsupported ROI document version {found} (latest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] roiscope_core::Error),
}
