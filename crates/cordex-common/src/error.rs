//! Error types shared by the pipeline crates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for common operations.
pub type CordexResult<T> = Result<T, CordexError>;

/// Errors raised by layout, naming and manifest helpers.
#[derive(Error, Debug)]
pub enum CordexError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file name does not follow the expected convention: {0}")]
    InvalidName(String),

    #[error("date out of range: {0}")]
    DateOutOfRange(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl CordexError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
