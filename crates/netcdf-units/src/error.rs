//! Error types for NetCDF unit conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for NetCDF operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF access.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// The file could not be opened as NetCDF
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// Reading or writing variable data failed
    #[error("failed to access variable {variable} in {path}: {message}")]
    Variable {
        path: PathBuf,
        variable: String,
        message: String,
    },

    /// Missing required variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),
}
