//! Error types for raster processing.

use std::path::PathBuf;

use cordex_common::CordexError;
use thiserror::Error;

/// Result type for raster operations.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors that can occur during raster processing.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Error reported by the GDAL library.
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    /// A GDAL utility could not be started.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// A GDAL utility or external exporter exited with an error.
    #[error("{tool} failed ({status}): {stderr}")]
    Command {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory listing, naming or date error.
    #[error(transparent)]
    Common(#[from] CordexError),

    /// A stage found nothing to process where it needs at least one input.
    #[error("no input rasters in {0}")]
    NoInputs(PathBuf),

    /// Two inputs of one run map to the same output file.
    #[error("output {name} would be written from both {first} and {second}")]
    OutputCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// More band descriptions than bands.
    #[error("{path} has {bands} bands, got {descriptions} descriptions")]
    BandMismatch {
        path: PathBuf,
        bands: usize,
        descriptions: usize,
    },

    /// Invalid parameters.
    #[error("invalid raster parameters: {0}")]
    InvalidParams(String),
}

impl RasterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
