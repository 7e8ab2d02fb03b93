//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unreadable or malformed archive.
    #[error("archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error(transparent)]
    Common(#[from] cordex_common::CordexError),

    #[error("acquisition failed: {0}")]
    Acquisition(#[from] cds_client::CdsError),

    #[error("unit conversion failed: {0}")]
    Conversion(#[from] netcdf_units::NetCdfError),

    #[error(transparent)]
    Raster(#[from] raster_ops::RasterError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
