//! The CORDEX temperature pipeline.
//!
//! Six stages, each reading one directory of the [`ProjectLayout`] and
//! writing the next:
//!
//! 1. [`acquire`]: decade archives from the Climate Data Store
//! 2. [`extract`]: unzip and shorten raw file names
//! 3. [`convert`]: Kelvin to Celsius copies
//! 4. reprojection to EPSG:4326 (`raster_ops::reproject_netcdf`)
//! 5. optional seasonal split (`raster_ops::seasonal_tif_files`)
//! 6. the configured [`raster_ops::Exporter`]
//!
//! [`Pipeline`] runs a selection of stages in that order and writes the run
//! manifest.
//!
//! [`ProjectLayout`]: cordex_common::ProjectLayout

pub mod acquire;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod runner;

pub use acquire::{download_cordex_data, YearRange};
pub use config::PipelineConfig;
pub use convert::convert_kelvin_celsius;
pub use error::{PipelineError, PipelineResult};
pub use extract::extract_cordex_data;
pub use runner::{Pipeline, PipelineStage};
