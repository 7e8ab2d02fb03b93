//! Raster processing for the CORDEX pipeline.
//!
//! Everything here operates on whole directories, the way the pipeline
//! hands data from stage to stage:
//!
//! - [`reproject`]: rotated-pole NetCDF to EPSG:4326 GeoTIFF
//! - [`mosaic`]: all reprojected rasters into one dated Cloud-Optimized GeoTIFF
//! - [`seasonal`]: one single-band GeoTIFF per season
//! - [`export`]: the terminal exporters (COG or an external raster catalog)
//!
//! Raster access goes through the [`RasterBackend`] trait. [`GdalBackend`]
//! is the production implementation.

mod backend;
pub mod error;
pub mod export;
mod gdal_backend;
pub mod mosaic;
pub mod reproject;
mod rotated_pole;
pub mod seasonal;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use backend::{OutputType, RasterBackend, ResampleAlg, TranslateOptions};
pub use error::{RasterError, RasterResult};
pub use export::{
    CatalogConfig, CogExporter, ExportConfig, Exporter, ExporterKind, RasterCatalogExporter,
};
pub use gdal_backend::GdalBackend;
pub use mosaic::{cloud_optimized_geotiff, MosaicOutput};
pub use reproject::{reproject_netcdf, WarpParams};
pub use rotated_pole::RotatedPole;
pub use seasonal::seasonal_tif_files;
