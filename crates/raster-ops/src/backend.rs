//! Raster backend abstraction.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RasterResult;
use crate::reproject::WarpParams;

/// Resampling algorithm for warping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleAlg {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    Average,
}

impl ResampleAlg {
    /// Name understood by `gdalwarp -r`.
    pub fn as_gdal(&self) -> &'static str {
        match self {
            ResampleAlg::Nearest => "near",
            ResampleAlg::Bilinear => "bilinear",
            ResampleAlg::Cubic => "cubic",
            ResampleAlg::Average => "average",
        }
    }
}

/// Pixel type of a warped raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputType {
    #[default]
    Float32,
    Float64,
    Int16,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputType::Float32 => "Float32",
            OutputType::Float64 => "Float64",
            OutputType::Int16 => "Int16",
        };
        f.write_str(name)
    }
}

/// Options for a format translation (`gdal_translate`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Output driver; the backend's default (GTiff) when `None`
    pub format: Option<String>,
    /// `KEY=VALUE` creation options
    pub creation_options: Vec<String>,
    /// 1-based bands to keep; all bands when `None`
    pub bands: Option<Vec<usize>>,
}

impl TranslateOptions {
    /// Tiled, LZW-compressed GeoTIFF.
    pub fn tiled_lzw() -> Self {
        Self {
            format: Some("GTiff".to_string()),
            creation_options: vec!["TILED=YES".to_string(), "COMPRESS=LZW".to_string()],
            bands: None,
        }
    }

    /// Cloud-Optimized GeoTIFF, DEFLATE compressed, overviews averaged.
    pub fn cog() -> Self {
        Self {
            format: Some("COG".to_string()),
            creation_options: vec![
                "COMPRESS=DEFLATE".to_string(),
                "RESAMPLING=AVERAGE".to_string(),
            ],
            bands: None,
        }
    }

    /// One band of the source as a plain GeoTIFF.
    pub fn single_band(band: usize) -> Self {
        Self {
            format: Some("GTiff".to_string()),
            creation_options: Vec::new(),
            bands: Some(vec![band]),
        }
    }
}

/// Raster operations the pipeline stages need.
///
/// Paths are always files on disk; stages pass the output of one call as
/// the input of the next.
pub trait RasterBackend {
    /// Warp `src` into `dst` (overwriting it).
    fn warp(&self, src: &Path, dst: &Path, params: &WarpParams) -> RasterResult<()>;

    /// Number of bands in a raster.
    fn band_count(&self, path: &Path) -> RasterResult<usize>;

    /// Stack the bands of all `inputs`, in order, into the virtual raster `vrt`.
    fn build_band_stack(&self, inputs: &[PathBuf], vrt: &Path) -> RasterResult<()>;

    /// Translate `src` into `dst` (overwriting it).
    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> RasterResult<()>;

    /// Set the description of bands `1..=descriptions.len()` and flush.
    fn set_band_descriptions(&self, path: &Path, descriptions: &[String]) -> RasterResult<()>;

    /// Descriptions of all bands, in band order.
    fn band_descriptions(&self, path: &Path) -> RasterResult<Vec<String>>;
}

impl<B: RasterBackend + ?Sized> RasterBackend for &B {
    fn warp(&self, src: &Path, dst: &Path, params: &WarpParams) -> RasterResult<()> {
        (**self).warp(src, dst, params)
    }

    fn band_count(&self, path: &Path) -> RasterResult<usize> {
        (**self).band_count(path)
    }

    fn build_band_stack(&self, inputs: &[PathBuf], vrt: &Path) -> RasterResult<()> {
        (**self).build_band_stack(inputs, vrt)
    }

    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> RasterResult<()> {
        (**self).translate(src, dst, options)
    }

    fn set_band_descriptions(&self, path: &Path, descriptions: &[String]) -> RasterResult<()> {
        (**self).set_band_descriptions(path, descriptions)
    }

    fn band_descriptions(&self, path: &Path) -> RasterResult<Vec<String>> {
        (**self).band_descriptions(path)
    }
}
