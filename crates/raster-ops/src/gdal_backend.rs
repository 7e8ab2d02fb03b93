//! GDAL implementation of [`RasterBackend`].
//!
//! Metadata access and VRT building go through the `gdal` bindings.
//! Warping and translation run the `gdalwarp` / `gdal_translate` utilities
//! of the same GDAL installation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use gdal::programs::raster::{build_vrt, BuildVRTOptions};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags, Metadata};
use tracing::debug;

use crate::backend::{RasterBackend, TranslateOptions};
use crate::error::{RasterError, RasterResult};
use crate::reproject::WarpParams;

/// Raster backend driven by the local GDAL installation.
#[derive(Debug, Clone)]
pub struct GdalBackend {
    gdalwarp: PathBuf,
    gdal_translate: PathBuf,
}

impl Default for GdalBackend {
    fn default() -> Self {
        Self {
            gdalwarp: PathBuf::from("gdalwarp"),
            gdal_translate: PathBuf::from("gdal_translate"),
        }
    }
}

impl GdalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use utilities from `bin_dir` instead of `PATH`.
    pub fn with_bin_dir(bin_dir: impl AsRef<Path>) -> Self {
        let bin_dir = bin_dir.as_ref();
        Self {
            gdalwarp: bin_dir.join("gdalwarp"),
            gdal_translate: bin_dir.join("gdal_translate"),
        }
    }
}

/// GDAL source name; NetCDF files are opened through their subdataset.
fn warp_source(src: &Path, subdataset: Option<&str>) -> OsString {
    match subdataset {
        Some(var) if src.extension().is_some_and(|e| e == "nc") => {
            OsString::from(format!("NETCDF:\"{}\":{}", src.display(), var))
        }
        _ => src.as_os_str().to_owned(),
    }
}

fn warp_args(src: &Path, dst: &Path, params: &WarpParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-overwrite".into(),
        "-of".into(),
        params.format.clone().into(),
        "-ot".into(),
        params.output_type.to_string().into(),
        "-s_srs".into(),
        params.src_srs.clone().into(),
        "-t_srs".into(),
        params.dst_srs.clone().into(),
        "-tr".into(),
        params.x_res.to_string().into(),
        params.y_res.to_string().into(),
        "-r".into(),
        params.resample.as_gdal().into(),
    ];
    args.push(warp_source(src, params.subdataset.as_deref()));
    args.push(dst.as_os_str().to_owned());
    args
}

fn translate_args(src: &Path, dst: &Path, options: &TranslateOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(format) = &options.format {
        args.push("-of".into());
        args.push(format.clone().into());
    }
    for co in &options.creation_options {
        args.push("-co".into());
        args.push(co.clone().into());
    }
    for band in options.bands.iter().flatten() {
        args.push("-b".into());
        args.push(band.to_string().into());
    }
    args.push(src.as_os_str().to_owned());
    args.push(dst.as_os_str().to_owned());
    args
}

fn run_tool(tool: &Path, args: &[OsString]) -> RasterResult<()> {
    let name = tool.display().to_string();
    debug!(tool = %name, args = ?args, "Running GDAL utility");

    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| RasterError::Spawn {
            tool: name.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(RasterError::Command {
            tool: name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

impl RasterBackend for GdalBackend {
    fn warp(&self, src: &Path, dst: &Path, params: &WarpParams) -> RasterResult<()> {
        run_tool(&self.gdalwarp, &warp_args(src, dst, params))
    }

    fn band_count(&self, path: &Path) -> RasterResult<usize> {
        let dataset = Dataset::open(path)?;
        Ok(dataset.raster_count())
    }

    fn build_band_stack(&self, inputs: &[PathBuf], vrt: &Path) -> RasterResult<()> {
        let datasets = inputs
            .iter()
            .map(Dataset::open)
            .collect::<Result<Vec<_>, _>>()?;
        let options = BuildVRTOptions::new(["-separate"])?;

        // The VRT is written when the returned dataset is dropped.
        let stacked = build_vrt(Some(vrt), &datasets, Some(options))?;
        drop(stacked);
        Ok(())
    }

    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> RasterResult<()> {
        run_tool(&self.gdal_translate, &translate_args(src, dst, options))
    }

    fn set_band_descriptions(&self, path: &Path, descriptions: &[String]) -> RasterResult<()> {
        let dataset = Dataset::open_ex(
            path,
            DatasetOptions {
                open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_RASTER,
                ..Default::default()
            },
        )?;

        let bands = dataset.raster_count();
        if descriptions.len() > bands {
            return Err(RasterError::BandMismatch {
                path: path.to_path_buf(),
                bands,
                descriptions: descriptions.len(),
            });
        }

        for (i, description) in descriptions.iter().enumerate() {
            let mut band = dataset.rasterband(i + 1)?;
            band.set_description(description)?;
        }

        // Close the update handle so the descriptions reach the file
        // before anything reads it again.
        drop(dataset);
        Ok(())
    }

    fn band_descriptions(&self, path: &Path) -> RasterResult<Vec<String>> {
        let dataset = Dataset::open(path)?;
        (1..=dataset.raster_count())
            .map(|i| -> RasterResult<String> { Ok(dataset.rasterband(i)?.description()?) })
            .collect()
    }
}
