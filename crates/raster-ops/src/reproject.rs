//! Rotated-pole NetCDF to geographic GeoTIFF.

use std::fs;
use std::path::Path;

use cordex_common::naming::{is_netcdf, reprojected_name, TAS_VARIABLE};
use cordex_common::{list_matching, ManifestRecord, Stage};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::backend::{OutputType, RasterBackend, ResampleAlg};
use crate::error::{RasterError, RasterResult};
use crate::rotated_pole::RotatedPole;

/// Target grid: WGS 84 geographic coordinates.
pub const DEFAULT_DST_SRS: &str = "EPSG:4326";

/// Native EUR-11 spacing in degrees.
pub const DEFAULT_RESOLUTION: f64 = 0.11;

/// Parameters of one warp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpParams {
    pub src_srs: String,
    pub dst_srs: String,
    pub x_res: f64,
    pub y_res: f64,
    pub resample: ResampleAlg,
    pub output_type: OutputType,
    /// Output driver
    pub format: String,
    /// Variable read from NetCDF sources
    pub subdataset: Option<String>,
}

impl WarpParams {
    /// Rotated pole to EPSG:4326 at 0.11°, nearest neighbour, Float32 GeoTIFF.
    pub fn eur11(pole: RotatedPole) -> Self {
        Self {
            src_srs: pole.to_proj4(),
            dst_srs: DEFAULT_DST_SRS.to_string(),
            x_res: DEFAULT_RESOLUTION,
            y_res: DEFAULT_RESOLUTION,
            resample: ResampleAlg::Nearest,
            output_type: OutputType::Float32,
            format: "GTiff".to_string(),
            subdataset: Some(TAS_VARIABLE.to_string()),
        }
    }

    pub fn validate(&self) -> RasterResult<()> {
        if !(self.x_res > 0.0 && self.y_res > 0.0) {
            return Err(RasterError::InvalidParams(format!(
                "resolution must be positive, got {} x {}",
                self.x_res, self.y_res
            )));
        }
        if self.src_srs.trim().is_empty() || self.dst_srs.trim().is_empty() {
            return Err(RasterError::InvalidParams(
                "source and target SRS are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WarpParams {
    fn default() -> Self {
        Self::eur11(RotatedPole::default())
    }
}

/// Warp every `.nc` file in `src_dir` to `dst_dir/<stem>.tif`.
///
/// A file that fails to warp is logged and recorded as failed; the
/// remaining files are still processed. Only a missing or unreadable
/// `src_dir` fails the stage.
pub fn reproject_netcdf(
    backend: &dyn RasterBackend,
    src_dir: &Path,
    dst_dir: &Path,
    params: &WarpParams,
) -> RasterResult<Vec<ManifestRecord>> {
    params.validate()?;
    let files = list_matching(src_dir, is_netcdf)?;
    fs::create_dir_all(dst_dir).map_err(|e| RasterError::io(dst_dir, e))?;

    info!(
        count = files.len(),
        src = %src_dir.display(),
        dst_srs = %params.dst_srs,
        "Reprojecting NetCDF files"
    );

    let mut records = Vec::with_capacity(files.len());
    for name in files {
        let src = src_dir.join(&name);
        let dst = dst_dir.join(reprojected_name(&name));

        match backend.warp(&src, &dst, params) {
            Ok(()) => {
                info!(file = %name, output = %dst.display(), "Reprojected");
                records.push(ManifestRecord::completed(Stage::Reproject, src, dst));
            }
            Err(e) => {
                error!(file = %name, error = %e, "Reprojection failed");
                records.push(ManifestRecord::failed(Stage::Reproject, src, e));
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;

    #[test]
    fn test_default_params() {
        let params = WarpParams::default();
        assert_eq!(params.dst_srs, "EPSG:4326");
        assert_eq!(params.x_res, 0.11);
        assert_eq!(params.resample, ResampleAlg::Nearest);
        assert_eq!(params.subdataset.as_deref(), Some("tas"));
        assert!(params.src_srs.starts_with("+proj=ob_tran"));
    }

    #[test]
    fn test_invalid_resolution() {
        let mut params = WarpParams::default();
        params.x_res = 0.0;
        assert!(matches!(params.validate(), Err(RasterError::InvalidParams(_))));
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for name in ["tas_200612-201011_Cels.nc", "tas_201012-202011_Cels.nc", "tas_202012-203011_Cels.nc"] {
            fs::write(src.path().join(name), b"nc").unwrap();
        }
        fs::write(src.path().join("notes.txt"), b"ignored").unwrap();

        let backend = FakeBackend::new(4).failing_on("201012");
        let records =
            reproject_netcdf(&backend, src.path(), dst.path(), &WarpParams::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert!(!records[0].is_failed());
        assert!(records[1].is_failed());
        assert!(!records[2].is_failed());
        assert!(dst.path().join("tas_200612-201011_Cels.tif").exists());
        assert!(!dst.path().join("tas_201012-202011_Cels.tif").exists());
        assert!(dst.path().join("tas_202012-203011_Cels.tif").exists());
    }

    #[test]
    fn test_missing_output_dir_is_created() {
        let src = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("reprojected").join("eur11");
        fs::write(src.path().join("tas_202012-203011_Cels.nc"), b"nc").unwrap();

        let backend = FakeBackend::new(4);
        let records =
            reproject_netcdf(&backend, src.path(), &dst, &WarpParams::default()).unwrap();

        assert_eq!(records.len(), 1);
        assert!(!records[0].is_failed());
        assert!(dst.join("tas_202012-203011_Cels.tif").exists());
    }

    #[test]
    fn test_missing_source_dir_is_error() {
        let dst = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(4);
        let result = reproject_netcdf(
            &backend,
            &dst.path().join("missing"),
            dst.path(),
            &WarpParams::default(),
        );
        assert!(matches!(result, Err(RasterError::Common(_))));
    }
}
