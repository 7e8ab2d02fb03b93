//! One GeoTIFF per season.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cordex_common::naming::{is_geotiff, seasonal_name, start_year_from_name};
use cordex_common::{list_matching, ManifestRecord, SeasonCalendar, Stage};
use tracing::{info, warn};

use crate::backend::{RasterBackend, TranslateOptions};
use crate::error::{RasterError, RasterResult};

/// Split every multi-band `.tif` in `input_dir` into single-band files
/// named after the season they start, e.g. `2020_12_01.tif`.
///
/// The band count is read from the first input and applied to all of them.
/// Band `b` of a file starting in year `Y` is dated `Y-12-01` plus
/// `3 * (b - 1)` months. Files whose name carries no start year are
/// skipped. Two inputs of the same run that map to one output name fail
/// the stage with [`RasterError::OutputCollision`]; files left by earlier
/// runs are overwritten.
pub fn seasonal_tif_files(
    backend: &dyn RasterBackend,
    input_dir: &Path,
    output_dir: &Path,
) -> RasterResult<Vec<ManifestRecord>> {
    let files = list_matching(input_dir, is_geotiff)?;
    let Some(first) = files.first() else {
        info!(dir = %input_dir.display(), "No rasters to split");
        return Ok(Vec::new());
    };

    fs::create_dir_all(output_dir).map_err(|e| RasterError::io(output_dir, e))?;
    let bands = backend.band_count(&input_dir.join(first))?;
    info!(files = files.len(), bands, "Splitting rasters into seasons");

    let mut written: HashMap<String, PathBuf> = HashMap::new();
    let mut records = Vec::new();

    for name in &files {
        let src = input_dir.join(name);
        let Some(start_year) = start_year_from_name(name) else {
            warn!(file = %name, "No start year in file name, skipping");
            records.push(ManifestRecord::skipped(
                Stage::Seasonal,
                src,
                "no start year in file name",
            ));
            continue;
        };
        let calendar = SeasonCalendar::for_start_year(start_year)?;

        for band in 1..=bands {
            let output_name = seasonal_name(calendar.band_date(band - 1)?);
            if let Some(first) = written.get(&output_name) {
                return Err(RasterError::OutputCollision {
                    name: output_name,
                    first: first.clone(),
                    second: src,
                });
            }

            let dst = output_dir.join(&output_name);
            backend.translate(&src, &dst, &TranslateOptions::single_band(band))?;
            records.push(ManifestRecord::completed(Stage::Seasonal, &src, &dst));
            written.insert(output_name, src.clone());
        }

        info!(file = %name, start_year, bands, "Split into seasonal rasters");
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, FakeRaster};

    #[test]
    fn test_four_band_file_from_2020() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        FakeRaster::with_bands(4)
            .write(&input.path().join("tas_202012-203011_Cels.tif"))
            .unwrap();

        let backend = FakeBackend::new(4);
        let records = seasonal_tif_files(&backend, input.path(), output.path()).unwrap();
        assert_eq!(records.len(), 4);

        for (band, name) in ["2020_12_01.tif", "2021_03_01.tif", "2021_06_01.tif", "2021_09_01.tif"]
            .iter()
            .enumerate()
        {
            let raster = FakeRaster::read(&output.path().join(name)).unwrap();
            assert_eq!(raster.bands, 1);
            assert_eq!(raster.source_bands, vec![band + 1]);
        }
    }

    #[test]
    fn test_file_without_year_is_skipped() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        FakeRaster::with_bands(2).write(&input.path().join("tas_202012-203011.tif")).unwrap();
        FakeRaster::with_bands(2).write(&input.path().join("tas_xxxx.tif")).unwrap();

        let backend = FakeBackend::new(2);
        let records = seasonal_tif_files(&backend, input.path(), output.path()).unwrap();

        assert_eq!(records.len(), 3);
        assert!(matches!(
            records[2].status,
            cordex_common::RecordStatus::Skipped { .. }
        ));
    }

    #[test]
    fn test_collision_within_run_is_error() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        FakeRaster::with_bands(4).write(&input.path().join("tas_202012-203011.tif")).unwrap();
        FakeRaster::with_bands(4).write(&input.path().join("tas_202012-203011_Cels.tif")).unwrap();

        let backend = FakeBackend::new(4);
        let err = seasonal_tif_files(&backend, input.path(), output.path()).unwrap_err();

        match err {
            RasterError::OutputCollision { name, first, second } => {
                assert_eq!(name, "2020_12_01.tif");
                assert!(first.ends_with("tas_202012-203011.tif"));
                assert!(second.ends_with("tas_202012-203011_Cels.tif"));
            }
            other => panic!("expected collision, got {other}"),
        }
    }

    #[test]
    fn test_rerun_overwrites_previous_outputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        FakeRaster::with_bands(1).write(&input.path().join("tas_203012-204011.tif")).unwrap();
        std::fs::write(output.path().join("2030_12_01.tif"), b"stale").unwrap();

        let backend = FakeBackend::new(1);
        seasonal_tif_files(&backend, input.path(), output.path()).unwrap();
        seasonal_tif_files(&backend, input.path(), output.path()).unwrap();

        let raster = FakeRaster::read(&output.path().join("2030_12_01.tif")).unwrap();
        assert_eq!(raster.bands, 1);
    }

    #[test]
    fn test_empty_input_dir() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(1);
        assert!(seasonal_tif_files(&backend, input.path(), output.path())
            .unwrap()
            .is_empty());
    }
}
