//! Multi-band Cloud-Optimized GeoTIFF mosaic.

use std::fs;
use std::path::{Path, PathBuf};

use cordex_common::naming::{is_geotiff, COG_NAME, MERGED_TEMP_NAME, MERGED_VRT_NAME};
use cordex_common::{list_matching, SeasonCalendar};
use tracing::{debug, info, warn};

use crate::backend::{RasterBackend, TranslateOptions};
use crate::error::{RasterError, RasterResult};

/// Result of a mosaic run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicOutput {
    pub path: PathBuf,
    pub inputs: Vec<PathBuf>,
    /// One description per band, in band order
    pub descriptions: Vec<String>,
}

/// Stack every `.tif` in `input_dir` into `output_dir/cloud_geotiff.tif`.
///
/// Inputs are stacked in name order, one source band per output band.
/// Band `i` is described with the `i`-th interval of `calendar`; the label
/// is positional and does not look at the input's own dates.
pub fn cloud_optimized_geotiff(
    backend: &dyn RasterBackend,
    input_dir: &Path,
    output_dir: &Path,
    calendar: &SeasonCalendar,
) -> RasterResult<MosaicOutput> {
    let inputs: Vec<PathBuf> = list_matching(input_dir, is_geotiff)?
        .into_iter()
        .map(|name| input_dir.join(name))
        .collect();
    if inputs.is_empty() {
        return Err(RasterError::NoInputs(input_dir.to_path_buf()));
    }

    fs::create_dir_all(output_dir).map_err(|e| RasterError::io(output_dir, e))?;
    let vrt = output_dir.join(MERGED_VRT_NAME);
    let merged = output_dir.join(MERGED_TEMP_NAME);
    let cog = output_dir.join(COG_NAME);

    info!(inputs = inputs.len(), output = %cog.display(), "Building mosaic");

    backend.build_band_stack(&inputs, &vrt)?;
    backend.translate(&vrt, &merged, &TranslateOptions::tiled_lzw())?;

    let bands = backend.band_count(&merged)?;
    let descriptions = (0..bands)
        .map(|i| calendar.interval_label(i))
        .collect::<Result<Vec<_>, _>>()?;
    backend.set_band_descriptions(&merged, &descriptions)?;
    debug!(bands, first = ?descriptions.first(), last = ?descriptions.last(), "Labelled bands");

    backend.translate(&merged, &cog, &TranslateOptions::cog())?;

    for temp in [&merged, &vrt] {
        if let Err(e) = fs::remove_file(temp) {
            warn!(path = %temp.display(), error = %e, "Failed to remove temporary file");
        }
    }

    info!(path = %cog.display(), bands, "Cloud-Optimized GeoTIFF written");

    Ok(MosaicOutput {
        path: cog,
        inputs,
        descriptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, FakeRaster};

    fn write_inputs(dir: &Path, names: &[&str], bands: usize) {
        for name in names {
            FakeRaster::with_bands(bands).write(&dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_mosaic_labels_and_cleanup() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_inputs(
            input.path(),
            &["tas_202012-203011_Cels.tif", "tas_203012-204011_Cels.tif"],
            2,
        );

        let backend = FakeBackend::new(2);
        let result = cloud_optimized_geotiff(
            &backend,
            input.path(),
            output.path(),
            &SeasonCalendar::default(),
        )
        .unwrap();

        assert_eq!(result.path, output.path().join("cloud_geotiff.tif"));
        assert_eq!(
            result.descriptions,
            vec![
                "2020-12-01 - 2021-03-01",
                "2021-03-01 - 2021-06-01",
                "2021-06-01 - 2021-09-01",
                "2021-09-01 - 2021-12-01",
            ]
        );

        let cog = FakeRaster::read(&result.path).unwrap();
        assert_eq!(cog.format, "COG");
        assert_eq!(cog.bands, 4);
        assert_eq!(cog.descriptions, result.descriptions);
        assert!(cog.creation_options.contains(&"COMPRESS=DEFLATE".to_string()));

        assert!(!output.path().join("merged_temp.tif").exists());
        assert!(!output.path().join("merged.vrt").exists());

        let calls = backend.calls();
        assert_eq!(calls.first().map(String::as_str), Some("build_vrt merged.vrt"));
        assert!(calls.contains(&"set_descriptions merged_temp.tif".to_string()));
    }

    #[test]
    fn test_inputs_stacked_in_name_order() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_inputs(input.path(), &["tas_b.tif", "tas_a.tif", "skip.nc"], 1);

        let backend = FakeBackend::new(1);
        let result =
            cloud_optimized_geotiff(&backend, input.path(), output.path(), &SeasonCalendar::default())
                .unwrap();

        let names: Vec<_> = result
            .inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["tas_a.tif", "tas_b.tif"]);
    }

    #[test]
    fn test_no_inputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(1);

        let err = cloud_optimized_geotiff(&backend, input.path(), output.path(), &SeasonCalendar::default())
            .unwrap_err();
        assert!(matches!(err, RasterError::NoInputs(_)));
        assert!(!output.path().join("cloud_geotiff.tif").exists());
    }
}
