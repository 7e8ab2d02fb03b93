//! Celsius copies of the extracted NetCDF files.

use std::fs;
use std::path::Path;

use cordex_common::naming::{celsius_name, is_netcdf};
use cordex_common::{list_matching, ManifestRecord, Stage};
use netcdf_units::{convert_kelvin_to_celsius, ConversionOutcome};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Copy every `.nc` of `src_dir` to `dst_dir/<stem>_Cels.nc`, then convert
/// `tas` from Kelvin to Celsius in every `.nc` of `dst_dir`.
///
/// Copies are byte-for-byte; files without `tas` stay that way. Files in
/// `dst_dir` that already carry Celsius units are not converted again.
/// With `delete_kelvin` the source files are removed once, after all
/// conversions succeeded.
pub fn convert_kelvin_celsius(
    src_dir: &Path,
    dst_dir: &Path,
    delete_kelvin: bool,
) -> PipelineResult<Vec<ManifestRecord>> {
    fs::create_dir_all(dst_dir).map_err(|e| PipelineError::io(dst_dir, e))?;

    let sources = list_matching(src_dir, is_netcdf)?;
    for name in &sources {
        let src = src_dir.join(name);
        let dst = dst_dir.join(celsius_name(name));
        fs::copy(&src, &dst).map_err(|e| PipelineError::io(&src, e))?;
        debug!(from = %src.display(), to = %dst.display(), "Copied");
    }

    let targets = list_matching(dst_dir, is_netcdf)?;
    info!(copied = sources.len(), converting = targets.len(), "Converting tas to Celsius");

    let mut records = Vec::with_capacity(targets.len());
    for name in targets {
        let path = dst_dir.join(&name);
        let record = match convert_kelvin_to_celsius(&path)? {
            ConversionOutcome::Converted { .. } => {
                ManifestRecord::completed(Stage::Convert, &path, &path)
            }
            ConversionOutcome::MissingVariable => {
                info!(file = %name, "No tas variable, copied without conversion");
                ManifestRecord::skipped(Stage::Convert, &path, "no tas variable")
            }
            ConversionOutcome::AlreadyCelsius => {
                debug!(file = %name, "Already in Celsius");
                ManifestRecord::skipped(Stage::Convert, &path, "already in Celsius")
            }
        };
        records.push(record);
    }

    if delete_kelvin {
        for name in &sources {
            let src = src_dir.join(name);
            fs::remove_file(&src).map_err(|e| PipelineError::io(&src, e))?;
        }
        info!(deleted = sources.len(), "Removed Kelvin originals");
    }

    Ok(records)
}
