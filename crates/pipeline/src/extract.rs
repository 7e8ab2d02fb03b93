//! Archive extraction and raw file renaming.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use cordex_common::naming::{canonical_raw_name, is_archive};
use cordex_common::{list_matching, DateRange, ManifestRecord, Stage};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{PipelineError, PipelineResult};

/// Unpack every archive of `zip_dir` into `extract_dir`, then shorten raw
/// CORDEX names to `tas_<start>-<end>.nc`.
///
/// Renaming replaces a file already holding the short name. Files that do
/// not carry the raw naming pattern are left alone, which makes the stage
/// safe to run again over its own output. A malformed archive fails the
/// stage.
pub fn extract_cordex_data(
    zip_dir: &Path,
    extract_dir: &Path,
    delete_zip: bool,
) -> PipelineResult<Vec<ManifestRecord>> {
    fs::create_dir_all(extract_dir).map_err(|e| PipelineError::io(extract_dir, e))?;

    let archives = list_matching(zip_dir, is_archive)?;
    info!(archives = archives.len(), dir = %zip_dir.display(), "Extracting archives");

    let mut records = Vec::new();
    for name in archives {
        let path = zip_dir.join(&name);
        let members = unpack(&path, extract_dir)?;
        info!(archive = %name, members = members.len(), "Extracted");

        if delete_zip {
            fs::remove_file(&path).map_err(|e| PipelineError::io(&path, e))?;
            debug!(archive = %name, "Deleted archive");
        }
        records.extend(
            members
                .into_iter()
                .map(|member| ManifestRecord::completed(Stage::Extract, &path, member)),
        );
    }

    records.extend(rename_raw_files(extract_dir)?);
    Ok(records)
}

/// Unpack all members of one archive; returns the written files.
fn unpack(archive_path: &Path, dest: &Path) -> PipelineResult<Vec<PathBuf>> {
    let archive_error = |source| PipelineError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(|e| PipelineError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(archive_error)?;

    let mut written = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_error)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(archive = %archive_path.display(), member = %entry.name(), "Skipping member with unsafe path");
            continue;
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| PipelineError::io(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut target = File::create(&out).map_err(|e| PipelineError::io(&out, e))?;
        io::copy(&mut entry, &mut target).map_err(|e| PipelineError::io(&out, e))?;
        written.push(out);
    }

    Ok(written)
}

/// Rename raw CORDEX files in `dir` to their short names.
fn rename_raw_files(dir: &Path) -> PipelineResult<Vec<ManifestRecord>> {
    let raw = list_matching(dir, |name| canonical_raw_name(name).is_some())?;

    let mut records = Vec::with_capacity(raw.len());
    for name in raw {
        let Some(short) = canonical_raw_name(&name) else {
            continue;
        };
        let src = dir.join(&name);
        let dst = dir.join(&short);

        if dst.exists() {
            fs::remove_file(&dst).map_err(|e| PipelineError::io(&dst, e))?;
        }
        fs::rename(&src, &dst).map_err(|e| PipelineError::io(&src, e))?;
        let coverage = DateRange::from_filename(&short)
            .map(|range| range.to_string())
            .unwrap_or_default();
        info!(from = %name, to = %short, coverage = %coverage, "Renamed");
        records.push(ManifestRecord::completed(Stage::Rename, src, dst));
    }

    Ok(records)
}
