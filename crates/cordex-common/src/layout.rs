//! Fixed directory layout of a project.
//!
//! One project root holds a subdirectory per processing step. Directory
//! contents are the hand-over between stages.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CordexError, CordexResult};

/// Default project root, relative to the working directory.
pub const DEFAULT_PROJECT_HOME: &str = "./cordex";

/// Downloaded zip archives, one per decade.
pub const ZIP_DIR: &str = "netcdf_zip";
/// Extracted raw NetCDF files (Kelvin).
pub const EXTRACT_DIR: &str = "netcdf";
/// NetCDF copies converted to Celsius.
pub const CONVERTED_DIR: &str = "netcdf_Celsius";
/// Warped GeoTIFFs in EPSG:4326.
pub const REPROJECTED_DIR: &str = "reprojected_tif";
/// Single-band seasonal GeoTIFFs.
pub const SEASONAL_DIR: &str = "320_seasonal_tifs";
/// Cloud-optimized output.
pub const COG_DIR: &str = "cog";
/// Output of the external raster-catalog exporter.
pub const CATALOG_DIR: &str = "esri_crf";
/// Run manifest written after each run.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Directory tree of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_HOME)
    }
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn zip_dir(&self) -> PathBuf {
        self.root.join(ZIP_DIR)
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.root.join(EXTRACT_DIR)
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.root.join(CONVERTED_DIR)
    }

    pub fn reprojected_dir(&self) -> PathBuf {
        self.root.join(REPROJECTED_DIR)
    }

    pub fn seasonal_dir(&self) -> PathBuf {
        self.root.join(SEASONAL_DIR)
    }

    pub fn cog_dir(&self) -> PathBuf {
        self.root.join(COG_DIR)
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.root.join(CATALOG_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// All stage directories, in pipeline order.
    pub fn stage_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.zip_dir(),
            self.extract_dir(),
            self.converted_dir(),
            self.reprojected_dir(),
            self.seasonal_dir(),
            self.cog_dir(),
            self.catalog_dir(),
        ]
    }

    /// Create every stage directory that does not exist yet.
    pub fn ensure(&self) -> CordexResult<()> {
        for dir in self.stage_dirs() {
            fs::create_dir_all(&dir).map_err(|e| CordexError::io(&dir, e))?;
            debug!(path = %dir.display(), "Ensured stage directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_dirs_live_under_root() {
        let layout = ProjectLayout::new("/data/cordex");
        assert_eq!(layout.zip_dir(), PathBuf::from("/data/cordex/netcdf_zip"));
        assert_eq!(
            layout.seasonal_dir(),
            PathBuf::from("/data/cordex/320_seasonal_tifs")
        );
        assert!(layout.stage_dirs().iter().all(|d| d.starts_with("/data/cordex")));
    }

    #[test]
    fn test_ensure_creates_missing_dirs_and_is_repeatable() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path().join("project"));

        layout.ensure().unwrap();
        layout.ensure().unwrap();

        for dir in layout.stage_dirs() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
    }
}
