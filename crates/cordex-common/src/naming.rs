//! File naming conventions.
//!
//! Names encode the temporal coverage of a file and decide whether a stage
//! picks it up at all. Files that do not match are skipped silently.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CordexError, CordexResult};

/// Name of the temperature variable in the source datasets.
pub const TAS_VARIABLE: &str = "tas";

/// Fixed name of the cloud-optimized mosaic.
pub const COG_NAME: &str = "cloud_geotiff.tif";

/// Intermediate tiled/LZW mosaic, removed after the COG is written.
pub const MERGED_TEMP_NAME: &str = "merged_temp.tif";

/// Band-separated virtual stack built before the merge.
pub const MERGED_VRT_NAME: &str = "merged.vrt";

/// Suffix appended to the stem of converted files.
pub const CELSIUS_SUFFIX: &str = "_Cels";

/// Raw file name as shipped inside the CDS archives.
static RAW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^tas_EUR-11_MPI-M-MPI-ESM-LR_rcp45_r1i1p1_MPI-CSC-REMO2009_v1_sem_(\d{6}-\d{6})\.nc$",
    )
    .expect("raw file pattern is valid")
});

/// `YYYYMM-YYYYMM` coverage token.
static RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})(\d{2})-(\d{4})(\d{2})").expect("range pattern is valid"));

/// Archive name for a year interval, e.g. `cordex_tas_2020_2030.zip`.
pub fn archive_name(start_year: i32, end_year: i32) -> String {
    format!("cordex_tas_{}_{}.zip", start_year, end_year)
}

/// Short canonical name for a raw file, or `None` if it is not a raw file.
///
/// `tas_EUR-11_..._sem_201012-202011.nc` becomes `tas_201012-202011.nc`.
pub fn canonical_raw_name(filename: &str) -> Option<String> {
    RAW_PATTERN
        .captures(filename)
        .map(|caps| format!("tas_{}.nc", &caps[1]))
}

/// Name of the Celsius copy of a NetCDF file: `<stem>_Cels.nc`.
pub fn celsius_name(filename: &str) -> String {
    format!("{}{}.nc", stem(filename), CELSIUS_SUFFIX)
}

/// Name of the reprojected raster for a NetCDF file: `<stem>.tif`.
pub fn reprojected_name(filename: &str) -> String {
    format!("{}.tif", stem(filename))
}

/// Name of a seasonal raster: `YYYY_MM_DD.tif`.
pub fn seasonal_name(date: NaiveDate) -> String {
    format!("{}.tif", date.format("%Y_%m_%d"))
}

/// Start year read from the fixed offset after the `tas_` prefix.
pub fn start_year_from_name(filename: &str) -> Option<i32> {
    let year = filename.get(4..8)?;
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

pub fn is_archive(filename: &str) -> bool {
    filename.ends_with(".zip")
}

pub fn is_netcdf(filename: &str) -> bool {
    filename.ends_with(".nc")
}

pub fn is_geotiff(filename: &str) -> bool {
    filename.ends_with(".tif")
}

fn stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    }
}

/// List the regular files in `dir` whose names satisfy `predicate`.
///
/// The listing is fully materialized and sorted by name before a stage
/// iterates it. For canonical names this is chronological order.
pub fn list_matching<F>(dir: &Path, predicate: F) -> CordexResult<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let entries = fs::read_dir(dir).map_err(|e| CordexError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CordexError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map(|t| t.is_file())
            .map_err(|e| CordexError::io(entry.path(), e))?;
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if predicate(name) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Temporal coverage encoded in a file name as `YYYYMM-YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

impl DateRange {
    /// Find and parse the first coverage token in a file name.
    pub fn from_filename(filename: &str) -> CordexResult<Self> {
        let caps = RANGE_PATTERN
            .captures(filename)
            .ok_or_else(|| CordexError::InvalidName(filename.to_string()))?;

        let num = |i: usize| -> CordexResult<u32> {
            caps[i]
                .parse()
                .map_err(|_| CordexError::InvalidName(filename.to_string()))
        };

        let range = Self {
            start_year: num(1)? as i32,
            start_month: num(2)?,
            end_year: num(3)? as i32,
            end_month: num(4)?,
        };

        if !(1..=12).contains(&range.start_month) || !(1..=12).contains(&range.end_month) {
            return Err(CordexError::InvalidName(filename.to_string()));
        }
        Ok(range)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}-{:04}{:02}",
            self.start_year, self.start_month, self.end_year, self.end_month
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "tas_EUR-11_MPI-M-MPI-ESM-LR_rcp45_r1i1p1_MPI-CSC-REMO2009_v1_sem_201012-202011.nc";

    #[test]
    fn test_canonical_raw_name() {
        assert_eq!(canonical_raw_name(RAW), Some("tas_201012-202011.nc".to_string()));
    }

    #[test]
    fn test_canonical_name_rejects_other_files() {
        assert_eq!(canonical_raw_name("tas_201012-202011.nc"), None);
        assert_eq!(canonical_raw_name("README.txt"), None);
        // Different scenario
        assert_eq!(
            canonical_raw_name(
                "tas_EUR-11_MPI-M-MPI-ESM-LR_rcp85_r1i1p1_MPI-CSC-REMO2009_v1_sem_201012-202011.nc"
            ),
            None
        );
        // Trailing garbage after the extension
        assert_eq!(canonical_raw_name(&format!("{}.bak", RAW)), None);
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(archive_name(2020, 2030), "cordex_tas_2020_2030.zip");
        assert_eq!(celsius_name("tas_201012-202011.nc"), "tas_201012-202011_Cels.nc");
        assert_eq!(
            reprojected_name("tas_201012-202011_Cels.nc"),
            "tas_201012-202011_Cels.tif"
        );
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(seasonal_name(date), "2021_03_01.tif");
    }

    #[test]
    fn test_start_year_from_name() {
        assert_eq!(start_year_from_name("tas_202012-203011_Cels.tif"), Some(2020));
        assert_eq!(start_year_from_name("merged.tif"), None);
        assert_eq!(start_year_from_name("tas"), None);
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::from_filename("tas_201012-202011_Cels.nc").unwrap();
        assert_eq!(range.start_year, 2010);
        assert_eq!(range.start_month, 12);
        assert_eq!(range.end_year, 2020);
        assert_eq!(range.end_month, 11);
        assert_eq!(range.to_string(), "201012-202011");

        assert!(DateRange::from_filename("tas_201013-202011.nc").is_err());
        assert!(DateRange::from_filename("cloud_geotiff.tif").is_err());
    }

    #[test]
    fn test_list_matching_sorts_and_filters() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.nc", "a.nc", "c.txt"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("d.nc")).unwrap();

        let names = list_matching(tmp.path(), is_netcdf).unwrap();
        assert_eq!(names, vec!["a.nc", "b.nc"]);
    }
}
