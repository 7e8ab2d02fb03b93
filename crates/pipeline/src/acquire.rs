//! Decade-by-decade acquisition from the Climate Data Store.

use std::path::Path;

use cds_client::{ClimateDataSource, RetrieveRequest};
use cordex_common::naming::archive_name;
use cordex_common::{ManifestRecord, Stage};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Half-open year interval `[start, end)` cut into `step`-year archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
    pub step: u32,
}

impl YearRange {
    /// `(first_year, first_year + step)` for every archive.
    pub fn intervals(&self) -> PipelineResult<Vec<(i32, i32)>> {
        if self.step == 0 {
            return Err(PipelineError::Config("year step must be > 0".to_string()));
        }
        let step = i32::try_from(self.step)
            .map_err(|_| PipelineError::Config(format!("year step {} too large", self.step)))?;
        Ok((self.start..self.end)
            .step_by(self.step as usize)
            .map(|year| (year, year + step))
            .collect())
    }
}

/// Retrieve one archive per interval of `years` into `zip_dir`.
///
/// Archives are named `cordex_tas_<start>_<end>.zip`. The first transport
/// or authorization error ends the stage; nothing is retried.
pub async fn download_cordex_data(
    source: &dyn ClimateDataSource,
    dataset: &str,
    zip_dir: &Path,
    years: YearRange,
) -> PipelineResult<Vec<ManifestRecord>> {
    let intervals = years.intervals()?;
    info!(
        archives = intervals.len(),
        start = years.start,
        end = years.end,
        dataset = %dataset,
        "Downloading CORDEX tas archives"
    );

    let mut records = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        let target = zip_dir.join(archive_name(start, end));
        let request = RetrieveRequest::cordex_tas(start, end);

        let bytes = source.retrieve(dataset, &request, &target).await?;
        info!(start, end, bytes, path = %target.display(), "Archive downloaded");

        let origin = format!("{}:{}-{}", dataset, start, end);
        records.push(ManifestRecord::completed(Stage::Acquire, origin, target));
    }

    Ok(records)
}
