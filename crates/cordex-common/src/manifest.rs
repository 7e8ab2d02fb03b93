//! Run manifest.
//!
//! Stages report what they did with each input as a [`ManifestRecord`].
//! The pipeline runner collects the records and writes them next to the
//! project directories, so a run can be inspected without re-listing the
//! stage directories.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CordexError, CordexResult};

/// Pipeline stage a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquire,
    Extract,
    Rename,
    Convert,
    Reproject,
    Seasonal,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Extract => "extract",
            Stage::Rename => "rename",
            Stage::Convert => "convert",
            Stage::Reproject => "reproject",
            Stage::Seasonal => "seasonal",
            Stage::Export => "export",
        }
    }
}

/// Outcome for one input of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

/// One processed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub stage: Stage,
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub status: RecordStatus,
}

impl ManifestRecord {
    pub fn completed(stage: Stage, source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            source: source.into(),
            output: Some(output.into()),
            status: RecordStatus::Completed,
        }
    }

    pub fn skipped(stage: Stage, source: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            output: None,
            status: RecordStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(stage: Stage, source: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self {
            stage,
            source: source.into(),
            output: None,
            status: RecordStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed { .. })
    }
}

/// Records of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub records: Vec<ManifestRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: ManifestRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ManifestRecord>) {
        self.records.extend(records);
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &ManifestRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.records.iter().filter(|r| r.is_failed())
    }

    pub fn load(path: &Path) -> CordexResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| CordexError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> CordexResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| CordexError::io(path, e))?;
        info!(
            path = %path.display(),
            records = self.records.len(),
            failed = self.failures().count(),
            "Wrote run manifest"
        );
        Ok(())
    }
}
