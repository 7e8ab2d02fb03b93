//! Pipeline configuration.
//!
//! Loaded from a YAML file (see `config/pipeline.yaml`); every section is
//! optional and falls back to the defaults below. `CORDEX_HOME`,
//! `CDSAPI_URL` and `CDSAPI_KEY` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cds_client::{CdsConfig, CORDEX_DATASET};
use chrono::NaiveDate;
use cordex_common::layout::DEFAULT_PROJECT_HOME;
use cordex_common::SeasonCalendar;
use raster_ops::{ExportConfig, OutputType, ResampleAlg, RotatedPole, WarpParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::acquire::YearRange;
use crate::error::{PipelineError, PipelineResult};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding all stage directories
    pub project_home: PathBuf,
    pub acquisition: AcquisitionConfig,
    pub extraction: ExtractionConfig,
    pub conversion: ConversionConfig,
    pub reprojection: ReprojectionConfig,
    pub seasonal: SeasonalConfig,
    pub mosaic: MosaicConfig,
    pub export: ExportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_home: PathBuf::from(DEFAULT_PROJECT_HOME),
            acquisition: AcquisitionConfig::default(),
            extraction: ExtractionConfig::default(),
            conversion: ConversionConfig::default(),
            reprojection: ReprojectionConfig::default(),
            seasonal: SeasonalConfig::default(),
            mosaic: MosaicConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub enabled: bool,
    pub start_year: i32,
    /// Exclusive: the last archive starts before this year
    pub end_year: i32,
    /// Years per archive
    pub step: u32,
    pub dataset: String,
    pub cds: CdsSettings,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_year: 2020,
            end_year: 2100,
            step: 10,
            dataset: CORDEX_DATASET.to_string(),
            cds: CdsSettings::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn years(&self) -> YearRange {
        YearRange {
            start: self.start_year,
            end: self.end_year,
            step: self.step,
        }
    }
}

/// Connection settings of the CDS client. The key is best left to
/// `CDSAPI_KEY` rather than written into the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdsSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub poll_interval_secs: u64,
    pub max_poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub max_wait_secs: Option<u64>,
}

impl Default for CdsSettings {
    fn default() -> Self {
        let defaults = CdsConfig::default();
        Self {
            url: None,
            key: None,
            poll_interval_secs: defaults.poll_interval.as_secs(),
            max_poll_interval_secs: defaults.max_poll_interval.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_wait_secs: None,
        }
    }
}

impl CdsSettings {
    pub fn to_client_config(&self) -> CdsConfig {
        let mut config = CdsConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
            ..CdsConfig::default()
        };
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(key) = &self.key {
            config.key = key.clone();
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Remove each archive once it is unpacked
    pub delete_zip: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { delete_zip: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Remove the Kelvin originals after conversion
    pub delete_kelvin: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            delete_kelvin: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReprojectionConfig {
    pub rotated_pole: RotatedPole,
    pub dst_srs: String,
    /// Output pixel size in degrees (both axes)
    pub resolution: f64,
    pub resample: ResampleAlg,
    pub output_type: OutputType,
}

impl Default for ReprojectionConfig {
    fn default() -> Self {
        let params = WarpParams::default();
        Self {
            rotated_pole: RotatedPole::default(),
            dst_srs: params.dst_srs,
            resolution: params.x_res,
            resample: params.resample,
            output_type: params.output_type,
        }
    }
}

impl ReprojectionConfig {
    pub fn warp_params(&self) -> WarpParams {
        WarpParams {
            dst_srs: self.dst_srs.clone(),
            x_res: self.resolution,
            y_res: self.resolution,
            resample: self.resample,
            output_type: self.output_type,
            ..WarpParams::eur11(self.rotated_pole)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    pub enabled: bool,
}

/// Dating of the mosaic bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub base_date: NaiveDate,
    pub interval_months: u32,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        let calendar = SeasonCalendar::default();
        Self {
            base_date: calendar.base,
            interval_months: calendar.interval_months,
        }
    }
}

impl MosaicConfig {
    pub fn calendar(&self) -> SeasonCalendar {
        SeasonCalendar::new(self.base_date, self.interval_months)
    }
}

impl PipelineConfig {
    /// Load a config file, then apply environment overrides.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::from_yaml(&contents).map_err(|source| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        info!(path = %path.display(), home = %config.project_home.display(), "Loaded configuration");
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(home) = lookup("CORDEX_HOME").filter(|v| !v.is_empty()) {
            debug!(home = %home, "CORDEX_HOME overrides project_home");
            self.project_home = PathBuf::from(home);
        }
        if let Some(url) = lookup("CDSAPI_URL").filter(|v| !v.is_empty()) {
            self.acquisition.cds.url = Some(url);
        }
        if let Some(key) = lookup("CDSAPI_KEY").filter(|v| !v.is_empty()) {
            self.acquisition.cds.key = Some(key);
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.acquisition.step == 0 {
            return Err(PipelineError::Config("acquisition.step must be > 0".to_string()));
        }
        if self.mosaic.interval_months == 0 {
            return Err(PipelineError::Config(
                "mosaic.interval_months must be > 0".to_string(),
            ));
        }
        self.reprojection.warp_params().validate()?;
        Ok(())
    }
}
