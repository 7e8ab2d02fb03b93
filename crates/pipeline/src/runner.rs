//! Runs a selection of stages in pipeline order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cds_client::{CdsClient, ClimateDataSource};
use cordex_common::{Manifest, ManifestRecord, ProjectLayout, Stage};
use raster_ops::{reproject_netcdf, seasonal_tif_files, RasterBackend};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::acquire::download_cordex_data;
use crate::config::PipelineConfig;
use crate::convert::convert_kelvin_celsius;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::extract_cordex_data;

/// A stage that can be selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Download,
    Extract,
    Convert,
    Reproject,
    Seasonal,
    Export,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::Download,
        PipelineStage::Extract,
        PipelineStage::Convert,
        PipelineStage::Reproject,
        PipelineStage::Seasonal,
        PipelineStage::Export,
    ];

    /// Stages enabled by `config`, in order.
    pub fn configured(config: &PipelineConfig) -> Vec<PipelineStage> {
        Self::ALL
            .into_iter()
            .filter(|stage| match stage {
                PipelineStage::Download => config.acquisition.enabled,
                PipelineStage::Seasonal => config.seasonal.enabled,
                _ => true,
            })
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Download => "download",
            PipelineStage::Extract => "extract",
            PipelineStage::Convert => "convert",
            PipelineStage::Reproject => "reproject",
            PipelineStage::Seasonal => "seasonal",
            PipelineStage::Export => "export",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| PipelineError::Config(format!("unknown stage: {}", s)))
    }
}

/// The pipeline over one project directory.
pub struct Pipeline {
    config: PipelineConfig,
    layout: ProjectLayout,
    backend: Arc<dyn RasterBackend>,
    source: Option<Arc<dyn ClimateDataSource>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, backend: Arc<dyn RasterBackend>) -> Self {
        let layout = ProjectLayout::new(&config.project_home);
        Self {
            config,
            layout,
            backend,
            source: None,
        }
    }

    /// Use `source` for downloads instead of a CDS client built from the
    /// configuration.
    pub fn with_source(mut self, source: Arc<dyn ClimateDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Run the stages enabled in the configuration.
    pub async fn run_configured(&self) -> PipelineResult<Manifest> {
        self.run(&PipelineStage::configured(&self.config)).await
    }

    /// Run `stages` in pipeline order and write the manifest.
    ///
    /// The manifest is written even when a stage fails; the failing stage
    /// gets a failed record and its error is returned.
    pub async fn run(&self, stages: &[PipelineStage]) -> PipelineResult<Manifest> {
        let mut selected = stages.to_vec();
        selected.sort();
        selected.dedup();

        self.layout.ensure()?;
        info!(
            home = %self.layout.root().display(),
            stages = ?selected.iter().map(PipelineStage::as_str).collect::<Vec<_>>(),
            "Starting pipeline run"
        );

        let mut manifest = Manifest::new();
        for stage in selected {
            info!(stage = %stage, "Running stage");
            match self.run_stage(stage).await {
                Ok(records) => {
                    let failed = records.iter().filter(|r| r.is_failed()).count();
                    if failed > 0 {
                        warn!(stage = %stage, failed, "Stage finished with failures");
                    }
                    info!(stage = %stage, records = records.len(), "Stage finished");
                    manifest.extend(records);
                }
                Err(e) => {
                    error!(stage = %stage, error = %e, "Stage failed");
                    manifest.push(ManifestRecord::failed(
                        manifest_stage(stage),
                        self.layout.root(),
                        &e,
                    ));
                    manifest.save(&self.layout.manifest_path())?;
                    return Err(e);
                }
            }
        }

        manifest.save(&self.layout.manifest_path())?;
        Ok(manifest)
    }

    async fn run_stage(&self, stage: PipelineStage) -> PipelineResult<Vec<ManifestRecord>> {
        let layout = &self.layout;
        match stage {
            PipelineStage::Download => {
                let source = self.data_source()?;
                download_cordex_data(
                    source.as_ref(),
                    &self.config.acquisition.dataset,
                    &layout.zip_dir(),
                    self.config.acquisition.years(),
                )
                .await
            }
            PipelineStage::Extract => extract_cordex_data(
                &layout.zip_dir(),
                &layout.extract_dir(),
                self.config.extraction.delete_zip,
            ),
            PipelineStage::Convert => convert_kelvin_celsius(
                &layout.extract_dir(),
                &layout.converted_dir(),
                self.config.conversion.delete_kelvin,
            ),
            PipelineStage::Reproject => Ok(reproject_netcdf(
                self.backend.as_ref(),
                &layout.converted_dir(),
                &layout.reprojected_dir(),
                &self.config.reprojection.warp_params(),
            )?),
            PipelineStage::Seasonal => Ok(seasonal_tif_files(
                self.backend.as_ref(),
                &layout.reprojected_dir(),
                &layout.seasonal_dir(),
            )?),
            PipelineStage::Export => {
                let exporter = self
                    .config
                    .export
                    .build(Arc::clone(&self.backend), self.config.mosaic.calendar())?;
                info!(exporter = exporter.name(), "Exporting");
                let output = exporter.export(layout)?;
                Ok(vec![ManifestRecord::completed(
                    Stage::Export,
                    layout.root(),
                    output,
                )])
            }
        }
    }

    fn data_source(&self) -> PipelineResult<Arc<dyn ClimateDataSource>> {
        if let Some(source) = &self.source {
            return Ok(Arc::clone(source));
        }
        let client = CdsClient::new(self.config.acquisition.cds.to_client_config())?;
        Ok(Arc::new(client))
    }
}

fn manifest_stage(stage: PipelineStage) -> Stage {
    match stage {
        PipelineStage::Download => Stage::Acquire,
        PipelineStage::Extract => Stage::Extract,
        PipelineStage::Convert => Stage::Convert,
        PipelineStage::Reproject => Stage::Reproject,
        PipelineStage::Seasonal => Stage::Seasonal,
        PipelineStage::Export => Stage::Export,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_ops::fake::FakeBackend;

    #[test]
    fn test_configured_stages() {
        let mut config = PipelineConfig::default();
        assert_eq!(
            PipelineStage::configured(&config),
            vec![
                PipelineStage::Download,
                PipelineStage::Extract,
                PipelineStage::Convert,
                PipelineStage::Reproject,
                PipelineStage::Export,
            ]
        );

        config.acquisition.enabled = false;
        config.seasonal.enabled = true;
        let stages = PipelineStage::configured(&config);
        assert_eq!(stages.first(), Some(&PipelineStage::Extract));
        assert!(stages.contains(&PipelineStage::Seasonal));
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("reproject".parse::<PipelineStage>().unwrap(), PipelineStage::Reproject);
        assert!("warp".parse::<PipelineStage>().is_err());
    }

    #[tokio::test]
    async fn test_failed_stage_still_writes_manifest() {
        let home = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            project_home: home.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let layout = ProjectLayout::new(home.path());
        layout.ensure().unwrap();
        std::fs::write(layout.zip_dir().join("broken.zip"), b"nope").unwrap();

        let pipeline = Pipeline::new(config, Arc::new(FakeBackend::new(1)));
        let result = pipeline.run(&[PipelineStage::Extract]).await;
        assert!(matches!(result, Err(PipelineError::Archive { .. })));

        let manifest = Manifest::load(&layout.manifest_path()).unwrap();
        assert_eq!(manifest.failures().count(), 1);
        assert_eq!(manifest.records[0].stage, Stage::Extract);
    }

    #[tokio::test]
    async fn test_download_without_key_is_config_error() {
        let home = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig {
            project_home: home.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        config.acquisition.cds.key = None;

        let pipeline = Pipeline::new(config, Arc::new(FakeBackend::new(1)));
        let result = pipeline.run(&[PipelineStage::Download]).await;
        assert!(matches!(
            result,
            Err(PipelineError::Acquisition(cds_client::CdsError::InvalidConfig(_)))
        ));
    }
}
