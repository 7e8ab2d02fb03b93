//! Terminal exporters.
//!
//! The last stage of a run hands the processed rasters to one exporter,
//! selected by configuration. [`CogExporter`] builds the dated COG mosaic;
//! [`RasterCatalogExporter`] delegates to an external program, such as a
//! GIS vendor's scripting environment, that loads the Celsius NetCDF
//! files into its own raster catalog.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use cordex_common::{ProjectLayout, SeasonCalendar};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::RasterBackend;
use crate::error::{RasterError, RasterResult};
use crate::mosaic::cloud_optimized_geotiff;

/// Default catalog mosaic name.
pub const DEFAULT_MOSAIC_NAME: &str = "tas_2020_2100";

/// A terminal export of the processed rasters.
pub trait Exporter {
    fn name(&self) -> &'static str;

    /// Run the export and return the path of the produced artifact.
    fn export(&self, layout: &ProjectLayout) -> RasterResult<PathBuf>;
}

/// Which exporter ends a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    #[default]
    CloudOptimizedGeotiff,
    RasterCatalog,
}

/// External catalog command.
///
/// `args` may contain the placeholders `{input_dir}`, `{output}` and
/// `{mosaic_name}`. Without any placeholder, the input directory and the
/// output path are appended as the last two arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub mosaic_name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            mosaic_name: DEFAULT_MOSAIC_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub kind: ExporterKind,
    pub catalog: CatalogConfig,
}

impl ExportConfig {
    /// Build the configured exporter.
    pub fn build(
        &self,
        backend: Arc<dyn RasterBackend>,
        calendar: SeasonCalendar,
    ) -> RasterResult<Box<dyn Exporter>> {
        match self.kind {
            ExporterKind::CloudOptimizedGeotiff => Ok(Box::new(CogExporter::new(backend, calendar))),
            ExporterKind::RasterCatalog => {
                let program = self.catalog.program.clone().ok_or_else(|| {
                    RasterError::InvalidParams(
                        "raster_catalog export needs export.catalog.program".to_string(),
                    )
                })?;
                Ok(Box::new(RasterCatalogExporter {
                    program,
                    args: self.catalog.args.clone(),
                    mosaic_name: self.catalog.mosaic_name.clone(),
                }))
            }
        }
    }
}

/// Mosaic of the reprojected rasters as `cog/cloud_geotiff.tif`.
pub struct CogExporter {
    backend: Arc<dyn RasterBackend>,
    calendar: SeasonCalendar,
}

impl CogExporter {
    pub fn new(backend: Arc<dyn RasterBackend>, calendar: SeasonCalendar) -> Self {
        Self { backend, calendar }
    }
}

impl Exporter for CogExporter {
    fn name(&self) -> &'static str {
        "cloud_optimized_geotiff"
    }

    fn export(&self, layout: &ProjectLayout) -> RasterResult<PathBuf> {
        let output = cloud_optimized_geotiff(
            self.backend.as_ref(),
            &layout.reprojected_dir(),
            &layout.cog_dir(),
            &self.calendar,
        )?;
        Ok(output.path)
    }
}

/// Export through an external catalog program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterCatalogExporter {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub mosaic_name: String,
}

impl RasterCatalogExporter {
    /// Catalog dataset written under the catalog directory.
    pub fn output_path(&self, layout: &ProjectLayout) -> PathBuf {
        layout.catalog_dir().join(format!("{}.crf", self.mosaic_name))
    }

    fn command_args(&self, input_dir: &Path, output: &Path) -> Vec<String> {
        let input = input_dir.display().to_string();
        let out = output.display().to_string();

        let has_placeholder = self
            .args
            .iter()
            .any(|a| a.contains("{input_dir}") || a.contains("{output}"));

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace("{input_dir}", &input)
                    .replace("{output}", &out)
                    .replace("{mosaic_name}", &self.mosaic_name)
            })
            .collect();
        if !has_placeholder {
            args.push(input);
            args.push(out);
        }
        args
    }
}

impl Exporter for RasterCatalogExporter {
    fn name(&self) -> &'static str {
        "raster_catalog"
    }

    fn export(&self, layout: &ProjectLayout) -> RasterResult<PathBuf> {
        let input_dir = layout.converted_dir();
        let catalog_dir = layout.catalog_dir();
        fs::create_dir_all(&catalog_dir).map_err(|e| RasterError::io(&catalog_dir, e))?;

        let output = self.output_path(layout);
        let args = self.command_args(&input_dir, &output);
        let tool = self.program.display().to_string();

        info!(program = %tool, output = %output.display(), "Running raster catalog export");
        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| RasterError::Spawn {
                tool: tool.clone(),
                source: e,
            })?;

        for line in String::from_utf8_lossy(&result.stdout).lines() {
            debug!(program = %tool, "{}", line);
        }

        if !result.status.success() {
            return Err(RasterError::Command {
                tool,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, FakeRaster};

    #[test]
    fn test_config_defaults_to_cog() {
        let config: ExportConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.kind, ExporterKind::CloudOptimizedGeotiff);
        assert_eq!(config.catalog.mosaic_name, "tas_2020_2100");
    }

    #[test]
    fn test_catalog_requires_program() {
        let config: ExportConfig = serde_yaml::from_str("kind: raster_catalog").unwrap();
        let backend: Arc<dyn RasterBackend> = Arc::new(FakeBackend::new(1));
        assert!(matches!(
            config.build(backend, SeasonCalendar::default()),
            Err(RasterError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_command_args_substitution() {
        let exporter = RasterCatalogExporter {
            program: PathBuf::from("propy"),
            args: vec![
                "export_crf.py".to_string(),
                "--input={input_dir}".to_string(),
                "--mosaic={mosaic_name}".to_string(),
                "{output}".to_string(),
            ],
            mosaic_name: "tas_2020_2100".to_string(),
        };
        let args = exporter.command_args(Path::new("/p/netcdf_Celsius"), Path::new("/p/esri_crf/tas_2020_2100.crf"));
        assert_eq!(
            args,
            vec![
                "export_crf.py",
                "--input=/p/netcdf_Celsius",
                "--mosaic=tas_2020_2100",
                "/p/esri_crf/tas_2020_2100.crf",
            ]
        );
    }

    #[test]
    fn test_command_args_appended_without_placeholders() {
        let exporter = RasterCatalogExporter {
            program: PathBuf::from("propy"),
            args: vec!["export_crf.py".to_string()],
            mosaic_name: "m".to_string(),
        };
        let args = exporter.command_args(Path::new("in"), Path::new("out.crf"));
        assert_eq!(args, vec!["export_crf.py", "in", "out.crf"]);
    }

    #[test]
    fn test_cog_exporter_reads_reprojected_dir() {
        let home = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(home.path());
        layout.ensure().unwrap();
        FakeRaster::with_bands(4)
            .write(&layout.reprojected_dir().join("tas_202012-203011_Cels.tif"))
            .unwrap();

        let backend: Arc<dyn RasterBackend> = Arc::new(FakeBackend::new(4));
        let exporter = ExportConfig::default()
            .build(backend, SeasonCalendar::default())
            .unwrap();

        assert_eq!(exporter.name(), "cloud_optimized_geotiff");
        let path = exporter.export(&layout).unwrap();
        assert_eq!(path, layout.cog_dir().join("cloud_geotiff.tif"));
        assert_eq!(FakeRaster::read(&path).unwrap().descriptions.len(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_catalog_exporter_runs_program() {
        let home = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(home.path());
        layout.ensure().unwrap();

        let exporter = RasterCatalogExporter {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "mkdir -p \"$0\" && test -d \"$1\"".to_string(), "{output}".to_string(), "{input_dir}".to_string()],
            mosaic_name: "tas_2020_2100".to_string(),
        };
        let path = exporter.export(&layout).unwrap();
        assert!(path.ends_with("esri_crf/tas_2020_2100.crf"));
        assert!(path.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_catalog_exporter_failure() {
        let home = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(home.path());
        layout.ensure().unwrap();

        let exporter = RasterCatalogExporter {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "echo boom >&2; exit 3".to_string(), "{output}".to_string()],
            mosaic_name: "m".to_string(),
        };
        match exporter.export(&layout).unwrap_err() {
            RasterError::Command { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("expected command error, got {other}"),
        }
    }
}
