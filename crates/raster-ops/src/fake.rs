//! In-process raster backend for tests.
//!
//! Rasters are small JSON documents recording band count, descriptions and
//! how they were produced, so stage logic can be tested without GDAL.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::backend::{RasterBackend, TranslateOptions};
use crate::error::{RasterError, RasterResult};
use crate::reproject::WarpParams;

/// Contents of a fake raster file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeRaster {
    pub bands: usize,
    pub descriptions: Vec<String>,
    pub format: String,
    pub creation_options: Vec<String>,
    /// Files this raster was made from
    pub sources: Vec<PathBuf>,
    /// Original band numbers (1-based) when built from a band subset
    pub source_bands: Vec<usize>,
    pub dst_srs: Option<String>,
}

impl FakeRaster {
    pub fn with_bands(bands: usize) -> Self {
        Self {
            bands,
            format: "GTiff".to_string(),
            ..Default::default()
        }
    }

    pub fn read(path: &Path) -> RasterResult<Self> {
        let bytes = fs::read(path).map_err(|e| RasterError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| RasterError::Command {
            tool: "fake".to_string(),
            status: "unreadable".to_string(),
            stderr: format!("{} is not a raster: {}", path.display(), e),
        })
    }

    pub fn write(&self, path: &Path) -> RasterResult<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| RasterError::InvalidParams(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| RasterError::io(path, e))
    }
}

/// Backend whose warps produce fake rasters with a fixed band count.
#[derive(Debug, Default)]
pub struct FakeBackend {
    bands_per_warp: usize,
    fail_markers: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(bands_per_warp: usize) -> Self {
        Self {
            bands_per_warp,
            ..Default::default()
        }
    }

    /// Fail any operation whose source path contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Operations performed so far, as `"<op> <file name>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, op: &str, path: &Path) -> RasterResult<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{} {}", op, name));
        }

        let display = path.display().to_string();
        if self.fail_markers.iter().any(|m| display.contains(m.as_str())) {
            return Err(RasterError::Command {
                tool: op.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("simulated failure for {}", display),
            });
        }
        Ok(())
    }
}

impl RasterBackend for FakeBackend {
    fn warp(&self, src: &Path, dst: &Path, params: &WarpParams) -> RasterResult<()> {
        self.record("warp", src)?;
        if !src.exists() {
            return Err(RasterError::io(
                src,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source missing"),
            ));
        }
        let raster = FakeRaster {
            format: params.format.clone(),
            sources: vec![src.to_path_buf()],
            dst_srs: Some(params.dst_srs.clone()),
            ..FakeRaster::with_bands(self.bands_per_warp)
        };
        raster.write(dst)
    }

    fn band_count(&self, path: &Path) -> RasterResult<usize> {
        self.record("band_count", path)?;
        Ok(FakeRaster::read(path)?.bands)
    }

    fn build_band_stack(&self, inputs: &[PathBuf], vrt: &Path) -> RasterResult<()> {
        self.record("build_vrt", vrt)?;
        let mut stack = FakeRaster {
            format: "VRT".to_string(),
            ..Default::default()
        };
        for input in inputs {
            self.record("stack", input)?;
            let raster = FakeRaster::read(input)?;
            stack.bands += raster.bands;
            stack.sources.push(input.clone());
        }
        stack.write(vrt)
    }

    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> RasterResult<()> {
        self.record("translate", src)?;
        let source = FakeRaster::read(src)?;

        let (bands, source_bands, descriptions) = match &options.bands {
            Some(selected) => {
                if let Some(bad) = selected.iter().find(|b| **b == 0 || **b > source.bands) {
                    return Err(RasterError::InvalidParams(format!(
                        "band {} out of range for {} ({} bands)",
                        bad,
                        src.display(),
                        source.bands
                    )));
                }
                let descriptions = selected
                    .iter()
                    .filter_map(|b| source.descriptions.get(b - 1).cloned())
                    .collect();
                (selected.len(), selected.clone(), descriptions)
            }
            None => (source.bands, Vec::new(), source.descriptions.clone()),
        };

        let raster = FakeRaster {
            bands,
            descriptions,
            format: options.format.clone().unwrap_or_else(|| "GTiff".to_string()),
            creation_options: options.creation_options.clone(),
            sources: vec![src.to_path_buf()],
            source_bands,
            dst_srs: source.dst_srs,
        };
        raster.write(dst)
    }

    fn set_band_descriptions(&self, path: &Path, descriptions: &[String]) -> RasterResult<()> {
        self.record("set_descriptions", path)?;
        let mut raster = FakeRaster::read(path)?;
        if descriptions.len() > raster.bands {
            return Err(RasterError::BandMismatch {
                path: path.to_path_buf(),
                bands: raster.bands,
                descriptions: descriptions.len(),
            });
        }
        raster.descriptions = descriptions.to_vec();
        raster.write(path)
    }

    fn band_descriptions(&self, path: &Path) -> RasterResult<Vec<String>> {
        let raster = FakeRaster::read(path)?;
        let mut descriptions = raster.descriptions;
        descriptions.resize(raster.bands, String::new());
        Ok(descriptions)
    }
}
