//! End-to-end runs over a scratch project directory.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cds_client::{CdsResult, ClimateDataSource, RetrieveRequest};
use cordex_common::{ProjectLayout, Stage};
use cordex_pipeline::{Pipeline, PipelineConfig, PipelineStage};
use raster_ops::fake::{FakeBackend, FakeRaster};
use raster_ops::{GdalBackend, RasterBackend};
use test_utils::{
    assert_approx_eq, file_names, raw_cordex_name, require_command, write_tas_netcdf, zip_files,
    TasSpec, SCENARIO_DECADE,
};

/// Write one archive holding one raw `tas` file for `range` into `zip_path`.
fn write_raw_archive(zip_path: &Path, range: &str, spec: &TasSpec) {
    let scratch = tempfile::tempdir().unwrap();
    let raw = scratch.path().join(raw_cordex_name(range));
    write_tas_netcdf(&raw, spec).unwrap();
    zip_files(zip_path, &[raw.as_path()]).unwrap();
}

fn config_for(home: &Path) -> PipelineConfig {
    let mut config = PipelineConfig {
        project_home: home.to_path_buf(),
        ..PipelineConfig::default()
    };
    config.acquisition.enabled = false;
    config
}

/// Serves archives built from a fixed Kelvin field, named by decade.
struct ArchiveSource {
    spec: TasSpec,
}

#[async_trait]
impl ClimateDataSource for ArchiveSource {
    async fn retrieve(
        &self,
        _dataset: &str,
        request: &RetrieveRequest,
        target: &Path,
    ) -> CdsResult<u64> {
        let start: i32 = request.start_year.parse().unwrap();
        let end: i32 = request.end_year.parse().unwrap();
        let range = format!("{}12-{}11", start, end);
        write_raw_archive(target, &range, &self.spec);
        Ok(std::fs::metadata(target).unwrap().len())
    }
}

#[tokio::test]
async fn test_extract_convert_reproject_with_fake_backend() {
    let home = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(home.path());
    layout.ensure().unwrap();

    let spec = TasSpec::kelvin(4, 3, 3);
    write_raw_archive(&layout.zip_dir().join("cordex_tas_2010_2020.zip"), SCENARIO_DECADE, &spec);

    let pipeline = Pipeline::new(config_for(home.path()), Arc::new(FakeBackend::new(4)));
    let manifest = pipeline
        .run(&[PipelineStage::Extract, PipelineStage::Convert, PipelineStage::Reproject])
        .await
        .unwrap();

    assert_eq!(file_names(&layout.reprojected_dir()), vec!["tas_201012-202011_Cels.tif"]);
    assert!(file_names(&layout.zip_dir()).is_empty());
    assert!(file_names(&layout.extract_dir()).is_empty());

    let field = netcdf_units::read_tas(&layout.converted_dir().join("tas_201012-202011_Cels.nc")).unwrap();
    assert_eq!(field.units.as_deref(), Some("Celsius"));
    for (celsius, kelvin) in field.values.iter().zip(&spec.values) {
        assert_approx_eq!(*kelvin as f64 - *celsius, 273.15, 1e-3);
    }

    assert_eq!(manifest.for_stage(Stage::Rename).count(), 1);
    assert_eq!(manifest.for_stage(Stage::Reproject).count(), 1);
    assert_eq!(manifest.failures().count(), 0);
    assert!(layout.manifest_path().exists());
}

#[tokio::test]
async fn test_full_configured_run() {
    let home = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig {
        project_home: home.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    config.acquisition.start_year = 2020;
    config.acquisition.end_year = 2040;
    config.seasonal.enabled = true;

    let source = Arc::new(ArchiveSource {
        spec: TasSpec::kelvin(4, 2, 2),
    });
    let pipeline = Pipeline::new(config, Arc::new(FakeBackend::new(4))).with_source(source);
    let manifest = pipeline.run_configured().await.unwrap();
    let layout = pipeline.layout();

    assert_eq!(
        file_names(&layout.reprojected_dir()),
        vec!["tas_202012-203011_Cels.tif", "tas_203012-204011_Cels.tif"]
    );
    assert_eq!(file_names(&layout.seasonal_dir()).len(), 8);
    assert!(layout.seasonal_dir().join("2030_12_01.tif").exists());

    let cog = FakeRaster::read(&layout.cog_dir().join("cloud_geotiff.tif")).unwrap();
    assert_eq!(cog.bands, 8);
    assert_eq!(cog.descriptions[0], "2020-12-01 - 2021-03-01");
    assert_eq!(cog.descriptions[7], "2022-09-01 - 2022-12-01");

    assert_eq!(manifest.for_stage(Stage::Acquire).count(), 2);
    assert_eq!(manifest.for_stage(Stage::Export).count(), 1);
}

#[tokio::test]
async fn test_reprojection_failure_does_not_abort_run() {
    let home = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(home.path());
    layout.ensure().unwrap();
    let spec = TasSpec::kelvin(4, 2, 2);
    write_raw_archive(&layout.zip_dir().join("a.zip"), "202012-203011", &spec);
    write_raw_archive(&layout.zip_dir().join("b.zip"), "203012-204011", &spec);

    let backend = FakeBackend::new(4).failing_on("202012-203011");
    let pipeline = Pipeline::new(config_for(home.path()), Arc::new(backend));
    let manifest = pipeline
        .run(&[
            PipelineStage::Extract,
            PipelineStage::Convert,
            PipelineStage::Reproject,
            PipelineStage::Export,
        ])
        .await
        .unwrap();

    assert_eq!(manifest.failures().count(), 1);
    assert_eq!(file_names(&layout.reprojected_dir()), vec!["tas_203012-204011_Cels.tif"]);
    let cog = FakeRaster::read(&layout.cog_dir().join("cloud_geotiff.tif")).unwrap();
    assert_eq!(cog.bands, 4);
}

#[tokio::test]
async fn test_end_to_end_with_gdal() {
    require_command!("gdalwarp", "gdal_translate");

    let home = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(home.path());
    layout.ensure().unwrap();
    let spec = TasSpec::kelvin(4, 6, 8);
    write_raw_archive(&layout.zip_dir().join("cordex_tas_2010_2020.zip"), SCENARIO_DECADE, &spec);

    let backend = Arc::new(GdalBackend::new());
    let pipeline = Pipeline::new(config_for(home.path()), backend.clone());
    pipeline
        .run(&[
            PipelineStage::Extract,
            PipelineStage::Convert,
            PipelineStage::Reproject,
            PipelineStage::Export,
        ])
        .await
        .unwrap();

    let tif = layout.reprojected_dir().join("tas_201012-202011_Cels.tif");
    assert_eq!(file_names(&layout.reprojected_dir()).len(), 1);
    assert_eq!(backend.band_count(&tif).unwrap(), 4);

    let descriptions = backend
        .band_descriptions(&layout.cog_dir().join("cloud_geotiff.tif"))
        .unwrap();
    assert_eq!(descriptions[1], "2021-03-01 - 2021-06-01");
}
