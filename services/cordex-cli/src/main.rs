//! CORDEX temperature pipeline runner.
//!
//! Downloads EURO-CORDEX near-surface temperature projections, converts
//! them to Celsius, reprojects them to EPSG:4326 and exports a dated
//! Cloud-Optimized GeoTIFF (or hands them to an external raster catalog).
//! Each stage can also be run on its own.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cordex_pipeline::{Pipeline, PipelineConfig, PipelineStage};
use raster_ops::{GdalBackend, RasterBackend};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cordex-cli")]
#[command(about = "Download, convert, reproject and package CORDEX tas projections")]
struct Args {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, env = "CORDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Project directory; overrides the configuration and CORDEX_HOME
    #[arg(long)]
    home: Option<PathBuf>,

    /// Directory holding gdalwarp and gdal_translate (default: PATH)
    #[arg(long, env = "GDAL_BIN_DIR")]
    gdal_bin: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage enabled in the configuration
    Run,
    /// Download decade archives from the Climate Data Store
    Download {
        /// First year (inclusive)
        #[arg(long)]
        start_year: Option<i32>,
        /// Last year (exclusive)
        #[arg(long)]
        end_year: Option<i32>,
        /// Years per archive
        #[arg(long)]
        step: Option<u32>,
    },
    /// Unpack archives and shorten raw file names
    Extract {
        /// Keep archives after extraction
        #[arg(long)]
        keep_zip: bool,
    },
    /// Convert tas from Kelvin to Celsius
    Convert {
        /// Keep the Kelvin originals
        #[arg(long)]
        keep_kelvin: bool,
    },
    /// Reproject Celsius files to EPSG:4326
    Reproject,
    /// Split reprojected rasters into one file per season
    Seasonal,
    /// Run the configured exporter
    Export,
}

impl Command {
    fn stages(&self) -> Option<Vec<PipelineStage>> {
        let stage = match self {
            Command::Run => return None,
            Command::Download { .. } => PipelineStage::Download,
            Command::Extract { .. } => PipelineStage::Extract,
            Command::Convert { .. } => PipelineStage::Convert,
            Command::Reproject => PipelineStage::Reproject,
            Command::Seasonal => PipelineStage::Seasonal,
            Command::Export => PipelineStage::Export,
        };
        Some(vec![stage])
    }

    /// Fold command flags into the configuration.
    fn apply(&self, config: &mut PipelineConfig) {
        match self {
            Command::Download {
                start_year,
                end_year,
                step,
            } => {
                if let Some(year) = start_year {
                    config.acquisition.start_year = *year;
                }
                if let Some(year) = end_year {
                    config.acquisition.end_year = *year;
                }
                if let Some(step) = step {
                    config.acquisition.step = *step;
                }
            }
            Command::Extract { keep_zip: true } => config.extraction.delete_zip = false,
            Command::Convert { keep_kelvin: true } => config.conversion.delete_kelvin = false,
            _ => {}
        }
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    match args.log_format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).init(),
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::from_env().context("building default configuration")?,
    };

    if let Some(home) = &args.home {
        config.project_home = home.clone();
    }
    args.command.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);
    netcdf_units::silence_hdf5_errors();

    let config = load_config(&args)?;
    info!(
        home = %config.project_home.display(),
        command = ?args.command,
        "Starting CORDEX pipeline"
    );

    let backend: Arc<dyn RasterBackend> = match &args.gdal_bin {
        Some(dir) => Arc::new(GdalBackend::with_bin_dir(dir)),
        None => Arc::new(GdalBackend::new()),
    };
    let pipeline = Pipeline::new(config, backend);

    let manifest = match args.command.stages() {
        Some(stages) => pipeline.run(&stages).await?,
        None => pipeline.run_configured().await?,
    };

    let failed = manifest.failures().count();
    if failed > 0 {
        warn!(
            failed,
            manifest = %pipeline.layout().manifest_path().display(),
            "Some files could not be processed"
        );
    }
    info!(records = manifest.records.len(), failed, "Pipeline finished");

    Ok(())
}
