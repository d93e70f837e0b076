//! CLI Entry Point for spectro-daq
//!
//! Runs the PVCAM spectroscopy pipeline against the simulated spectrometer:
//! - `measure`: take a corrected spectrum, optionally background-subtracted
//! - `exposure`: show how a duration is encoded for the camera
//! - `shutter`: move the shutter and read the state back
//! - `default-config`: print a starting camera configuration
//!
//! # Usage
//!
//! ```bash
//! spectro-daq measure --config config.yaml --exposure 10 --background --format csv
//! RUST_LOG=debug spectro-daq measure --sequential --cosmic-rate 0.5
//! ```

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daq_driver_mock::{MockMode, MockSpectrometer, SyntheticSpectrum};
use daq_driver_pvcam::components::exposure;
use daq_driver_pvcam::{
    CameraConfig, CameraSettings, Measurement, PvcamSpectrometer, ShutterConfig, ShutterState,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "spectro-daq")]
#[command(about = "PVCAM spectroscopy acquisition with cosmic-peak correction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

/// Options shared by every command that opens a session.
#[derive(clap::Args)]
struct SessionArgs {
    /// Camera configuration file (YAML, keyed by chip name)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chip name the simulated camera reports
    #[arg(long, default_value = "PIXIS 256")]
    chip: String,

    /// Simulation mode (instant, realistic or chaos)
    #[arg(long, default_value = "instant")]
    mode: MockMode,

    /// Seed for noise and cosmic hits
    #[arg(long)]
    seed: Option<u64>,

    /// Probability of a cosmic-ray hit per simulated frame
    #[arg(long, default_value = "0.0")]
    cosmic_rate: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one corrected spectrum
    Measure {
        #[command(flatten)]
        session: SessionArgs,

        /// Total integration time in seconds, split across repeats
        #[arg(long)]
        exposure: Option<f64>,

        /// Subtract a dark background taken with the shutter closed
        #[arg(long)]
        background: bool,

        /// Override the spatial cosmic-peak threshold
        #[arg(long)]
        spatial_threshold: Option<f64>,

        /// Enable sequential cosmic-peak rejection
        #[arg(long)]
        sequential: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the device encoding of an exposure duration
    Exposure {
        /// Duration in seconds
        seconds: f64,
    },

    /// Move the shutter and report the state read back
    Shutter {
        #[command(flatten)]
        session: SessionArgs,

        /// Target state (open/opened/closed)
        state: String,
    },

    /// Print a configuration section for the given chip
    DefaultConfig {
        /// Chip name
        #[arg(long, default_value = "PIXIS256")]
        chip: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure {
            session,
            exposure,
            background,
            spatial_threshold,
            sequential,
            format,
            output,
        } => {
            let mut config = load_config(&session)?;
            let settings = config.for_chip_mut(&session.chip)?;
            if let Some(threshold) = spatial_threshold {
                settings.cosmic_peaks.spatial_threshold = Some(threshold);
            }
            if sequential {
                settings.cosmic_peaks.sequential.enabled = true;
            }
            config.validate()?;

            let spectrometer = PvcamSpectrometer::open(mock_device(&session), &config).await?;
            let measurement = spectrometer.measure(exposure, background).await?;
            spectrometer.close();

            let rendered = match format {
                OutputFormat::Csv => to_csv(&measurement)?,
                OutputFormat::Json => serde_json::to_string_pretty(&measurement)?,
            };
            write_output(output, &rendered)
        }
        Commands::Exposure { seconds } => {
            let spec = exposure::encode(seconds)?;
            println!(
                "{} s -> {} x {:?} = {} s",
                seconds,
                spec.count,
                spec.resolution,
                spec.seconds()
            );
            Ok(())
        }
        Commands::Shutter { session, state } => {
            let state: ShutterState = state.parse()?;
            let config = load_config(&session)?;
            let spectrometer = PvcamSpectrometer::open(mock_device(&session), &config).await?;
            spectrometer.set_shutter(state).await?;
            println!("shutter: {}", spectrometer.shutter().await?);
            Ok(())
        }
        Commands::DefaultConfig { chip } => {
            let mut config = CameraConfig::default();
            config.insert(chip, default_settings());
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn default_settings() -> CameraSettings {
    CameraSettings {
        setpoint_temperature: Some(-70.0),
        speed: Some(0),
        gain: Some(1),
        exposure_time: Some(1.0),
        shutter: Some(ShutterConfig::default()),
        ..CameraSettings::default()
    }
}

fn load_config(session: &SessionArgs) -> Result<CameraConfig> {
    match &session.config {
        Some(path) => Ok(CameraConfig::load(path)?),
        None => {
            info!("No --config given, using defaults for '{}'", session.chip);
            let mut config = CameraConfig::default();
            config.insert(session.chip.replace(char::is_whitespace, ""), default_settings());
            Ok(config)
        }
    }
}

fn mock_device(session: &SessionArgs) -> MockSpectrometer {
    let mut builder = MockSpectrometer::builder()
        .chip_name(session.chip.clone())
        .mode(session.mode)
        .synthetic(SyntheticSpectrum {
            cosmic_rate: session.cosmic_rate,
            ..SyntheticSpectrum::default()
        });
    if let Some(seed) = session.seed {
        builder = builder.seed(seed);
    }
    builder.build()
}

fn to_csv(measurement: &Measurement) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["pixel", "intensity"])?;
    for (i, v) in measurement.trace.iter().enumerate() {
        writer.write_record([i.to_string(), v.to_string()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

fn write_output(path: Option<PathBuf>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            std::io::stdout().write_all(rendered.as_bytes())?;
        }
    }
    Ok(())
}
