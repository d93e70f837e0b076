//! Photometrics PVCAM Spectroscopy Pipeline (Componentized)
//!
//! Drives a PVCAM camera in 1-D (vertically binned) readout and turns raw
//! frames into a corrected spectrum.
//!
//! Component architecture:
//! - Exposure: seconds <-> 16-bit device count with selectable resolution
//! - Shutter: logical open/closed states applied through settle exposures
//! - Spikes: spatial and sequential cosmic-peak removal
//!
//! [`PvcamSpectrometer`] ties the components together. The hardware itself is
//! reached through [`daq_core::capabilities::SpectroscopyDevice`], so the same
//! pipeline runs against the SDK adapter or the mock device.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = CameraConfig::load(Path::new("config.yaml"))?;
//! let spectrometer = PvcamSpectrometer::open(device, &config).await?;
//! let measurement = spectrometer.measure(Some(10.0), true).await?;
//! ```

pub mod components;
pub mod config;
pub mod measurement;

pub use crate::components::exposure::{ExposureResolution, ExposureSpec};
pub use crate::components::shutter::{ShutterOpenMode, ShutterSequencer, ShutterState};
pub use crate::config::{
    CameraConfig, CameraSettings, CorrectionConfig, SequentialConfig, ShutterConfig,
};
pub use crate::measurement::{Measurement, PvcamSpectrometer};
