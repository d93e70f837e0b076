//! Shared fixtures for the spectrometer integration tests.
//!
//! - `init_tracing`: route pipeline logs to the test writer (`RUST_LOG=debug`)
//! - `flat`: constant trace
//! - `spectrometer`: pipeline over a fixed-frame mock device

#![allow(dead_code)] // Not every test file uses every fixture

use daq_core::data::Trace;
use daq_driver_mock::MockSpectrometer;
use daq_driver_pvcam::{CameraSettings, PvcamSpectrometer, ShutterConfig};
use tracing_subscriber::EnvFilter;

/// Width of the fixture traces.
pub const PIXELS: usize = 16;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn flat(value: f64) -> Trace {
    Trace::new(vec![value; PIXELS])
}

/// Settings with the default shutter wiring and no corrections.
pub fn shutter_settings() -> CameraSettings {
    CameraSettings {
        shutter: Some(ShutterConfig::default()),
        ..CameraSettings::default()
    }
}

/// Mock returning `light` with the shutter open and `dark` with it closed.
pub fn fixed_device(light: Trace, dark: Trace) -> MockSpectrometer {
    MockSpectrometer::builder().fixed_frames(light, dark).build()
}

/// Pipeline sharing state with the returned device handle.
pub fn spectrometer(
    device: &MockSpectrometer,
    settings: CameraSettings,
) -> PvcamSpectrometer<MockSpectrometer> {
    init_tracing();
    match PvcamSpectrometer::new("PIXIS 256", device.clone(), settings) {
        Ok(s) => s,
        Err(e) => panic!("fixture settings rejected: {}", e),
    }
}
