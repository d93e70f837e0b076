//! Mock Spectrometer Driver
//!
//! Simulated PVCAM camera for exercising the spectroscopy pipeline without
//! hardware. All delays use `tokio::time::sleep`, never `std::thread::sleep`.
//!
//! # Modes
//!
//! - [`MockMode::Instant`]: no delays; the default for tests
//! - [`MockMode::Realistic`]: acquisitions take `frames * (exposure + readout)`
//! - [`MockMode::Chaos`]: realistic timing plus random readout failures
//!
//! Scripted failures for specific calls are configured with [`ErrorConfig`].
//!
//! ```rust,ignore
//! use daq_driver_mock::{MockSpectrometer, MockMode};
//!
//! let device = MockSpectrometer::builder()
//!     .mode(MockMode::Realistic)
//!     .seed(42)
//!     .build();
//! ```

pub mod common;
mod mock_spectrometer;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockOperation, MockRng, TimingConfig};
pub use mock_spectrometer::{
    MockSpectrometer, MockSpectrometerBuilder, SpectralLine, SyntheticSpectrum,
};
