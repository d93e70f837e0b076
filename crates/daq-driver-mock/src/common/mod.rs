//! Shared infrastructure for the mock spectrometer.
//!
//! - **mode**: Instant, Realistic, Chaos
//! - **timing**: exposure and readout delays
//! - **errors**: failure injection
//! - **rng**: seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{ErrorConfig, ErrorScenario, MockOperation};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
