//! Operational modes for the mock spectrometer.
//!
//! - **Instant**: no delays, deterministic; for unit tests
//! - **Realistic**: sleeps for the programmed exposure plus readout
//! - **Chaos**: realistic timing plus random acquisition failures

use std::str::FromStr;

/// Operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Zero delays
    #[default]
    Instant,
    /// Hardware-like timing
    Realistic,
    /// Hardware-like timing with injected failures
    Chaos,
}

impl MockMode {
    /// Whether acquisitions should take wall-clock time.
    pub fn simulates_timing(self) -> bool {
        !matches!(self, MockMode::Instant)
    }
}

impl FromStr for MockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instant" => Ok(MockMode::Instant),
            "realistic" => Ok(MockMode::Realistic),
            "chaos" => Ok(MockMode::Chaos),
            other => Err(format!("unknown mock mode '{}'", other)),
        }
    }
}
