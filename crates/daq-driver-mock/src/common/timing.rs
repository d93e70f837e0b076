//! Timing model for realistic mode.

use std::time::Duration;

/// Delays applied by the mock spectrometer outside [`MockMode::Instant`].
///
/// An acquisition of `n` frames takes `n * (exposure + readout)` plus the
/// communication delay; parameter access takes the communication delay.
///
/// [`MockMode::Instant`]: super::MockMode::Instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// Readout time per binned frame in milliseconds
    pub frame_readout_ms: u64,
    /// Round trip to the camera in milliseconds
    pub communication_delay_ms: u64,
    /// Multiplier applied to the programmed exposure (1.0 = real time)
    pub exposure_scale: f64,
}

impl TimingConfig {
    /// PIXIS-like 1-D readout: a few milliseconds per binned row.
    pub fn spectrometer() -> Self {
        Self {
            frame_readout_ms: 6,
            communication_delay_ms: 1,
            exposure_scale: 1.0,
        }
    }

    /// Wall-clock time for `frames` exposures of `exposure_s` each.
    pub fn acquisition(&self, frames: usize, exposure_s: f64) -> Duration {
        let per_frame = Duration::from_secs_f64((exposure_s * self.exposure_scale).max(0.0))
            + Duration::from_millis(self.frame_readout_ms);
        per_frame * frames as u32 + self.communication()
    }

    /// Delay for a single parameter read or write.
    pub fn communication(&self) -> Duration {
        Duration::from_millis(self.communication_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_readout_ms: 0,
            communication_delay_ms: 0,
            exposure_scale: 0.0,
        }
    }
}
