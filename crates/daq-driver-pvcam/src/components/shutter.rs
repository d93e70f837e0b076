//! Shutter sequencing.
//!
//! The camera's logic output drives a mechanical shutter. PVCAM only moves the
//! shutter while an exposure cycle runs, so changing the logical state means:
//! write the drive mode, run one short throw-away exposure long enough for the
//! blades to settle, then put the caller's exposure back.
//!
//! Which drive mode means "open" depends on how the shutter is wired, so the
//! state -> mode table comes from configuration. The table must be invertible
//! for [`ShutterSequencer::get`] to answer; [`ShutterSequencer::new`] rejects
//! tables that are not.

use crate::components::exposure::{self, read_exposure_spec, write_exposure_spec};
use crate::components::params::{LOGIC_OUTPUT, OUTPUT_SHUTTER, SHTR_OPEN_MODE};
use anyhow::anyhow;
use daq_core::capabilities::{ParamValue, SpectroscopyDevice};
use daq_core::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Logical shutter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterState {
    /// Light reaches the sensor
    #[serde(alias = "opened")]
    Open,
    /// Sensor is dark
    Closed,
}

impl ShutterState {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutterState::Open => "open",
            ShutterState::Closed => "closed",
        }
    }
}

impl fmt::Display for ShutterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShutterState {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "opened" => Ok(ShutterState::Open),
            "closed" => Ok(ShutterState::Closed),
            _ => Err(DaqError::UnknownShutterState(s.to_string())),
        }
    }
}

/// PVCAM shutter open mode (`PL_SHTR_OPEN_MODES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterOpenMode {
    /// Shutter never opens
    Never,
    /// Opens before every exposure
    PreExposure,
    /// Opens once before the sequence
    PreSequence,
    /// Opens before the trigger
    PreTrigger,
    /// Left as is
    NoChange,
}

impl ShutterOpenMode {
    /// Decode a `SHTR_OPEN_MODE` value.
    pub fn from_pvcam(value: i64) -> Option<Self> {
        match value {
            0 => Some(ShutterOpenMode::Never),
            1 => Some(ShutterOpenMode::PreExposure),
            2 => Some(ShutterOpenMode::PreSequence),
            3 => Some(ShutterOpenMode::PreTrigger),
            4 => Some(ShutterOpenMode::NoChange),
            _ => None,
        }
    }

    /// `SHTR_OPEN_MODE` code.
    pub fn to_pvcam(self) -> i64 {
        match self {
            ShutterOpenMode::Never => 0,
            ShutterOpenMode::PreExposure => 1,
            ShutterOpenMode::PreSequence => 2,
            ShutterOpenMode::PreTrigger => 3,
            ShutterOpenMode::NoChange => 4,
        }
    }

    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutterOpenMode::Never => "never",
            ShutterOpenMode::PreExposure => "pre_exposure",
            ShutterOpenMode::PreSequence => "pre_sequence",
            ShutterOpenMode::PreTrigger => "pre_trigger",
            ShutterOpenMode::NoChange => "no_change",
        }
    }
}

/// Drive-mode table for a shutter wired to the logic output: closed never
/// opens, open opens once before the sequence.
pub fn default_drive_modes() -> BTreeMap<ShutterState, ShutterOpenMode> {
    BTreeMap::from([
        (ShutterState::Closed, ShutterOpenMode::Never),
        (ShutterState::Open, ShutterOpenMode::PreSequence),
    ])
}

/// Check that no two states share a drive mode.
pub fn check_invertible(modes: &BTreeMap<ShutterState, ShutterOpenMode>) -> AppResult<()> {
    let mut seen: BTreeMap<&'static str, ShutterState> = BTreeMap::new();
    for (state, mode) in modes {
        if let Some(previous) = seen.insert(mode.as_str(), *state) {
            return Err(DaqError::Configuration(format!(
                "shutter states '{}' and '{}' both map to drive mode '{}'",
                previous,
                state,
                mode.as_str()
            )));
        }
    }
    Ok(())
}

/// Applies logical shutter states to the device.
#[derive(Debug, Clone)]
pub struct ShutterSequencer {
    modes: BTreeMap<ShutterState, ShutterOpenMode>,
    settle_delay_s: f64,
}

impl ShutterSequencer {
    /// Build a sequencer from a drive-mode table and settle time.
    ///
    /// Fails with [`DaqError::Configuration`] if the table is not invertible or
    /// the settle delay cannot be encoded as an exposure.
    pub fn new(
        modes: BTreeMap<ShutterState, ShutterOpenMode>,
        settle_delay_s: f64,
    ) -> AppResult<Self> {
        check_invertible(&modes)?;
        exposure::encode(settle_delay_s).map_err(|_| {
            DaqError::Configuration(format!("invalid shutter delay: {} s", settle_delay_s))
        })?;
        Ok(Self {
            modes,
            settle_delay_s,
        })
    }

    /// Settle exposure in seconds.
    pub fn settle_delay(&self) -> f64 {
        self.settle_delay_s
    }

    /// Drive mode configured for `state`.
    pub fn drive_mode(&self, state: ShutterState) -> AppResult<ShutterOpenMode> {
        self.modes
            .get(&state)
            .copied()
            .ok_or_else(|| DaqError::UnknownShutterState(state.to_string()))
    }

    /// Logical state configured for `mode`.
    pub fn state_for(&self, mode: ShutterOpenMode) -> AppResult<ShutterState> {
        self.modes
            .iter()
            .find(|(_, m)| **m == mode)
            .map(|(s, _)| *s)
            .ok_or_else(|| DaqError::UnknownDriveMode(mode.as_str().to_string()))
    }

    /// Route the logic output to the shutter.
    pub async fn init<D>(&self, device: &D) -> AppResult<()>
    where
        D: SpectroscopyDevice + ?Sized,
    {
        device
            .set_parameter(LOGIC_OUTPUT, ParamValue::Int(OUTPUT_SHUTTER))
            .await?;
        info!("Logic output routed to shutter");
        Ok(())
    }

    /// Move the shutter to `state` and wait for it to settle.
    ///
    /// The caller's exposure setting is restored before returning, also when
    /// the transition itself fails.
    pub async fn set<D>(&self, device: &D, state: ShutterState) -> AppResult<()>
    where
        D: SpectroscopyDevice + ?Sized,
    {
        let saved = read_exposure_spec(device).await?;
        let mode = self.drive_mode(state)?;

        let settle = async {
            device
                .set_parameter(SHTR_OPEN_MODE, ParamValue::Int(mode.to_pvcam()))
                .await?;

            // The shutter only moves during an exposure cycle.
            exposure::write_exposure(device, self.settle_delay_s).await?;
            device.acquire_frames(1).await?;
            Ok::<(), DaqError>(())
        }
        .await;

        // Restore even when the transition failed; the first error wins.
        let restored = write_exposure_spec(device, &saved).await;
        if let Err(e) = settle {
            warn!("Shutter transition to {} failed: {}", state, e);
            return Err(e);
        }
        restored?;
        debug!(
            "Shutter {} (mode {}), exposure restored to {} s",
            state,
            mode.as_str(),
            saved.seconds()
        );
        Ok(())
    }

    /// Current logical state as reported by the device.
    pub async fn get<D>(&self, device: &D) -> AppResult<ShutterState>
    where
        D: SpectroscopyDevice + ?Sized,
    {
        let raw = device.get_parameter(SHTR_OPEN_MODE).await?;
        let code = raw
            .as_i64()
            .ok_or_else(|| anyhow!("{} is not an integer: {}", SHTR_OPEN_MODE, raw))?;
        let mode = ShutterOpenMode::from_pvcam(code)
            .ok_or_else(|| DaqError::UnknownDriveMode(code.to_string()))?;
        self.state_for(mode)
    }
}
