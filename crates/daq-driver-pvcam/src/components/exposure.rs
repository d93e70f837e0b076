//! Exposure time encoding.
//!
//! PVCAM stores exposure as a 16-bit count in a selectable resolution unit.
//! Callers think in seconds; this module converts between the two.
//!
//! Durations below [`MICROSECOND_LIMIT_S`] use microsecond resolution, longer
//! ones millisecond resolution. The limit is 65535 µs, the largest duration the
//! microsecond unit can hold, so each branch stays within the 16-bit count.
//!
//! Conversion truncates: `floor(seconds * 10^k)`. The exposure actually applied
//! can therefore be up to one unit shorter than requested.

use crate::components::params::{EXP_RES_INDEX, EXP_TIME};
use anyhow::anyhow;
use daq_core::capabilities::{ParamValue, SpectroscopyDevice};
use daq_core::error::{AppResult, DaqError};
use serde::Serialize;
use tracing::debug;

/// Durations strictly below this use microsecond resolution.
pub const MICROSECOND_LIMIT_S: f64 = 0.065535;

/// Largest count the device accepts.
pub const MAX_COUNT: u16 = u16::MAX;

/// Time granularity of the exposure count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureResolution {
    /// 1 count = 1 ms
    Milliseconds,
    /// 1 count = 1 µs
    Microseconds,
}

impl ExposureResolution {
    /// Decode the device's `EXP_RES_INDEX` value.
    pub fn from_pvcam(value: i64) -> AppResult<Self> {
        match value {
            0 => Ok(ExposureResolution::Milliseconds),
            1 => Ok(ExposureResolution::Microseconds),
            other => Err(DaqError::UnknownUnit(other)),
        }
    }

    /// `EXP_RES_INDEX` code for this resolution.
    pub fn to_pvcam(self) -> i64 {
        match self {
            ExposureResolution::Milliseconds => 0,
            ExposureResolution::Microseconds => 1,
        }
    }

    /// Seconds per count.
    pub fn factor(self) -> f64 {
        match self {
            ExposureResolution::Milliseconds => 1e-3,
            ExposureResolution::Microseconds => 1e-6,
        }
    }

    fn counts_per_second(self) -> f64 {
        match self {
            ExposureResolution::Milliseconds => 1e3,
            ExposureResolution::Microseconds => 1e6,
        }
    }
}

/// Exposure as the device represents it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExposureSpec {
    /// Duration this encoding was built from (requested, or decoded when read back)
    pub duration_seconds: f64,
    /// Unit of `count`
    pub resolution: ExposureResolution,
    /// Truncated duration in `resolution` units
    pub count: u16,
}

impl ExposureSpec {
    /// Duration the device will actually expose for.
    pub fn seconds(&self) -> f64 {
        decode(self)
    }
}

/// Convert seconds into the device representation.
///
/// Fails with [`DaqError::InvalidExposure`] for negative or non-finite input and
/// for durations whose millisecond count exceeds [`MAX_COUNT`].
pub fn encode(seconds: f64) -> AppResult<ExposureSpec> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DaqError::InvalidExposure(seconds));
    }

    let resolution = if seconds < MICROSECOND_LIMIT_S {
        ExposureResolution::Microseconds
    } else {
        ExposureResolution::Milliseconds
    };

    let raw = (seconds * resolution.counts_per_second()).floor();
    if raw > f64::from(MAX_COUNT) {
        return Err(DaqError::InvalidExposure(seconds));
    }

    Ok(ExposureSpec {
        duration_seconds: seconds,
        resolution,
        count: raw as u16,
    })
}

/// Convert the device representation back to seconds.
pub fn decode(spec: &ExposureSpec) -> f64 {
    f64::from(spec.count) * spec.resolution.factor()
}

/// Encode `seconds` and write it to the device.
///
/// Returns the encoding that was applied.
pub async fn write_exposure<D>(device: &D, seconds: f64) -> AppResult<ExposureSpec>
where
    D: SpectroscopyDevice + ?Sized,
{
    let spec = encode(seconds)?;
    write_exposure_spec(device, &spec).await?;
    debug!(
        "Exposure set: requested {} s, applied {} x {:?} ({} s)",
        seconds,
        spec.count,
        spec.resolution,
        spec.seconds()
    );
    Ok(spec)
}

/// Write an encoding verbatim (resolution first, then count).
pub async fn write_exposure_spec<D>(device: &D, spec: &ExposureSpec) -> AppResult<()>
where
    D: SpectroscopyDevice + ?Sized,
{
    device
        .set_parameter(EXP_RES_INDEX, ParamValue::Int(spec.resolution.to_pvcam()))
        .await?;
    device
        .set_parameter(EXP_TIME, ParamValue::Int(i64::from(spec.count)))
        .await?;
    Ok(())
}

/// Read the exposure currently configured on the device.
///
/// Fails with [`DaqError::UnknownUnit`] if the device reports a resolution
/// outside milliseconds/microseconds.
pub async fn read_exposure_spec<D>(device: &D) -> AppResult<ExposureSpec>
where
    D: SpectroscopyDevice + ?Sized,
{
    let unit = device.get_parameter(EXP_RES_INDEX).await?;
    let unit = unit
        .as_i64()
        .ok_or_else(|| anyhow!("{} is not an integer: {}", EXP_RES_INDEX, unit))?;
    let resolution = ExposureResolution::from_pvcam(unit)?;

    let count = device.get_parameter(EXP_TIME).await?;
    let count = count
        .as_i64()
        .and_then(|c| u16::try_from(c).ok())
        .ok_or_else(|| anyhow!("{} out of range: {}", EXP_TIME, count))?;

    let mut spec = ExposureSpec {
        duration_seconds: 0.0,
        resolution,
        count,
    };
    spec.duration_seconds = decode(&spec);
    Ok(spec)
}

/// Read the current exposure in seconds.
pub async fn read_exposure<D>(device: &D) -> AppResult<f64>
where
    D: SpectroscopyDevice + ?Sized,
{
    Ok(read_exposure_spec(device).await?.seconds())
}
