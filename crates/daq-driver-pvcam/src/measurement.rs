//! Measurement orchestration.
//!
//! [`PvcamSpectrometer`] owns the device handle and runs the full measurement
//! sequence: exposure split across repeats, optional background acquisition
//! through the shutter, sequential cosmic-peak rejection on each raw batch,
//! reduction, background subtraction and finally the spatial pass on the
//! finished spectrum.
//!
//! The device sits behind a `tokio::sync::Mutex` held for the whole of each
//! operation, so a shutter transition can never interleave with the exposures
//! of a measurement.

use crate::components::exposure::{self, ExposureSpec};
use crate::components::params::{CHIP_NAME, GAIN_INDEX, SPDTAB_INDEX, TEMP, TEMP_SETPOINT};
use crate::components::shutter::{ShutterSequencer, ShutterState};
use crate::components::spikes::{self, MIN_SEQUENTIAL_FRAMES};
use crate::config::{CameraConfig, CameraSettings};
use anyhow::anyhow;
use daq_core::capabilities::{ParamValue, SpectroscopyDevice};
use daq_core::data::{FrameBatch, Metadata, Trace};
use daq_core::error::{AppResult, DaqError};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of [`PvcamSpectrometer::measure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Corrected spectrum
    pub trace: Trace,
    /// Bookkeeping from the signal acquisition
    pub metadata: Metadata,
}

/// A PVCAM camera used as a 1-D spectrometer.
pub struct PvcamSpectrometer<D> {
    chip_name: String,
    settings: CameraSettings,
    shutter: Option<ShutterSequencer>,
    device: Mutex<D>,
}

impl<D: SpectroscopyDevice> PvcamSpectrometer<D> {
    /// Wrap a device with explicit settings. No device I/O happens here.
    pub fn new(
        chip_name: impl Into<String>,
        device: D,
        settings: CameraSettings,
    ) -> AppResult<Self> {
        let shutter = settings
            .shutter
            .as_ref()
            .map(|s| s.sequencer())
            .transpose()?;
        Ok(Self {
            chip_name: chip_name.into(),
            settings,
            shutter,
            device: Mutex::new(device),
        })
    }

    /// Open a session: identify the chip, select its configuration section and
    /// apply it to the device.
    pub async fn open(device: D, config: &CameraConfig) -> AppResult<Self> {
        let raw = device.get_parameter(CHIP_NAME).await?;
        let chip_name = raw
            .as_str()
            .ok_or_else(|| anyhow!("{} is not text: {}", CHIP_NAME, raw))?
            .to_string();
        let settings = config.for_chip(&chip_name)?.clone();

        info!("Opening spectrometer session for chip '{}'", chip_name);
        let spectrometer = Self::new(chip_name, device, settings)?;
        spectrometer.apply_settings().await?;
        Ok(spectrometer)
    }

    async fn apply_settings(&self) -> AppResult<()> {
        let device = self.device.lock().await;
        let s = &self.settings;

        if let Some(celsius) = s.setpoint_temperature {
            device
                .set_parameter(TEMP_SETPOINT, ParamValue::Float(celsius))
                .await?;
        }
        if let Some(speed) = s.speed {
            device
                .set_parameter(SPDTAB_INDEX, ParamValue::Int(speed))
                .await?;
        }
        if let Some(gain) = s.gain {
            device.set_parameter(GAIN_INDEX, ParamValue::Int(gain)).await?;
        }
        if let Some(seconds) = s.exposure_time {
            exposure::write_exposure(&*device, seconds).await?;
        }
        if let Some(shutter) = &self.shutter {
            shutter.init(&*device).await?;
        }

        debug!(
            "Applied settings: setpoint={:?} speed={:?} gain={:?} exposure={:?} shutter={}",
            s.setpoint_temperature,
            s.speed,
            s.gain,
            s.exposure_time,
            self.shutter.is_some()
        );
        Ok(())
    }

    /// Chip name reported by the device, whitespace included.
    pub fn chip_name(&self) -> &str {
        &self.chip_name
    }

    /// Settings in effect for this session.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Exposures taken per measurement.
    ///
    /// The configured repeat count, raised to the sequential pass minimum when
    /// that pass is enabled.
    pub fn repeat_count(&self) -> usize {
        let repeats = self.settings.repeats.max(1);
        if self.settings.cosmic_peaks.sequential.enabled {
            repeats.max(MIN_SEQUENTIAL_FRAMES)
        } else {
            repeats
        }
    }

    /// Current per-exposure duration in seconds, read from the device.
    pub async fn exposure(&self) -> AppResult<f64> {
        let device = self.device.lock().await;
        exposure::read_exposure(&*device).await
    }

    /// Set the per-exposure duration. Returns what the device will apply.
    pub async fn set_exposure(&self, seconds: f64) -> AppResult<ExposureSpec> {
        let device = self.device.lock().await;
        exposure::write_exposure(&*device, seconds).await
    }

    /// Current shutter state.
    pub async fn shutter(&self) -> AppResult<ShutterState> {
        let sequencer = self.sequencer()?;
        let device = self.device.lock().await;
        sequencer.get(&*device).await
    }

    /// Move the shutter.
    pub async fn set_shutter(&self, state: ShutterState) -> AppResult<()> {
        let sequencer = self.sequencer()?;
        let device = self.device.lock().await;
        sequencer.set(&*device, state).await
    }

    /// Actual sensor temperature in °C.
    pub async fn temperature(&self) -> AppResult<f64> {
        let device = self.device.lock().await;
        let raw = device.get_parameter(TEMP).await?;
        Ok(raw
            .as_f64()
            .ok_or_else(|| anyhow!("{} is not numeric: {}", TEMP, raw))?)
    }

    fn sequencer(&self) -> AppResult<&ShutterSequencer> {
        self.shutter.as_ref().ok_or_else(|| {
            DaqError::Configuration(format!(
                "camera '{}' has no shutter configured",
                self.chip_name
            ))
        })
    }

    /// Take one corrected spectrum.
    ///
    /// When `exposure_seconds` is given it is the total integration time and is
    /// split evenly across [`repeat_count`](Self::repeat_count) exposures.
    /// `Some(0.0)` behaves like `None`.
    /// Background removal acquires a dark batch with the shutter closed, then
    /// the signal with it open, and subtracts the two after reduction.
    pub async fn measure(
        &self,
        exposure_seconds: Option<f64>,
        remove_background: bool,
    ) -> AppResult<Measurement> {
        let shutter = if remove_background {
            Some(self.sequencer()?)
        } else {
            None
        };

        let device = self.device.lock().await;
        let repeats = self.repeat_count();

        // Zero keeps the exposure already programmed.
        if let Some(total) = exposure_seconds.filter(|t| *t != 0.0) {
            let per_exposure = total / repeats as f64;
            exposure::write_exposure(&*device, per_exposure).await?;
            debug!(
                "Exposure {} s split into {} x {} s",
                total, repeats, per_exposure
            );
        }

        let (mut trace, metadata) = match shutter {
            Some(shutter) => {
                shutter.set(&*device, ShutterState::Closed).await?;
                let (background, _) = self.acquire(&*device, repeats).await?;

                shutter.set(&*device, ShutterState::Open).await?;
                let (signal, metadata) = self.acquire(&*device, repeats).await?;

                let trace = signal.subtract(&background)?;
                (trace, metadata)
            }
            None => self.acquire(&*device, repeats).await?,
        };

        if let Some(threshold) = self.settings.cosmic_peaks.spatial_threshold {
            spikes::correct_spatial(&mut trace, threshold);
        }

        info!(
            "Measured {} samples from {} exposure(s){}",
            trace.len(),
            repeats,
            if remove_background {
                ", background removed"
            } else {
                ""
            }
        );
        Ok(Measurement { trace, metadata })
    }

    /// Acquire `count` exposures, run the sequential pass if enabled and reduce.
    async fn acquire(&self, device: &D, count: usize) -> AppResult<(Trace, Metadata)> {
        let (mut batch, metadata) = device.acquire_frames(count).await?;
        check_batch(&batch, count)?;

        let sequential = &self.settings.cosmic_peaks.sequential;
        if sequential.enabled {
            spikes::correct_sequential(&mut batch, sequential)?;
        }
        Ok((batch.collapse(self.settings.reduction), metadata))
    }

    /// End the session and hand the device back.
    pub fn close(self) -> D {
        info!("Closing spectrometer session for chip '{}'", self.chip_name);
        self.device.into_inner()
    }
}

fn check_batch(batch: &FrameBatch, expected: usize) -> AppResult<()> {
    if batch.len() != expected {
        return Err(DaqError::Processing(format!(
            "device returned {} frame(s), {} requested",
            batch.len(),
            expected
        )));
    }
    Ok(())
}
