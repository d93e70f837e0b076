//! Mock PVCAM spectrometer.

use crate::common::{ErrorConfig, MockMode, MockOperation, MockRng, TimingConfig};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use daq_core::capabilities::{ParamValue, SpectroscopyDevice};
use daq_core::data::{FrameBatch, Metadata, Trace};
use daq_core::error::{DriverError, DriverErrorKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::sleep;

const DRIVER_TYPE: &str = "mock_spectrometer";

/// Pixels per trace (PIXIS 256 sensor width)
const DEFAULT_PIXELS: usize = 1024;

/// Parameters the mock understands, with their power-on values.
fn default_parameters(chip_name: &str) -> HashMap<String, ParamValue> {
    HashMap::from([
        ("CHIP_NAME".to_string(), ParamValue::Text(chip_name.to_string())),
        ("EXP_RES_INDEX".to_string(), ParamValue::Int(0)),
        ("EXP_TIME".to_string(), ParamValue::Int(1000)),
        ("SHTR_OPEN_MODE".to_string(), ParamValue::Int(2)),
        ("LOGIC_OUTPUT".to_string(), ParamValue::Int(0)),
        ("TEMP_SETPOINT".to_string(), ParamValue::Float(-70.0)),
        ("TEMP".to_string(), ParamValue::Float(-70.0)),
        ("SPDTAB_INDEX".to_string(), ParamValue::Int(0)),
        ("GAIN_INDEX".to_string(), ParamValue::Int(1)),
    ])
}

const READ_ONLY: [&str; 2] = ["CHIP_NAME", "TEMP"];

/// `SHTR_OPEN_MODE` code for `OPEN_NEVER`; every other mode lets light in.
const OPEN_NEVER: i64 = 0;

// =============================================================================
// Signal models
// =============================================================================

/// Gaussian emission line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralLine {
    /// Centre pixel
    pub center: f64,
    /// Standard deviation in pixels
    pub width: f64,
    /// Peak rate in counts per second
    pub amplitude: f64,
}

/// Synthetic detector response.
///
/// A frame is `bias + exposure * (dark_current + lines) + read noise`, with the
/// line term present only while the shutter lets light in. Cosmic rays land on
/// random single pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpectrum {
    /// Constant ADC offset in counts
    pub bias: f64,
    /// Thermal signal in counts per second per pixel
    pub dark_current: f64,
    /// Emission lines
    pub lines: Vec<SpectralLine>,
    /// Gaussian read noise in counts
    pub read_noise: f64,
    /// Probability per frame of one cosmic-ray hit
    pub cosmic_rate: f64,
    /// Counts added by a cosmic-ray hit
    pub cosmic_amplitude: f64,
}

impl Default for SyntheticSpectrum {
    fn default() -> Self {
        Self {
            bias: 600.0,
            dark_current: 2.0,
            lines: vec![
                SpectralLine {
                    center: 300.0,
                    width: 4.0,
                    amplitude: 4000.0,
                },
                SpectralLine {
                    center: 640.0,
                    width: 7.0,
                    amplitude: 1500.0,
                },
            ],
            read_noise: 3.0,
            cosmic_rate: 0.0,
            cosmic_amplitude: 20_000.0,
        }
    }
}

impl SyntheticSpectrum {
    fn frame(&self, pixels: usize, exposure_s: f64, light: bool, rng: &MockRng) -> Trace {
        let mut trace: Trace = (0..pixels)
            .map(|i| {
                let x = i as f64;
                let mut rate = self.dark_current;
                if light {
                    rate += self
                        .lines
                        .iter()
                        .map(|l| l.amplitude * (-0.5 * ((x - l.center) / l.width).powi(2)).exp())
                        .sum::<f64>();
                }
                self.bias + exposure_s * rate + rng.gaussian(0.0, self.read_noise)
            })
            .collect();

        if pixels > 0 && rng.should_fail(self.cosmic_rate) {
            let hit = rng.gen_range(0..pixels);
            trace[hit] += self.cosmic_amplitude;
        }
        trace
    }
}

#[derive(Debug, Clone)]
enum SignalModel {
    /// Same frame every time, chosen by shutter state
    Fixed { light: Trace, dark: Trace },
    Synthetic(SyntheticSpectrum),
}

// =============================================================================
// MockSpectrometerBuilder
// =============================================================================

/// Builder for [`MockSpectrometer`].
pub struct MockSpectrometerBuilder {
    chip_name: String,
    pixels: usize,
    mode: MockMode,
    error_config: ErrorConfig,
    timing_config: TimingConfig,
    seed: Option<u64>,
    chaos_failure_rate: f64,
    model: SignalModel,
    scripted: VecDeque<Trace>,
}

impl MockSpectrometerBuilder {
    fn new() -> Self {
        Self {
            chip_name: "PIXIS 256".to_string(),
            pixels: DEFAULT_PIXELS,
            mode: MockMode::Instant,
            error_config: ErrorConfig::none(),
            timing_config: TimingConfig::spectrometer(),
            seed: None,
            chaos_failure_rate: 0.1,
            model: SignalModel::Synthetic(SyntheticSpectrum::default()),
            scripted: VecDeque::new(),
        }
    }

    /// Chip name reported through `CHIP_NAME`.
    pub fn chip_name(mut self, name: impl Into<String>) -> Self {
        self.chip_name = name.into();
        self
    }

    /// Samples per trace for synthetic frames.
    pub fn pixels(mut self, pixels: usize) -> Self {
        self.pixels = pixels;
        self
    }

    /// Timing and failure behaviour.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Scripted or random failure injection.
    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    /// Delays used in [`MockMode::Realistic`] and [`MockMode::Chaos`].
    pub fn timing_config(mut self, config: TimingConfig) -> Self {
        self.timing_config = config;
        self
    }

    /// Seed for noise, cosmic hits and chaos failures.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Probability that an acquisition fails in [`MockMode::Chaos`].
    pub fn chaos_failure_rate(mut self, rate: f64) -> Self {
        self.chaos_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Return `light` while the shutter is open and `dark` while it is closed,
    /// independent of exposure.
    pub fn fixed_frames(mut self, light: Trace, dark: Trace) -> Self {
        self.pixels = light.len();
        self.model = SignalModel::Fixed { light, dark };
        self
    }

    /// Exposure-dependent synthetic spectrum.
    pub fn synthetic(mut self, spectrum: SyntheticSpectrum) -> Self {
        self.model = SignalModel::Synthetic(spectrum);
        self
    }

    /// Frames returned before the signal model is used, in order.
    pub fn scripted_frames(mut self, frames: impl IntoIterator<Item = Trace>) -> Self {
        self.scripted.extend(frames);
        self
    }

    /// Build the spectrometer.
    pub fn build(self) -> MockSpectrometer {
        MockSpectrometer {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    params: default_parameters(&self.chip_name),
                    writes: Vec::new(),
                    scripted: self.scripted,
                }),
                pixels: self.pixels,
                mode: self.mode,
                error_config: self.error_config,
                timing: self.timing_config,
                chaos_failure_rate: self.chaos_failure_rate,
                rng: MockRng::new(self.seed),
                model: self.model,
                acquisitions: AtomicU64::new(0),
                frames: AtomicU64::new(0),
            }),
        }
    }
}

// =============================================================================
// MockSpectrometer
// =============================================================================

#[derive(Debug)]
struct State {
    params: HashMap<String, ParamValue>,
    writes: Vec<(String, ParamValue)>,
    scripted: VecDeque<Trace>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    pixels: usize,
    mode: MockMode,
    error_config: ErrorConfig,
    timing: TimingConfig,
    chaos_failure_rate: f64,
    rng: MockRng,
    model: SignalModel,
    acquisitions: AtomicU64,
    frames: AtomicU64,
}

/// Simulated PVCAM camera in spectroscopy readout.
///
/// Holds the PVCAM parameters the measurement pipeline touches, derives the
/// exposure from `EXP_RES_INDEX`/`EXP_TIME` and the shutter state from
/// `SHTR_OPEN_MODE`, and produces frames from a fixed or synthetic signal
/// model. Clones share state.
///
/// # Example
///
/// ```rust,ignore
/// let device = MockSpectrometer::builder().seed(42).build();
/// let (batch, meta) = device.acquire_frames(5).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MockSpectrometer {
    inner: Arc<Inner>,
}

impl MockSpectrometer {
    /// Instant-mode spectrometer with the default synthetic spectrum.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a spectrometer.
    pub fn builder() -> MockSpectrometerBuilder {
        MockSpectrometerBuilder::new()
    }

    /// Current value of a parameter, without error injection or delays.
    pub async fn parameter(&self, name: &str) -> Option<ParamValue> {
        self.inner.state.lock().await.params.get(name).cloned()
    }

    /// Every successful `set_parameter` call, in order.
    pub async fn parameter_writes(&self) -> Vec<(String, ParamValue)> {
        self.inner.state.lock().await.writes.clone()
    }

    /// Number of `acquire_frames` calls that produced data.
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::SeqCst)
    }

    /// Total frames produced.
    pub fn frames_acquired(&self) -> u64 {
        self.inner.frames.load(Ordering::SeqCst)
    }

    /// Queue frames to be returned by upcoming acquisitions.
    pub async fn push_frames(&self, frames: impl IntoIterator<Item = Trace>) {
        self.inner.state.lock().await.scripted.extend(frames);
    }

    fn inject(&self, operation: MockOperation) -> Result<()> {
        self.inner
            .error_config
            .check_operation(DRIVER_TYPE, operation)
            .map_err(anyhow::Error::new)
    }

    async fn communicate(&self) {
        if self.inner.mode.simulates_timing() {
            sleep(self.inner.timing.communication()).await;
        }
    }
}

impl Default for MockSpectrometer {
    fn default() -> Self {
        Self::new()
    }
}

fn int_param(params: &HashMap<String, ParamValue>, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(ParamValue::as_i64)
        .ok_or_else(|| anyhow!("{} not set to an integer", name))
}

fn exposure_seconds(params: &HashMap<String, ParamValue>) -> Result<f64> {
    let factor = match int_param(params, "EXP_RES_INDEX")? {
        0 => 1e-3,
        1 => 1e-6,
        other => {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!("unsupported exposure resolution {}", other),
            )
            .into());
        }
    };
    Ok(int_param(params, "EXP_TIME")? as f64 * factor)
}

#[async_trait]
impl SpectroscopyDevice for MockSpectrometer {
    async fn acquire_frames(&self, count: usize) -> Result<(FrameBatch, Metadata)> {
        self.inject(MockOperation::Acquire)?;
        if count == 0 {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                "frame count must be at least 1",
            )
            .into());
        }

        let inner = &self.inner;
        let (exposure_s, light, scripted) = {
            let mut state = inner.state.lock().await;
            let exposure_s = exposure_seconds(&state.params)?;
            let light = int_param(&state.params, "SHTR_OPEN_MODE")? != OPEN_NEVER;
            let take = count.min(state.scripted.len());
            let scripted: Vec<Trace> = state.scripted.drain(..take).collect();
            (exposure_s, light, scripted)
        };

        if inner.mode.simulates_timing() {
            sleep(inner.timing.acquisition(count, exposure_s)).await;
        }
        if inner.mode == MockMode::Chaos && inner.rng.should_fail(inner.chaos_failure_rate) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Timeout,
                "readout did not complete",
            )
            .into());
        }

        let mut traces = scripted;
        while traces.len() < count {
            let frame = match &inner.model {
                SignalModel::Fixed { light: l, dark: d } => {
                    if light {
                        l.clone()
                    } else {
                        d.clone()
                    }
                }
                SignalModel::Synthetic(spectrum) => {
                    spectrum.frame(inner.pixels, exposure_s, light, &inner.rng)
                }
            };
            traces.push(frame);
        }

        let batch = FrameBatch::new(traces)?;
        inner.acquisitions.fetch_add(1, Ordering::SeqCst);
        inner.frames.fetch_add(count as u64, Ordering::SeqCst);

        tracing::debug!(
            "MockSpectrometer: {} frame(s) of {} s, shutter {}",
            count,
            exposure_s,
            if light { "open" } else { "closed" }
        );

        let metadata = Metadata::new(count)
            .with_field("driver", DRIVER_TYPE)
            .with_field("exposure_s", exposure_s)
            .with_field("shutter_open", light)
            .with_field("pixels", batch.trace_len());
        Ok((batch, metadata))
    }

    async fn get_parameter(&self, name: &str) -> Result<ParamValue> {
        self.inject(MockOperation::GetParameter)?;
        self.communicate().await;
        self.inner
            .state
            .lock()
            .await
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| {
                DriverError::new(
                    DRIVER_TYPE,
                    DriverErrorKind::InvalidParameter,
                    format!("unknown parameter {}", name),
                )
                .into()
            })
    }

    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<()> {
        self.inject(MockOperation::SetParameter)?;
        self.communicate().await;
        if READ_ONLY.contains(&name) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!("{} is read-only", name),
            )
            .into());
        }

        let mut state = self.inner.state.lock().await;
        let Some(slot) = state.params.get_mut(name) else {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!("unknown parameter {}", name),
            )
            .into());
        };
        *slot = value.clone();
        if name == "TEMP_SETPOINT" {
            // Instantly at setpoint.
            state.params.insert("TEMP".to_string(), value.clone());
        }
        state.writes.push((name.to_string(), value));
        Ok(())
    }
}
