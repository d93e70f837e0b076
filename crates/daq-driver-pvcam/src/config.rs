//! Camera configuration.
//!
//! One YAML file describes every camera a lab owns, keyed by chip name:
//!
//! ```yaml
//! PIXIS256:
//!   setpoint_temperature: -70
//!   speed: 0
//!   gain: 1
//!   exposure_time: 1.0
//!   repeats: 1
//!   reduction: sum
//!   shutter:
//!     delay: 0.1
//!     modes: { closed: never, open: pre_sequence }
//!   cosmic_peaks:
//!     spatial_threshold: 0.5
//!     sequential:
//!       enabled: true
//!       sigma: 5.0
//!       noise_floor: 1.0
//! ```
//!
//! At session start the camera reports its chip name and the matching section
//! is selected with [`CameraConfig::for_chip`]. Every key is optional; a
//! missing key leaves the feature disabled or at its default.
//!
//! Loading follows two stages: serde deserialization with `serde_valid` range
//! checks, then cross-field validation (the shutter table must be invertible).

use crate::components::shutter::{
    check_invertible, default_drive_modes, ShutterOpenMode, ShutterSequencer, ShutterState,
};
use daq_core::data::BatchReduction;
use daq_core::error::{AppResult, DaqError};
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

fn default_repeats() -> usize {
    1
}

fn default_shutter_delay() -> f64 {
    0.1
}

fn default_sigma() -> f64 {
    5.0
}

fn default_noise_floor() -> f64 {
    1.0
}

// =============================================================================
// Sections
// =============================================================================

/// Settings for one camera model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CameraSettings {
    /// Sensor temperature setpoint in °C
    #[serde(default)]
    pub setpoint_temperature: Option<f64>,

    /// ADC speed table index
    #[serde(default)]
    #[validate(minimum = 0)]
    pub speed: Option<i64>,

    /// ADC gain index
    #[serde(default)]
    #[validate(minimum = 0)]
    pub gain: Option<i64>,

    /// Exposure applied when the session opens, in seconds
    #[serde(default, alias = "exposureTime")]
    #[validate(minimum = 0.0)]
    pub exposure_time: Option<f64>,

    /// Exposures per measurement
    #[serde(default = "default_repeats")]
    #[validate(minimum = 1)]
    pub repeats: usize,

    /// How repeated exposures are combined
    #[serde(default)]
    pub reduction: BatchReduction,

    /// Mechanical shutter; absent means the camera has none
    #[serde(default)]
    #[validate]
    pub shutter: Option<ShutterConfig>,

    /// Cosmic-peak correction
    #[serde(default)]
    #[validate]
    pub cosmic_peaks: CorrectionConfig,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            setpoint_temperature: None,
            speed: None,
            gain: None,
            exposure_time: None,
            repeats: default_repeats(),
            reduction: BatchReduction::default(),
            shutter: None,
            cosmic_peaks: CorrectionConfig::default(),
        }
    }
}

/// Shutter wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ShutterConfig {
    /// Settle exposure used to move the blades, in seconds
    #[serde(default = "default_shutter_delay")]
    #[validate(exclusive_minimum = 0.0)]
    pub delay: f64,

    /// Logical state to PVCAM drive mode
    #[serde(default = "default_drive_modes")]
    pub modes: BTreeMap<ShutterState, ShutterOpenMode>,
}

impl Default for ShutterConfig {
    fn default() -> Self {
        Self {
            delay: default_shutter_delay(),
            modes: default_drive_modes(),
        }
    }
}

impl ShutterConfig {
    /// Build the sequencer this section describes.
    pub fn sequencer(&self) -> AppResult<ShutterSequencer> {
        ShutterSequencer::new(self.modes.clone(), self.delay)
    }
}

/// Cosmic-peak correction settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CorrectionConfig {
    /// Relative deviation for the spatial pass; absent disables it
    #[serde(default)]
    #[validate(exclusive_minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub spatial_threshold: Option<f64>,

    /// Cross-frame pass
    #[serde(default)]
    #[validate]
    pub sequential: SequentialConfig,
}

/// Sequential (cross-frame) correction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SequentialConfig {
    /// Run the pass; forces at least five exposures per measurement
    #[serde(default)]
    pub enabled: bool,

    /// Rejection threshold in robust standard deviations
    #[serde(default = "default_sigma")]
    #[validate(exclusive_minimum = 0.0)]
    pub sigma: f64,

    /// Lower bound on the noise scale, in detector counts
    #[serde(default = "default_noise_floor")]
    #[validate(minimum = 0.0)]
    pub noise_floor: f64,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sigma: default_sigma(),
            noise_floor: default_noise_floor(),
        }
    }
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// All camera sections, keyed by chip name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraConfig {
    cameras: BTreeMap<String, CameraSettings>,
}

fn normalize_chip_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

impl CameraConfig {
    /// Load and validate a YAML camera file.
    ///
    /// # Errors
    ///
    /// * [`DaqError::Configuration`] if the file does not exist or fails validation
    /// * [`DaqError::Config`] if the file cannot be parsed
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(DaqError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        debug!("Loading camera config from: {}", path.display());

        let config: CameraConfig = Figment::new().merge(Yaml::file(path)).extract()?;
        config.validate()?;

        info!(
            "Loaded camera config with {} section(s) from {}",
            config.cameras.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate YAML from a string.
    ///
    /// Useful for tests and embedded defaults.
    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        let config: CameraConfig = serde_yaml::from_str(yaml)
            .map_err(|e| DaqError::Configuration(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| DaqError::Configuration(format!("Failed to write YAML: {}", e)))
    }

    /// Add or replace a section.
    pub fn insert(&mut self, chip_name: impl Into<String>, settings: CameraSettings) {
        self.cameras.insert(chip_name.into(), settings);
    }

    /// Chip names with a section.
    pub fn chips(&self) -> impl Iterator<Item = &str> {
        self.cameras.keys().map(String::as_str)
    }

    /// Run range checks and cross-field validation on every section.
    pub fn validate(&self) -> AppResult<()> {
        for (chip, settings) in &self.cameras {
            if let Err(errors) = settings.validate() {
                let messages: Vec<String> =
                    errors.to_string().lines().map(|s| s.to_string()).collect();
                return Err(DaqError::Configuration(format!(
                    "camera '{}': {}",
                    chip,
                    messages.join("\n")
                )));
            }
            if let Some(shutter) = &settings.shutter {
                check_invertible(&shutter.modes).map_err(|e| {
                    DaqError::Configuration(format!("camera '{}': {}", chip, e))
                })?;
            }
        }
        Ok(())
    }

    /// Mutable access to a chip's section, matched like [`for_chip`](Self::for_chip).
    pub fn for_chip_mut(&mut self, chip_name: &str) -> AppResult<&mut CameraSettings> {
        let wanted = normalize_chip_name(chip_name);
        self.cameras
            .iter_mut()
            .find(|(key, _)| normalize_chip_name(key) == wanted)
            .map(|(_, settings)| settings)
            .ok_or_else(|| {
                DaqError::Configuration(format!("No configuration section for chip '{}'", wanted))
            })
    }

    /// Settings for the chip the device reports.
    ///
    /// Whitespace is ignored on both sides, so `"PIXIS 256"` selects the
    /// `PIXIS256` section.
    pub fn for_chip(&self, chip_name: &str) -> AppResult<&CameraSettings> {
        let wanted = normalize_chip_name(chip_name);
        self.cameras
            .iter()
            .find(|(key, _)| normalize_chip_name(key) == wanted)
            .map(|(_, settings)| settings)
            .ok_or_else(|| {
                DaqError::Configuration(format!("No configuration section for chip '{}'", wanted))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
PIXIS256:
  setpoint_temperature: -70
  speed: 0
  gain: 1
  exposure_time: 1.0
  repeats: 3
  reduction: first
  shutter:
    delay: 0.2
    modes: { closed: never, opened: pre_exposure }
  cosmic_peaks:
    spatial_threshold: 0.5
    sequential:
      enabled: true
      sigma: 4.0
"#;

    #[test]
    fn parses_full_section() {
        let config = CameraConfig::from_yaml_str(FULL).unwrap();
        let s = config.for_chip("PIXIS 256").unwrap();

        assert_eq!(s.setpoint_temperature, Some(-70.0));
        assert_eq!(s.repeats, 3);
        assert_eq!(s.reduction, BatchReduction::First);

        let shutter = s.shutter.as_ref().unwrap();
        assert_eq!(shutter.delay, 0.2);
        assert_eq!(
            shutter.modes.get(&ShutterState::Open),
            Some(&ShutterOpenMode::PreExposure)
        );

        assert_eq!(s.cosmic_peaks.spatial_threshold, Some(0.5));
        assert!(s.cosmic_peaks.sequential.enabled);
        assert_eq!(s.cosmic_peaks.sequential.sigma, 4.0);
        assert_eq!(s.cosmic_peaks.sequential.noise_floor, 1.0);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = CameraConfig::from_yaml_str("ProEM512: {}\n").unwrap();
        let s = config.for_chip("ProEM512").unwrap();
        assert_eq!(s, &CameraSettings::default());
        assert!(s.shutter.is_none());
        assert!(s.cosmic_peaks.spatial_threshold.is_none());
        assert!(!s.cosmic_peaks.sequential.enabled);
    }

    #[test]
    fn unknown_chip_is_a_configuration_error() {
        let config = CameraConfig::from_yaml_str(FULL).unwrap();
        assert!(matches!(
            config.for_chip("Blaze 400"),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn threshold_must_be_in_unit_interval() {
        for bad in ["0.0", "1.5", "-0.2"] {
            let yaml = format!("X:\n  cosmic_peaks:\n    spatial_threshold: {}\n", bad);
            assert!(
                matches!(
                    CameraConfig::from_yaml_str(&yaml),
                    Err(DaqError::Configuration(_))
                ),
                "threshold {} accepted",
                bad
            );
        }
        let ok = "X:\n  cosmic_peaks:\n    spatial_threshold: 1.0\n";
        assert!(CameraConfig::from_yaml_str(ok).is_ok());
    }

    #[test]
    fn zero_repeats_rejected() {
        assert!(CameraConfig::from_yaml_str("X:\n  repeats: 0\n").is_err());
    }

    #[test]
    fn shared_drive_mode_rejected() {
        let yaml = "X:\n  shutter:\n    modes: { closed: never, open: never }\n";
        assert!(matches!(
            CameraConfig::from_yaml_str(yaml),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = CameraConfig::default();
        config.insert(
            "PIXIS256",
            CameraSettings {
                shutter: Some(ShutterConfig::default()),
                ..CameraSettings::default()
            },
        );
        let yaml = config.to_yaml().unwrap();
        assert_eq!(CameraConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
