//! Session tests: configuration files and `PvcamSpectrometer::open`.

mod common;

use common::init_tracing;
use daq_core::capabilities::ParamValue;
use daq_core::error::DaqError;
use daq_driver_mock::MockSpectrometer;
use daq_driver_pvcam::components::params::{
    EXP_TIME, GAIN_INDEX, LOGIC_OUTPUT, OUTPUT_SHUTTER, SPDTAB_INDEX, TEMP_SETPOINT,
};
use daq_driver_pvcam::{CameraConfig, PvcamSpectrometer, ShutterState};
use std::io::Write;
use tempfile::NamedTempFile;

const LAB_CONFIG: &str = r#"
PIXIS256:
  setpoint_temperature: -70
  speed: 0
  gain: 2
  exposure_time: 0.5
  shutter:
    delay: 0.1
    modes: { closed: never, open: pre_sequence }
  cosmic_peaks:
    spatial_threshold: 0.5
ProEM512:
  repeats: 10
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_sections_from_file() {
    let file = write_config(LAB_CONFIG);
    let config = CameraConfig::load(file.path()).unwrap();

    let chips: Vec<&str> = config.chips().collect();
    assert_eq!(chips, vec!["PIXIS256", "ProEM512"]);

    let pixis = config.for_chip("PIXIS 256").unwrap();
    assert_eq!(pixis.gain, Some(2));
    assert!(pixis.shutter.is_some());

    let proem = config.for_chip("ProEM 512").unwrap();
    assert_eq!(proem.repeats, 10);
    assert!(proem.shutter.is_none());
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = CameraConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, DaqError::Configuration(_)));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("PIXIS256:\n  repeats: [1, 2\n");
    let err = CameraConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, DaqError::Config(_)));
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_config("PIXIS256:\n  exposure_tme: 1.0\n");
    assert!(CameraConfig::load(file.path()).is_err());
}

#[test]
fn camel_case_exposure_key_is_accepted() {
    let file = write_config(
        "PIXIS256:\n  setpoint_temperature: -70\n  speed: 0\n  gain: 1\n  exposureTime: 0.25\n  shutter:\n    delay: 0.1\n",
    );
    let config = CameraConfig::load(file.path()).unwrap();
    let pixis = config.for_chip("PIXIS256").unwrap();
    assert_eq!(pixis.exposure_time, Some(0.25));
    assert!(pixis.shutter.is_some());
}

#[test]
fn out_of_range_threshold_fails_validation() {
    let file = write_config("PIXIS256:\n  cosmic_peaks:\n    spatial_threshold: 2.0\n");
    let err = CameraConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, DaqError::Configuration(_)));
}

#[tokio::test]
async fn open_applies_the_matching_section() {
    init_tracing();
    let config = CameraConfig::from_yaml_str(LAB_CONFIG).unwrap();
    let device = MockSpectrometer::builder().chip_name("PIXIS 256").build();

    let s = PvcamSpectrometer::open(device.clone(), &config).await.unwrap();

    assert_eq!(s.chip_name(), "PIXIS 256");
    assert_eq!(
        device.parameter(TEMP_SETPOINT).await,
        Some(ParamValue::Float(-70.0))
    );
    assert_eq!(device.parameter(SPDTAB_INDEX).await, Some(ParamValue::Int(0)));
    assert_eq!(device.parameter(GAIN_INDEX).await, Some(ParamValue::Int(2)));
    assert_eq!(device.parameter(EXP_TIME).await, Some(ParamValue::Int(500)));
    assert_eq!(
        device.parameter(LOGIC_OUTPUT).await,
        Some(ParamValue::Int(OUTPUT_SHUTTER))
    );
    assert!((s.temperature().await.unwrap() + 70.0).abs() < 1e-12);

    s.set_shutter(ShutterState::Closed).await.unwrap();
    assert_eq!(s.shutter().await.unwrap(), ShutterState::Closed);
}

#[tokio::test]
async fn open_without_shutter_leaves_logic_output_alone() {
    let config = CameraConfig::from_yaml_str(LAB_CONFIG).unwrap();
    let device = MockSpectrometer::builder().chip_name("ProEM 512").build();

    let s = PvcamSpectrometer::open(device.clone(), &config).await.unwrap();

    assert_eq!(s.repeat_count(), 10);
    assert_eq!(device.parameter(LOGIC_OUTPUT).await, Some(ParamValue::Int(0)));
    assert!(device.parameter_writes().await.is_empty());
}

#[tokio::test]
async fn open_fails_for_unconfigured_chip() {
    let config = CameraConfig::from_yaml_str(LAB_CONFIG).unwrap();
    let device = MockSpectrometer::builder().chip_name("Blaze 400B").build();

    let err = PvcamSpectrometer::open(device, &config).await.err().unwrap();
    assert!(matches!(err, DaqError::Configuration(_)));
}
