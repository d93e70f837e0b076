//! Integration tests for the mock spectrometer
//!
//! Exercises the public surface the pipeline relies on: the
//! `SpectroscopyDevice` impl, shared state between clones and error injection.

use daq_core::capabilities::{ParamValue, SpectroscopyDevice};
use daq_core::data::Trace;
use daq_core::error::{DriverError, DriverErrorKind};
use daq_driver_mock::*;

fn flat(value: f64) -> Trace {
    Trace::new(vec![value; 8])
}

#[tokio::test]
async fn clones_share_parameters_and_counters() {
    let device = MockSpectrometer::builder()
        .fixed_frames(flat(5.0), flat(1.0))
        .build();
    let handle = device.clone();

    device
        .set_parameter("GAIN_INDEX", ParamValue::Int(3))
        .await
        .unwrap();
    device.acquire_frames(2).await.unwrap();

    assert_eq!(handle.parameter("GAIN_INDEX").await, Some(ParamValue::Int(3)));
    assert_eq!(handle.acquisitions(), 1);
    assert_eq!(handle.frames_acquired(), 2);
}

#[tokio::test]
async fn works_behind_an_arc_trait_object() {
    let device: std::sync::Arc<dyn SpectroscopyDevice> =
        std::sync::Arc::new(MockSpectrometer::builder().pixels(32).seed(1).build());

    let (batch, meta) = device.acquire_frames(3).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.trace_len(), 32);
    assert_eq!(meta.frame_count, 3);
}

#[tokio::test]
async fn communication_loss_latches_until_reset() {
    let errors = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);
    let device = MockSpectrometer::builder()
        .error_config(errors.clone())
        .build();

    for _ in 0..2 {
        let err = device.get_parameter("TEMP").await.unwrap_err();
        let driver = err.downcast_ref::<DriverError>().unwrap();
        assert_eq!(driver.kind, DriverErrorKind::Communication);
    }

    errors.reset();
    let err = device.acquire_frames(1).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<DriverError>().unwrap().kind,
        DriverErrorKind::Communication
    );
}

#[test]
fn seeded_random_failures_are_reproducible() {
    let a = ErrorConfig::random_failures_seeded(0.5, Some(12345));
    let b = ErrorConfig::random_failures_seeded(0.5, Some(12345));

    let outcomes = |config: &ErrorConfig| -> Vec<bool> {
        (0..32)
            .map(|_| config.check_operation("mock", MockOperation::Acquire).is_ok())
            .collect()
    };
    let first = outcomes(&a);
    assert_eq!(first, outcomes(&b));
    assert!(first.iter().any(|ok| *ok));
    assert!(first.iter().any(|ok| !*ok));
}

#[test]
fn per_operation_rates_only_affect_that_operation() {
    let rates = std::collections::HashMap::from([(MockOperation::SetParameter, 1.0)]);
    let config = ErrorConfig::with_rates(rates);

    assert!(config
        .check_operation("mock", MockOperation::SetParameter)
        .is_err());
    assert!(config.check_operation("mock", MockOperation::Acquire).is_ok());
}

#[test]
fn modes_parse_case_insensitively() {
    assert_eq!("Realistic".parse::<MockMode>().unwrap(), MockMode::Realistic);
    assert_eq!("chaos".parse::<MockMode>().unwrap(), MockMode::Chaos);
    assert!("turbo".parse::<MockMode>().is_err());
}
