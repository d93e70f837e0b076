//! Custom error types for the spectroscopy pipeline.
//!
//! This module defines the primary error type, `DaqError`. Using the `thiserror`
//! crate, it provides a single place for every failure the measurement pipeline
//! can surface, from unreadable configuration files to lookups the device
//! answers with values the pipeline does not know.
//!
//! ## Error Hierarchy
//!
//! - **Lookup errors** (`UnknownUnit`, `UnknownShutterState`, `UnknownDriveMode`):
//!   the device or the caller named something outside the configured tables.
//!   Always fatal to the operation and never substituted with a default.
//! - **Configuration errors** (`Config`, `Configuration`): the file could not be
//!   read, or it parsed but is semantically wrong.
//! - **Pipeline errors** (`InvalidExposure`, `Processing`,
//!   `SequentialBatchTooSmall`): the requested operation cannot be carried out.
//! - **`Device`**: failures coming from the hardware collaborator, carried through
//!   unchanged.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a failure raised inside a device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Opening the device or SDK failed
    Initialization,
    /// Lost or garbled communication with the device
    Communication,
    /// The device reported a fault
    Hardware,
    /// The operation did not complete in time
    Timeout,
    /// Parameter name or value rejected by the device
    InvalidParameter,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured error raised by device drivers (real or simulated).
///
/// Drivers return it through `anyhow`, so the pipeline carries it inside
/// [`DaqError::Device`] and callers can `downcast_ref::<DriverError>()`.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver identifier, e.g. `"mock_spectrometer"`
    pub driver_type: String,
    /// Failure category
    pub kind: DriverErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl DriverError {
    /// Create a driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Primary error type for the spectroscopy pipeline.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration file could not be read or deserialized.
    ///
    /// **Error Type**: Permanent - requires fixing the configuration file.
    ///
    /// **Source**: Wraps `figment::Error`.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but failed semantic validation.
    ///
    /// Also raised when an operation needs a feature the configuration left
    /// disabled, e.g. background removal without a shutter section.
    ///
    /// # Example
    ///
    /// ```rust
    /// use daq_core::error::DaqError;
    ///
    /// fn validate_delay(delay_seconds: f64) -> Result<(), DaqError> {
    ///     if delay_seconds <= 0.0 {
    ///         return Err(DaqError::Configuration(
    ///             "shutter delay must be positive".into()
    ///         ));
    ///     }
    ///     Ok(())
    /// }
    /// ```
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The device reported an exposure resolution code outside the known set.
    #[error("Unknown exposure resolution unit reported by device: {0}")]
    UnknownUnit(i64),

    /// A logical shutter state has no drive mode in the configured table.
    #[error("Unknown shutter state: {0}")]
    UnknownShutterState(String),

    /// The device reported a shutter drive mode absent from the configured table.
    #[error("Unknown shutter drive mode reported by device: {0}")]
    UnknownDriveMode(String),

    /// Exposure duration cannot be represented as a 16-bit device count.
    #[error("Exposure of {0} s cannot be represented by the device")]
    InvalidExposure(f64),

    /// Sequential cosmic-peak correction was invoked on too few exposures.
    ///
    /// The orchestrator raises the repeat count before acquiring, so reaching
    /// this is a programming error rather than a user-recoverable condition.
    #[error("Sequential correction needs at least {min} exposures, got {got}")]
    SequentialBatchTooSmall {
        /// Number of traces supplied
        got: usize,
        /// Minimum batch size
        min: usize,
    },

    /// Data processing operation failed.
    ///
    /// Occurs during post-acquisition processing such as background subtraction
    /// of traces with different lengths, or an empty frame batch.
    #[error("Data processing error: {0}")]
    Processing(String),

    /// Failure reported by the device collaborator, propagated unchanged.
    #[error(transparent)]
    Device(#[from] anyhow::Error),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_transparent() {
        let err: DaqError = anyhow::anyhow!("readout timed out").into();
        assert_eq!(err.to_string(), "readout timed out");
    }

    #[test]
    fn driver_errors_survive_the_round_trip_through_anyhow() {
        let driver = DriverError::new("mock_spectrometer", DriverErrorKind::Timeout, "no frame");
        let err: DaqError = anyhow::Error::new(driver).into();
        let DaqError::Device(inner) = &err else {
            panic!("expected a device error");
        };
        let driver = inner.downcast_ref::<DriverError>().unwrap();
        assert_eq!(driver.kind, DriverErrorKind::Timeout);
        assert_eq!(
            err.to_string(),
            "Driver 'mock_spectrometer' timeout error: no frame"
        );
    }

    #[test]
    fn lookup_errors_name_the_offending_value() {
        assert!(DaqError::UnknownUnit(7).to_string().contains('7'));
        assert!(DaqError::UnknownShutterState("ajar".into())
            .to_string()
            .contains("ajar"));
    }
}
