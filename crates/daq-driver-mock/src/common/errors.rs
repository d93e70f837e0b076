//! Error injection for the mock spectrometer.
//!
//! Lets tests make individual device calls fail the way real hardware does:
//! after a number of successful calls, randomly at a configured rate, or
//! permanently once communication is lost. Failures are
//! [`DriverError`]s so callers can downcast them out of the pipeline's error.

use super::rng::MockRng;
use daq_core::error::{DriverError, DriverErrorKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Device call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `acquire_frames`
    Acquire,
    /// `get_parameter`
    GetParameter,
    /// `set_parameter`
    SetParameter,
}

impl fmt::Display for MockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MockOperation::Acquire => "acquire",
            MockOperation::GetParameter => "get_parameter",
            MockOperation::SetParameter => "set_parameter",
        };
        f.write_str(name)
    }
}

/// Scripted failure.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Succeed `count` times, then fail every call
    FailAfterN {
        /// Call being counted
        operation: MockOperation,
        /// Successful calls before the first failure
        count: u32,
    },
    /// Every call of `operation` times out
    Timeout {
        /// Affected call
        operation: MockOperation,
    },
    /// The first call of any kind loses the link; every later call fails too
    CommunicationLoss,
    /// The first call latches a hardware fault; every later call fails too
    HardwareFault {
        /// Fault code reported in the message
        code: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    calls: HashMap<MockOperation, u32>,
    communication_lost: bool,
    hardware_fault: Option<u32>,
}

/// Error injection configuration. Clones share state.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    rates: Arc<HashMap<MockOperation, f64>>,
    default_rate: f64,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

impl ErrorConfig {
    fn build(
        rates: HashMap<MockOperation, f64>,
        default_rate: f64,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            rates: Arc::new(rates),
            default_rate,
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Never fail.
    pub fn none() -> Self {
        Self::build(HashMap::new(), 0.0, Vec::new(), None)
    }

    /// Fail any call with probability `rate`, reproducibly for a given seed.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        Self::build(HashMap::new(), rate, Vec::new(), seed)
    }

    /// Per-operation failure probabilities. Unlisted operations never fail.
    pub fn with_rates(rates: HashMap<MockOperation, f64>) -> Self {
        Self::build(rates, 0.0, Vec::new(), None)
    }

    /// A single scripted failure.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Several scripted failures, checked in order.
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), 0.0, scenarios, None)
    }

    /// Decide whether `operation` fails now.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: MockOperation,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.communication_lost {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }
        if let Some(code) = state.hardware_fault {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {}", code),
            ));
        }

        let calls = {
            let n = state.calls.entry(operation).or_insert(0);
            *n += 1;
            *n
        };

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN { operation: op, count }
                    if *op == operation && calls > *count =>
                {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Injected {} failure after {} calls", operation, count),
                    ));
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("{} timed out", operation),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault = Some(*code);
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Hardware fault: {}", code),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .rates
            .get(&operation)
            .copied()
            .unwrap_or(self.default_rate);
        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random {} failure", operation),
            ));
        }

        Ok(())
    }

    /// Clear counters and latched faults.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
