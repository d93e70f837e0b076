//! PVCAM parameter names and enumeration codes.
//!
//! The device collaborator addresses parameters by their PVCAM names (the
//! `PARAM_` prefix dropped). Only the parameters the measurement pipeline
//! touches are listed here.

/// Exposure resolution index (`0` = milliseconds, `1` = microseconds)
pub const EXP_RES_INDEX: &str = "EXP_RES_INDEX";
/// Exposure count in units of the current resolution
pub const EXP_TIME: &str = "EXP_TIME";
/// Shutter open mode (`OPEN_NEVER`, `OPEN_PRE_SEQUENCE`, ...)
pub const SHTR_OPEN_MODE: &str = "SHTR_OPEN_MODE";
/// Signal routed to the camera's logic output connector
pub const LOGIC_OUTPUT: &str = "LOGIC_OUTPUT";
/// Sensor chip name, used to select the camera's configuration section
pub const CHIP_NAME: &str = "CHIP_NAME";
/// Sensor temperature setpoint (degrees Celsius)
pub const TEMP_SETPOINT: &str = "TEMP_SETPOINT";
/// Current sensor temperature (degrees Celsius, read-only)
pub const TEMP: &str = "TEMP";
/// ADC speed table index
pub const SPDTAB_INDEX: &str = "SPDTAB_INDEX";
/// ADC gain index
pub const GAIN_INDEX: &str = "GAIN_INDEX";

/// `LOGIC_OUTPUT` code that drives a mechanical shutter (`OUTPUT_SHUTTER`)
pub const OUTPUT_SHUTTER: i64 = 1;
