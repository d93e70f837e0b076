//! Hardware Capabilities
//!
//! The measurement pipeline never owns hardware code. It talks to a device
//! through the [`SpectroscopyDevice`] capability, which covers exactly what a
//! spectroscopy acquisition needs:
//!
//! - acquire a batch of raw 1-D frames using the current exposure settings
//! - read and write a small set of named instrument parameters
//!
//! # Design Philosophy
//!
//! The capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors, so SDK adapters can attach their own context
//!
//! # Example
//!
//! ```rust,ignore
//! async fn dark_frame<D: SpectroscopyDevice + ?Sized>(device: &D) -> Result<Trace> {
//!     device.set_parameter("SHTR_OPEN_MODE", ParamValue::Int(0)).await?;
//!     let (batch, _meta) = device.acquire_frames(1).await?;
//!     Ok(batch.into_traces().remove(0))
//! }
//! ```

use crate::data::{FrameBatch, Metadata};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Value of a named device parameter.
///
/// PVCAM parameters are integers, enumerations (reported as their integer
/// code), floating-point values or strings. Enumerations travel as `Int`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer or enumeration code
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Text value (chip name, serial number)
    Text(String),
}

impl ParamValue {
    /// Integer view of the value. Floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Floating-point view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Capability: 1-D spectroscopic acquisition
///
/// # Contract
/// - `acquire_frames` blocks (awaits) for the full exposure and readout of every
///   frame and returns exactly `count` traces of the device's fixed length
/// - No retries: failures are reported to the caller as-is
/// - The handle has no internal locking; callers serialize access
#[async_trait]
pub trait SpectroscopyDevice: Send + Sync {
    /// Acquire `count` consecutive exposures with the current settings.
    ///
    /// # Returns
    /// The batch of traces plus the acquisition's bookkeeping.
    async fn acquire_frames(&self, count: usize) -> Result<(FrameBatch, Metadata)>;

    /// Read the current value of a named parameter.
    async fn get_parameter(&self, name: &str) -> Result<ParamValue>;

    /// Write a named parameter. Takes effect on the next acquisition.
    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<()>;
}

#[async_trait]
impl<T: SpectroscopyDevice + ?Sized> SpectroscopyDevice for Arc<T> {
    async fn acquire_frames(&self, count: usize) -> Result<(FrameBatch, Metadata)> {
        (**self).acquire_frames(count).await
    }

    async fn get_parameter(&self, name: &str) -> Result<ParamValue> {
        (**self).get_parameter(name).await
    }

    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<()> {
        (**self).set_parameter(name, value).await
    }
}
