//! Spectroscopic data model.
//!
//! A spectroscopy readout bins the sensor vertically, so every exposure yields
//! one [`Trace`]: a row of samples, one per detector column. Repeated exposures
//! from a single acquisition call travel together as a [`FrameBatch`].

use crate::error::{AppResult, DaqError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// One 1-D intensity readout, one sample per detector pixel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace(Vec<f64>);

impl Trace {
    /// Wrap raw samples.
    pub fn new(samples: Vec<f64>) -> Self {
        Self(samples)
    }

    /// Trace of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Consume the trace and return its samples.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Element-wise `self - other`.
    ///
    /// Fails with [`DaqError::Processing`] when the lengths differ.
    pub fn subtract(&self, other: &Trace) -> AppResult<Trace> {
        if self.len() != other.len() {
            return Err(DaqError::Processing(format!(
                "cannot subtract a {}-sample trace from a {}-sample trace",
                other.len(),
                self.len()
            )));
        }
        Ok(self.iter().zip(other.iter()).map(|(a, b)| a - b).collect())
    }
}

impl Deref for Trace {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl DerefMut for Trace {
    fn deref_mut(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

impl From<Vec<f64>> for Trace {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl FromIterator<f64> for Trace {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a batch of repeated exposures is reduced to a single trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchReduction {
    /// Sum all exposures (total integrated signal)
    #[default]
    Sum,
    /// Keep only the first exposure
    First,
}

/// Traces produced by one acquisition call.
///
/// Invariant: at least one trace, all traces the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    traces: Vec<Trace>,
}

impl FrameBatch {
    /// Build a batch, checking it is non-empty and rectangular.
    pub fn new(traces: Vec<Trace>) -> AppResult<Self> {
        let Some(first) = traces.first() else {
            return Err(DaqError::Processing("frame batch is empty".into()));
        };
        let width = first.len();
        if let Some(bad) = traces.iter().position(|t| t.len() != width) {
            return Err(DaqError::Processing(format!(
                "frame {} has {} samples, expected {}",
                bad,
                traces[bad].len(),
                width
            )));
        }
        Ok(Self { traces })
    }

    /// Number of exposures in the batch.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the batch holds no traces.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Samples per trace.
    pub fn trace_len(&self) -> usize {
        self.traces.first().map_or(0, |t| t.len())
    }

    /// Borrow the traces.
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Mutably borrow the traces. Lengths must not be changed.
    pub fn traces_mut(&mut self) -> &mut [Trace] {
        &mut self.traces
    }

    /// Consume the batch.
    pub fn into_traces(self) -> Vec<Trace> {
        self.traces
    }

    /// Collapse the batch into one trace.
    pub fn collapse(&self, reduction: BatchReduction) -> Trace {
        match reduction {
            BatchReduction::First => self.traces[0].clone(),
            BatchReduction::Sum => {
                let mut acc = Trace::zeros(self.trace_len());
                for trace in &self.traces {
                    for (a, v) in acc.iter_mut().zip(trace.iter()) {
                        *a += v;
                    }
                }
                acc
            }
        }
    }
}

/// Acquisition bookkeeping, passed through the pipeline unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// When the acquisition call started
    pub acquired_at: DateTime<Utc>,
    /// Number of exposures the call produced
    pub frame_count: usize,
    /// Readout parameters reported by the device
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    /// Metadata stamped with the current time.
    pub fn new(frame_count: usize) -> Self {
        Self {
            acquired_at: Utc::now(),
            frame_count,
            fields: serde_json::Map::new(),
        }
    }

    /// Attach a readout field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
