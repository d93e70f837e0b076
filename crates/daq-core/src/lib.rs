//! `daq-core`
//!
//! Core trait definitions and types shared by the spectroscopy drivers.
//!
//! This crate provides the building blocks the measurement pipeline and the
//! device collaborators agree on: the per-pixel data model, the device
//! capability trait and the error type.
//!
//! ## Key Types
//!
//! - [`data::Trace`]: One spectroscopic readout, one `f64` per detector column
//! - [`data::FrameBatch`]: The traces produced by one acquisition call
//! - [`capabilities::SpectroscopyDevice`]: What the pipeline needs from hardware
//! - [`error::DaqError`]: Typed failures surfaced by the pipeline

pub mod capabilities;
pub mod data;
pub mod error;

// Re-export commonly used types
pub use capabilities::{ParamValue, SpectroscopyDevice};
pub use data::{BatchReduction, FrameBatch, Metadata, Trace};
pub use error::{AppResult, DaqError};
