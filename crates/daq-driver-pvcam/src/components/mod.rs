//! Spectroscopy pipeline components.
//!
//! - [`params`]: PVCAM parameter names and codes used by the pipeline
//! - [`exposure`]: seconds <-> (resolution, count) encoding
//! - [`shutter`]: logical shutter state sequencing
//! - [`spikes`]: cosmic-peak correction

pub mod exposure;
pub mod params;
pub mod shutter;
pub mod spikes;
