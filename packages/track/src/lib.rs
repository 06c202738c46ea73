#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Track reconstruction from raw telemetry.
//!
//! Turns one uploaded telemetry file into validated segments:
//!
//! 1. [`parser`]: text to time-ordered [`PointData`](mobility_track_models::PointData)
//! 2. [`point_filter`]: inaccurate and redundant points removed
//! 3. [`segmentation`]: greedy split per mode, pause, and jump
//! 4. [`outliers`]: speed outliers removed, then segmented again
//! 5. [`filters`]: temporal bounds, region of interest, tiny segments
//! 6. [`metrics`]: measurements and plausibility checks
//!
//! [`pipeline::process_raw`] runs every step.

pub mod config;
pub mod filters;
pub mod metrics;
pub mod outliers;
pub mod parser;
pub mod pipeline;
pub mod point_filter;
pub mod segmentation;

pub use config::PipelineConfig;
pub use pipeline::{process_points, process_raw};

/// Errors that abort processing of a whole track.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    /// The input cannot produce a track at all.
    #[error("Non-recoverable track error: {message}")]
    NonRecoverable {
        /// What made the input unusable.
        message: String,
    },
}

impl ProcessingError {
    /// Shorthand for [`ProcessingError::NonRecoverable`].
    pub fn non_recoverable(message: impl Into<String>) -> Self {
        Self::NonRecoverable {
            message: message.into(),
        }
    }
}
