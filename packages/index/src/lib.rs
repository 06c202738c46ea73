#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Environmental, economic and health indexes of a track.
//!
//! [`calculate_indexes`] loads a persisted track through an [`IndexStore`],
//! computes [`SegmentIndexes`] for each of its segments and hands them back
//! to the store, which also refreshes the track-level totals. Re-running it
//! overwrites the previous results.

pub mod costs;
pub mod emissions;
pub mod health;

use async_trait::async_trait;
use mobility_track_models::{SegmentRecord, TrackRecord};
use serde::{Deserialize, Serialize};

pub use costs::{Costs, calculate_costs};
pub use emissions::{Emission, Pollutant, SegmentEmissions, calculate_emissions};
pub use health::{Health, calculate_health};

/// Errors that can occur while calculating indexes.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No track exists with this id.
    #[error("Track {track_id} not found")]
    TrackNotFound {
        /// The requested track.
        track_id: i64,
    },

    /// The track failed validation and has no indexes.
    #[error("Track {track_id} is not valid")]
    InvalidTrack {
        /// The requested track.
        track_id: i64,
    },

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Storage operations needed by [`calculate_indexes`].
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Loads a track with its segments.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Storage`] if the backend fails.
    async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, IndexError>;

    /// Replaces the indexes of every given segment and recomputes the
    /// aggregates of `track_id`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Storage`] if the backend fails. Nothing is
    /// written in that case.
    async fn save_indexes(
        &self,
        track_id: i64,
        indexes: &[SegmentIndexes],
    ) -> Result<(), IndexError>;
}

/// Every index computed for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentIndexes {
    pub segment_id: i64,
    pub emissions: SegmentEmissions,
    pub costs: Costs,
    pub health: Health,
}

/// Computes the indexes of one stored segment.
#[must_use]
pub fn segment_indexes(segment: &SegmentRecord) -> SegmentIndexes {
    let length_km = segment.length / 1_000.0;
    let duration_hours = segment.duration / 3_600.0;
    let speed_kmh = if duration_hours > 0.0 {
        length_km / duration_hours
    } else {
        0.0
    };

    SegmentIndexes {
        segment_id: segment.id,
        emissions: calculate_emissions(segment.vehicle_mode, length_km),
        costs: calculate_costs(segment.vehicle_mode, length_km, duration_hours),
        health: calculate_health(segment.vehicle_mode, duration_hours * 60.0, speed_kmh),
    }
}

/// Calculates and stores the indexes of every segment of a valid track.
///
/// # Errors
///
/// * [`IndexError::TrackNotFound`] if the track does not exist
/// * [`IndexError::InvalidTrack`] if the track failed validation
/// * [`IndexError::Storage`] if loading or saving fails
pub async fn calculate_indexes(
    store: &dyn IndexStore,
    track_id: i64,
) -> Result<Vec<SegmentIndexes>, IndexError> {
    let track = store
        .load_track(track_id)
        .await?
        .ok_or(IndexError::TrackNotFound { track_id })?;
    if !track.is_valid {
        return Err(IndexError::InvalidTrack { track_id });
    }

    let indexes: Vec<SegmentIndexes> = track.segments.iter().map(segment_indexes).collect();
    store.save_indexes(track_id, &indexes).await?;

    log::info!(
        "Calculated indexes for {} segments of track {track_id}",
        indexes.len()
    );
    Ok(indexes)
}
