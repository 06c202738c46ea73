#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Track ingestion and the staged processing chain.
//!
//! An uploaded telemetry file becomes a stored track through
//! [`ingest_track`]. From there each stage (indexes, badges) is triggered
//! by a [`Message`] and announces its completion with the next one, see
//! [`staging::handle_message`]. [`batch`] runs the same pipeline over many
//! local files with a bounded worker pool.

pub mod batch;
pub mod notify;
pub mod objects;
pub mod staging;
pub mod store;

use std::sync::LazyLock;

use chrono::Utc;
use mobility_badge::{BadgeError, BadgeStore, update_badges};
use mobility_geometry::{GeometryError, RegionOfInterest};
use mobility_index::{IndexError, IndexStore, calculate_indexes};
use mobility_ingest_models::{IngestOutcome, Message};
use mobility_track::{PipelineConfig, ProcessingError, config::ConfigError};
use mobility_track_models::ProcessedTrack;
use regex::Regex;
use uuid::Uuid;

pub use notify::{LogNotifier, Notifier};
pub use objects::{LocalDirectorySource, ObjectSource};
pub use store::TrackStore;

/// Owner UUID in upload keys such as `cognito/<app>/<uuid>/<file>`.
static OWNER_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cognito/[^/]+/([\w-]{36})").unwrap_or_else(|_| unreachable!())
});

/// Errors that can occur while ingesting or handling messages.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The track cannot be processed at all.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// The uploaded object could not be retrieved.
    #[error("Could not fetch {bucket}/{key}: {message}")]
    Object {
        bucket: String,
        key: String,
        message: String,
    },

    /// A message could not be published.
    #[error("Could not publish {message}: {reason}")]
    Notify {
        /// Rendered message.
        message: String,
        reason: String,
    },

    /// The message is not one the chain understands.
    #[error("Unsupported message: {message}")]
    UnsupportedMessage { message: String },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Badge(#[from] BadgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database connection could not be opened.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Extracts the owner UUID from an uploaded object key.
///
/// # Errors
///
/// Returns [`ProcessingError::NonRecoverable`] (wrapped) if the key does
/// not contain a well-formed owner UUID.
pub fn owner_uuid_from_object_key(object_key: &str) -> Result<Uuid, IngestError> {
    let missing = || {
        ProcessingError::non_recoverable(format!(
            "could not determine track owner for object {object_key}"
        ))
    };
    let raw = OWNER_KEY_RE
        .captures(object_key)
        .and_then(|c| c.get(1))
        .ok_or_else(missing)?;
    Ok(Uuid::parse_str(raw.as_str()).map_err(|_| missing())?)
}

/// Loads a region of interest from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or parsed.
pub fn load_region(path: &std::path::Path) -> Result<RegionOfInterest, IngestError> {
    let text = std::fs::read_to_string(path)?;
    Ok(RegionOfInterest::from_geojson(&text)?)
}

/// Pipeline configuration from a TOML file, or the defaults when no file
/// is given.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if the file cannot be read or parsed.
pub fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig, IngestError> {
    Ok(match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    })
}

/// Persists a processed track for the user identified by `owner_uuid`.
///
/// # Errors
///
/// Returns [`ProcessingError::NonRecoverable`] (wrapped) if the owner is
/// unknown, or [`IngestError::Storage`] if persisting fails.
pub async fn store_track(
    store: &dyn TrackStore,
    owner_uuid: &Uuid,
    track: &ProcessedTrack,
) -> Result<IngestOutcome, IngestError> {
    let owner_id = store.resolve_owner(owner_uuid).await?.ok_or_else(|| {
        ProcessingError::non_recoverable(format!("unknown track owner {owner_uuid}"))
    })?;
    let track_id = store.save_track(owner_id, track, Utc::now()).await?;

    Ok(IngestOutcome {
        track_id,
        is_valid: track.is_valid(),
        segments: track.segments.len(),
        points: track.point_count(),
        validation_error: track.validation_summary(),
    })
}

/// Fetches an uploaded telemetry object, runs the track pipeline on it and
/// stores the result.
///
/// # Errors
///
/// * [`IngestError::Processing`] if the key has no owner, the owner is
///   unknown, or the data cannot form a track
/// * [`IngestError::Object`] if the object cannot be fetched
/// * [`IngestError::Storage`] if persisting fails
pub async fn ingest_track(
    objects: &dyn ObjectSource,
    store: &dyn TrackStore,
    bucket: &str,
    object_key: &str,
    region: Option<&RegionOfInterest>,
    config: &PipelineConfig,
) -> Result<IngestOutcome, IngestError> {
    let owner_uuid = owner_uuid_from_object_key(object_key)?;
    log::debug!("Retrieving {bucket}/{object_key}");
    let raw = objects.fetch(bucket, object_key).await?;
    let track = mobility_track::process_raw(&raw, region, config)?;
    let outcome = store_track(store, &owner_uuid, &track).await?;

    log::info!(
        "Ingested {object_key} as track {} (valid: {})",
        outcome.track_id,
        outcome.is_valid
    );
    Ok(outcome)
}

/// Runs the downstream stages of a freshly stored track in-process: indexes
/// then badges. Invalid tracks are left alone.
///
/// # Errors
///
/// Returns [`IngestError::Index`] or [`IngestError::Badge`] if a stage
/// fails.
pub async fn finish_track(
    indexes: &dyn IndexStore,
    badges: &dyn BadgeStore,
    outcome: &IngestOutcome,
) -> Result<(), IngestError> {
    if !outcome.is_valid {
        log::warn!(
            "Track {} is not valid, skipping indexes and badges: {}",
            outcome.track_id,
            outcome.validation_error
        );
        return Ok(());
    }
    calculate_indexes(indexes, outcome.track_id).await?;
    let updates = update_badges(badges, outcome.track_id).await?;
    log::info!(
        "Track {}: {} badge updates",
        outcome.track_id,
        updates.len()
    );
    Ok(())
}

/// Parses an incoming event: either an object storage notification for an
/// uploaded file (`Records[0].s3`) or a pipeline [`Message`].
///
/// Objects without a `message_type` are [`Message::Unknown`].
///
/// # Errors
///
/// Returns [`IngestError::Json`] if the payload is not valid JSON, or
/// [`IngestError::UnsupportedMessage`] for a malformed storage
/// notification.
pub fn parse_event(payload: &str) -> Result<Message, IngestError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;

    if let Some(records) = value.get("Records") {
        let s3 = records.get(0).and_then(|r| r.get("s3"));
        let bucket = s3
            .and_then(|s| s.pointer("/bucket/name"))
            .and_then(serde_json::Value::as_str);
        let key = s3
            .and_then(|s| s.pointer("/object/key"))
            .and_then(serde_json::Value::as_str);
        return match (bucket, key) {
            (Some(bucket), Some(key)) => Ok(Message::TrackPointsSaved {
                bucket_name: bucket.to_string(),
                object_key: key.to_string(),
            }),
            _ => Err(IngestError::UnsupportedMessage {
                message: "storage notification without bucket or key".to_string(),
            }),
        };
    }

    if value.get("message_type").is_none() {
        return Ok(Message::Unknown);
    }
    Ok(serde_json::from_value(value)?)
}

/// Worker pool size: `MOBILITY_CONCURRENCY` when set to a positive number,
/// otherwise the available parallelism.
#[must_use]
pub fn concurrency_from_env() -> usize {
    std::env::var("MOBILITY_CONCURRENCY")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get))
}
