//! Message-driven pipeline stages.
//!
//! Each [`Message`] triggers one stage. When the stage succeeds the next
//! message is published through the [`Notifier`]; a failing stage publishes
//! nothing and the chain stops there. Stages may be replayed for the same
//! track: indexes are overwritten, badge progress is recomputed and awarded
//! badges are never revoked.

use mobility_badge::{BadgeStore, update_badges};
use mobility_geometry::RegionOfInterest;
use mobility_index::{IndexStore, calculate_indexes};
use mobility_ingest_models::Message;
use mobility_track::PipelineConfig;

use crate::{IngestError, Notifier, ObjectSource, TrackStore, ingest_track};

/// Collaborators of the stage handlers.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub objects: &'a dyn ObjectSource,
    pub tracks: &'a dyn TrackStore,
    pub indexes: &'a dyn IndexStore,
    pub badges: &'a dyn BadgeStore,
    pub notifier: &'a dyn Notifier,
    pub region: Option<&'a RegionOfInterest>,
    pub config: &'a PipelineConfig,
}

async fn run_stage(
    ctx: &StageContext<'_>,
    message: &Message,
) -> Result<Option<Message>, IngestError> {
    match message {
        Message::TrackPointsSaved {
            bucket_name,
            object_key,
        } => {
            let outcome = ingest_track(
                ctx.objects,
                ctx.tracks,
                bucket_name,
                object_key,
                ctx.region,
                ctx.config,
            )
            .await?;
            if outcome.is_valid {
                Ok(Some(Message::TrackIngested {
                    track_id: outcome.track_id,
                }))
            } else {
                log::warn!(
                    "Track {} stored as invalid ({}), not scoring it",
                    outcome.track_id,
                    outcome.validation_error
                );
                Ok(None)
            }
        }
        Message::TrackIngested { track_id } => {
            calculate_indexes(ctx.indexes, *track_id).await?;
            Ok(Some(Message::IndexesCalculated {
                track_id: *track_id,
            }))
        }
        Message::IndexesCalculated { track_id } => {
            let updates = update_badges(ctx.badges, *track_id).await?;
            log::debug!("Track {track_id}: {} badge updates", updates.len());
            Ok(Some(Message::BadgesUpdated {
                track_id: *track_id,
            }))
        }
        Message::BadgesUpdated { track_id } => {
            log::info!("Track {track_id} is fully processed");
            Ok(None)
        }
        Message::Unknown => {
            log::warn!("Ignoring message of unknown type");
            Ok(None)
        }
    }
}

/// Runs the stage triggered by `message` and publishes its follow-up.
///
/// Returns the published message, if any.
///
/// # Errors
///
/// Returns the stage's error, or [`IngestError::Notify`] if publishing
/// fails.
pub async fn handle_message(
    ctx: &StageContext<'_>,
    message: &Message,
) -> Result<Option<Message>, IngestError> {
    log::debug!("Handling {}", message.summary());
    let next = run_stage(ctx, message).await?;
    if let Some(next) = &next {
        ctx.notifier.publish(next).await?;
    }
    Ok(next)
}

/// Handles `message` and every follow-up in-process until the chain ends.
///
/// Returns the published messages in order.
///
/// # Errors
///
/// Returns the first stage error; messages published before it stay
/// published.
pub async fn follow_chain(
    ctx: &StageContext<'_>,
    message: Message,
) -> Result<Vec<Message>, IngestError> {
    let mut published = Vec::new();
    let mut current = message;
    while let Some(next) = handle_message(ctx, &current).await? {
        published.push(next.clone());
        current = next;
    }
    Ok(published)
}
