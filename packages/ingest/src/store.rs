//! Persistence seam for ingested tracks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mobility_database::{DbError, PgStore};
use mobility_track_models::ProcessedTrack;
use uuid::Uuid;

use crate::IngestError;

/// Stores processed tracks and resolves their owners.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Internal id of the user with the given external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the lookup fails.
    async fn resolve_owner(&self, owner_uuid: &Uuid) -> Result<Option<i64>, IngestError>;

    /// Saves the track, its points, segments and validation errors
    /// atomically, returning the new track id.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if anything fails to persist; nothing is
    /// stored in that case.
    async fn save_track(
        &self,
        owner_id: i64,
        track: &ProcessedTrack,
        created_at: DateTime<Utc>,
    ) -> Result<i64, IngestError>;
}

impl From<DbError> for IngestError {
    fn from(value: DbError) -> Self {
        Self::Storage(Box::new(value))
    }
}

#[async_trait]
impl TrackStore for PgStore<'_> {
    async fn resolve_owner(&self, owner_uuid: &Uuid) -> Result<Option<i64>, IngestError> {
        Ok(Self::resolve_owner(self, &owner_uuid.to_string()).await?)
    }

    async fn save_track(
        &self,
        owner_id: i64,
        track: &ProcessedTrack,
        created_at: DateTime<Utc>,
    ) -> Result<i64, IngestError> {
        Ok(Self::save_track(self, owner_id, track, created_at).await?)
    }
}
