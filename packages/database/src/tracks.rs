//! Track persistence and retrieval.

use chrono::{DateTime, NaiveDateTime, Utc};
use mobility_geometry::line_to_geojson;
use mobility_track_models::{
    PointData, ProcessedTrack, SegmentRecord, TrackAggregates, TrackRecord, ValidatedSegment,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, PgStore, conversion, parse_vehicle_mode, queries, utc};

impl PgStore<'_> {
    /// Internal id of the user owning `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn resolve_owner(&self, uuid: &str) -> Result<Option<i64>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                queries::SELECT_USER_ID,
                &[DatabaseValue::String(uuid.to_string())],
            )
            .await?;

        rows.first()
            .map(|row| row.to_value("id").map_err(|e| conversion("id", e)))
            .transpose()
    }

    /// Stores a processed track with its points, segments and validation
    /// errors in one transaction, returning the new track id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails. Nothing is stored in
    /// that case.
    pub async fn save_track(
        &self,
        owner_id: i64,
        track: &ProcessedTrack,
        created_at: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let txn = self.db.begin_transaction().await?;

        let rows = txn
            .query_raw_params(
                queries::INSERT_TRACK,
                &[
                    DatabaseValue::Int64(owner_id),
                    DatabaseValue::Int64(track.session_id),
                    DatabaseValue::DateTime(created_at.naive_utc()),
                    DatabaseValue::Bool(track.is_valid()),
                    DatabaseValue::String(track.validation_summary()),
                ],
            )
            .await?;
        let track_id: i64 = rows
            .first()
            .ok_or_else(|| DbError::Conversion {
                message: "Failed to get track id from insert".to_string(),
            })?
            .to_value("id")
            .map_err(|e| conversion("id", e))?;

        for segment in &track.segments {
            for point in segment.segment.points() {
                insert_point(txn.as_ref(), track_id, point).await?;
            }
            insert_segment(txn.as_ref(), track_id, segment).await?;
        }

        txn.commit().await?;

        log::info!(
            "Stored track {track_id} ({} segments, {} points, valid: {})",
            track.segments.len(),
            track.point_count(),
            track.is_valid()
        );
        Ok(track_id)
    }

    /// Loads a track with its segments.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a query fails or a row cannot be decoded.
    pub async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, DbError> {
        let rows = self
            .db
            .query_raw_params(queries::SELECT_TRACK, &[DatabaseValue::Int64(track_id)])
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let created_at: NaiveDateTime = row
            .to_value("created_at")
            .map_err(|e| conversion("created_at", e))?;
        let aggregated: bool = row.to_value("aggregated").unwrap_or(false);
        let aggregates = aggregated.then(|| TrackAggregates {
            so2_saved: row.to_value("so2_saved").unwrap_or(0.0),
            nox_saved: row.to_value("nox_saved").unwrap_or(0.0),
            co_saved: row.to_value("co_saved").unwrap_or(0.0),
            co2_saved: row.to_value("co2_saved").unwrap_or(0.0),
            pm10_saved: row.to_value("pm10_saved").unwrap_or(0.0),
            total_cost: row.to_value("total_cost").unwrap_or(0.0),
            calories_consumed: row.to_value("calories_consumed").unwrap_or(0.0),
        });

        let mut record = TrackRecord {
            id: track_id,
            owner_id: row
                .to_value("owner_id")
                .map_err(|e| conversion("owner_id", e))?,
            created_at: utc(created_at),
            session_id: row
                .to_value("session_id")
                .map_err(|e| conversion("session_id", e))?,
            is_valid: row
                .to_value("is_valid")
                .map_err(|e| conversion("is_valid", e))?,
            validation_error: row.to_value("validation_error").unwrap_or_default(),
            aggregates,
            segments: Vec::new(),
        };

        let segment_rows = self
            .db
            .query_raw_params(
                queries::SELECT_TRACK_SEGMENTS,
                &[DatabaseValue::Int64(track_id)],
            )
            .await?;
        for row in &segment_rows {
            let vehicle_mode: String = row
                .to_value("vehicle_mode")
                .map_err(|e| conversion("vehicle_mode", e))?;
            record.segments.push(SegmentRecord {
                id: row.to_value("id").map_err(|e| conversion("id", e))?,
                vehicle_mode: parse_vehicle_mode(&vehicle_mode)?,
                length: row.to_value("length").unwrap_or(0.0),
                duration: row.to_value("duration").unwrap_or(0.0),
            });
        }

        Ok(Some(record))
    }
}

async fn insert_point(db: &dyn Database, track_id: i64, point: &PointData) -> Result<(), DbError> {
    db.exec_raw_params(
        queries::INSERT_COLLECTED_POINT,
        &[
            DatabaseValue::Int64(track_id),
            DatabaseValue::String(point.vehicle_mode.to_string()),
            DatabaseValue::Real64(point.longitude()),
            DatabaseValue::Real64(point.latitude()),
            DatabaseValue::Real64(point.accuracy),
            DatabaseValue::Real64(point.speed),
            DatabaseValue::Int64(point.session_id),
            DatabaseValue::DateTime(point.timestamp.naive_utc()),
        ],
    )
    .await?;
    Ok(())
}

async fn insert_segment(
    db: &dyn Database,
    track_id: i64,
    segment: &ValidatedSegment,
) -> Result<i64, DbError> {
    let info = &segment.info;
    let rows = db
        .query_raw_params(
            queries::INSERT_SEGMENT,
            &[
                DatabaseValue::Int64(track_id),
                DatabaseValue::String(info.vehicle_mode.to_string()),
                DatabaseValue::String(line_to_geojson(&info.geometry).to_string()),
                DatabaseValue::DateTime(info.start.naive_utc()),
                DatabaseValue::DateTime(info.end.naive_utc()),
                DatabaseValue::Real64(info.duration),
                DatabaseValue::Real64(info.length),
                DatabaseValue::Real64(info.average_speed),
                DatabaseValue::Real64(info.max_speed),
                DatabaseValue::Real64(info.min_speed),
            ],
        )
        .await?;
    let segment_id: i64 = rows
        .first()
        .ok_or_else(|| DbError::Conversion {
            message: "Failed to get segment id from insert".to_string(),
        })?
        .to_value("id")
        .map_err(|e| conversion("id", e))?;

    for error in &segment.errors {
        db.exec_raw_params(
            queries::INSERT_VALIDATION_ERROR,
            &[
                DatabaseValue::Int64(segment_id),
                DatabaseValue::String(error.kind.to_string()),
                DatabaseValue::String(error.variable.clone()),
                DatabaseValue::Real64(error.value),
                DatabaseValue::String(error.vehicle_mode.to_string()),
            ],
        )
        .await?;
    }

    log::debug!(
        "Stored {} segment {segment_id} with {} validation errors",
        info.vehicle_mode,
        segment.errors.len()
    );
    Ok(segment_id)
}
