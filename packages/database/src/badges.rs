//! [`BadgeStore`] implementation.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mobility_badge::{BadgeError, BadgeStore};
use mobility_badge_models::{Badge, BadgeName, BadgeUpdate};
use mobility_track_models::{TrackRecord, VehicleMode};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::DatabaseValue;

use crate::{DbError, PgStore, conversion, join_names, queries};

impl PgStore<'_> {
    async fn scalar(
        &self,
        query: &str,
        params: &[DatabaseValue],
        column: &str,
    ) -> Result<Option<f64>, DbError> {
        let rows = self.db.query_raw_params(query, params).await?;
        rows.first()
            .map(|row| row.to_value(column).map_err(|e| conversion(column, e)))
            .transpose()
    }
}

fn timestamp_or_null(value: Option<DateTime<Utc>>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |t| DatabaseValue::DateTime(t.naive_utc()))
}

#[async_trait]
impl BadgeStore for PgStore<'_> {
    async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, BadgeError> {
        Ok(Self::load_track(self, track_id).await?)
    }

    async fn user_badges(&self, user_id: i64) -> Result<Vec<Badge>, BadgeError> {
        let rows = self
            .db
            .query_raw_params(queries::SELECT_USER_BADGES, &[DatabaseValue::Int64(user_id)])
            .await
            .map_err(DbError::from)?;

        let mut badges = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.to_value("name").map_err(|e| conversion("name", e))?;
            let Ok(name) = name.parse::<BadgeName>() else {
                log::warn!("Skipping unknown badge '{name}' of user {user_id}");
                continue;
            };
            badges.push(Badge {
                id: row.to_value("id").map_err(|e| conversion("id", e))?,
                name,
                acquired: row.to_value("acquired").unwrap_or(false),
                target: row.to_value("target").unwrap_or(0.0),
                progress: row.to_value("progress").unwrap_or(0.0),
            });
        }
        Ok(badges)
    }

    async fn track_dates(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<String>, BadgeError> {
        let rows = self
            .db
            .query_raw_params(
                queries::SELECT_TRACK_DATES,
                &[
                    DatabaseValue::Int64(user_id),
                    DatabaseValue::String(start.format("%Y-%m-%d").to_string()),
                    DatabaseValue::String(end.format("%Y-%m-%d").to_string()),
                ],
            )
            .await
            .map_err(DbError::from)?;

        let mut days = BTreeSet::new();
        for row in &rows {
            let day: String = row.to_value("day").map_err(|e| conversion("day", e))?;
            days.insert(day);
        }
        Ok(days)
    }

    async fn count_rides(
        &self,
        user_id: i64,
        modes: &[VehicleMode],
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<u64, BadgeError> {
        let rows = self
            .db
            .query_raw_params(
                queries::SELECT_COUNT_RIDES,
                &[
                    DatabaseValue::Int64(user_id),
                    DatabaseValue::String(join_names(modes)),
                    timestamp_or_null(window.map(|(start, _)| start)),
                    timestamp_or_null(window.map(|(_, end)| end)),
                ],
            )
            .await
            .map_err(DbError::from)?;

        let rides: i64 = rows
            .first()
            .map(|row| row.to_value("rides").map_err(|e| conversion("rides", e)))
            .transpose()?
            .unwrap_or(0);
        Ok(u64::try_from(rides).unwrap_or(0))
    }

    async fn total_distance(&self, user_id: i64, modes: &[VehicleMode]) -> Result<f64, BadgeError> {
        let params = [
            DatabaseValue::Int64(user_id),
            DatabaseValue::String(join_names(modes)),
        ];
        Ok(self
            .scalar(queries::SELECT_TOTAL_DISTANCE, &params, "distance")
            .await?
            .unwrap_or(0.0))
    }

    async fn total_co2_saved(&self, user_id: i64) -> Result<f64, BadgeError> {
        Ok(self
            .scalar(
                queries::SELECT_CO2_SAVED,
                &[DatabaseValue::Int64(user_id)],
                "co2_saved",
            )
            .await?
            .unwrap_or(0.0))
    }

    async fn total_calories(&self, user_id: i64) -> Result<f64, BadgeError> {
        Ok(self
            .scalar(
                queries::SELECT_CONSUMED_CALORIES,
                &[DatabaseValue::Int64(user_id)],
                "calories",
            )
            .await?
            .unwrap_or(0.0))
    }

    async fn save_badges(&self, updates: &[BadgeUpdate]) -> Result<(), BadgeError> {
        let txn = self.db.begin_transaction().await.map_err(DbError::from)?;
        for update in updates {
            txn.exec_raw_params(
                queries::UPDATE_BADGE,
                &[
                    DatabaseValue::Int64(update.badge_id),
                    DatabaseValue::Real64(update.progress),
                    DatabaseValue::Bool(update.acquired),
                ],
            )
            .await
            .map_err(DbError::from)?;
        }
        txn.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}
