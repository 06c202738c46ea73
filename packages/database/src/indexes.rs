//! [`IndexStore`] implementation.

use async_trait::async_trait;
use mobility_index::{IndexError, IndexStore, SegmentIndexes};
use mobility_track_models::TrackRecord;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, PgStore, queries};

#[async_trait]
impl IndexStore for PgStore<'_> {
    async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, IndexError> {
        Ok(Self::load_track(self, track_id).await?)
    }

    async fn save_indexes(
        &self,
        track_id: i64,
        indexes: &[SegmentIndexes],
    ) -> Result<(), IndexError> {
        let txn = self.db.begin_transaction().await.map_err(DbError::from)?;
        for segment in indexes {
            upsert_segment_indexes(txn.as_ref(), segment).await?;
        }
        txn.exec_raw_params(
            queries::UPDATE_TRACK_AGGREGATES,
            &[DatabaseValue::Int64(track_id)],
        )
        .await
        .map_err(DbError::from)?;
        txn.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

async fn upsert_segment_indexes(db: &dyn Database, indexes: &SegmentIndexes) -> Result<(), DbError> {
    let segment_id = indexes.segment_id;
    let emissions = &indexes.emissions;
    db.exec_raw_params(
        queries::UPSERT_EMISSION,
        &[
            DatabaseValue::Int64(segment_id),
            DatabaseValue::Real64(emissions.so2.emitted),
            DatabaseValue::Real64(emissions.so2.saved),
            DatabaseValue::Real64(emissions.nox.emitted),
            DatabaseValue::Real64(emissions.nox.saved),
            DatabaseValue::Real64(emissions.co.emitted),
            DatabaseValue::Real64(emissions.co.saved),
            DatabaseValue::Real64(emissions.co2.emitted),
            DatabaseValue::Real64(emissions.co2.saved),
            DatabaseValue::Real64(emissions.pm10.emitted),
            DatabaseValue::Real64(emissions.pm10.saved),
        ],
    )
    .await?;

    let costs = &indexes.costs;
    db.exec_raw_params(
        queries::UPSERT_COST,
        &[
            DatabaseValue::Int64(segment_id),
            DatabaseValue::Real64(costs.fuel_cost),
            DatabaseValue::Real64(costs.time_cost),
            DatabaseValue::Real64(costs.depreciation_cost),
            DatabaseValue::Real64(costs.operation_cost),
            DatabaseValue::Real64(costs.total_cost),
        ],
    )
    .await?;

    db.exec_raw_params(
        queries::UPSERT_HEALTH,
        &[
            DatabaseValue::Int64(segment_id),
            DatabaseValue::Real64(indexes.health.calories_consumed),
        ],
    )
    .await?;

    Ok(())
}
