//! [`CompetitionStore`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use mobility_competition::{CompetitionError, CompetitionStore};
use mobility_competition_models::{
    AgeRange, Competition, CompetitorInfo, PrizeCriterion, Winner,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{DatabaseValue, Row};

use crate::{DbError, PgStore, conversion, join_names, queries, utc};

/// Parses a comma-separated list column, skipping blanks.
fn parse_list<T: std::str::FromStr>(column: &str, value: &str) -> Result<Vec<T>, DbError>
where
    T::Err: std::fmt::Display,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<T>().map_err(|e| conversion(column, e)))
        .collect()
}

fn competition_from_row(row: &Row) -> Result<Competition, DbError> {
    let criteria: String = row
        .to_value("criteria")
        .map_err(|e| conversion("criteria", e))?;
    let age_groups: Option<String> = row.to_value("age_groups").unwrap_or(None);
    let start_date: NaiveDateTime = row
        .to_value("start_date")
        .map_err(|e| conversion("start_date", e))?;
    let end_date: NaiveDateTime = row
        .to_value("end_date")
        .map_err(|e| conversion("end_date", e))?;
    let winner_threshold: i64 = row
        .to_value("winner_threshold")
        .map_err(|e| conversion("winner_threshold", e))?;

    Ok(Competition {
        id: row.to_value("id").map_err(|e| conversion("id", e))?,
        name: row.to_value("name").unwrap_or_default(),
        criteria: parse_list("criteria", &criteria)?,
        winner_threshold: u32::try_from(winner_threshold)
            .map_err(|e| conversion("winner_threshold", e))?,
        start_date: utc(start_date),
        end_date: utc(end_date),
        age_groups: age_groups
            .as_deref()
            .map(|groups| parse_list::<AgeRange>("age_groups", groups))
            .transpose()?
            .unwrap_or_default(),
        region_of_interest: row.to_value("region_of_interest").unwrap_or(None),
    })
}

/// Parameters shared by the ranking and user score templates: window,
/// age groups, modes, region.
fn window_params(competition: &Competition, criterion: PrizeCriterion) -> [DatabaseValue; 5] {
    let (_, modes) = queries::criterion_score(criterion);
    [
        DatabaseValue::DateTime(competition.start_date.naive_utc()),
        DatabaseValue::DateTime(competition.end_date.naive_utc()),
        DatabaseValue::String(join_names(&competition.age_groups)),
        DatabaseValue::String(join_names(modes)),
        competition
            .region_of_interest
            .clone()
            .map_or(DatabaseValue::Null, DatabaseValue::String),
    ]
}

#[async_trait]
impl CompetitionStore for PgStore<'_> {
    async fn open_competitions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Competition>, CompetitionError> {
        let rows = self
            .db
            .query_raw_params(
                queries::SELECT_OPEN_COMPETITIONS,
                &[DatabaseValue::DateTime(now.naive_utc())],
            )
            .await
            .map_err(DbError::from)?;

        let mut competitions = Vec::with_capacity(rows.len());
        for row in &rows {
            competitions.push(competition_from_row(row)?);
        }
        Ok(competitions)
    }

    async fn ranking(
        &self,
        competition: &Competition,
        criterion: PrizeCriterion,
        limit: usize,
    ) -> Result<Vec<CompetitorInfo>, CompetitionError> {
        let [start, end, age_groups, modes, region] = window_params(competition, criterion);
        let sql = queries::with_score(queries::SELECT_CRITERION_RANKING, criterion);
        let rows = self
            .db
            .query_raw_params(
                &sql,
                &[
                    start,
                    end,
                    age_groups,
                    modes,
                    region,
                    DatabaseValue::Int64(i64::try_from(limit).unwrap_or(i64::MAX)),
                ],
            )
            .await
            .map_err(DbError::from)?;

        let mut competitors = Vec::with_capacity(rows.len());
        for row in &rows {
            let age_range: Option<String> = row.to_value("age_range").unwrap_or(None);
            competitors.push(CompetitorInfo {
                points: row.to_value("points").map_err(|e| conversion("points", e))?,
                user_id: row
                    .to_value("user_id")
                    .map_err(|e| conversion("user_id", e))?,
                age_range: age_range.and_then(|a| a.parse().ok()),
                absolute_score: row
                    .to_value("absolute_score")
                    .map_err(|e| conversion("absolute_score", e))?,
            });
        }
        Ok(competitors)
    }

    async fn user_score(
        &self,
        competition: &Competition,
        criterion: PrizeCriterion,
        user_id: i64,
    ) -> Result<f64, CompetitionError> {
        let [start, end, _, modes, region] = window_params(competition, criterion);
        let sql = queries::with_score(queries::SELECT_USER_CRITERION_SCORE, criterion);
        let rows = self
            .db
            .query_raw_params(
                &sql,
                &[start, end, DatabaseValue::Int64(user_id), modes, region],
            )
            .await
            .map_err(DbError::from)?;

        Ok(rows
            .first()
            .map(|row| {
                row.to_value("absolute_score")
                    .map_err(|e| conversion("absolute_score", e))
            })
            .transpose()?
            .unwrap_or(0.0))
    }

    async fn close_competition(
        &self,
        competition_id: i64,
        winners: &[Winner],
        leaderboard: &serde_json::Value,
    ) -> Result<(), CompetitionError> {
        let txn = self.db.begin_transaction().await.map_err(DbError::from)?;
        for winner in winners {
            txn.exec_raw_params(
                queries::INSERT_COMPETITION_WINNER,
                &[
                    DatabaseValue::Int64(competition_id),
                    DatabaseValue::Int64(winner.user_id),
                    DatabaseValue::Int64(i64::from(winner.rank)),
                ],
            )
            .await
            .map_err(DbError::from)?;
        }
        txn.exec_raw_params(
            queries::UPDATE_COMPETITION_LEADERBOARD,
            &[
                DatabaseValue::Int64(competition_id),
                DatabaseValue::String(leaderboard.to_string()),
            ],
        )
        .await
        .map_err(DbError::from)?;
        txn.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_columns() {
        let criteria: Vec<PrizeCriterion> =
            parse_list("criteria", "saved_co2, bike_distance,").unwrap();
        assert_eq!(
            criteria,
            [PrizeCriterion::SavedCo2, PrizeCriterion::BikeDistance]
        );

        let groups: Vec<AgeRange> = parse_list("age_groups", "< 19,65+").unwrap();
        assert_eq!(
            groups,
            [AgeRange::NineteenOrYounger, AgeRange::OlderThanSixtyFive]
        );
    }

    #[test]
    fn rejects_unknown_criteria() {
        assert!(parse_list::<PrizeCriterion>("criteria", "fastest_lap").is_err());
    }
}
