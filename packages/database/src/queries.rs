//! Named SQL templates, embedded at compile time from `queries/`.
//!
//! Ranking templates contain a `{score}` placeholder filled with the
//! aggregate of the requested [`PrizeCriterion`].

use mobility_competition_models::PrizeCriterion;
use mobility_track_models::VehicleMode;

pub const SELECT_USER_ID: &str = include_str!("../queries/select-user-id.sql");
pub const INSERT_TRACK: &str = include_str!("../queries/insert-track.sql");
pub const INSERT_COLLECTED_POINT: &str = include_str!("../queries/insert-collected-point.sql");
pub const INSERT_SEGMENT: &str = include_str!("../queries/insert-segment.sql");
pub const INSERT_VALIDATION_ERROR: &str = include_str!("../queries/insert-validation-error.sql");
pub const SELECT_TRACK: &str = include_str!("../queries/select-track.sql");
pub const SELECT_TRACK_SEGMENTS: &str = include_str!("../queries/select-track-segments.sql");
pub const SELECT_REGION_OF_INTEREST: &str =
    include_str!("../queries/select-region-of-interest.sql");

pub const UPSERT_EMISSION: &str = include_str!("../queries/upsert-emission.sql");
pub const UPSERT_COST: &str = include_str!("../queries/upsert-cost.sql");
pub const UPSERT_HEALTH: &str = include_str!("../queries/upsert-health.sql");
pub const UPDATE_TRACK_AGGREGATES: &str = include_str!("../queries/update-track-aggregates.sql");

pub const SELECT_USER_BADGES: &str = include_str!("../queries/select-user-badges.sql");
pub const SELECT_TRACK_DATES: &str = include_str!("../queries/select-track-dates.sql");
pub const SELECT_COUNT_RIDES: &str = include_str!("../queries/select-count-rides.sql");
pub const SELECT_TOTAL_DISTANCE: &str = include_str!("../queries/select-total-distance.sql");
pub const SELECT_CO2_SAVED: &str = include_str!("../queries/select-co2-saved.sql");
pub const SELECT_CONSUMED_CALORIES: &str =
    include_str!("../queries/select-consumed-calories.sql");
pub const UPDATE_BADGE: &str = include_str!("../queries/update-badge.sql");

pub const SELECT_OPEN_COMPETITIONS: &str =
    include_str!("../queries/select-open-competitions.sql");
pub const SELECT_CRITERION_RANKING: &str =
    include_str!("../queries/select-criterion-ranking.sql");
pub const SELECT_USER_CRITERION_SCORE: &str =
    include_str!("../queries/select-user-criterion-score.sql");
pub const INSERT_COMPETITION_WINNER: &str =
    include_str!("../queries/insert-competition-winner.sql");
pub const UPDATE_COMPETITION_LEADERBOARD: &str =
    include_str!("../queries/update-competition-leaderboard.sql");

/// SQL aggregate measuring a criterion, and the vehicle modes it counts.
///
/// An empty mode list means every mode.
#[must_use]
pub const fn criterion_score(criterion: PrizeCriterion) -> (&'static str, &'static [VehicleMode]) {
    match criterion {
        PrizeCriterion::SavedSo2 => ("SUM(e.so2_saved)", &[]),
        PrizeCriterion::SavedNox => ("SUM(e.nox_saved)", &[]),
        PrizeCriterion::SavedCo2 => ("SUM(e.co2_saved)", &[]),
        PrizeCriterion::SavedCo => ("SUM(e.co_saved)", &[]),
        PrizeCriterion::SavedPm10 => ("SUM(e.pm10_saved)", &[]),
        PrizeCriterion::ConsumedCalories => ("SUM(h.calories_consumed)", &[]),
        PrizeCriterion::BikeUsageFrequency => ("COUNT(DISTINCT t.id)", &[VehicleMode::Bike]),
        PrizeCriterion::PublicTransportUsageFrequency => {
            ("COUNT(DISTINCT t.id)", VehicleMode::public_transports())
        }
        PrizeCriterion::BikeDistance => ("SUM(s.length)", &[VehicleMode::Bike]),
        PrizeCriterion::SustainableMeansDistance => ("SUM(s.length)", VehicleMode::sustainable()),
    }
}

/// Fills the `{score}` placeholder of a ranking template.
#[must_use]
pub fn with_score(template: &str, criterion: PrizeCriterion) -> String {
    template.replace("{score}", criterion_score(criterion).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_criterion_fills_the_ranking_template() {
        for criterion in PrizeCriterion::all() {
            let sql = with_score(SELECT_CRITERION_RANKING, *criterion);
            assert!(!sql.contains("{score}"), "{criterion}");
        }
    }

    #[test]
    fn frequency_criteria_count_tracks() {
        let sql = with_score(SELECT_USER_CRITERION_SCORE, PrizeCriterion::BikeUsageFrequency);
        assert!(sql.contains("COUNT(DISTINCT t.id)"));
        assert_eq!(
            criterion_score(PrizeCriterion::BikeUsageFrequency).1,
            &[VehicleMode::Bike]
        );
    }

    #[test]
    fn pollutant_criteria_do_not_filter_modes() {
        assert!(criterion_score(PrizeCriterion::SavedNox).1.is_empty());
    }
}
