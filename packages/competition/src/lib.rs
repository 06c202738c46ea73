#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Competition closing and prize assignment.
//!
//! Meant to run on a schedule. [`calculate_prizes`] picks every open
//! competition whose end date has passed, ranks participants on each of its
//! criteria, merges the per-criterion boards into one leaderboard and
//! stores the winners together with a snapshot of that leaderboard.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mobility_competition_models::{
    Competition, CompetitionResult, CompetitorInfo, CriterionBoard, LeaderboardEntry,
    PrizeCriterion, Winner,
};

/// Errors that can occur while closing competitions.
#[derive(Debug, thiserror::Error)]
pub enum CompetitionError {
    /// The leaderboard snapshot could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Competition queries and persistence.
#[async_trait]
pub trait CompetitionStore: Send + Sync {
    /// Competitions that started before `now` and have no winners yet.
    async fn open_competitions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Competition>, CompetitionError>;

    /// Best participants on one criterion, honoring the competition's time
    /// window, age groups and region. At most `limit` entries, best first.
    async fn ranking(
        &self,
        competition: &Competition,
        criterion: PrizeCriterion,
        limit: usize,
    ) -> Result<Vec<CompetitorInfo>, CompetitionError>;

    /// Absolute score of one user on one criterion within the competition
    /// window.
    async fn user_score(
        &self,
        competition: &Competition,
        criterion: PrizeCriterion,
        user_id: i64,
    ) -> Result<f64, CompetitionError>;

    /// Stores the winners and the leaderboard snapshot and closes the
    /// competition, atomically.
    async fn close_competition(
        &self,
        competition_id: i64,
        winners: &[Winner],
        leaderboard: &serde_json::Value,
    ) -> Result<(), CompetitionError>;
}

/// Merges per-criterion boards into one leaderboard.
///
/// A user's score is the sum of their points over all boards divided by the
/// number of boards; missing from a board counts as zero. Absolute scores
/// are summed as they are. Entries are
/// sorted best first, ties broken by ascending user id.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn consolidate_leaderboards(boards: &[CriterionBoard]) -> Vec<LeaderboardEntry> {
    let participants: BTreeSet<i64> = boards
        .iter()
        .flat_map(|b| b.competitors.iter().map(|c| c.user_id))
        .collect();
    let divisor = boards.len() as f64;

    let mut leaderboard: Vec<LeaderboardEntry> = participants
        .into_iter()
        .map(|user| {
            let mut points = 0.0;
            let mut absolute_score = 0.0;
            let mut criteria_points = BTreeMap::new();
            for board in boards {
                let entry = board.competitors.iter().find(|c| c.user_id == user);
                let score = entry.map_or(0.0, |c| c.absolute_score);
                points += entry.map_or(0.0, |c| c.points);
                absolute_score += score;
                criteria_points.insert(board.criterion, score);
            }
            LeaderboardEntry {
                user,
                points: points / divisor,
                absolute_score,
                criteria_points,
            }
        })
        .collect();

    leaderboard.sort_by(|a, b| b.points.total_cmp(&a.points).then(a.user.cmp(&b.user)));
    leaderboard
}

/// The top `winner_threshold` entries, ranked from 1.
#[must_use]
pub fn select_winners(competition: &Competition, leaderboard: &[LeaderboardEntry]) -> Vec<Winner> {
    leaderboard
        .iter()
        .take(competition.winner_threshold as usize)
        .zip(1..)
        .map(|(entry, rank)| Winner {
            user_id: entry.user,
            rank,
        })
        .collect()
}

/// Fetches one board per criterion and consolidates them.
///
/// # Errors
///
/// Returns [`CompetitionError::Storage`] if a ranking query fails.
pub async fn leaderboard(
    store: &dyn CompetitionStore,
    competition: &Competition,
) -> Result<Vec<LeaderboardEntry>, CompetitionError> {
    let limit = competition.board_limit();
    let mut boards = Vec::with_capacity(competition.criteria.len());
    for criterion in &competition.criteria {
        let competitors = store.ranking(competition, *criterion, limit).await?;
        log::debug!(
            "Competition {} board {criterion}: {} competitors",
            competition.id,
            competitors.len()
        );
        boards.push(CriterionBoard {
            criterion: *criterion,
            competitors,
        });
    }
    Ok(consolidate_leaderboards(&boards))
}

/// Closes every open competition that ended before `now`.
///
/// # Errors
///
/// Returns [`CompetitionError`] on the first competition that fails.
/// Competitions closed before it stay closed.
pub async fn calculate_prizes(
    store: &dyn CompetitionStore,
    now: DateTime<Utc>,
) -> Result<Vec<CompetitionResult>, CompetitionError> {
    let open = store.open_competitions(now).await?;
    let expired: Vec<Competition> = open.into_iter().filter(|c| c.has_ended(now)).collect();
    log::info!("{} expired competitions to close", expired.len());

    let mut results = Vec::with_capacity(expired.len());
    for competition in expired {
        log::info!("Handling competition {} ({})", competition.id, competition.name);
        let leaderboard = leaderboard(store, &competition).await?;
        let winners = select_winners(&competition, &leaderboard);
        for winner in &winners {
            log::info!(
                "User {} wins rank {} of competition {}",
                winner.user_id,
                winner.rank,
                competition.id
            );
        }

        let snapshot = serde_json::to_value(&leaderboard)?;
        store
            .close_competition(competition.id, &winners, &snapshot)
            .await?;
        results.push(CompetitionResult {
            competition,
            winners,
            leaderboard,
        });
    }
    Ok(results)
}

/// Absolute score of `user_id` for every criterion of a competition.
///
/// # Errors
///
/// Returns [`CompetitionError::Storage`] if a score query fails.
pub async fn user_scores(
    store: &dyn CompetitionStore,
    competition: &Competition,
    user_id: i64,
) -> Result<BTreeMap<PrizeCriterion, f64>, CompetitionError> {
    let mut scores = BTreeMap::new();
    for criterion in &competition.criteria {
        let score = store.user_score(competition, *criterion, user_id).await?;
        scores.insert(*criterion, score);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeDelta, TimeZone as _};

    use super::*;

    fn competitor(user_id: i64, points: f64, absolute_score: f64) -> CompetitorInfo {
        CompetitorInfo {
            points,
            user_id,
            age_range: None,
            absolute_score,
        }
    }

    fn board(criterion: PrizeCriterion, competitors: Vec<CompetitorInfo>) -> CriterionBoard {
        CriterionBoard {
            criterion,
            competitors,
        }
    }

    fn competition(id: i64, end: DateTime<Utc>, winner_threshold: u32) -> Competition {
        Competition {
            id,
            name: format!("competition {id}"),
            criteria: vec![PrizeCriterion::SavedCo2, PrizeCriterion::BikeDistance],
            winner_threshold,
            start_date: end - TimeDelta::days(30),
            end_date: end,
            age_groups: Vec::new(),
            region_of_interest: None,
        }
    }

    #[test]
    fn two_criteria_scores_are_averaged() {
        let boards = vec![
            board(
                PrizeCriterion::SavedCo2,
                vec![competitor(1, 3.0, 30.0), competitor(2, 0.0, 0.0)],
            ),
            board(
                PrizeCriterion::BikeDistance,
                vec![competitor(1, 1.0, 5.0), competitor(2, 2.0, 9.0)],
            ),
        ];
        let leaderboard = consolidate_leaderboards(&boards);
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].user, 1);
        assert!((leaderboard[0].points - 2.0).abs() < f64::EPSILON);
        assert_eq!(leaderboard[1].user, 2);
        assert!((leaderboard[1].points - 1.0).abs() < f64::EPSILON);
        assert!((leaderboard[1].criteria_points[&PrizeCriterion::BikeDistance] - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_competitor_scores_zero_on_that_board() {
        let boards = vec![
            board(PrizeCriterion::SavedCo2, vec![competitor(1, 4.0, 1.0)]),
            board(PrizeCriterion::BikeDistance, vec![competitor(2, 4.0, 1.0)]),
        ];
        let leaderboard = consolidate_leaderboards(&boards);
        for entry in &leaderboard {
            assert!((entry.points - 2.0).abs() < f64::EPSILON);
            assert_eq!(entry.criteria_points.len(), 2);
        }
    }

    #[test]
    fn absolute_scores_are_summed_across_boards() {
        let boards = vec![
            board(
                PrizeCriterion::SavedCo2,
                vec![competitor(1, 2.0, 120.0), competitor(2, 1.0, 80.0)],
            ),
            board(PrizeCriterion::BikeDistance, vec![competitor(1, 1.0, 7.5)]),
            board(
                PrizeCriterion::BikeUsageFrequency,
                vec![competitor(2, 2.0, 4.0), competitor(1, 1.0, 3.0)],
            ),
        ];
        let leaderboard = consolidate_leaderboards(&boards);
        let by_user = |user: i64| leaderboard.iter().find(|e| e.user == user).unwrap();

        assert!((by_user(1).absolute_score - 130.5).abs() < 1e-9);
        assert!((by_user(2).absolute_score - 84.0).abs() < 1e-9);
        assert!(by_user(2).criteria_points[&PrizeCriterion::BikeDistance].abs() < f64::EPSILON);
    }

    #[test]
    fn ties_are_broken_by_user_id() {
        let boards = vec![board(
            PrizeCriterion::SavedCo2,
            vec![competitor(9, 1.0, 1.0), competitor(3, 1.0, 1.0), competitor(5, 2.0, 1.0)],
        )];
        let users: Vec<i64> = consolidate_leaderboards(&boards)
            .iter()
            .map(|e| e.user)
            .collect();
        assert_eq!(users, [5, 3, 9]);
    }

    #[test]
    fn leaderboard_is_non_increasing() {
        let boards = vec![
            board(
                PrizeCriterion::SavedCo2,
                (1..20).map(|u| competitor(u, f64::from((u * 7 % 11) as i32), 0.0)).collect(),
            ),
            board(
                PrizeCriterion::BikeDistance,
                (5..25).map(|u| competitor(u, f64::from((u * 3 % 13) as i32), 0.0)).collect(),
            ),
        ];
        let leaderboard = consolidate_leaderboards(&boards);
        assert!(leaderboard.windows(2).all(|w| w[0].points >= w[1].points));
    }

    struct MemoryStore {
        competitions: Vec<Competition>,
        boards: BTreeMap<PrizeCriterion, Vec<CompetitorInfo>>,
        closed: Mutex<Vec<(i64, Vec<Winner>, serde_json::Value)>>,
    }

    #[async_trait]
    impl CompetitionStore for MemoryStore {
        async fn open_competitions(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<Competition>, CompetitionError> {
            let closed = self.closed.lock().unwrap();
            Ok(self
                .competitions
                .iter()
                .filter(|c| c.start_date < now && !closed.iter().any(|(id, _, _)| *id == c.id))
                .cloned()
                .collect())
        }

        async fn ranking(
            &self,
            _competition: &Competition,
            criterion: PrizeCriterion,
            limit: usize,
        ) -> Result<Vec<CompetitorInfo>, CompetitionError> {
            Ok(self
                .boards
                .get(&criterion)
                .map(|b| b.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }

        async fn user_score(
            &self,
            _competition: &Competition,
            criterion: PrizeCriterion,
            user_id: i64,
        ) -> Result<f64, CompetitionError> {
            Ok(self
                .boards
                .get(&criterion)
                .and_then(|b| b.iter().find(|c| c.user_id == user_id))
                .map_or(0.0, |c| c.absolute_score))
        }

        async fn close_competition(
            &self,
            competition_id: i64,
            winners: &[Winner],
            leaderboard: &serde_json::Value,
        ) -> Result<(), CompetitionError> {
            self.closed
                .lock()
                .unwrap()
                .push((competition_id, winners.to_vec(), leaderboard.clone()));
            Ok(())
        }
    }

    fn store(now: DateTime<Utc>) -> MemoryStore {
        MemoryStore {
            competitions: vec![
                competition(1, now - TimeDelta::days(1), 1),
                competition(2, now + TimeDelta::days(1), 1),
            ],
            boards: BTreeMap::from([
                (
                    PrizeCriterion::SavedCo2,
                    vec![competitor(10, 3.0, 300.0), competitor(20, 0.0, 0.0)],
                ),
                (
                    PrizeCriterion::BikeDistance,
                    vec![competitor(20, 2.0, 40.0), competitor(10, 1.0, 10.0)],
                ),
            ]),
            closed: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn closes_only_expired_competitions() {
        let now = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
        let store = store(now);

        let results = calculate_prizes(&store, now).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].competition.id, 1);
        assert_eq!(results[0].winners, [Winner { user_id: 10, rank: 1 }]);

        let closed = store.closed.lock().unwrap();
        assert_eq!(closed.len(), 1);
        let snapshot = &closed[0].2;
        assert_eq!(snapshot[0]["user"], 10);
        assert_eq!(snapshot[0]["points"], 2.0);
        assert_eq!(snapshot[0]["absolute_score"], 310.0);
        assert_eq!(snapshot[1]["absolute_score"], 40.0);
        assert_eq!(snapshot[1]["criteria_points"]["bike_distance"], 40.0);
    }

    #[tokio::test]
    async fn closed_competitions_are_not_closed_twice() {
        let now = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
        let store = store(now);
        calculate_prizes(&store, now).await.unwrap();
        let second = calculate_prizes(&store, now).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_scores_cover_every_criterion() {
        let now = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
        let store = store(now);
        let scores = user_scores(&store, &store.competitions[0], 20).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores[&PrizeCriterion::BikeDistance] - 40.0).abs() < f64::EPSILON);
        assert!(scores[&PrizeCriterion::SavedCo2].abs() < f64::EPSILON);
    }
}
