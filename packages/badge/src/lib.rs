#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Badge engine.
//!
//! After each valid track, [`update_badges`] re-evaluates the progress of
//! every badge its owner has not earned yet. A badge is awarded once its
//! progress reaches the target and is never revoked, so running the engine
//! twice for the same track changes nothing.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Datelike as _, Days, NaiveDate, NaiveTime, Utc};
use mobility_badge_models::{Badge, BadgeCategory, BadgeName, BadgeUpdate};
use mobility_track_models::{TrackRecord, VehicleMode};

/// Errors that can occur while updating badges.
#[derive(Debug, thiserror::Error)]
pub enum BadgeError {
    /// No track exists with this id.
    #[error("Track {track_id} not found")]
    TrackNotFound {
        /// The requested track.
        track_id: i64,
    },

    /// Invalid tracks never count towards badges.
    #[error("Track {track_id} is not valid")]
    InvalidTrack {
        /// The requested track.
        track_id: i64,
    },

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Historical per-user queries and badge persistence.
///
/// All queries only consider valid tracks.
#[async_trait]
pub trait BadgeStore: Send + Sync {
    /// Loads a track with its segments.
    async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, BadgeError>;

    /// Every badge of a user.
    async fn user_badges(&self, user_id: i64) -> Result<Vec<Badge>, BadgeError>;

    /// Dates (`%Y-%m-%d`) within `[start, end]` on which the user created
    /// at least one track.
    async fn track_dates(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<String>, BadgeError>;

    /// Number of tracks with at least one segment on one of `modes`,
    /// optionally restricted to tracks created within `[start, end)`.
    async fn count_rides(
        &self,
        user_id: i64,
        modes: &[VehicleMode],
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<u64, BadgeError>;

    /// Total length in meters of the user's segments on `modes`.
    async fn total_distance(&self, user_id: i64, modes: &[VehicleMode]) -> Result<f64, BadgeError>;

    /// Total CO2 saved by the user, in grams.
    async fn total_co2_saved(&self, user_id: i64) -> Result<f64, BadgeError>;

    /// Total calories consumed by the user.
    async fn total_calories(&self, user_id: i64) -> Result<f64, BadgeError>;

    /// Persists badge progress and awards atomically.
    async fn save_badges(&self, updates: &[BadgeUpdate]) -> Result<(), BadgeError>;
}

/// Days before the track date that must also have tracks.
const fn data_collector_lookback_days(name: BadgeName) -> u64 {
    match name {
        BadgeName::DataCollectorLevel1 => 6,
        BadgeName::DataCollectorLevel2 => 13,
        BadgeName::DataCollectorLevel3 => 29,
        _ => 0,
    }
}

/// Days before the track date whose week opens the counting window.
const fn biker_offset_days(name: BadgeName) -> u64 {
    match name {
        BadgeName::BikerLevel2 => 7,
        BadgeName::BikerLevel3 => 21,
        _ => 0,
    }
}

/// Start of the Monday-based week containing `at`, and start of the next
/// week.
#[must_use]
pub fn week_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = at.date_naive();
    let monday = date
        .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(date);
    let start = monday.and_time(NaiveTime::MIN).and_utc();
    let end = monday
        .checked_add_days(Days::new(7))
        .map_or(DateTime::<Utc>::MAX_UTC, |d| d.and_time(NaiveTime::MIN).and_utc());
    (start, end)
}

async fn data_collector_progress(
    store: &dyn BadgeStore,
    badge: &Badge,
    track: &TrackRecord,
) -> Result<f64, BadgeError> {
    let end = track.created_at.date_naive();
    let start = end
        .checked_sub_days(Days::new(data_collector_lookback_days(badge.name)))
        .unwrap_or(end);
    let collected = store.track_dates(track.owner_id, start, end).await?;

    let every_day = start
        .iter_days()
        .take_while(|day| *day <= end)
        .all(|day| collected.contains(&day.format("%Y-%m-%d").to_string()));
    Ok(if every_day { badge.target } else { 0.0 })
}

#[allow(clippy::cast_precision_loss)]
async fn biker_progress(
    store: &dyn BadgeStore,
    badge: &Badge,
    track: &TrackRecord,
) -> Result<f64, BadgeError> {
    if !track.uses_any(&[VehicleMode::Bike]) {
        return Ok(0.0);
    }
    let (_, end) = week_bounds(track.created_at);
    let reference = track
        .created_at
        .checked_sub_days(Days::new(biker_offset_days(badge.name)))
        .unwrap_or(track.created_at);
    let (start, _) = week_bounds(reference);

    let rides = store
        .count_rides(track.owner_id, &[VehicleMode::Bike], Some((start, end)))
        .await?;
    Ok(rides as f64)
}

#[allow(clippy::cast_precision_loss)]
async fn badge_progress(
    store: &dyn BadgeStore,
    badge: &Badge,
    track: &TrackRecord,
) -> Result<Option<f64>, BadgeError> {
    let user_id = track.owner_id;
    let progress = match badge.name.category() {
        BadgeCategory::NewUser | BadgeCategory::MoneySaver => return Ok(None),
        BadgeCategory::DataCollector => data_collector_progress(store, badge, track).await?,
        BadgeCategory::Biker => biker_progress(store, badge, track).await?,
        BadgeCategory::BikeSurfer => {
            store.total_distance(user_id, &[VehicleMode::Bike]).await? / 1_000.0
        }
        BadgeCategory::TplSurfer => {
            store.total_distance(user_id, &[VehicleMode::Bus]).await? / 1_000.0
        }
        BadgeCategory::MultiSurfer => {
            store
                .total_distance(user_id, VehicleMode::sustainable())
                .await?
                / 1_000.0
        }
        BadgeCategory::Ecologist => store.total_co2_saved(user_id).await? / 1_000.0,
        BadgeCategory::PublicMobility => store
            .count_rides(user_id, VehicleMode::public_transports(), None)
            .await? as f64,
        BadgeCategory::Healthy => store.total_calories(user_id).await?,
    };
    Ok(Some(progress))
}

/// Re-evaluates the owner's pending badges after `track_id` was processed.
///
/// Returns the updates that were persisted. Progress is recomputed from
/// the stored tracks each time, so windowed badges can fall back. Acquired
/// badges are left untouched.
///
/// # Errors
///
/// * [`BadgeError::TrackNotFound`] if the track does not exist
/// * [`BadgeError::InvalidTrack`] if the track failed validation
/// * [`BadgeError::Storage`] if a query or the final save fails
pub async fn update_badges(
    store: &dyn BadgeStore,
    track_id: i64,
) -> Result<Vec<BadgeUpdate>, BadgeError> {
    let track = store
        .load_track(track_id)
        .await?
        .ok_or(BadgeError::TrackNotFound { track_id })?;
    if !track.is_valid {
        return Err(BadgeError::InvalidTrack { track_id });
    }

    let badges = store.user_badges(track.owner_id).await?;
    let mut updates = Vec::new();

    for badge in badges.iter().filter(|b| !b.acquired && !b.name.is_unhandled()) {
        log::debug!("Handling badge {}", badge.name);
        let Some(progress) = badge_progress(store, badge, &track).await? else {
            continue;
        };
        let acquired = progress >= badge.target;
        if acquired {
            log::info!("Awarding badge {} to user {}", badge.name, track.owner_id);
        }
        updates.push(BadgeUpdate {
            badge_id: badge.id,
            name: badge.name,
            progress,
            acquired,
        });
    }

    store.save_badges(&updates).await?;
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chrono::{TimeDelta, TimeZone as _};
    use mobility_track_models::SegmentRecord;

    use super::*;

    struct MemoryStore {
        tracks: Vec<TrackRecord>,
        badges: Mutex<BTreeMap<i64, Badge>>,
        co2_saved: f64,
        calories: f64,
    }

    impl MemoryStore {
        fn new(tracks: Vec<TrackRecord>, badges: Vec<Badge>) -> Self {
            Self {
                tracks,
                badges: Mutex::new(badges.into_iter().map(|b| (b.id, b)).collect()),
                co2_saved: 0.0,
                calories: 0.0,
            }
        }

        fn badge(&self, id: i64) -> Badge {
            self.badges.lock().unwrap()[&id].clone()
        }
    }

    #[async_trait]
    impl BadgeStore for MemoryStore {
        async fn load_track(&self, track_id: i64) -> Result<Option<TrackRecord>, BadgeError> {
            Ok(self.tracks.iter().find(|t| t.id == track_id).cloned())
        }

        async fn user_badges(&self, _user_id: i64) -> Result<Vec<Badge>, BadgeError> {
            Ok(self.badges.lock().unwrap().values().cloned().collect())
        }

        async fn track_dates(
            &self,
            user_id: i64,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<BTreeSet<String>, BadgeError> {
            Ok(self
                .tracks
                .iter()
                .filter(|t| t.owner_id == user_id && t.is_valid)
                .map(|t| t.created_at.date_naive())
                .filter(|d| *d >= start && *d <= end)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect())
        }

        async fn count_rides(
            &self,
            user_id: i64,
            modes: &[VehicleMode],
            window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        ) -> Result<u64, BadgeError> {
            Ok(self
                .tracks
                .iter()
                .filter(|t| t.owner_id == user_id && t.is_valid && t.uses_any(modes))
                .filter(|t| window.is_none_or(|(s, e)| t.created_at >= s && t.created_at < e))
                .count() as u64)
        }

        async fn total_distance(
            &self,
            user_id: i64,
            modes: &[VehicleMode],
        ) -> Result<f64, BadgeError> {
            Ok(self
                .tracks
                .iter()
                .filter(|t| t.owner_id == user_id && t.is_valid)
                .flat_map(|t| &t.segments)
                .filter(|s| modes.contains(&s.vehicle_mode))
                .map(|s| s.length)
                .sum())
        }

        async fn total_co2_saved(&self, _user_id: i64) -> Result<f64, BadgeError> {
            Ok(self.co2_saved)
        }

        async fn total_calories(&self, _user_id: i64) -> Result<f64, BadgeError> {
            Ok(self.calories)
        }

        async fn save_badges(&self, updates: &[BadgeUpdate]) -> Result<(), BadgeError> {
            let mut badges = self.badges.lock().unwrap();
            for update in updates {
                if let Some(badge) = badges.get_mut(&update.badge_id) {
                    badge.progress = update.progress;
                    badge.acquired = badge.acquired || update.acquired;
                }
            }
            Ok(())
        }
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 4, 1, 10, 0, 0).unwrap() + TimeDelta::days(n)
    }

    fn track(id: i64, created_at: DateTime<Utc>, mode: VehicleMode, length: f64) -> TrackRecord {
        TrackRecord {
            id,
            owner_id: 1,
            created_at,
            session_id: id,
            is_valid: true,
            validation_error: String::new(),
            aggregates: None,
            segments: vec![SegmentRecord {
                id: id * 10,
                vehicle_mode: mode,
                length,
                duration: 600.0,
            }],
        }
    }

    fn badge(id: i64, name: BadgeName, target: f64) -> Badge {
        Badge {
            id,
            name,
            acquired: false,
            target,
            progress: 0.0,
        }
    }

    #[tokio::test]
    async fn data_collector_awarded_after_seven_consecutive_days() {
        let tracks = (0..7).map(|n| track(n + 1, day(n), VehicleMode::Foot, 500.0)).collect();
        let store = MemoryStore::new(tracks, vec![badge(1, BadgeName::DataCollectorLevel1, 7.0)]);

        let updates = update_badges(&store, 7).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].acquired);
        assert!((store.badge(1).progress - 7.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn data_collector_not_awarded_with_a_missing_day() {
        let tracks = (0..7)
            .filter(|n| *n != 3)
            .map(|n| track(n + 1, day(n), VehicleMode::Foot, 500.0))
            .collect();
        let store = MemoryStore::new(tracks, vec![badge(1, BadgeName::DataCollectorLevel1, 7.0)]);

        let updates = update_badges(&store, 7).await.unwrap();
        assert!(!updates[0].acquired);
        assert!(store.badge(1).progress.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn award_is_idempotent() {
        let tracks = vec![
            track(1, day(0), VehicleMode::Bike, 30_000.0),
            track(2, day(1), VehicleMode::Bike, 30_000.0),
        ];
        let store = MemoryStore::new(
            tracks,
            vec![
                badge(1, BadgeName::BikeSurferLevel1, 50.0),
                badge(2, BadgeName::BikeSurferLevel2, 500.0),
            ],
        );

        let first = update_badges(&store, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(store.badge(1).acquired);
        assert!(!store.badge(2).acquired);

        let second = update_badges(&store, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].badge_id, 2);
        assert!(store.badge(1).acquired);
        assert!((store.badge(2).progress - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn biker_counts_rides_in_week_window() {
        // 2019-04-01 is a Monday.
        let tracks = vec![
            track(1, day(-8), VehicleMode::Bike, 1_000.0),
            track(2, day(-1), VehicleMode::Bike, 1_000.0),
            track(3, day(0), VehicleMode::Bike, 1_000.0),
            track(4, day(2), VehicleMode::Bike, 1_000.0),
            track(5, day(3), VehicleMode::Car, 1_000.0),
        ];
        let store = MemoryStore::new(
            tracks,
            vec![
                badge(1, BadgeName::BikerLevel1, 10.0),
                badge(2, BadgeName::BikerLevel2, 10.0),
            ],
        );

        update_badges(&store, 4).await.unwrap();
        assert!((store.badge(1).progress - 2.0).abs() < f64::EPSILON);
        assert!((store.badge(2).progress - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn biker_progress_follows_the_current_week() {
        let store = MemoryStore::new(
            vec![
                track(1, day(0), VehicleMode::Bike, 1_000.0),
                track(2, day(1), VehicleMode::Bike, 1_000.0),
                track(3, day(14), VehicleMode::Bike, 1_000.0),
            ],
            vec![badge(1, BadgeName::BikerLevel1, 3.0)],
        );

        update_badges(&store, 2).await.unwrap();
        assert!((store.badge(1).progress - 2.0).abs() < f64::EPSILON);

        let updates = update_badges(&store, 3).await.unwrap();
        assert!((updates[0].progress - 1.0).abs() < f64::EPSILON);
        assert!((store.badge(1).progress - 1.0).abs() < f64::EPSILON);
        assert!(!store.badge(1).acquired);
    }

    #[tokio::test]
    async fn acquired_badge_is_kept_when_the_window_moves_on() {
        let store = MemoryStore::new(
            vec![
                track(1, day(0), VehicleMode::Bike, 1_000.0),
                track(2, day(14), VehicleMode::Bike, 1_000.0),
            ],
            vec![badge(1, BadgeName::BikerLevel1, 1.0)],
        );

        assert!(update_badges(&store, 1).await.unwrap()[0].acquired);
        assert!(update_badges(&store, 2).await.unwrap().is_empty());
        assert!(store.badge(1).acquired);
    }

    #[tokio::test]
    async fn biker_ignores_tracks_without_bike() {
        let tracks = vec![
            track(1, day(0), VehicleMode::Bike, 1_000.0),
            track(2, day(1), VehicleMode::Foot, 1_000.0),
        ];
        let store = MemoryStore::new(tracks, vec![badge(1, BadgeName::BikerLevel1, 1.0)]);
        let updates = update_badges(&store, 2).await.unwrap();
        assert!(updates[0].progress.abs() < f64::EPSILON);
        assert!(!updates[0].acquired);
    }

    #[tokio::test]
    async fn unit_conversions_and_unhandled_badges() {
        let tracks = vec![track(1, day(0), VehicleMode::Bus, 1_000.0)];
        let mut store = MemoryStore::new(
            tracks,
            vec![
                badge(1, BadgeName::EcologistLevel1, 2.0),
                badge(2, BadgeName::HealthyLevel1, 100.0),
                badge(3, BadgeName::PublicMobilityLevel1, 1.0),
                badge(4, BadgeName::MoneySaverLevel1, 1.0),
                badge(5, BadgeName::NewUser, 0.0),
            ],
        );
        store.co2_saved = 2_500.0;
        store.calories = 42.0;

        let updates = update_badges(&store, 1).await.unwrap();
        assert_eq!(updates.len(), 3);
        assert!(store.badge(1).acquired);
        assert!((store.badge(1).progress - 2.5).abs() < 1e-12);
        assert!(!store.badge(2).acquired);
        assert!(store.badge(3).acquired);
        assert!(!store.badge(4).acquired);
        assert!(!store.badge(5).acquired);
    }

    #[tokio::test]
    async fn invalid_track_is_rejected() {
        let mut t = track(1, day(0), VehicleMode::Bike, 1_000.0);
        t.is_valid = false;
        let store = MemoryStore::new(vec![t], vec![badge(1, BadgeName::BikerLevel1, 1.0)]);
        assert!(matches!(
            update_badges(&store, 1).await,
            Err(BadgeError::InvalidTrack { track_id: 1 })
        ));
    }

    #[test]
    fn week_starts_on_monday() {
        let wednesday = Utc.with_ymd_and_hms(2019, 4, 3, 15, 30, 0).unwrap();
        let (start, end) = week_bounds(wednesday);
        assert_eq!(start, Utc.with_ymd_and_hms(2019, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2019, 4, 8, 0, 0, 0).unwrap());
    }
}
