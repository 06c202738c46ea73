#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Competition and leaderboard types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// What a competition ranks its participants by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrizeCriterion {
    SavedSo2,
    SavedNox,
    SavedCo2,
    SavedCo,
    SavedPm10,
    ConsumedCalories,
    BikeUsageFrequency,
    PublicTransportUsageFrequency,
    BikeDistance,
    SustainableMeansDistance,
}

impl PrizeCriterion {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::SavedSo2,
            Self::SavedNox,
            Self::SavedCo2,
            Self::SavedCo,
            Self::SavedPm10,
            Self::ConsumedCalories,
            Self::BikeUsageFrequency,
            Self::PublicTransportUsageFrequency,
            Self::BikeDistance,
            Self::SustainableMeansDistance,
        ]
    }

    /// Human-readable label.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SavedSo2 => "saved SO2 emissions",
            Self::SavedNox => "saved NOx emissions",
            Self::SavedCo2 => "saved CO2 emissions",
            Self::SavedCo => "saved CO emissions",
            Self::SavedPm10 => "saved PM10 emissions",
            Self::ConsumedCalories => "consumed calories",
            Self::BikeUsageFrequency => "bike usage frequency",
            Self::PublicTransportUsageFrequency => "public transport usage frequency",
            Self::BikeDistance => "bike distance",
            Self::SustainableMeansDistance => "sustainable means distance",
        }
    }
}

/// Participant age bracket. String forms match the stored values.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AgeRange {
    #[serde(rename = "< 19")]
    #[strum(serialize = "< 19")]
    NineteenOrYounger,
    #[serde(rename = "19 - 30")]
    #[strum(serialize = "19 - 30")]
    NineteenToThirty,
    #[serde(rename = "30- 65")]
    #[strum(serialize = "30- 65")]
    ThirtyToSixtyFive,
    #[serde(rename = "65+")]
    #[strum(serialize = "65+")]
    OlderThanSixtyFive,
}

/// A time-boxed, multi-criterion contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub id: i64,
    pub name: String,
    pub criteria: Vec<PrizeCriterion>,
    /// How many top participants win.
    pub winner_threshold: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Eligible age groups. Empty means everyone.
    pub age_groups: Vec<AgeRange>,
    /// Area (`GeoJSON`) in which tracks must lie to count. `None` means
    /// everywhere.
    pub region_of_interest: Option<String>,
}

impl Competition {
    /// Maximum number of participants fetched per criterion board.
    #[must_use]
    pub fn board_limit(&self) -> usize {
        self.criteria.len() * self.winner_threshold as usize
    }

    /// Whether the competition ended before `now`.
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }
}

/// One participant's standing on one criterion board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorInfo {
    /// Ranking points awarded for this board.
    pub points: f64,
    pub user_id: i64,
    pub age_range: Option<AgeRange>,
    /// Raw value of the criterion (kg saved, rides, ...).
    pub absolute_score: f64,
}

/// One ranked criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionBoard {
    pub criterion: PrizeCriterion,
    pub competitors: Vec<CompetitorInfo>,
}

/// A participant on the consolidated leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: i64,
    /// Summed board points divided by the number of boards.
    pub points: f64,
    /// Absolute scores summed over all boards.
    pub absolute_score: f64,
    /// Absolute score per criterion.
    pub criteria_points: BTreeMap<PrizeCriterion, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: i64,
    /// 1-based.
    pub rank: u32,
}

/// Outcome of closing one competition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionResult {
    pub competition: Competition,
    pub winners: Vec<Winner>,
    pub leaderboard: Vec<LeaderboardEntry>,
}
