#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Badge taxonomy and per-user badge records.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Every badge a user can earn. String forms match the stored badge names.
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
pub enum BadgeName {
    NewUser,
    DataCollectorLevel0,
    DataCollectorLevel1,
    DataCollectorLevel2,
    DataCollectorLevel3,
    BikerLevel1,
    BikerLevel2,
    BikerLevel3,
    PublicMobilityLevel1,
    PublicMobilityLevel2,
    PublicMobilityLevel3,
    BikeSurferLevel1,
    BikeSurferLevel2,
    BikeSurferLevel3,
    TplSurferLevel1,
    TplSurferLevel2,
    TplSurferLevel3,
    MultiSurferLevel1,
    MultiSurferLevel2,
    MultiSurferLevel3,
    EcologistLevel1,
    EcologistLevel2,
    EcologistLevel3,
    HealthyLevel1,
    HealthyLevel2,
    HealthyLevel3,
    MoneySaverLevel1,
    MoneySaverLevel2,
    MoneySaverLevel3,
}

/// Badge families sharing one progress rule.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BadgeCategory {
    NewUser,
    DataCollector,
    Biker,
    PublicMobility,
    BikeSurfer,
    TplSurfer,
    MultiSurfer,
    Ecologist,
    Healthy,
    MoneySaver,
}

impl BadgeName {
    /// Returns all variants of this enum, in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::NewUser,
            Self::DataCollectorLevel0,
            Self::DataCollectorLevel1,
            Self::DataCollectorLevel2,
            Self::DataCollectorLevel3,
            Self::BikerLevel1,
            Self::BikerLevel2,
            Self::BikerLevel3,
            Self::PublicMobilityLevel1,
            Self::PublicMobilityLevel2,
            Self::PublicMobilityLevel3,
            Self::BikeSurferLevel1,
            Self::BikeSurferLevel2,
            Self::BikeSurferLevel3,
            Self::TplSurferLevel1,
            Self::TplSurferLevel2,
            Self::TplSurferLevel3,
            Self::MultiSurferLevel1,
            Self::MultiSurferLevel2,
            Self::MultiSurferLevel3,
            Self::EcologistLevel1,
            Self::EcologistLevel2,
            Self::EcologistLevel3,
            Self::HealthyLevel1,
            Self::HealthyLevel2,
            Self::HealthyLevel3,
            Self::MoneySaverLevel1,
            Self::MoneySaverLevel2,
            Self::MoneySaverLevel3,
        ]
    }

    #[must_use]
    pub const fn category(self) -> BadgeCategory {
        match self {
            Self::NewUser => BadgeCategory::NewUser,
            Self::DataCollectorLevel0
            | Self::DataCollectorLevel1
            | Self::DataCollectorLevel2
            | Self::DataCollectorLevel3 => BadgeCategory::DataCollector,
            Self::BikerLevel1 | Self::BikerLevel2 | Self::BikerLevel3 => BadgeCategory::Biker,
            Self::PublicMobilityLevel1 | Self::PublicMobilityLevel2 | Self::PublicMobilityLevel3 => {
                BadgeCategory::PublicMobility
            }
            Self::BikeSurferLevel1 | Self::BikeSurferLevel2 | Self::BikeSurferLevel3 => {
                BadgeCategory::BikeSurfer
            }
            Self::TplSurferLevel1 | Self::TplSurferLevel2 | Self::TplSurferLevel3 => {
                BadgeCategory::TplSurfer
            }
            Self::MultiSurferLevel1 | Self::MultiSurferLevel2 | Self::MultiSurferLevel3 => {
                BadgeCategory::MultiSurfer
            }
            Self::EcologistLevel1 | Self::EcologistLevel2 | Self::EcologistLevel3 => {
                BadgeCategory::Ecologist
            }
            Self::HealthyLevel1 | Self::HealthyLevel2 | Self::HealthyLevel3 => {
                BadgeCategory::Healthy
            }
            Self::MoneySaverLevel1 | Self::MoneySaverLevel2 | Self::MoneySaverLevel3 => {
                BadgeCategory::MoneySaver
            }
        }
    }

    /// Level within the category (`0` for the entry data collector badge
    /// and for `new_user`).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::NewUser | Self::DataCollectorLevel0 => 0,
            Self::DataCollectorLevel1
            | Self::BikerLevel1
            | Self::PublicMobilityLevel1
            | Self::BikeSurferLevel1
            | Self::TplSurferLevel1
            | Self::MultiSurferLevel1
            | Self::EcologistLevel1
            | Self::HealthyLevel1
            | Self::MoneySaverLevel1 => 1,
            Self::DataCollectorLevel2
            | Self::BikerLevel2
            | Self::PublicMobilityLevel2
            | Self::BikeSurferLevel2
            | Self::TplSurferLevel2
            | Self::MultiSurferLevel2
            | Self::EcologistLevel2
            | Self::HealthyLevel2
            | Self::MoneySaverLevel2 => 2,
            Self::DataCollectorLevel3
            | Self::BikerLevel3
            | Self::PublicMobilityLevel3
            | Self::BikeSurferLevel3
            | Self::TplSurferLevel3
            | Self::MultiSurferLevel3
            | Self::EcologistLevel3
            | Self::HealthyLevel3
            | Self::MoneySaverLevel3 => 3,
        }
    }

    /// Badges whose progress is not evaluated from tracks.
    #[must_use]
    pub const fn is_unhandled(self) -> bool {
        matches!(
            self.category(),
            BadgeCategory::NewUser | BadgeCategory::MoneySaver
        )
    }
}

/// One badge of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub name: BadgeName,
    pub acquired: bool,
    pub target: f64,
    pub progress: f64,
}

/// New progress for a badge, and whether it has just been earned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BadgeUpdate {
    pub badge_id: i64,
    pub name: BadgeName,
    pub progress: f64,
    pub acquired: bool,
}
