//! Pipeline thresholds.
//!
//! [`PipelineConfig`] is built once (from [`Default`] or a TOML file) and
//! passed by reference into [`crate::pipeline::process_points`]. Every
//! section and field is optional in TOML; anything omitted keeps its
//! default value.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, TimeZone as _, Utc};
use mobility_track_models::{ModeTable, VehicleMode};
use serde::{Deserialize, Deserializer};

/// Errors that can occur while loading a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Complete set of thresholds used by the track pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub points: PointFilterConfig,
    pub segmentation: SegmentationConfig,
    pub outliers: OutlierConfig,
    pub filters: SegmentFilterConfig,
    /// Plausibility limits per mode. Modes without an entry are not
    /// validated.
    pub validation: BTreeMap<VehicleMode, SegmentLimits>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            points: PointFilterConfig::default(),
            segmentation: SegmentationConfig::default(),
            outliers: OutlierConfig::default(),
            filters: SegmentFilterConfig::default(),
            validation: BTreeMap::from([
                (VehicleMode::Foot, SegmentLimits::foot()),
                (VehicleMode::Bike, SegmentLimits::bike()),
            ]),
        }
    }
}

impl PipelineConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text does not match the schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded pipeline config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Limits for `mode`, if that mode is validated at all.
    #[must_use]
    pub fn limits_for(&self, mode: VehicleMode) -> Option<&SegmentLimits> {
        self.validation.get(&mode)
    }
}

/// Point-level filtering thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointFilterConfig {
    /// Points with a reported accuracy above this value (meters) are dropped.
    pub accuracy_threshold: f64,
    /// Minimum metric distance (meters) from recently accepted points.
    pub position_threshold: f64,
    /// How many recently accepted points a candidate is compared against.
    pub redundancy_window: usize,
}

impl Default for PointFilterConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: 30.0,
            position_threshold: 2.0,
            redundancy_window: 5,
        }
    }
}

/// When consecutive points stop belonging to the same segment.
///
/// Besides these thresholds, any change of vehicle mode starts a new
/// segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// A gap longer than this many minutes starts a new segment.
    pub minutes_threshold: f64,
    /// A jump longer than this many meters starts a new segment.
    #[serde(deserialize_with = "distance_thresholds")]
    pub distance_thresholds: ModeTable<f64>,
    /// Segments with this many points or fewer are discarded.
    pub min_points: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            minutes_threshold: 5.0,
            distance_thresholds: ModeTable::new(500.0)
                .with(VehicleMode::Foot, 100.0)
                .with(VehicleMode::Bike, 300.0)
                .with(VehicleMode::Bus, 1_000.0)
                .with(VehicleMode::Car, 1_500.0)
                .with(VehicleMode::Motorcycle, 1_500.0)
                .with(VehicleMode::Train, 3_000.0),
            min_points: 2,
        }
    }
}

/// Speed outlier removal. A point is dropped when the speed to its
/// successor exceeds `mean + coefficient * stddev` of its segment's speeds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Standard deviation multiplier of the speed cutoff.
    #[serde(deserialize_with = "outlier_coefficients")]
    pub coefficients: ModeTable<f64>,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            coefficients: ModeTable::new(2.0),
        }
    }
}

/// Segment filters applied after outlier removal: the accepted time range
/// and the minimum segment size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentFilterConfig {
    /// Earliest accepted timestamp (RFC 3339 string in TOML).
    pub temporal_lower_bound: DateTime<Utc>,
    /// Latest accepted timestamp. `None` means the time of processing.
    pub temporal_upper_bound: Option<DateTime<Utc>>,
    /// Segments with this many points or fewer are discarded.
    pub small_segment_threshold: usize,
}

impl Default for SegmentFilterConfig {
    fn default() -> Self {
        Self {
            temporal_lower_bound: Utc
                .with_ymd_and_hms(2018, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            temporal_upper_bound: None,
            small_segment_threshold: 1,
        }
    }
}

/// A per-mode table as written in TOML, where `default` may be left out.
#[derive(Deserialize)]
struct ModeTableOverride<T> {
    default: Option<T>,
    #[serde(flatten)]
    entries: BTreeMap<VehicleMode, T>,
}

/// Reads a per-mode table whose entries replace the built-in ones. A
/// missing `default` keeps `fallback`.
fn mode_table<'de, D, T>(deserializer: D, fallback: T) -> Result<ModeTable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let table = ModeTableOverride::deserialize(deserializer)?;
    Ok(ModeTable {
        default: table.default.unwrap_or(fallback),
        entries: table.entries,
    })
}

fn distance_thresholds<'de, D: Deserializer<'de>>(d: D) -> Result<ModeTable<f64>, D::Error> {
    mode_table(d, SegmentationConfig::default().distance_thresholds.default)
}

fn outlier_coefficients<'de, D: Deserializer<'de>>(d: D) -> Result<ModeTable<f64>, D::Error> {
    mode_table(d, OutlierConfig::default().coefficients.default)
}

/// Physical plausibility limits for one vehicle mode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SegmentLimits {
    /// m/s
    pub average_speed: f64,
    /// m/s
    pub max_speed: f64,
    /// meters
    pub length: f64,
    /// seconds
    pub duration: f64,
}

impl SegmentLimits {
    /// Default walking limits.
    #[must_use]
    pub const fn foot() -> Self {
        Self {
            average_speed: 2.7,
            max_speed: 5.6,
            length: 50_000.0,
            duration: 10.0 * 3_600.0,
        }
    }

    /// Default cycling limits.
    #[must_use]
    pub const fn bike() -> Self {
        Self {
            average_speed: 8.3,
            max_speed: 16.7,
            length: 200_000.0,
            duration: 12.0 * 3_600.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_only_foot_and_bike() {
        let config = PipelineConfig::default();
        assert!(config.limits_for(VehicleMode::Foot).is_some());
        assert!(config.limits_for(VehicleMode::Bike).is_some());
        assert!(config.limits_for(VehicleMode::Car).is_none());
        assert!(config.limits_for(VehicleMode::Train).is_none());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [points]
            accuracy_threshold = 15.0

            [segmentation.distance_thresholds]
            default = 250.0
            car = 2000.0

            [filters]
            temporal_lower_bound = "2019-06-01T00:00:00Z"

            [validation.car]
            average_speed = 40.0
            max_speed = 60.0
            length = 1000000.0
            duration = 86400.0
            "#,
        )
        .unwrap();

        assert!((config.points.accuracy_threshold - 15.0).abs() < f64::EPSILON);
        assert_eq!(config.points.redundancy_window, 5);
        let distances = &config.segmentation.distance_thresholds;
        assert!((distances.value(VehicleMode::Car) - 2_000.0).abs() < f64::EPSILON);
        assert!((distances.value(VehicleMode::Foot) - 250.0).abs() < f64::EPSILON);
        assert_eq!(
            config.filters.temporal_lower_bound,
            Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap()
        );
        assert!(config.limits_for(VehicleMode::Car).is_some());
        assert!(config.limits_for(VehicleMode::Foot).is_none());
    }

    #[test]
    fn mode_tables_without_default_keep_the_builtin_fallback() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [segmentation.distance_thresholds]
            car = 2000

            [outliers.coefficients]
            bike = 3.0
            "#,
        )
        .unwrap();

        let distances = &config.segmentation.distance_thresholds;
        assert!((distances.value(VehicleMode::Car) - 2_000.0).abs() < f64::EPSILON);
        assert!((distances.value(VehicleMode::Foot) - 500.0).abs() < f64::EPSILON);
        assert!(!distances.has_entry(VehicleMode::Train));

        let coefficients = &config.outliers.coefficients;
        assert!((coefficients.value(VehicleMode::Bike) - 3.0).abs() < f64::EPSILON);
        assert!((coefficients.value(VehicleMode::Foot) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_mode_key() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [outliers.coefficients]
            default = 2.0
            rocket = 1.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
