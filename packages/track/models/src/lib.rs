#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point, segment, and track types for the track pipeline.
//!
//! [`PointData`] and [`Segment`] only live for the duration of one ingestion
//! call. [`TrackRecord`] and [`SegmentRecord`] are the shapes read back from
//! storage by the downstream index and badge stages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mobility_geometry::{LineString, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How the user was travelling when a point was collected.
///
/// The discriminant is the code sent by the mobile client in the
/// `vehicleMode` telemetry field.
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
pub enum VehicleMode {
    /// Walking or running
    Foot = 1,
    /// Bicycle
    Bike = 2,
    /// Urban or extra-urban bus
    Bus = 3,
    /// Private car
    Car = 4,
    /// Scooter or motorbike
    Motorcycle = 5,
    /// Train
    Train = 6,
    /// Mode not reported by the client
    Unknown = 7,
}

/// Error returned when a telemetry code does not map to a [`VehicleMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVehicleModeError {
    /// The code that was provided.
    pub code: i64,
}

impl std::fmt::Display for InvalidVehicleModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid vehicle mode code {}: expected 1-7", self.code)
    }
}

impl std::error::Error for InvalidVehicleModeError {}

impl VehicleMode {
    /// Returns the telemetry code of this mode.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Maps a telemetry code to a mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not one of the known modes.
    pub const fn from_code(code: i64) -> Result<Self, InvalidVehicleModeError> {
        match code {
            1 => Ok(Self::Foot),
            2 => Ok(Self::Bike),
            3 => Ok(Self::Bus),
            4 => Ok(Self::Car),
            5 => Ok(Self::Motorcycle),
            6 => Ok(Self::Train),
            7 => Ok(Self::Unknown),
            _ => Err(InvalidVehicleModeError { code }),
        }
    }

    /// Public transport modes: costs are limited to travel time.
    #[must_use]
    pub const fn is_public_transport(self) -> bool {
        matches!(self, Self::Bus | Self::Train)
    }

    /// Modes counted as sustainable mobility.
    #[must_use]
    pub const fn is_sustainable(self) -> bool {
        matches!(self, Self::Bike | Self::Bus | Self::Foot | Self::Train)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Foot,
            Self::Bike,
            Self::Bus,
            Self::Car,
            Self::Motorcycle,
            Self::Train,
            Self::Unknown,
        ]
    }

    /// Modes counted as public transport.
    #[must_use]
    pub const fn public_transports() -> &'static [Self] {
        &[Self::Bus, Self::Train]
    }

    /// Modes counted as sustainable mobility.
    #[must_use]
    pub const fn sustainable() -> &'static [Self] {
        &[Self::Bike, Self::Bus, Self::Foot, Self::Train]
    }
}

/// A per-mode lookup table with an explicit fallback.
///
/// Modes without an entry resolve to `default`. Deserializes from a map with
/// a `default` key plus one optional key per mode name:
///
/// ```toml
/// default = 500.0
/// foot = 100.0
/// bike = 300.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTable<T> {
    /// Value used for modes missing from `entries`.
    pub default: T,
    #[serde(flatten)]
    pub entries: BTreeMap<VehicleMode, T>,
}

impl<T> ModeTable<T> {
    /// Creates an empty table that always resolves to `default`.
    #[must_use]
    pub const fn new(default: T) -> Self {
        Self {
            default,
            entries: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the value for one mode.
    #[must_use]
    pub fn with(mut self, mode: VehicleMode, value: T) -> Self {
        self.entries.insert(mode, value);
        self
    }

    /// Value for `mode`, or the table default.
    #[must_use]
    pub fn get(&self, mode: VehicleMode) -> &T {
        self.entries.get(&mode).unwrap_or(&self.default)
    }

    /// Whether `mode` has its own entry.
    #[must_use]
    pub fn has_entry(&self, mode: VehicleMode) -> bool {
        self.entries.contains_key(&mode)
    }
}

impl<T: Copy> ModeTable<T> {
    /// Copy of the value for `mode`, or the table default.
    #[must_use]
    pub fn value(&self, mode: VehicleMode) -> T {
        *self.get(mode)
    }
}

/// One telemetry record exactly as it appears on a raw line.
///
/// Numeric fields are already converted; nothing else is checked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub acceleration_x: f64,
    pub acceleration_y: f64,
    pub acceleration_z: f64,
    pub accuracy: f64,
    pub battery_consumption_per_hour: f64,
    pub battery_level: f64,
    pub device_bearing: f64,
    pub device_pitch: f64,
    pub device_roll: f64,
    pub elevation: f64,
    pub gps_bearing: f64,
    pub humidity: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub lumen: f64,
    pub pressure: f64,
    pub proximity: f64,
    pub session_id: i64,
    pub speed: f64,
    pub temperature: f64,
    /// Milliseconds since the unix epoch.
    pub timestamp_millis: i64,
    pub vehicle_mode_code: i64,
    pub serial_version_uid: String,
}

/// A validated telemetry point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointData {
    /// Geographic position (longitude, latitude).
    pub position: Point<f64>,
    /// Web mercator position, precomputed for metric distances.
    pub projected: Point<f64>,
    /// Reported horizontal accuracy, in meters.
    pub accuracy: f64,
    /// Speed reported by the device, in m/s.
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
    pub vehicle_mode: VehicleMode,
    pub session_id: i64,
}

impl PointData {
    /// Builds a point, projecting its position once up front.
    #[must_use]
    pub fn new(
        longitude: f64,
        latitude: f64,
        accuracy: f64,
        speed: f64,
        timestamp: DateTime<Utc>,
        vehicle_mode: VehicleMode,
        session_id: i64,
    ) -> Self {
        let position = mobility_geometry::geographic_point(longitude, latitude);
        Self {
            position,
            projected: mobility_geometry::project(position),
            accuracy,
            speed,
            timestamp,
            vehicle_mode,
            session_id,
        }
    }

    /// Builds a point at `position` that inherits every other attribute
    /// from `template`.
    #[must_use]
    pub fn synthesized_at(position: Point<f64>, timestamp: DateTime<Utc>, template: &Self) -> Self {
        Self {
            position,
            projected: mobility_geometry::project(position),
            accuracy: template.accuracy,
            speed: template.speed,
            timestamp,
            vehicle_mode: template.vehicle_mode,
            session_id: template.session_id,
        }
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.position.x()
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    /// Metric distance to another point, in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        mobility_geometry::metric_distance(self.projected, other.projected)
    }

    /// Seconds elapsed from `earlier` to this point (fractional).
    #[must_use]
    pub fn seconds_since(&self, earlier: &Self) -> f64 {
        seconds_between(earlier.timestamp, self.timestamp)
    }

    /// Speed needed to move from `earlier` to this point, in m/s.
    ///
    /// Returns `None` when no time elapsed between the two.
    #[must_use]
    pub fn speed_from(&self, earlier: &Self) -> Option<f64> {
        let seconds = self.seconds_since(earlier);
        if seconds > 0.0 {
            Some(self.distance_to(earlier) / seconds)
        } else {
            None
        }
    }
}

/// Fractional seconds between two instants.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    delta
        .num_microseconds()
        .map_or_else(|| delta.num_milliseconds() as f64 / 1000.0, |us| us as f64 / 1_000_000.0)
}

/// An ordered, non-empty run of points sharing one vehicle mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    points: Vec<PointData>,
}

impl Segment {
    /// Wraps a run of points. Returns `None` for an empty run.
    #[must_use]
    pub fn from_points(points: Vec<PointData>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    #[must_use]
    pub fn points(&self) -> &[PointData] {
        &self.points
    }

    #[must_use]
    pub fn into_points(self) -> Vec<PointData> {
        self.points
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with collections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> &PointData {
        &self.points[0]
    }

    #[must_use]
    pub fn last(&self) -> &PointData {
        &self.points[self.points.len() - 1]
    }

    #[must_use]
    pub fn vehicle_mode(&self) -> VehicleMode {
        self.first().vehicle_mode
    }
}

/// Derived measurements of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Geographic line through every point of the segment.
    pub geometry: LineString<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Duration in (fractional) seconds.
    pub duration: f64,
    /// Metric length, in meters.
    pub length: f64,
    /// Average speed over the whole segment, in m/s.
    pub average_speed: f64,
    /// Highest speed between two consecutive points, in m/s.
    pub max_speed: f64,
    /// Lowest speed between two consecutive points, in m/s.
    pub min_speed: f64,
    pub vehicle_mode: VehicleMode,
}

/// Which plausibility check a segment failed.
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
pub enum ValidationErrorKind {
    SpeedTooHigh,
    LengthTooBig,
    DurationTooLong,
}

/// A physical implausibility found on a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Name of the offending metric (e.g. `average_speed`).
    pub variable: String,
    pub value: f64,
    pub vehicle_mode: VehicleMode,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}={:.3}",
            self.kind, self.vehicle_mode, self.variable, self.value
        )
    }
}

/// A segment with its measurements and any validation errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSegment {
    pub segment: Segment,
    pub info: SegmentInfo,
    pub errors: Vec<ValidationError>,
}

impl ValidatedSegment {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Output of the track pipeline for one telemetry session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrack {
    pub session_id: i64,
    pub segments: Vec<ValidatedSegment>,
}

impl ProcessedTrack {
    /// A track is valid iff none of its segments carries an error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.segments.iter().all(ValidatedSegment::is_valid)
    }

    /// Every validation error of the track, in segment order.
    pub fn validation_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.segments.iter().flat_map(|s| s.errors.iter())
    }

    /// Concatenated, human-readable error summary (empty when valid).
    #[must_use]
    pub fn validation_summary(&self) -> String {
        self.validation_errors()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Total number of points across all segments.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(|s| s.segment.len()).sum()
    }
}

/// Track-level totals rolled up from the per-segment indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackAggregates {
    pub so2_saved: f64,
    pub nox_saved: f64,
    pub co_saved: f64,
    pub co2_saved: f64,
    pub pm10_saved: f64,
    pub total_cost: f64,
    pub calories_consumed: f64,
}

/// A segment as stored, with the fields downstream stages need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: i64,
    pub vehicle_mode: VehicleMode,
    /// Metric length, in meters.
    pub length: f64,
    /// Duration in seconds.
    pub duration: f64,
}

/// A persisted track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub session_id: i64,
    pub is_valid: bool,
    pub validation_error: String,
    /// Populated once indexes have been calculated.
    pub aggregates: Option<TrackAggregates>,
    pub segments: Vec<SegmentRecord>,
}

impl TrackRecord {
    /// Whether any segment of the track used one of `modes`.
    #[must_use]
    pub fn uses_any(&self, modes: &[VehicleMode]) -> bool {
        self.segments.iter().any(|s| modes.contains(&s.vehicle_mode))
    }
}
