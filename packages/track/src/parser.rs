//! Telemetry text parsing and point-set validation.
//!
//! Raw uploads are comma-separated text with one header line followed by
//! one record per line. Lines that fail to parse are logged and skipped.

use std::collections::BTreeSet;

use chrono::DateTime;
use mobility_track_models::{PointData, RawSample, VehicleMode};

use crate::ProcessingError;

/// Number of fields on a telemetry line.
pub const FIELD_COUNT: usize = 23;

/// Errors for a single telemetry line. Never escalated past the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    /// The line has fewer fields than expected.
    #[error("expected {FIELD_COUNT} fields, found {found}")]
    FieldCount {
        /// Number of fields present.
        found: usize,
    },

    /// A field could not be parsed as a number.
    #[error("invalid value {value:?} for field {field}")]
    InvalidNumber {
        /// Name of the field.
        field: &'static str,
        /// The raw text.
        value: String,
    },

    /// The vehicle mode code is not a known mode.
    #[error("unknown vehicle mode code {code}")]
    UnknownVehicleMode {
        /// The raw code.
        code: i64,
    },

    /// The timestamp cannot be represented.
    #[error("timestamp {millis} is out of range")]
    TimestampOutOfRange {
        /// Milliseconds since the epoch.
        millis: i64,
    },
}

fn float_field(fields: &[&str], index: usize, name: &'static str) -> Result<f64, LineError> {
    fields[index]
        .parse::<f64>()
        .map_err(|_| LineError::InvalidNumber {
            field: name,
            value: fields[index].to_string(),
        })
}

fn int_field(fields: &[&str], index: usize, name: &'static str) -> Result<i64, LineError> {
    fields[index]
        .parse::<i64>()
        .map_err(|_| LineError::InvalidNumber {
            field: name,
            value: fields[index].to_string(),
        })
}

/// Splits one telemetry line into its typed fields.
///
/// # Errors
///
/// Returns [`LineError`] if the line is short or a numeric field is
/// malformed.
pub fn parse_line(line: &str) -> Result<RawSample, LineError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < FIELD_COUNT {
        return Err(LineError::FieldCount {
            found: fields.len(),
        });
    }

    Ok(RawSample {
        acceleration_x: float_field(&fields, 0, "accelerationX")?,
        acceleration_y: float_field(&fields, 1, "accelerationY")?,
        acceleration_z: float_field(&fields, 2, "accelerationZ")?,
        accuracy: float_field(&fields, 3, "accuracy")?,
        battery_consumption_per_hour: float_field(&fields, 4, "batConsumptionPerHour")?,
        battery_level: float_field(&fields, 5, "batteryLevel")?,
        device_bearing: float_field(&fields, 6, "deviceBearing")?,
        device_pitch: float_field(&fields, 7, "devicePitch")?,
        device_roll: float_field(&fields, 8, "deviceRoll")?,
        elevation: float_field(&fields, 9, "elevation")?,
        gps_bearing: float_field(&fields, 10, "gps_bearing")?,
        humidity: float_field(&fields, 11, "humidity")?,
        latitude: float_field(&fields, 12, "latitude")?,
        longitude: float_field(&fields, 13, "longitude")?,
        lumen: float_field(&fields, 14, "lumen")?,
        pressure: float_field(&fields, 15, "pressure")?,
        proximity: float_field(&fields, 16, "proximity")?,
        session_id: int_field(&fields, 17, "sessionId")?,
        speed: float_field(&fields, 18, "speed")?,
        temperature: float_field(&fields, 19, "temperature")?,
        timestamp_millis: int_field(&fields, 20, "timeStamp")?,
        vehicle_mode_code: int_field(&fields, 21, "vehicleMode")?,
        serial_version_uid: fields[22].to_string(),
    })
}

/// Converts a raw sample into a [`PointData`].
///
/// # Errors
///
/// Returns [`LineError`] for an unknown vehicle mode or an unrepresentable
/// timestamp.
pub fn to_point(raw: &RawSample) -> Result<PointData, LineError> {
    let vehicle_mode =
        VehicleMode::from_code(raw.vehicle_mode_code).map_err(|e| LineError::UnknownVehicleMode {
            code: e.code,
        })?;
    let timestamp = DateTime::from_timestamp_millis(raw.timestamp_millis).ok_or(
        LineError::TimestampOutOfRange {
            millis: raw.timestamp_millis,
        },
    )?;

    Ok(PointData::new(
        raw.longitude,
        raw.latitude,
        raw.accuracy,
        raw.speed,
        timestamp,
        vehicle_mode,
        raw.session_id,
    ))
}

/// Parses an entire telemetry upload into time-ordered points.
///
/// The first line is a header. Empty and malformed lines are skipped.
#[must_use]
pub fn parse_points(data: &str) -> Vec<PointData> {
    let mut points = Vec::new();
    let mut skipped = 0_usize;

    for (index, line) in data.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line).and_then(|raw| to_point(&raw)) {
            Ok(point) => points.push(point),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping telemetry line {index}: {e}");
            }
        }
    }

    points.sort_by_key(|p| p.timestamp);
    log::info!("Parsed {} points ({skipped} lines skipped)", points.len());
    points
}

/// Checks that a parsed point set can be processed as one track.
///
/// # Errors
///
/// Returns [`ProcessingError::NonRecoverable`] if there are no points or
/// they belong to more than one session.
pub fn validate_points(points: &[PointData]) -> Result<i64, ProcessingError> {
    let sessions: BTreeSet<i64> = points.iter().map(|p| p.session_id).collect();
    let mut iter = sessions.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(ProcessingError::non_recoverable(
            "there are no valid points in input data",
        )),
        (Some(session_id), None) => Ok(*session_id),
        (Some(_), Some(_)) => Err(ProcessingError::non_recoverable(format!(
            "multiple session identifiers present in input data: {sessions:?}"
        ))),
    }
}
