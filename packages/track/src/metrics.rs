//! Segment measurements and physical plausibility checks.

use mobility_geometry::{geographic_line, metric_length};
use mobility_track_models::{
    Segment, SegmentInfo, ValidatedSegment, ValidationError, ValidationErrorKind,
};

use crate::config::{PipelineConfig, SegmentLimits};

/// Lowest and highest speed between consecutive points, skipping pairs with
/// no elapsed time. Both are `0.0` when no pair can be measured.
#[must_use]
pub fn speed_extrema(segment: &Segment) -> (f64, f64) {
    let mut speeds = segment
        .points()
        .windows(2)
        .filter_map(|pair| pair[1].speed_from(&pair[0]));

    let Some(first) = speeds.next() else {
        return (0.0, 0.0);
    };
    speeds.fold((first, first), |(min, max), s| (min.min(s), max.max(s)))
}

/// Measures a segment.
#[must_use]
pub fn segment_info(segment: &Segment) -> SegmentInfo {
    let first = segment.first();
    let last = segment.last();
    let geometry = geographic_line(segment.points().iter().map(|p| p.position));
    let length = metric_length(&geometry);
    let duration = last.seconds_since(first);
    let average_speed = if duration > 0.0 { length / duration } else { 0.0 };
    let (min_speed, max_speed) = speed_extrema(segment);

    SegmentInfo {
        geometry,
        start: first.timestamp,
        end: last.timestamp,
        duration,
        length,
        average_speed,
        max_speed,
        min_speed,
        vehicle_mode: segment.vehicle_mode(),
    }
}

/// Checks measurements against the limits for their mode.
#[must_use]
pub fn check_limits(info: &SegmentInfo, limits: &SegmentLimits) -> Vec<ValidationError> {
    let checks = [
        (
            ValidationErrorKind::SpeedTooHigh,
            "average_speed",
            info.average_speed,
            limits.average_speed,
        ),
        (
            ValidationErrorKind::SpeedTooHigh,
            "max_speed",
            info.max_speed,
            limits.max_speed,
        ),
        (
            ValidationErrorKind::LengthTooBig,
            "length",
            info.length,
            limits.length,
        ),
        (
            ValidationErrorKind::DurationTooLong,
            "duration",
            info.duration,
            limits.duration,
        ),
    ];

    checks
        .into_iter()
        .filter(|(_, _, value, limit)| value > limit)
        .map(|(kind, variable, value, _)| ValidationError {
            kind,
            variable: variable.to_string(),
            value,
            vehicle_mode: info.vehicle_mode,
        })
        .collect()
}

/// Measures and validates one segment. Modes without configured limits are
/// never flagged.
#[must_use]
pub fn validate_segment(segment: Segment, config: &PipelineConfig) -> ValidatedSegment {
    let info = segment_info(&segment);
    let errors = config
        .limits_for(info.vehicle_mode)
        .map(|limits| check_limits(&info, limits))
        .unwrap_or_default();

    for error in &errors {
        log::debug!("Segment validation failed: {error}");
    }

    ValidatedSegment {
        segment,
        info,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use mobility_geometry::{geographic_distance, geographic_point};
    use mobility_track_models::{PointData, VehicleMode};

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_536_830_986, 0).unwrap()
    }

    /// Longitude step (at the equator) covering `meters`.
    fn step_for(meters: f64) -> f64 {
        meters / geographic_distance(geographic_point(0.0, 0.0), geographic_point(1.0, 0.0))
    }

    fn segment(mode: VehicleMode, step_meters: f64, seconds: &[i64]) -> Segment {
        let step = step_for(step_meters);
        let points = seconds
            .iter()
            .enumerate()
            .map(|(i, s)| {
                #[allow(clippy::cast_precision_loss)]
                let lon = i as f64 * step;
                PointData::new(lon, 0.0, 0.0, 0.0, start() + TimeDelta::seconds(*s), mode, 1)
            })
            .collect();
        Segment::from_points(points).unwrap()
    }

    #[test]
    fn measures_uniform_segment() {
        let info = segment_info(&segment(VehicleMode::Foot, 10.0, &[0, 10, 20]));
        assert!((info.length - 20.0).abs() < 1e-6);
        assert!((info.duration - 20.0).abs() < 1e-9);
        assert!((info.average_speed - 1.0).abs() < 1e-6);
        assert!((info.max_speed - 1.0).abs() < 1e-6);
        assert!((info.min_speed - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_segment_has_zero_speeds() {
        let info = segment_info(&segment(VehicleMode::Foot, 10.0, &[0, 0, 0]));
        assert!(info.average_speed.abs() < f64::EPSILON);
        assert!(info.max_speed.abs() < f64::EPSILON);
        assert!(info.min_speed.abs() < f64::EPSILON);
    }

    #[test]
    fn fast_bike_segment_gets_one_average_speed_error() {
        let validated = validate_segment(
            segment(VehicleMode::Bike, 90.0, &[0, 10, 20]),
            &PipelineConfig::default(),
        );
        assert!((validated.info.average_speed - 9.0).abs() < 1e-6);
        assert_eq!(validated.errors.len(), 1);
        assert_eq!(validated.errors[0].kind, ValidationErrorKind::SpeedTooHigh);
        assert_eq!(validated.errors[0].variable, "average_speed");
        assert!(!validated.is_valid());
    }

    #[test]
    fn errors_accumulate() {
        let validated = validate_segment(
            segment(VehicleMode::Foot, 40_000.0, &[0, 20_000, 40_000]),
            &PipelineConfig::default(),
        );
        let variables: Vec<&str> = validated.errors.iter().map(|e| e.variable.as_str()).collect();
        assert_eq!(variables, ["length", "duration"]);
    }

    #[test]
    fn motorized_segments_are_not_validated_by_default() {
        let validated = validate_segment(
            segment(VehicleMode::Car, 5_000.0, &[0, 10, 20]),
            &PipelineConfig::default(),
        );
        assert!(validated.is_valid());
    }
}
