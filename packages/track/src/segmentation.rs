//! Greedy segmentation of a time-ordered point stream.
//!
//! A new segment starts whenever the next point, compared to the last point
//! of the current segment, changes vehicle mode, comes after too long a
//! pause, or jumps too far for its mode.

use mobility_track_models::{PointData, Segment};

use crate::config::SegmentationConfig;

/// Why a point opened a new segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Break {
    VehicleChanged,
    TooMuchTime,
    TooFar,
}

fn segment_break(last: &PointData, next: &PointData, config: &SegmentationConfig) -> Option<Break> {
    if next.vehicle_mode != last.vehicle_mode {
        return Some(Break::VehicleChanged);
    }
    if next.seconds_since(last) / 60.0 > config.minutes_threshold {
        return Some(Break::TooMuchTime);
    }
    let distance_threshold = config.distance_thresholds.value(next.vehicle_mode);
    if next.distance_to(last) > distance_threshold {
        return Some(Break::TooFar);
    }
    None
}

/// Splits time-ordered points into segments.
///
/// Segments with `config.min_points` points or fewer are discarded, so the
/// total number of output points never exceeds the input.
#[must_use]
pub fn generate_segments(points: Vec<PointData>, config: &SegmentationConfig) -> Vec<Segment> {
    let mut runs: Vec<Vec<PointData>> = Vec::new();
    let mut current: Vec<PointData> = Vec::new();

    for point in points {
        if let Some(last) = current.last()
            && let Some(reason) = segment_break(last, &point, config)
        {
            log::debug!("{reason:?}, starting new segment");
            runs.push(std::mem::take(&mut current));
        }
        current.push(point);
    }
    if !current.is_empty() {
        runs.push(current);
    }

    let total = runs.len();
    let segments: Vec<Segment> = runs
        .into_iter()
        .filter(|run| run.len() > config.min_points)
        .filter_map(Segment::from_points)
        .collect();
    log::debug!(
        "Generated {} segments ({} too small)",
        segments.len(),
        total - segments.len()
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use mobility_track_models::VehicleMode;

    const STEP: f64 = 0.000_1; // about 11 meters at the equator

    fn point(index: u32, seconds: i64, mode: VehicleMode) -> PointData {
        let start = DateTime::<Utc>::from_timestamp(1_536_830_986, 0).unwrap();
        PointData::new(
            f64::from(index) * STEP,
            0.0,
            0.0,
            0.0,
            start + TimeDelta::seconds(seconds),
            mode,
            1,
        )
    }

    fn config() -> SegmentationConfig {
        SegmentationConfig::default()
    }

    #[test]
    fn splits_on_vehicle_change() {
        let points = vec![
            point(0, 0, VehicleMode::Foot),
            point(1, 10, VehicleMode::Foot),
            point(2, 20, VehicleMode::Foot),
            point(3, 30, VehicleMode::Bike),
            point(4, 40, VehicleMode::Bike),
            point(5, 50, VehicleMode::Bike),
        ];
        let segments = generate_segments(points, &config());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].vehicle_mode(), VehicleMode::Foot);
        assert_eq!(segments[1].vehicle_mode(), VehicleMode::Bike);
    }

    #[test]
    fn splits_on_long_pause() {
        let points = vec![
            point(0, 0, VehicleMode::Foot),
            point(1, 10, VehicleMode::Foot),
            point(2, 20, VehicleMode::Foot),
            point(3, 20 + 6 * 60, VehicleMode::Foot),
            point(4, 30 + 6 * 60, VehicleMode::Foot),
            point(5, 40 + 6 * 60, VehicleMode::Foot),
        ];
        assert_eq!(generate_segments(points, &config()).len(), 2);
    }

    #[test]
    fn splits_on_long_jump() {
        let points = vec![
            point(0, 0, VehicleMode::Foot),
            point(1, 10, VehicleMode::Foot),
            point(2, 20, VehicleMode::Foot),
            point(20, 30, VehicleMode::Foot),
            point(21, 40, VehicleMode::Foot),
            point(22, 50, VehicleMode::Foot),
        ];
        assert_eq!(generate_segments(points, &config()).len(), 2);
    }

    #[test]
    fn drops_segments_at_or_below_minimum() {
        let points = vec![
            point(0, 0, VehicleMode::Foot),
            point(1, 10, VehicleMode::Foot),
            point(2, 20, VehicleMode::Bike),
            point(3, 30, VehicleMode::Bike),
            point(4, 40, VehicleMode::Bike),
        ];
        let segments = generate_segments(points, &config());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 3);
    }

    #[test]
    fn segmentation_is_deterministic_and_never_adds_points() {
        let modes = [VehicleMode::Foot, VehicleMode::Bike, VehicleMode::Car];
        let points: Vec<PointData> = (0..60_u32)
            .map(|i| point(i * (i % 7), i64::from(i) * 15, modes[(i / 9) as usize % 3]))
            .collect();

        let first = generate_segments(points.clone(), &config());
        let second = generate_segments(points.clone(), &config());
        assert_eq!(first, second);
        let total: usize = first.iter().map(Segment::len).sum();
        assert!(total <= points.len());
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(generate_segments(Vec::new(), &config()).is_empty());
    }
}
