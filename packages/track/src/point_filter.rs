//! Point-level filtering applied before segmentation.

use mobility_track_models::PointData;

use crate::config::PointFilterConfig;

/// Drops points whose reported accuracy is worse than `threshold` meters.
#[must_use]
pub fn filter_inaccurate(points: Vec<PointData>, threshold: f64) -> Vec<PointData> {
    let before = points.len();
    let kept: Vec<PointData> = points
        .into_iter()
        .filter(|p| p.accuracy <= threshold)
        .collect();
    log::debug!(
        "Accuracy filter removed {} of {before} points",
        before - kept.len()
    );
    kept
}

/// Drops points that are too close to one of the most recently accepted
/// points.
///
/// Each candidate is compared against at most `window` accepted points,
/// newest first.
#[must_use]
pub fn filter_redundant(points: Vec<PointData>, threshold: f64, window: usize) -> Vec<PointData> {
    let before = points.len();
    let mut accepted: Vec<PointData> = Vec::with_capacity(points.len());

    for candidate in points {
        let redundant = accepted
            .iter()
            .rev()
            .take(window)
            .any(|p| candidate.distance_to(p) < threshold);
        if redundant {
            log::debug!(
                "Discarding redundant point at {}",
                candidate.timestamp.to_rfc3339()
            );
        } else {
            accepted.push(candidate);
        }
    }

    log::debug!(
        "Redundancy filter removed {} of {before} points",
        before - accepted.len()
    );
    accepted
}

/// Runs the accuracy filter followed by the redundancy filter.
#[must_use]
pub fn filter_points(points: Vec<PointData>, config: &PointFilterConfig) -> Vec<PointData> {
    let points = filter_inaccurate(points, config.accuracy_threshold);
    filter_redundant(points, config.position_threshold, config.redundancy_window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use mobility_track_models::VehicleMode;

    fn point(lon: f64, seconds: i64, accuracy: f64) -> PointData {
        let start = DateTime::<Utc>::from_timestamp(1_536_830_986, 0).unwrap();
        PointData::new(
            lon,
            0.0,
            accuracy,
            0.0,
            start + TimeDelta::seconds(seconds),
            VehicleMode::Foot,
            1,
        )
    }

    // Roughly one meter of longitude at the equator.
    const ONE_METER: f64 = 0.000_009;

    #[test]
    fn drops_inaccurate_points() {
        let points = vec![point(0.0, 0, 5.0), point(0.01, 1, 50.0), point(0.02, 2, 30.0)];
        let kept = filter_inaccurate(points, 30.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn drops_points_close_to_recent_ones() {
        let points = vec![
            point(0.0, 0, 0.0),
            point(ONE_METER, 1, 0.0),
            point(100.0 * ONE_METER, 2, 0.0),
            point(100.5 * ONE_METER, 3, 0.0),
        ];
        let kept = filter_redundant(points, 2.0, 5);
        assert_eq!(kept.len(), 2);
        assert!((kept[1].longitude() - 100.0 * ONE_METER).abs() < 1e-12);
    }

    #[test]
    fn window_limits_backward_scan() {
        // The fourth point returns next to the first one, which has left
        // the one-point window.
        let points = vec![
            point(0.0, 0, 0.0),
            point(100.0 * ONE_METER, 1, 0.0),
            point(200.0 * ONE_METER, 2, 0.0),
            point(0.5 * ONE_METER, 3, 0.0),
        ];
        assert_eq!(filter_redundant(points.clone(), 2.0, 1).len(), 4);
        assert_eq!(filter_redundant(points, 2.0, 5).len(), 3);
    }
}
