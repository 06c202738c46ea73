//! Statistical speed outlier removal.
//!
//! For each segment the speed between every pair of consecutive points is
//! compared against `mean + coefficient * stddev` of all pair speeds in
//! that segment. Pairs above the cutoff lose their first point.

use mobility_track_models::{PointData, Segment};

use crate::ProcessingError;
use crate::config::OutlierConfig;

/// Mean and population standard deviation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_and_stddev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Points of `segment` that survive the cutoff, in order.
fn retained_points(segment: &Segment, coefficient: f64) -> Vec<PointData> {
    let points = segment.points();
    let speeds: Vec<Option<f64>> = points
        .windows(2)
        .map(|pair| pair[1].speed_from(&pair[0]))
        .collect();
    let measured: Vec<f64> = speeds.iter().filter_map(|s| *s).collect();

    let Some((mean, stddev)) = mean_and_stddev(&measured) else {
        log::debug!("Segment has no measurable speed, dropping its points");
        return Vec::new();
    };
    let cutoff = coefficient.mul_add(stddev, mean);

    let mut kept: Vec<PointData> = Vec::with_capacity(points.len());
    for (point, speed) in points.iter().zip(&speeds) {
        match speed {
            Some(speed) if *speed <= cutoff => kept.push(point.clone()),
            Some(speed) => log::debug!("Discarding outlier with speed {speed:.2} > {cutoff:.2}"),
            None => log::debug!("Discarding point with zero elapsed time to the next one"),
        }
    }
    if matches!(speeds.last(), Some(Some(speed)) if *speed <= cutoff) {
        kept.push(segment.last().clone());
    }
    kept
}

/// Removes speed outliers from every segment and flattens the result back
/// into one time-ordered point list, ready to be segmented again.
///
/// # Errors
///
/// Returns [`ProcessingError::NonRecoverable`] if fewer than two points
/// survive.
pub fn remove_outliers(
    segments: &[Segment],
    config: &OutlierConfig,
) -> Result<Vec<PointData>, ProcessingError> {
    let before: usize = segments.iter().map(Segment::len).sum();
    let points: Vec<PointData> = segments
        .iter()
        .flat_map(|segment| {
            retained_points(segment, config.coefficients.value(segment.vehicle_mode()))
        })
        .collect();

    log::info!(
        "Outlier filter kept {} of {before} points",
        points.len()
    );

    if points.len() < 2 {
        return Err(ProcessingError::non_recoverable(format!(
            "only {} points left after removing outliers",
            points.len()
        )));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use mobility_track_models::VehicleMode;

    const STEP: f64 = 0.000_1;

    fn segment(offsets: &[(f64, i64)]) -> Segment {
        let start = DateTime::<Utc>::from_timestamp(1_536_830_986, 0).unwrap();
        let points = offsets
            .iter()
            .map(|(x, seconds)| {
                PointData::new(
                    x * STEP,
                    0.0,
                    0.0,
                    0.0,
                    start + TimeDelta::seconds(*seconds),
                    VehicleMode::Bike,
                    1,
                )
            })
            .collect();
        Segment::from_points(points).unwrap()
    }

    #[test]
    fn stats_of_constant_values() {
        let (mean, stddev) = mean_and_stddev(&[3.0, 3.0, 3.0]).unwrap();
        assert!((mean - 3.0).abs() < 1e-12);
        assert!(stddev.abs() < 1e-12);
        assert!(mean_and_stddev(&[]).is_none());
    }

    #[test]
    fn keeps_uniform_segment_intact() {
        let s = segment(&[(0.0, 0), (1.0, 10), (2.0, 20), (3.0, 30)]);
        let points = remove_outliers(&[s], &OutlierConfig::default()).unwrap();
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn drops_first_point_of_fast_pair() {
        let mut offsets: Vec<(f64, i64)> = (0..10).map(|i| (f64::from(i), i64::from(i) * 10)).collect();
        // One huge jump between the 10th and 11th point.
        offsets.push((200.0, 100));
        offsets.push((201.0, 110));
        let s = segment(&offsets);

        let config = OutlierConfig::default();
        let points = remove_outliers(&[s], &config).unwrap();
        assert_eq!(points.len(), offsets.len() - 1);
        assert!(points.iter().all(|p| (p.longitude() - 9.0 * STEP).abs() > 1e-12));
    }

    #[test]
    fn retained_pairs_respect_cutoff() {
        let offsets: Vec<(f64, i64)> = (0..30_i32)
            .map(|i| (f64::from(i * i % 17), i64::from(i) * 10))
            .collect();
        let s = segment(&offsets);
        let speeds: Vec<f64> = s
            .points()
            .windows(2)
            .filter_map(|p| p[1].speed_from(&p[0]))
            .collect();
        let (mean, stddev) = mean_and_stddev(&speeds).unwrap();
        let cutoff = 2.0_f64.mul_add(stddev, mean);

        let kept = retained_points(&s, 2.0);
        for point in &kept {
            let index = s.points().iter().position(|p| p == point).unwrap();
            if index + 1 < s.len() {
                let speed = s.points()[index + 1].speed_from(point).unwrap();
                assert!(speed <= cutoff);
            }
        }
    }

    #[test]
    fn zero_duration_pair_loses_first_point() {
        let s = segment(&[(0.0, 0), (1.0, 10), (2.0, 10), (3.0, 20)]);
        let kept = retained_points(&s, 2.0);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|p| (p.longitude() - STEP).abs() > 1e-12));
    }

    #[test]
    fn fails_when_too_few_points_survive() {
        let s = segment(&[(0.0, 0), (1.0, 0)]);
        assert!(matches!(
            remove_outliers(&[s], &OutlierConfig::default()),
            Err(ProcessingError::NonRecoverable { .. })
        ));
    }
}
