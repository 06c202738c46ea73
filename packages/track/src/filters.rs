//! Segment filter chain.
//!
//! Filters run in order over the whole segment set. Point filters split a
//! segment wherever a point is discarded, so every output segment is still a
//! contiguous run of the original. The chain stops as soon as no segment is
//! left.

use chrono::{DateTime, TimeDelta, Utc};
use mobility_geometry::{Point, RegionOfInterest, fraction_along, geographic_distance};
use mobility_track_models::{PointData, Segment};

use crate::config::SegmentFilterConfig;

/// Crossings closer than this to an existing point (meters) are not
/// synthesized.
const DUPLICATE_POINT_TOLERANCE: f64 = 1e-6;

/// One step of the segment filter chain.
#[derive(Debug, Clone, Copy)]
pub enum SegmentFilter<'a> {
    /// Drops points outside `[lower, upper]`.
    TemporalBounds {
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    },
    /// Drops points outside the region, clipping segments at its boundary.
    RegionOfInterest(&'a RegionOfInterest),
    /// Drops segments with `threshold` points or fewer.
    SmallSegments { threshold: usize },
}

impl SegmentFilter<'_> {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TemporalBounds { .. } => "temporal_bounds",
            Self::RegionOfInterest(_) => "region_of_interest",
            Self::SmallSegments { .. } => "small_segments",
        }
    }

    /// Runs this filter over a segment set.
    #[must_use]
    pub fn apply(&self, segments: Vec<Segment>) -> Vec<Segment> {
        match self {
            Self::TemporalBounds { lower, upper } => reconcile_segments(segments, |p| {
                *lower <= p.timestamp && p.timestamp <= *upper
            }),
            Self::RegionOfInterest(region) => segments
                .iter()
                .flat_map(|s| clip_to_region(s, region))
                .collect(),
            Self::SmallSegments { threshold } => segments
                .into_iter()
                .filter(|s| s.len() > *threshold)
                .collect(),
        }
    }
}

/// Builds the standard chain: temporal bounds, region of interest (when
/// given), then small segment removal.
#[must_use]
pub fn standard_chain<'a>(
    config: &SegmentFilterConfig,
    region: Option<&'a RegionOfInterest>,
    now: DateTime<Utc>,
) -> Vec<SegmentFilter<'a>> {
    let mut chain = vec![SegmentFilter::TemporalBounds {
        lower: config.temporal_lower_bound,
        upper: config.temporal_upper_bound.unwrap_or(now),
    }];
    if let Some(region) = region {
        chain.push(SegmentFilter::RegionOfInterest(region));
    }
    chain.push(SegmentFilter::SmallSegments {
        threshold: config.small_segment_threshold,
    });
    chain
}

/// Applies `filters` in order, stopping early once no segment is left.
#[must_use]
pub fn apply_chain(filters: &[SegmentFilter<'_>], segments: Vec<Segment>) -> Vec<Segment> {
    let mut current = segments;
    for filter in filters {
        if current.is_empty() {
            break;
        }
        let before = current.len();
        current = filter.apply(current);
        log::debug!(
            "Filter {} turned {before} segments into {}",
            filter.name(),
            current.len()
        );
    }
    current
}

/// Keeps points passing `keep`; each discarded point closes the current run.
fn reconcile_segments<F>(segments: Vec<Segment>, keep: F) -> Vec<Segment>
where
    F: Fn(&PointData) -> bool,
{
    let mut result = Vec::new();
    for segment in segments {
        let mut run: Vec<PointData> = Vec::new();
        for point in segment.into_points() {
            if keep(&point) {
                run.push(point);
            } else {
                log::debug!("Discarding point at {}", point.timestamp.to_rfc3339());
                result.extend(Segment::from_points(std::mem::take(&mut run)));
            }
        }
        result.extend(Segment::from_points(run));
    }
    result
}

/// Timestamp at `ratio` of the way from `start` to `end`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn interpolate_timestamp(start: DateTime<Utc>, end: DateTime<Utc>, ratio: f64) -> DateTime<Utc> {
    let delta = end - start;
    delta.num_microseconds().map_or_else(
        || start + TimeDelta::milliseconds((delta.num_milliseconds() as f64 * ratio).round() as i64),
        |us| start + TimeDelta::microseconds((us as f64 * ratio).round() as i64),
    )
}

/// Synthesizes the boundary point between `from` and `to`, nearest the end
/// that lies inside the region.
fn boundary_point(
    region: &RegionOfInterest,
    from: &PointData,
    to: &PointData,
    inside: &PointData,
) -> Option<PointData> {
    let crossing: Point<f64> = region.nearest_crossing(from.position, to.position, inside.position)?;
    if geographic_distance(crossing, inside.position) < DUPLICATE_POINT_TOLERANCE {
        return None;
    }
    let ratio = fraction_along(from.position, to.position, crossing);
    let timestamp = interpolate_timestamp(from.timestamp, to.timestamp, ratio);
    Some(PointData::synthesized_at(crossing, timestamp, inside))
}

/// Splits one segment into the runs that lie inside `region`, closing each
/// run with a synthesized exit point and opening it with a synthesized
/// entry point where it crosses the boundary.
fn clip_to_region(segment: &Segment, region: &RegionOfInterest) -> Vec<Segment> {
    let mut result = Vec::new();
    let mut run: Vec<PointData> = Vec::new();
    let mut previous: Option<(&PointData, bool)> = None;

    for point in segment.points() {
        let inside = region.contains(&point.position);

        match previous {
            Some((prev, true)) if !inside => {
                if let Some(exit) = boundary_point(region, prev, point, prev) {
                    log::debug!("Synthesized exit point at {}", exit.timestamp.to_rfc3339());
                    run.push(exit);
                }
            }
            Some((prev, false)) if inside => {
                if let Some(entry) = boundary_point(region, prev, point, point) {
                    log::debug!("Synthesized entry point at {}", entry.timestamp.to_rfc3339());
                    run.push(entry);
                }
            }
            _ => {}
        }

        if inside {
            run.push(point.clone());
        } else {
            result.extend(Segment::from_points(std::mem::take(&mut run)));
        }
        previous = Some((point, inside));
    }
    result.extend(Segment::from_points(run));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use mobility_track_models::VehicleMode;

    const SQUARE: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
    }"#;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 3, 1, 8, 0, 0).unwrap()
    }

    fn point_at(lon: f64, lat: f64, seconds: i64) -> PointData {
        PointData::new(
            lon,
            lat,
            3.0,
            1.0,
            base() + TimeDelta::seconds(seconds),
            VehicleMode::Foot,
            7,
        )
    }

    fn segment(points: Vec<PointData>) -> Segment {
        Segment::from_points(points).unwrap()
    }

    #[test]
    fn temporal_filter_splits_on_discarded_point() {
        let lower = base();
        let upper = base() + TimeDelta::seconds(100);
        let s = segment(vec![
            point_at(0.1, 0.5, 0),
            point_at(0.2, 0.5, 10),
            point_at(0.3, 0.5, 200),
            point_at(0.4, 0.5, 30),
            point_at(0.5, 0.5, 40),
        ]);
        let result = SegmentFilter::TemporalBounds { lower, upper }.apply(vec![s]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 2);
        assert_eq!(result[1].len(), 2);
    }

    #[test]
    fn small_segment_filter_keeps_larger_segments() {
        let segments = vec![
            segment(vec![point_at(0.1, 0.5, 0)]),
            segment(vec![point_at(0.1, 0.5, 0), point_at(0.2, 0.5, 10)]),
        ];
        let result = SegmentFilter::SmallSegments { threshold: 1 }.apply(segments);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn region_filter_clips_exit_with_interpolated_point() {
        let region = RegionOfInterest::from_geojson(SQUARE).unwrap();
        let s = segment(vec![
            point_at(0.5, 0.5, 0),
            point_at(0.8, 0.5, 30),
            point_at(1.4, 0.5, 90),
            point_at(1.6, 0.5, 110),
        ]);
        let result = SegmentFilter::RegionOfInterest(&region).apply(vec![s]);
        assert_eq!(result.len(), 1);
        let points = result[0].points();
        assert_eq!(points.len(), 3);

        let exit = &points[2];
        assert!((exit.longitude() - 1.0).abs() < 1e-9);
        assert!((exit.latitude() - 0.5).abs() < 1e-9);
        // 0.2 of the 0.6 degree move, so a third of 60 seconds.
        assert_eq!(exit.timestamp, base() + TimeDelta::seconds(50));
        assert_eq!(exit.vehicle_mode, VehicleMode::Foot);
        assert_eq!(exit.session_id, 7);
    }

    #[test]
    fn region_filter_splits_on_exit_and_reentry() {
        let region = RegionOfInterest::from_geojson(SQUARE).unwrap();
        let s = segment(vec![
            point_at(0.6, 0.5, 0),
            point_at(0.9, 0.5, 10),
            point_at(1.5, 0.5, 20),
            point_at(0.7, 0.5, 30),
            point_at(0.4, 0.5, 40),
        ]);
        let result = SegmentFilter::RegionOfInterest(&region).apply(vec![s]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 3);
        assert_eq!(result[1].len(), 3);

        let entry = &result[1].points()[0];
        assert!((entry.longitude() - 1.0).abs() < 1e-9);
        assert!(entry.timestamp > base() + TimeDelta::seconds(20));
        assert!(entry.timestamp < base() + TimeDelta::seconds(30));
    }

    #[test]
    fn region_filter_drops_fully_outside_segment() {
        let region = RegionOfInterest::from_geojson(SQUARE).unwrap();
        let s = segment(vec![point_at(2.0, 2.0, 0), point_at(2.1, 2.0, 10)]);
        assert!(
            SegmentFilter::RegionOfInterest(&region)
                .apply(vec![s])
                .is_empty()
        );
    }

    #[test]
    fn chain_short_circuits_on_empty_set() {
        let region = RegionOfInterest::from_geojson(SQUARE).unwrap();
        let config = SegmentFilterConfig::default();
        let chain = standard_chain(&config, Some(&region), base());
        assert_eq!(chain.len(), 3);

        let s = segment(vec![point_at(0.5, 0.5, 10), point_at(0.6, 0.5, 20)]);
        // Every point lies after `now`, so the temporal filter empties the set.
        assert!(apply_chain(&chain, vec![s]).is_empty());
    }

    #[test]
    fn interpolates_midpoint_timestamp() {
        let start = base();
        let end = base() + TimeDelta::seconds(10);
        assert_eq!(
            interpolate_timestamp(start, end, 0.5),
            base() + TimeDelta::seconds(5)
        );
    }
}
