//! Track pipeline entry points.

use chrono::{DateTime, Utc};
use mobility_geometry::RegionOfInterest;
use mobility_track_models::{PointData, ProcessedTrack};

use crate::config::PipelineConfig;
use crate::filters::{apply_chain, standard_chain};
use crate::metrics::validate_segment;
use crate::outliers::remove_outliers;
use crate::parser::{parse_points, validate_points};
use crate::point_filter::filter_points;
use crate::segmentation::generate_segments;
use crate::ProcessingError;

/// Runs the full pipeline over parsed points.
///
/// Points may come in any order; they are stably sorted by timestamp
/// first. `now` is the upper temporal bound used when the config does not
/// set one. Segments failing validation are kept and carry their errors.
///
/// # Errors
///
/// Returns [`ProcessingError::NonRecoverable`] when the points cannot form
/// a track: no points, mixed sessions, too few points after outlier
/// removal, or no segment left after filtering.
pub fn process_points(
    points: Vec<PointData>,
    region: Option<&RegionOfInterest>,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<ProcessedTrack, ProcessingError> {
    let mut points = points;
    points.sort_by_key(|p| p.timestamp);
    let session_id = validate_points(&points)?;

    let points = filter_points(points, &config.points);
    let segments = generate_segments(points, &config.segmentation);
    log::debug!("Initial segmentation produced {} segments", segments.len());

    let points = remove_outliers(&segments, &config.outliers)?;
    let segments = generate_segments(points, &config.segmentation);

    let chain = standard_chain(&config.filters, region, now);
    let segments = apply_chain(&chain, segments);
    if segments.is_empty() {
        return Err(ProcessingError::non_recoverable(
            "no valid segments left after filtering",
        ));
    }

    let segments: Vec<_> = segments
        .into_iter()
        .map(|segment| validate_segment(segment, config))
        .collect();
    let track = ProcessedTrack {
        session_id,
        segments,
    };

    if track.is_valid() {
        log::info!(
            "Session {session_id}: {} valid segments",
            track.segments.len()
        );
    } else {
        log::info!(
            "Session {session_id}: track is invalid: {}",
            track.validation_summary()
        );
    }
    Ok(track)
}

/// Parses raw telemetry text and runs the full pipeline on it.
///
/// # Errors
///
/// See [`process_points`].
pub fn process_raw(
    data: &str,
    region: Option<&RegionOfInterest>,
    config: &PipelineConfig,
) -> Result<ProcessedTrack, ProcessingError> {
    let points = parse_points(data);
    process_points(points, region, config, Utc::now())
}
