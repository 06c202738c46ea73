//! Concurrent processing of many local telemetry files.
//!
//! Files are handled by a bounded pool of workers. Every file runs the
//! pipeline on its own; in ingest mode each worker also opens its own
//! database connection. One file failing never affects the others: the
//! failure is logged and shows up in the [`BatchResult`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt as _};
use mobility_database::PgStore;
use mobility_geometry::{RegionOfInterest, line_to_geojson};
use mobility_ingest_models::progress::BatchProgress;
use mobility_ingest_models::{BatchResult, FileOutcome, FileStatus};
use mobility_track::PipelineConfig;
use mobility_track_models::ProcessedTrack;
use regex::Regex;
use uuid::Uuid;

use crate::{IngestError, finish_track, store_track};

/// What to do with each processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Run the pipeline only.
    Validate,
    /// Store every track for `owner`, then compute its indexes and badges.
    Ingest { owner: Uuid },
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Number of files processed at once.
    pub concurrency: usize,
    /// Directory receiving one `GeoJSON` file per segment.
    pub export_dir: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: crate::concurrency_from_env(),
            export_dir: None,
        }
    }
}

/// Regular files directly inside `dir` whose name matches `pattern`,
/// sorted by path.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the directory cannot be read.
pub fn list_files(dir: &Path, pattern: Option<&Regex>) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = pattern.is_none_or(|re| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| re.is_match(n))
        });
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Writes every segment geometry of `track` as
/// `<dir>/<stem>_<index>_<mode>.geojson`. Returns the number of files
/// written.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if a file cannot be written.
pub fn export_segments(
    dir: &Path,
    stem: &str,
    track: &ProcessedTrack,
) -> Result<usize, IngestError> {
    std::fs::create_dir_all(dir)?;
    for (index, segment) in track.segments.iter().enumerate() {
        let name = format!("{stem}_{index}_{}.geojson", segment.info.vehicle_mode);
        std::fs::write(
            dir.join(name),
            line_to_geojson(&segment.info.geometry).to_string(),
        )?;
    }
    Ok(track.segments.len())
}

fn run_pipeline(
    path: &Path,
    data: &str,
    config: &PipelineConfig,
    region: Option<&RegionOfInterest>,
    export_dir: Option<&Path>,
) -> Result<ProcessedTrack, IngestError> {
    let track = mobility_track::process_raw(data, region, config)?;
    if let Some(dir) = export_dir {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("track");
        let written = export_segments(dir, stem, &track)?;
        log::debug!("Exported {written} segments of {}", path.display());
    }
    Ok(track)
}

async fn process_file(
    path: &Path,
    mode: BatchMode,
    config: Arc<PipelineConfig>,
    region: Option<Arc<RegionOfInterest>>,
    export_dir: Option<PathBuf>,
) -> Result<FileStatus, IngestError> {
    let data = tokio::fs::read_to_string(path).await?;
    let owned_path = path.to_path_buf();
    let track = tokio::task::spawn_blocking(move || {
        run_pipeline(
            &owned_path,
            &data,
            &config,
            region.as_deref(),
            export_dir.as_deref(),
        )
    })
    .await
    .map_err(std::io::Error::other)??;

    let track_id = match mode {
        BatchMode::Validate => None,
        BatchMode::Ingest { owner } => {
            let db = mobility_database::db::connect_from_env()
                .await
                .map_err(|e| IngestError::Connection {
                    message: e.to_string(),
                })?;
            let store = PgStore::new(db.as_ref());
            let outcome = store_track(&store, &owner, &track).await?;
            finish_track(&store, &store, &outcome).await?;
            Some(outcome.track_id)
        }
    };

    let segments = track.segments.len();
    let points = track.point_count();
    Ok(if track.is_valid() {
        FileStatus::Valid {
            segments,
            points,
            track_id,
        }
    } else {
        FileStatus::Invalid {
            segments,
            points,
            track_id,
            validation_error: track.validation_summary(),
        }
    })
}

/// Processes `paths` with at most `options.concurrency` files in flight.
pub async fn process_files(
    paths: Vec<PathBuf>,
    mode: BatchMode,
    config: Arc<PipelineConfig>,
    region: Option<Arc<RegionOfInterest>>,
    options: &BatchOptions,
    progress: Arc<dyn BatchProgress>,
) -> BatchResult {
    let started = Instant::now();
    let concurrency = options.concurrency.max(1);
    log::info!(
        "Processing {} files (concurrency={concurrency})...",
        paths.len()
    );
    progress.started(paths.len() as u64);

    let outcomes: Vec<FileOutcome> = stream::iter(paths.into_iter().map(|path| {
        let config = Arc::clone(&config);
        let region = region.clone();
        let export_dir = options.export_dir.clone();
        let progress = Arc::clone(&progress);
        async move {
            let status = match process_file(&path, mode, config, region, export_dir).await {
                Ok(status) => status,
                Err(e) => {
                    log::error!("Failed to process {}: {e}", path.display());
                    FileStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            let outcome = FileOutcome { path, status };
            progress.file_finished(&outcome);
            outcome
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let result = BatchResult::new(outcomes, started.elapsed());
    progress.finished(&result);
    log::info!(
        "Processed {} files in {:.1}s, {} with errors",
        result.total_files,
        result.duration.as_secs_f64(),
        result.files_with_errors
    );
    result
}
