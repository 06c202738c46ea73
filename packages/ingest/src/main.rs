#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the mobility track pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use mobility_cli_utils::{BatchBar, MultiProgress, init_logger};
use mobility_database::{PgStore, db};
use mobility_geometry::RegionOfInterest;
use mobility_ingest::batch::{self, BatchMode, BatchOptions};
use mobility_ingest::staging::{self, StageContext};
use mobility_ingest::{LocalDirectorySource, LogNotifier, load_config, load_region, parse_event};
use mobility_ingest_models::BatchResult;
use mobility_track::PipelineConfig;
use regex::Regex;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mobility_ingest", about = "Mobility track processing and scoring")]
struct Cli {
    /// Pipeline configuration (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Region of interest as a `GeoJSON` file
    #[arg(long, global = true, conflicts_with = "region_name")]
    region: Option<PathBuf>,
    /// Name of a region of interest stored in the database
    #[arg(long, global = true)]
    region_name: Option<String>,
    /// Number of files processed concurrently (overrides `MOBILITY_CONCURRENCY`)
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on local telemetry files without touching the database
    Process {
        files: Vec<PathBuf>,
        /// Write every segment geometry as `GeoJSON` into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Store local telemetry files for a user, then compute indexes and badges
    Ingest {
        /// External identifier of the track owner
        #[arg(long)]
        owner: Uuid,
        files: Vec<PathBuf>,
    },
    /// Process every matching file of a directory
    Batch {
        dir: PathBuf,
        /// Only file names matching this regular expression
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Store the tracks for this user instead of only validating them
        #[arg(long)]
        owner: Option<Uuid>,
    },
    /// Calculate the indexes of a stored track
    Indexes { track_id: i64 },
    /// Re-evaluate the owner's badges for a stored track
    Badges { track_id: i64 },
    /// Close expired competitions and record their winners
    Prizes,
    /// Handle one pipeline message or storage notification (JSON)
    HandleMessage {
        payload: String,
        /// Root directory of uploaded objects, laid out as `<bucket>/<key>`
        #[arg(long, default_value = ".")]
        objects_dir: PathBuf,
        /// Keep handling follow-up messages until the chain ends
        #[arg(long)]
        follow: bool,
    },
}

async fn resolve_region(cli: &Cli) -> Result<Option<RegionOfInterest>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.region {
        return Ok(Some(load_region(path)?));
    }
    let Some(name) = &cli.region_name else {
        return Ok(None);
    };
    let db = db::connect_from_env().await?;
    let geojson = PgStore::new(db.as_ref())
        .region_of_interest(name)
        .await?
        .ok_or_else(|| format!("Unknown region of interest: {name}"))?;
    Ok(Some(RegionOfInterest::from_geojson(&geojson)?))
}

fn print_batch(result: &BatchResult) {
    for outcome in &result.outcomes {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("Cannot render outcome of {}: {e}", outcome.path.display()),
        }
    }
    println!(
        "{} files, {} with errors ({:.1}s)",
        result.total_files,
        result.files_with_errors,
        result.duration.as_secs_f64()
    );
}

async fn run_batch(
    multi: &MultiProgress,
    paths: Vec<PathBuf>,
    mode: BatchMode,
    config: PipelineConfig,
    region: Option<RegionOfInterest>,
    options: &BatchOptions,
) -> BatchResult {
    let progress = BatchBar::new(multi, "Tracks");
    let result = batch::process_files(
        paths,
        mode,
        Arc::new(config),
        region.map(Arc::new),
        options,
        progress,
    )
    .await;
    print_batch(&result);
    result
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let region = resolve_region(&cli).await?;
    let mut options = BatchOptions::default();
    if let Some(concurrency) = cli.concurrency {
        options.concurrency = concurrency;
    }

    match cli.command {
        Commands::Process { files, export_dir } => {
            options.export_dir = export_dir;
            run_batch(&multi, files, BatchMode::Validate, config, region, &options).await;
        }
        Commands::Ingest { owner, files } => {
            run_batch(
                &multi,
                files,
                BatchMode::Ingest { owner },
                config,
                region,
                &options,
            )
            .await;
        }
        Commands::Batch {
            dir,
            pattern,
            export_dir,
            owner,
        } => {
            let pattern = pattern.as_deref().map(Regex::new).transpose()?;
            let files = batch::list_files(&dir, pattern.as_ref())?;
            if files.is_empty() {
                log::warn!("No matching files in {}", dir.display());
                return Ok(());
            }
            options.export_dir = export_dir;
            let mode = owner.map_or(BatchMode::Validate, |owner| BatchMode::Ingest { owner });
            run_batch(&multi, files, mode, config, region, &options).await;
        }
        Commands::Indexes { track_id } => {
            let db = db::connect_from_env().await?;
            let store = PgStore::new(db.as_ref());
            let indexes = mobility_index::calculate_indexes(&store, track_id).await?;
            println!("{}", serde_json::to_string_pretty(&indexes)?);
        }
        Commands::Badges { track_id } => {
            let db = db::connect_from_env().await?;
            let store = PgStore::new(db.as_ref());
            let updates = mobility_badge::update_badges(&store, track_id).await?;
            for update in updates.iter().filter(|u| u.acquired) {
                println!("Awarded {}", update.name);
            }
            log::info!("{} badges updated", updates.len());
        }
        Commands::Prizes => {
            let db = db::connect_from_env().await?;
            let store = PgStore::new(db.as_ref());
            let results = mobility_competition::calculate_prizes(&store, Utc::now()).await?;
            for result in &results {
                println!(
                    "{} ({}): {} winners",
                    result.competition.name,
                    result.competition.id,
                    result.winners.len()
                );
            }
        }
        Commands::HandleMessage {
            payload,
            objects_dir,
            follow,
        } => {
            let message = parse_event(&payload)?;
            let db = db::connect_from_env().await?;
            let store = PgStore::new(db.as_ref());
            let objects = LocalDirectorySource::new(objects_dir);
            let ctx = StageContext {
                objects: &objects,
                tracks: &store,
                indexes: &store,
                badges: &store,
                notifier: &LogNotifier,
                region: region.as_ref(),
                config: &config,
            };
            if follow {
                let published = staging::follow_chain(&ctx, message).await?;
                log::info!("Published {} messages", published.len());
            } else if let Some(next) = staging::handle_message(&ctx, &message).await? {
                println!("{}", serde_json::to_string(&next)?);
            }
        }
    }

    Ok(())
}
