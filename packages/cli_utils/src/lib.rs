#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the mobility command line tools.
//!
//! [`init_logger`] routes `log` records through `indicatif-log-bridge`, so
//! they are printed above the [`BatchBar`] instead of tearing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use mobility_ingest_models::progress::BatchProgress;
use mobility_ingest_models::{BatchResult, FileOutcome, FileStatus};

pub use indicatif::MultiProgress;

const BAR_TEMPLATE: &str =
    "{prefix:.bold} {wide_bar:.green/dim} {pos}/{len} files {msg} [{elapsed_precise}, eta {eta}]";

/// Progress bar over the files of a batch run. The message counts invalid
/// and failed files as they come in.
pub struct BatchBar {
    bar: ProgressBar,
    invalid: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchBar {
    #[must_use]
    pub fn new(multi: &MultiProgress, label: &str) -> Arc<dyn BatchProgress> {
        let bar = multi.add(ProgressBar::hidden());
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());

        Arc::new(Self::with_bar(bar))
    }

    const fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            invalid: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn counts(&self) -> String {
        format!(
            "({} invalid, {} failed)",
            self.invalid.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

impl BatchProgress for BatchBar {
    fn started(&self, total_files: u64) {
        self.bar.set_length(total_files);
        self.bar.set_position(0);
        self.bar.set_message(self.counts());
    }

    fn file_finished(&self, outcome: &FileOutcome) {
        match outcome.status {
            FileStatus::Valid { .. } => {}
            FileStatus::Invalid { .. } => {
                self.invalid.fetch_add(1, Ordering::Relaxed);
            }
            FileStatus::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.bar.set_message(self.counts());
        self.bar.inc(1);
    }

    fn finished(&self, result: &BatchResult) {
        self.bar.finish_with_message(format!(
            "{} in {:.1}s",
            self.counts(),
            result.duration.as_secs_f64()
        ));
    }
}

/// Installs `pretty_env_logger`, filtered by `RUST_LOG`, behind
/// `indicatif-log-bridge`.
///
/// Every progress bar must be added to the returned [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();
    let logger = pretty_env_logger::formatted_timed_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    match indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init() {
        Ok(()) => log::set_max_level(level),
        Err(e) => log::debug!("Logger already installed: {e}"),
    }

    multi
}
