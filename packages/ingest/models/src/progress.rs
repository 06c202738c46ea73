//! Progress reporting for batch runs.
//!
//! The batch pool reports through [`BatchProgress`] only. The CLI renders
//! it as a progress bar, tests use [`SilentProgress`].

use std::sync::Arc;

use crate::{BatchResult, FileOutcome};

/// Observer of a batch run. Shared between workers.
pub trait BatchProgress: Send + Sync {
    /// Called once, before any file is processed.
    fn started(&self, total_files: u64);

    /// Called whenever a file completes, in completion order.
    fn file_finished(&self, outcome: &FileOutcome);

    fn finished(&self, result: &BatchResult);
}

pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn started(&self, _total_files: u64) {}
    fn file_finished(&self, _outcome: &FileOutcome) {}
    fn finished(&self, _result: &BatchResult) {}
}

#[must_use]
pub fn silent_progress() -> Arc<dyn BatchProgress> {
    Arc::new(SilentProgress)
}
