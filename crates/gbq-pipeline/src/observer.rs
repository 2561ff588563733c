//! Turning load outcomes into log events
//!
//! The stage decides *what* happened to an element; observers decide how
//! that is reported. [`TracingObserver`] is the default and emits one event
//! per element at the outcome's severity.

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, trace, warn, Level};

use crate::types::{LoadOutcome, LoadRequest, SkipReason};

pub trait LoadObserver: Send + Sync {
    fn observe(&self, request: &LoadRequest, outcome: &LoadOutcome);
}

/// Reports outcomes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn observe(&self, request: &LoadRequest, outcome: &LoadOutcome) {
        let message = match outcome {
            LoadOutcome::Skipped(SkipReason::NoFileUris) => {
                format!("No file URIs to process, skip load for {}", request.table_name)
            },
            LoadOutcome::Skipped(SkipReason::NoTable) => {
                format!("No table to process, skip load of {:?}", request.file_uris)
            },
            LoadOutcome::Loaded { destination, stats } => format!(
                "Loaded {} rows into {} in {} seconds",
                stats.output_rows,
                destination,
                stats.took_secs()
            ),
            LoadOutcome::Failed { destination, error } => {
                format!("Failed to load files into {}: {}", destination, error)
            },
        };

        let table = request.table_name.as_str();
        let files = request.file_uris.len();
        match outcome.severity() {
            Level::ERROR => error!(table, files, "{}", message),
            Level::WARN => warn!(table, files, "{}", message),
            Level::DEBUG => debug!(table, files, "{}", message),
            Level::TRACE => trace!(table, files, "{}", message),
            _ => info!(table, files, "{}", message),
        }
    }
}

/// Keeps every outcome in memory. Cloning shares the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    outcomes: Arc<Mutex<Vec<(LoadRequest, LoadOutcome)>>>,
}

/// Outcome totals across all observed elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<(LoadRequest, LoadOutcome)> {
        self.outcomes
            .lock()
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for (_, outcome) in self.outcomes() {
            match outcome {
                LoadOutcome::Loaded { .. } => counts.loaded += 1,
                LoadOutcome::Skipped(_) => counts.skipped += 1,
                LoadOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

impl LoadObserver for RecordingObserver {
    fn observe(&self, request: &LoadRequest, outcome: &LoadOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push((request.clone(), outcome.clone()));
        }
    }
}

/// Both observers see every outcome, left first.
impl<A: LoadObserver, B: LoadObserver> LoadObserver for (A, B) {
    fn observe(&self, request: &LoadRequest, outcome: &LoadOutcome) {
        self.0.observe(request, outcome);
        self.1.observe(request, outcome);
    }
}

impl<T: LoadObserver + ?Sized> LoadObserver for Arc<T> {
    fn observe(&self, request: &LoadRequest, outcome: &LoadOutcome) {
        (**self).observe(request, outcome);
    }
}
