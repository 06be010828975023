//! Progress reporting through the log.

use skusync_engine::{ProgressSink, RunSummary, SyncState};
use skusync_model::{OperationOutcome, OutcomeStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Logs phases and per-item outcomes as a run progresses.
#[derive(Debug, Default)]
pub struct LogSink {
    seen: AtomicUsize,
}

impl LogSink {
    /// Creates a sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outcomes seen so far.
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogSink {
    fn phase(&self, state: SyncState) {
        info!(phase = ?state, outcomes = self.seen(), "phase");
    }

    fn outcome(&self, outcome: &OperationOutcome) {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        match outcome.status {
            OutcomeStatus::Failed => warn!(
                n,
                operation = %outcome.operation,
                error = outcome.detail.as_deref().unwrap_or(""),
                "failed"
            ),
            OutcomeStatus::Succeeded => info!(
                n,
                operation = %outcome.operation,
                id = ?outcome.destination_id,
                "done"
            ),
            OutcomeStatus::Skipped(reason) => debug!(
                n,
                operation = %outcome.operation,
                %reason,
                "skipped"
            ),
        }
    }

    fn summary(&self, summary: &RunSummary) {
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "summary"
        );
    }
}
