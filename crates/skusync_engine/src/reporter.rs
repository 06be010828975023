//! Run summaries.

use serde::Serialize;
use skusync_model::{OperationKind, OperationOutcome, OperationRef, OutcomeStatus, SkipReason};
use std::collections::BTreeMap;
use std::fmt;

/// A failed operation and the error it reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    /// The failed operation.
    pub operation: OperationRef,
    /// Error detail, verbatim.
    pub reason: String,
}

/// Aggregated counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Products created.
    pub created: usize,
    /// Products updated.
    pub updated: usize,
    /// Items skipped, of any kind.
    pub skipped: usize,
    /// Operations failed, of any kind.
    pub failed: usize,
    /// Collections created.
    pub collections_created: usize,
    /// Collection memberships added.
    pub memberships_linked: usize,
    /// Skips broken down by reason.
    pub skipped_by_reason: BTreeMap<SkipReason, usize>,
    /// Every failure, in outcome order.
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    /// Returns true if no operation failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Returns the number of outcomes summarized.
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.collections_created
            + self.memberships_linked
            + self.skipped
            + self.failed
    }
}

/// Aggregates outcomes into a summary. Makes no remote calls.
pub fn summarize(outcomes: &[OperationOutcome]) -> RunSummary {
    let mut summary = RunSummary::default();

    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Succeeded => match outcome.operation.kind {
                OperationKind::CreateProduct => summary.created += 1,
                OperationKind::UpdateProduct => summary.updated += 1,
                OperationKind::CreateCollection => summary.collections_created += 1,
                OperationKind::LinkCollectionMembership => summary.memberships_linked += 1,
                OperationKind::Product => {}
            },
            OutcomeStatus::Failed => {
                summary.failed += 1;
                summary.failures.push(FailureEntry {
                    operation: outcome.operation.clone(),
                    reason: outcome.detail.clone().unwrap_or_default(),
                });
            }
            OutcomeStatus::Skipped(reason) => {
                summary.skipped += 1;
                *summary.skipped_by_reason.entry(reason).or_default() += 1;
            }
        }
    }

    summary
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created:             {}", self.created)?;
        writeln!(f, "updated:             {}", self.updated)?;
        write!(f, "skipped:             {}", self.skipped)?;
        if !self.skipped_by_reason.is_empty() {
            let reasons: Vec<String> = self
                .skipped_by_reason
                .iter()
                .map(|(reason, count)| format!("{reason}: {count}"))
                .collect();
            write!(f, " ({})", reasons.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "failed:              {}", self.failed)?;
        writeln!(f, "collections created: {}", self.collections_created)?;
        write!(f, "memberships linked:  {}", self.memberships_linked)?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            write!(f, "failures:")?;
            for failure in &self.failures {
                write!(f, "\n  {}: {}", failure.operation, failure.reason)?;
            }
        }
        Ok(())
    }
}
