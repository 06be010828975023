//! Per-operation results.

use crate::id::RemoteId;
use crate::operation::{Operation, OperationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an item was skipped instead of executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The matched destination product already equals the source.
    NoChange,
    /// The product has no usable SKU.
    MissingSku,
    /// Another product in the same catalog shares the SKU.
    DuplicateSku,
    /// The member product has no destination identity.
    UnresolvedMember,
    /// The collection has no destination identity (its creation failed).
    UnresolvedCollection,
    /// The run was cancelled before the operation was admitted.
    Cancelled,
}

impl SkipReason {
    /// Returns a short human-readable description.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoChange => "no change",
            SkipReason::MissingSku => "missing SKU",
            SkipReason::DuplicateSku => "duplicate SKU",
            SkipReason::UnresolvedMember => "unresolved member",
            SkipReason::UnresolvedCollection => "unresolved collection",
            SkipReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result tag of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The remote mutation was applied.
    Succeeded,
    /// The remote mutation was attempted and failed.
    Failed,
    /// Nothing was sent.
    Skipped(SkipReason),
}

/// Lightweight reference to the operation an outcome belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationRef {
    /// Operation kind.
    pub kind: OperationKind,
    /// SKU, collection title, or `title/sku`.
    pub key: String,
}

impl OperationRef {
    /// Creates a reference.
    pub fn new(kind: OperationKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl From<&Operation> for OperationRef {
    fn from(op: &Operation) -> Self {
        Self::new(op.kind(), op.key())
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// The outcome of one operation (or one skipped item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// What the outcome is about.
    pub operation: OperationRef,
    /// Result tag.
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Error text for failures, verbatim from the transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Destination identity of the affected entity, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<RemoteId>,
}

impl OperationOutcome {
    /// A successful outcome with the destination identity.
    pub fn succeeded(operation: impl Into<OperationRef>, destination_id: Option<RemoteId>) -> Self {
        Self {
            operation: operation.into(),
            status: OutcomeStatus::Succeeded,
            detail: None,
            destination_id,
        }
    }

    /// A failed outcome with the error detail.
    pub fn failed(operation: impl Into<OperationRef>, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: OutcomeStatus::Failed,
            detail: Some(detail.into()),
            destination_id: None,
        }
    }

    /// A skipped outcome.
    pub fn skipped(operation: impl Into<OperationRef>, reason: SkipReason) -> Self {
        Self {
            operation: operation.into(),
            status: OutcomeStatus::Skipped(reason),
            detail: None,
            destination_id: None,
        }
    }

    /// Attaches a destination identity.
    pub fn with_destination(mut self, id: RemoteId) -> Self {
        self.destination_id = Some(id);
        self
    }

    /// Attaches a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns true if the outcome succeeded.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    /// Returns true if the outcome failed.
    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    /// Returns the skip reason, if skipped.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            OutcomeStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}
