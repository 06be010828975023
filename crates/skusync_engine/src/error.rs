//! Error types for the sync engine.

use crate::transport::PageToken;
use skusync_model::ModelError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The store rejected the request because of its rate limit.
    #[error("rate limited by store{}", retry_after_suffix(.retry_after))]
    RateLimited {
        /// Delay the store asked for, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The store answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs_f64()),
        None => String::new(),
    }
}

impl TransportError {
    /// Creates a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Returns true if this is a rate limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited { .. })
    }

    /// Returns true if a transport may retry the request.
    ///
    /// The engine itself never retries; this only informs transports that
    /// implement their own backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::RateLimited { .. } | TransportError::Network(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Decode(_) => false,
        }
    }
}

/// Errors raised by a store call: either the transport failed or the store
/// answered with something that does not parse into catalog records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure, passed through verbatim.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed payload.
    #[error(transparent)]
    Parse(#[from] ModelError),
}

/// Errors that abort a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A catalog snapshot could not be fetched completely.
    ///
    /// No plan is built from a partial snapshot.
    #[error("failed to fetch {resource} from {store}: {source}")]
    CatalogFetch {
        /// Store label.
        store: String,
        /// Resource being paged through.
        resource: &'static str,
        /// Continuation token returned by the last successful page; `None`
        /// if the first page failed. Fetching again from this token resumes
        /// the listing.
        resume_from: Option<PageToken>,
        /// Underlying failure.
        #[source]
        source: StoreError,
    },

    /// The run was cancelled before any mutation was attempted.
    #[error("sync cancelled")]
    Cancelled,

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(TransportError::RateLimited { retry_after: None }.is_retryable());
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(TransportError::status(503, "busy").is_retryable());
        assert!(!TransportError::status(422, "invalid").is_retryable());
        assert!(!TransportError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = TransportError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.to_string(), "rate limited by store (retry after 2s)");
        assert!(err.is_rate_limited());

        let err = StoreError::from(TransportError::status(422, "title can't be blank"));
        assert_eq!(err.to_string(), "HTTP 422: title can't be blank");

        let err = SyncError::CatalogFetch {
            store: "source".into(),
            resource: "products",
            resume_from: Some(PageToken::new("abc")),
            source: TransportError::Network("timeout".into()).into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch products from source: network error: timeout"
        );
    }
}
