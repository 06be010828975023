//! Error types for catalog records.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while converting store payloads into catalog records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A payload did not have the expected shape.
    #[error("malformed {entity}: {reason}")]
    Parse {
        /// Kind of entity being parsed (e.g. "product", "variant").
        entity: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A price string was not a non-negative decimal number.
    #[error("invalid price: {0:?}")]
    InvalidPrice(String),

    /// A product status outside the known set.
    #[error("unknown product status: {0:?}")]
    UnknownStatus(String),
}

impl ModelError {
    /// Creates a parse error for the given entity kind.
    pub fn parse(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            entity,
            reason: reason.into(),
        }
    }
}
