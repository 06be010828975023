//! Store-assigned identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by a store to a product, variant, image or collection.
///
/// Identifiers are only meaningful within the store that issued them; records
/// are matched across stores by SKU or collection title, never by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(u64);

impl RemoteId {
    /// Wraps a raw store id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw store id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
