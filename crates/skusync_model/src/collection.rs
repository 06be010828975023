//! Collection records.

use crate::id::RemoteId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A manually curated collection and the SKUs of its member products.
///
/// Collections are matched across stores by exact, case-sensitive title. A
/// collection only references its members; it does not own them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    /// Store-assigned id, `None` until created.
    pub id: Option<RemoteId>,
    /// Title, the cross-store matching key.
    pub title: String,
    /// HTML description.
    pub description: String,
    /// SKUs of member products.
    pub members: BTreeSet<String>,
}

impl CollectionRecord {
    /// Creates an empty collection with no store id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            members: BTreeSet::new(),
        }
    }

    /// Sets the store id.
    pub fn with_id(mut self, id: impl Into<RemoteId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a member SKU.
    pub fn with_member(mut self, sku: impl Into<String>) -> Self {
        self.members.insert(sku.into());
        self
    }

    /// Returns true if the product with this SKU is a member.
    pub fn contains(&self, sku: &str) -> bool {
        self.members.contains(sku)
    }
}
