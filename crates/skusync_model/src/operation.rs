//! Planned remote mutations.

use crate::id::RemoteId;
use crate::product::{ImageRecord, OptionValue, Price, ProductRecord, ProductStatus, VariantRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dependency tier of an operation.
///
/// All operations of one tier complete before the next tier starts:
/// collections are created after products exist, and membership links are
/// made once both the product and the collection have identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Product creates and updates.
    Products = 1,
    /// Collection creates.
    Collections = 2,
    /// Collection membership links.
    Memberships = 3,
}

impl Tier {
    /// All tiers in execution order.
    pub const ALL: [Tier; 3] = [Tier::Products, Tier::Collections, Tier::Memberships];
}

/// Kind of an operation, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A source product excluded before create or update could be decided.
    Product,
    /// Create a product with all its variants and images.
    CreateProduct,
    /// Patch an existing product.
    UpdateProduct,
    /// Create a collection.
    CreateCollection,
    /// Add a product to a collection.
    LinkCollectionMembership,
}

impl OperationKind {
    /// Returns a short human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Product => "product",
            OperationKind::CreateProduct => "create product",
            OperationKind::UpdateProduct => "update product",
            OperationKind::CreateCollection => "create collection",
            OperationKind::LinkCollectionMembership => "link membership",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level changes to one destination variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantUpdate {
    /// Destination variant id.
    pub variant_id: RemoteId,
    /// Variant SKU (shared by source and destination).
    pub sku: String,
    /// New price, if it differs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// New inventory quantity, if it differs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_quantity: Option<i64>,
    /// New option selections, if they differ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionValue>>,
}

impl VariantUpdate {
    /// Returns true if no field changes.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.inventory_quantity.is_none() && self.options.is_none()
    }
}

/// New alt text for an existing destination image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLabel {
    /// Destination image id.
    pub image_id: RemoteId,
    /// Alt text to apply.
    pub alt: String,
}

/// Change to a product's image set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageChange {
    /// Same number of images: every destination image, in position order,
    /// with the alt text of the source image at the same position.
    Relabel(Vec<ImageLabel>),
    /// Image counts differ: the source images replace the destination set.
    Replace(Vec<ImageRecord>),
}

/// Field-level deltas between a source product and its destination match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductChanges {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
    /// Changed destination variants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_updates: Vec<VariantUpdate>,
    /// Source variants with no destination counterpart.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_creates: Vec<VariantRecord>,
    /// Every destination variant id, in destination order.
    ///
    /// The store treats the variant list of an update as authoritative, so
    /// all existing variants are listed to keep them and their order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub existing_variants: Vec<RemoteId>,
    /// Image change, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageChange>,
}

impl ProductChanges {
    /// Returns true if applying these changes would not modify anything.
    ///
    /// Existing variants alone are not a change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.variant_updates.is_empty()
            && self.variant_creates.is_empty()
            && self.images.is_none()
    }

    /// Returns true if the variant list must be sent with the update.
    pub fn touches_variants(&self) -> bool {
        !self.variant_updates.is_empty() || !self.variant_creates.is_empty()
    }
}

/// A single remote mutation, carrying only what is needed to execute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a product with its full source payload.
    CreateProduct {
        /// Source product (its id is the source store's and is not sent).
        product: ProductRecord,
    },
    /// Apply field deltas to an existing destination product.
    UpdateProduct {
        /// Destination product id.
        product_id: RemoteId,
        /// Product SKU.
        sku: String,
        /// Deltas to apply.
        changes: ProductChanges,
    },
    /// Create a collection that does not exist at the destination.
    CreateCollection {
        /// Collection title.
        title: String,
        /// HTML description.
        description: String,
        /// Whether the collection is published on creation.
        published: bool,
    },
    /// Add a product to a collection.
    LinkCollectionMembership {
        /// Collection title.
        collection: String,
        /// Destination collection id, `None` if created earlier in the run.
        collection_id: Option<RemoteId>,
        /// Member product SKU.
        sku: String,
        /// Destination product id, `None` if created earlier in the run.
        product_id: Option<RemoteId>,
    },
}

impl Operation {
    /// Returns the operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateProduct { .. } => OperationKind::CreateProduct,
            Operation::UpdateProduct { .. } => OperationKind::UpdateProduct,
            Operation::CreateCollection { .. } => OperationKind::CreateCollection,
            Operation::LinkCollectionMembership { .. } => OperationKind::LinkCollectionMembership,
        }
    }

    /// Returns the dependency tier.
    pub fn tier(&self) -> Tier {
        match self {
            Operation::CreateProduct { .. } | Operation::UpdateProduct { .. } => Tier::Products,
            Operation::CreateCollection { .. } => Tier::Collections,
            Operation::LinkCollectionMembership { .. } => Tier::Memberships,
        }
    }

    /// Returns the key identifying what the operation acts on: the SKU for
    /// products, the title for collections, `title/sku` for memberships.
    pub fn key(&self) -> String {
        match self {
            Operation::CreateProduct { product } => product.sku.clone(),
            Operation::UpdateProduct { sku, .. } => sku.clone(),
            Operation::CreateCollection { title, .. } => title.clone(),
            Operation::LinkCollectionMembership {
                collection, sku, ..
            } => format!("{collection}/{sku}"),
        }
    }

    /// Returns the product SKU this operation references, if any.
    pub fn sku(&self) -> Option<&str> {
        match self {
            Operation::CreateProduct { product } => Some(&product.sku),
            Operation::UpdateProduct { sku, .. }
            | Operation::LinkCollectionMembership { sku, .. } => Some(sku),
            Operation::CreateCollection { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.key())
    }
}
