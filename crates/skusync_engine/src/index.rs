//! SKU indexes over catalog snapshots.

use skusync_model::{sku_key, OperationKind, OperationOutcome, OperationRef, ProductRecord, SkipReason};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Why a record was left out of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    /// Empty or blank SKU.
    MissingSku,
    /// SKU shared with at least one other record.
    DuplicateSku,
}

impl From<ExclusionReason> for SkipReason {
    fn from(reason: ExclusionReason) -> Self {
        match reason {
            ExclusionReason::MissingSku => SkipReason::MissingSku,
            ExclusionReason::DuplicateSku => SkipReason::DuplicateSku,
        }
    }
}

/// Splits items into a SKU-keyed map and the items that cannot be keyed.
///
/// Items with a blank SKU are excluded as missing. When several items share a
/// SKU, all of them are excluded: none is kept, since picking one would
/// silently resolve an ambiguity. Exclusions keep input order.
pub fn partition_by_sku<T, F>(
    items: impl IntoIterator<Item = T>,
    sku_of: F,
) -> (BTreeMap<String, T>, Vec<(T, ExclusionReason)>)
where
    F: Fn(&T) -> &str,
{
    let items: Vec<T> = items.into_iter().collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in &items {
        if let Some(key) = sku_key(sku_of(item)) {
            *counts.entry(key.to_string()).or_default() += 1;
        }
    }

    let mut keyed = BTreeMap::new();
    let mut excluded = Vec::new();
    for item in items {
        let key = sku_key(sku_of(&item)).map(str::to_string);
        match key {
            None => excluded.push((item, ExclusionReason::MissingSku)),
            Some(key) if counts.get(&key).copied().unwrap_or(0) > 1 => {
                excluded.push((item, ExclusionReason::DuplicateSku))
            }
            Some(key) => {
                keyed.insert(key, item);
            }
        }
    }

    (keyed, excluded)
}

/// A product left out of a SKU index.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedProduct {
    /// The excluded product.
    pub product: ProductRecord,
    /// Why it was excluded.
    pub reason: ExclusionReason,
}

impl ExcludedProduct {
    /// Reports the exclusion as a skipped outcome.
    ///
    /// Products without a SKU are keyed by title and id instead.
    pub fn to_outcome(&self) -> OperationOutcome {
        let key = match self.product.sku_key() {
            Some(sku) => sku.to_string(),
            None => match self.product.id {
                Some(id) => format!("{} (id {id})", self.product.title),
                None => self.product.title.clone(),
            },
        };
        OperationOutcome::skipped(
            OperationRef::new(OperationKind::Product, key),
            self.reason.into(),
        )
    }
}

/// Read-only mapping from SKU to product for one catalog.
///
/// No two entries share a SKU, and every entry has a non-blank SKU.
#[derive(Debug, Clone, Default)]
pub struct SkuIndex {
    products: BTreeMap<String, ProductRecord>,
}

impl SkuIndex {
    /// Returns the product with this SKU.
    pub fn get(&self, sku: &str) -> Option<&ProductRecord> {
        self.products.get(sku)
    }

    /// Returns true if the SKU is indexed.
    pub fn contains(&self, sku: &str) -> bool {
        self.products.contains_key(sku)
    }

    /// Iterates entries in SKU order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProductRecord)> {
        self.products.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of indexed products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Builds the SKU index of one catalog.
///
/// Returns the index and the products excluded from it.
pub fn build_index(
    products: impl IntoIterator<Item = ProductRecord>,
) -> (SkuIndex, Vec<ExcludedProduct>) {
    let (products, excluded) = partition_by_sku(products, |p| p.sku.as_str());

    let excluded: Vec<ExcludedProduct> = excluded
        .into_iter()
        .map(|(product, reason)| ExcludedProduct { product, reason })
        .collect();
    for e in &excluded {
        warn!(title = %e.product.title, sku = %e.product.sku, reason = ?e.reason, "product excluded from SKU index");
    }

    (SkuIndex { products }, excluded)
}
