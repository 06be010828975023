//! Collection matching and membership planning.

use skusync_model::{
    CollectionRecord, Operation, OperationKind, OperationOutcome, OperationRef, OutcomeStatus,
    RemoteId, SkipReason,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// How a member SKU maps to a destination product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberResolution {
    /// The destination product exists with this id.
    Known(RemoteId),
    /// The product is created earlier in the same plan; its id is resolved
    /// when the link executes.
    Pending,
    /// No destination product for this SKU.
    Unresolved,
}

/// Destination product identities by SKU.
#[derive(Debug, Clone, Default)]
pub struct ProductIdMap {
    known: BTreeMap<String, RemoteId>,
    pending: BTreeSet<String>,
}

impl ProductIdMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a known destination id.
    pub fn insert(&mut self, sku: impl Into<String>, id: RemoteId) {
        let sku = sku.into();
        self.pending.remove(&sku);
        self.known.insert(sku, id);
    }

    /// Records a SKU whose product is yet to be created.
    pub fn insert_pending(&mut self, sku: impl Into<String>) {
        let sku = sku.into();
        if !self.known.contains_key(&sku) {
            self.pending.insert(sku);
        }
    }

    /// Builds the map from product outcomes.
    ///
    /// Successful creates and updates contribute their destination id, and
    /// so do products skipped because they were already in sync: they exist
    /// at the destination just the same. Failed and excluded products do not.
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a OperationOutcome>) -> Self {
        let mut map = Self::new();
        for outcome in outcomes {
            let is_product = matches!(
                outcome.operation.kind,
                OperationKind::CreateProduct | OperationKind::UpdateProduct
            );
            let usable = matches!(
                outcome.status,
                OutcomeStatus::Succeeded | OutcomeStatus::Skipped(SkipReason::NoChange)
            );
            if let (true, true, Some(id)) = (is_product, usable, outcome.destination_id) {
                map.insert(outcome.operation.key.clone(), id);
            }
        }
        map
    }

    /// Resolves a member SKU.
    pub fn resolve(&self, sku: &str) -> MemberResolution {
        if let Some(id) = self.known.get(sku) {
            MemberResolution::Known(*id)
        } else if self.pending.contains(sku) {
            MemberResolution::Pending
        } else {
            MemberResolution::Unresolved
        }
    }

    /// Returns the number of known ids.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if no id is known and nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.pending.is_empty()
    }
}

/// Collection operations planned for one run.
#[derive(Debug, Clone, Default)]
pub struct CollectionPlan {
    /// `CreateCollection` and `LinkCollectionMembership` operations.
    pub operations: Vec<Operation>,
    /// `Skipped(UnresolvedMember)` outcomes.
    pub skipped: Vec<OperationOutcome>,
}

/// Plans collection creates and membership links.
///
/// Source collections are matched to destination collections by exact,
/// case-sensitive title. Missing ones are created. Each member SKU is resolved
/// through `product_ids`; unresolvable members are reported as skipped
/// without affecting the rest of the collection. Links already present at the
/// destination are not planned again. Memberships are never removed.
pub fn plan_collections(
    source: &[CollectionRecord],
    dest: &[CollectionRecord],
    product_ids: &ProductIdMap,
    publish: bool,
) -> CollectionPlan {
    let mut dest_by_title: HashMap<&str, &CollectionRecord> = HashMap::new();
    for collection in dest {
        if dest_by_title.contains_key(collection.title.as_str()) {
            warn!(title = %collection.title, "destination has several collections with this title, using the first");
            continue;
        }
        dest_by_title.insert(collection.title.as_str(), collection);
    }

    // Source collections sharing a title land in the same destination
    // collection, so their members are merged.
    let mut titles: Vec<&str> = Vec::new();
    let mut merged: HashMap<&str, (String, BTreeSet<&str>)> = HashMap::new();
    for collection in source {
        let entry = merged.entry(collection.title.as_str()).or_insert_with(|| {
            titles.push(collection.title.as_str());
            (collection.description.clone(), BTreeSet::new())
        });
        entry.1.extend(collection.members.iter().map(String::as_str));
    }

    let mut plan = CollectionPlan::default();
    for title in titles {
        let (description, members) = &merged[title];
        let existing = dest_by_title.get(title).copied();
        let collection_id = existing.and_then(|c| c.id);

        if existing.is_none() {
            debug!(title, "collection missing at destination, planning create");
            plan.operations.push(Operation::CreateCollection {
                title: title.to_string(),
                description: description.clone(),
                published: publish,
            });
        }

        for sku in members {
            let product_id = match product_ids.resolve(sku) {
                MemberResolution::Known(id) => Some(id),
                MemberResolution::Pending => None,
                MemberResolution::Unresolved => {
                    warn!(collection = title, sku, "member has no destination product");
                    plan.skipped.push(OperationOutcome::skipped(
                        OperationRef::new(
                            OperationKind::LinkCollectionMembership,
                            format!("{title}/{sku}"),
                        ),
                        SkipReason::UnresolvedMember,
                    ));
                    continue;
                }
            };

            if existing.is_some_and(|c| c.contains(sku)) {
                debug!(collection = title, sku, "membership already present");
                continue;
            }

            plan.operations.push(Operation::LinkCollectionMembership {
                collection: title.to_string(),
                collection_id,
                sku: sku.to_string(),
                product_id,
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(pairs: &[(&str, u64)]) -> ProductIdMap {
        let mut map = ProductIdMap::new();
        for (sku, id) in pairs {
            map.insert(*sku, RemoteId::new(*id));
        }
        map
    }

    #[test]
    fn missing_collection_is_created_and_unresolved_members_skipped() {
        let source = vec![CollectionRecord::new("Summer")
            .with_member("A1")
            .with_member("Z9")];

        let plan = plan_collections(&source, &[], &ids(&[("A1", 10)]), true);

        assert_eq!(plan.operations.len(), 2);
        assert_eq!(
            plan.operations[0],
            Operation::CreateCollection {
                title: "Summer".into(),
                description: String::new(),
                published: true,
            }
        );
        assert_eq!(
            plan.operations[1],
            Operation::LinkCollectionMembership {
                collection: "Summer".into(),
                collection_id: None,
                sku: "A1".into(),
                product_id: Some(RemoteId::new(10)),
            }
        );
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].operation.key, "Summer/Z9");
        assert_eq!(
            plan.skipped[0].skip_reason(),
            Some(SkipReason::UnresolvedMember)
        );
    }

    #[test]
    fn existing_memberships_are_not_relinked() {
        let source = vec![CollectionRecord::new("Sale")
            .with_member("A1")
            .with_member("B2")];
        let dest = vec![CollectionRecord::new("Sale").with_id(5u64).with_member("A1")];

        let plan = plan_collections(&source, &dest, &ids(&[("A1", 10), ("B2", 11)]), true);

        assert_eq!(plan.operations.len(), 1);
        assert_eq!(
            plan.operations[0],
            Operation::LinkCollectionMembership {
                collection: "Sale".into(),
                collection_id: Some(RemoteId::new(5)),
                sku: "B2".into(),
                product_id: Some(RemoteId::new(11)),
            }
        );
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn titles_match_case_sensitively() {
        let source = vec![CollectionRecord::new("summer").with_member("A1")];
        let dest = vec![CollectionRecord::new("Summer").with_id(5u64).with_member("A1")];

        let plan = plan_collections(&source, &dest, &ids(&[("A1", 10)]), false);
        assert!(matches!(
            &plan.operations[0],
            Operation::CreateCollection { title, published: false, .. } if title == "summer"
        ));
        assert_eq!(plan.operations.len(), 2);
    }

    #[test]
    fn same_title_collections_are_merged() {
        let source = vec![
            CollectionRecord::new("Summer").with_member("A1"),
            CollectionRecord::new("Summer").with_member("B2").with_member("A1"),
        ];
        let plan = plan_collections(&source, &[], &ids(&[("A1", 1), ("B2", 2)]), true);

        let creates = plan
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::CreateCollection { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(plan.operations.len(), 3);
    }

    #[test]
    fn pending_members_are_linked_without_id() {
        let mut map = ProductIdMap::new();
        map.insert_pending("N1");
        let source = vec![CollectionRecord::new("New").with_member("N1")];

        let plan = plan_collections(&source, &[], &map, true);
        assert!(matches!(
            &plan.operations[1],
            Operation::LinkCollectionMembership { product_id: None, sku, .. } if sku == "N1"
        ));
    }

    #[test]
    fn id_map_from_outcomes() {
        let outcomes = vec![
            OperationOutcome::succeeded(
                OperationRef::new(OperationKind::CreateProduct, "A1"),
                Some(RemoteId::new(1)),
            ),
            OperationOutcome::skipped(
                OperationRef::new(OperationKind::UpdateProduct, "B2"),
                SkipReason::NoChange,
            )
            .with_destination(RemoteId::new(2)),
            OperationOutcome::failed(OperationRef::new(OperationKind::CreateProduct, "C3"), "boom"),
            OperationOutcome::skipped(
                OperationRef::new(OperationKind::Product, "X1"),
                SkipReason::DuplicateSku,
            ),
        ];

        let map = ProductIdMap::from_outcomes(&outcomes);
        assert_eq!(map.resolve("A1"), MemberResolution::Known(RemoteId::new(1)));
        assert_eq!(map.resolve("B2"), MemberResolution::Known(RemoteId::new(2)));
        assert_eq!(map.resolve("C3"), MemberResolution::Unresolved);
        assert_eq!(map.resolve("X1"), MemberResolution::Unresolved);
        assert_eq!(map.len(), 2);
    }
}
