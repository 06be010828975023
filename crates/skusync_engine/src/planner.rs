//! Create-vs-update decisions and field-level deltas.

use crate::index::{partition_by_sku, ExclusionReason, SkuIndex};
use skusync_model::{
    ImageChange, ImageLabel, ImageRecord, Operation, OperationKind, OperationOutcome, OperationRef,
    ProductChanges, ProductRecord, SkipReason, VariantUpdate,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Product operations planned for one run, plus the products that need none.
#[derive(Debug, Clone, Default)]
pub struct ProductPlan {
    /// `CreateProduct` and `UpdateProduct` operations, in SKU order.
    pub operations: Vec<Operation>,
    /// Outcomes of matched products that get no operation:
    /// `Skipped(NoChange)` with the destination id, or `Failed` when the
    /// destination match has no id to address it by.
    pub unchanged: Vec<OperationOutcome>,
}

/// Plans product creates and updates.
///
/// For every indexed source SKU: no destination match yields a
/// `CreateProduct` with the full source payload; a match yields an
/// `UpdateProduct` carrying only the fields that differ, or a
/// `Skipped(NoChange)` outcome when nothing differs. Nothing is ever planned
/// for deletion.
pub fn plan_products(source: &SkuIndex, dest: &SkuIndex) -> ProductPlan {
    let mut plan = ProductPlan::default();

    for (sku, product) in source.iter() {
        let Some(existing) = dest.get(sku) else {
            debug!(sku, "no destination match, planning create");
            plan.operations.push(Operation::CreateProduct {
                product: product.clone(),
            });
            continue;
        };

        let Some(product_id) = existing.id else {
            warn!(sku, "destination product has no id");
            plan.unchanged.push(OperationOutcome::failed(
                OperationRef::new(OperationKind::UpdateProduct, sku),
                "destination product has no id",
            ));
            continue;
        };

        let changes = diff_product(product, existing);
        if changes.is_empty() {
            plan.unchanged.push(
                OperationOutcome::skipped(
                    OperationRef::new(OperationKind::UpdateProduct, sku),
                    SkipReason::NoChange,
                )
                .with_destination(product_id),
            );
        } else {
            plan.operations.push(Operation::UpdateProduct {
                product_id,
                sku: sku.to_string(),
                changes,
            });
        }
    }

    plan
}

/// Computes the deltas that turn `dest` into `source`.
pub fn diff_product(source: &ProductRecord, dest: &ProductRecord) -> ProductChanges {
    let mut changes = ProductChanges {
        title: (source.title != dest.title).then(|| source.title.clone()),
        description: (source.description != dest.description)
            .then(|| source.description.clone()),
        status: (source.status != dest.status).then_some(source.status),
        ..Default::default()
    };

    diff_variants(source, dest, &mut changes);
    changes.images = diff_images(&source.images, &dest.images);
    changes
}

fn diff_variants(source: &ProductRecord, dest: &ProductRecord, changes: &mut ProductChanges) {
    let (source_variants, source_excluded) =
        partition_by_sku(source.variants.iter(), |v| v.sku.as_str());
    let (dest_variants, dest_excluded) =
        partition_by_sku(dest.variants.iter(), |v| v.sku.as_str());

    // A SKU shared by several destination variants has no single match, and
    // creating one more would only add another copy on every run.
    let ambiguous: BTreeSet<&str> = dest_excluded
        .iter()
        .filter(|(_, reason)| *reason == ExclusionReason::DuplicateSku)
        .map(|(v, _)| v.sku.as_str())
        .collect();

    for (variant, reason) in source_excluded {
        warn!(product = %source.sku, variant = %variant.sku, ?reason, "source variant left unmatched");
    }

    for (sku, variant) in source_variants {
        if ambiguous.contains(sku.as_str()) {
            warn!(product = %source.sku, variant = %sku, "variant SKU is ambiguous at destination, leaving unmatched");
            continue;
        }
        match dest_variants.get(&sku).and_then(|d| d.id.map(|id| (id, *d))) {
            Some((variant_id, existing)) => {
                let update = VariantUpdate {
                    variant_id,
                    sku,
                    price: (variant.price != existing.price).then_some(variant.price),
                    inventory_quantity: (variant.inventory_quantity
                        != existing.inventory_quantity)
                        .then_some(variant.inventory_quantity),
                    // Only slot values are written, so names are not compared.
                    options: (variant.option_values() != existing.option_values())
                        .then(|| variant.options.clone()),
                };
                if !update.is_empty() {
                    changes.variant_updates.push(update);
                }
            }
            None => {
                let mut created = variant.clone();
                created.id = None;
                changes.variant_creates.push(created);
            }
        }
    }

    // Every destination variant is kept, including ones the source does not
    // know and ones excluded for SKU problems.
    changes.existing_variants = dest.variants.iter().filter_map(|v| v.id).collect();
}

/// Compares image sets.
///
/// With equal counts, images are paired by position and only alt text is
/// compared: stores rehost images, so source URLs never equal destination
/// URLs. With differing counts, the source set replaces the destination set
/// wholesale; images are never appended.
pub fn diff_images(source: &[ImageRecord], dest: &[ImageRecord]) -> Option<ImageChange> {
    if source.len() != dest.len() {
        return Some(replace_images(source));
    }

    let differs = source.iter().zip(dest).any(|(s, d)| s.alt != d.alt);
    if !differs {
        return None;
    }

    let labels: Option<Vec<ImageLabel>> = source
        .iter()
        .zip(dest)
        .map(|(s, d)| {
            d.id.map(|image_id| ImageLabel {
                image_id,
                alt: s.alt.clone(),
            })
        })
        .collect();

    match labels {
        Some(labels) => Some(ImageChange::Relabel(labels)),
        None => Some(replace_images(source)),
    }
}

fn replace_images(source: &[ImageRecord]) -> ImageChange {
    ImageChange::Replace(
        source
            .iter()
            .map(|img| ImageRecord {
                id: None,
                ..img.clone()
            })
            .collect(),
    )
}
