//! Integration tests for full sync runs against in-memory stores.

use async_trait::async_trait;
use serde_json::Value;
use skusync_engine::{
    CancelHandle, MemoryStore, Method, NoopSink, Page, PageToken, ProgressSink, Query, SyncConfig,
    SyncEngine, SyncError, SyncState, Transport, TransportError, TransportResult,
};
use skusync_model::{
    ImageRecord, Operation, OperationKind, OperationOutcome, Price, ProductRecord, SkipReason,
    VariantRecord,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn price(p: &str) -> Price {
    Price::parse(p).unwrap()
}

fn product(sku: &str, title: &str) -> ProductRecord {
    ProductRecord::new(sku, title).with_variant(VariantRecord::new(sku, price("9.99"), 5))
}

fn source_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_shop_name("source").with_id_base(1_000))
}

fn destination_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_shop_name("destination").with_id_base(50_000))
}

fn engine(
    source: &Arc<MemoryStore>,
    destination: &Arc<MemoryStore>,
) -> SyncEngine<Arc<MemoryStore>, Arc<MemoryStore>> {
    SyncEngine::new(SyncConfig::new(), Arc::clone(source), Arc::clone(destination))
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let source = source_store();
    let destination = destination_store();

    let shirt = ProductRecord::new("S1", "Shirt")
        .with_description("<p>Cotton</p>")
        .with_variant(VariantRecord::new("S1", price("10"), 4).with_option("Size", "S"))
        .with_variant(VariantRecord::new("S1-M", price("12.5"), 2).with_option("Size", "M"))
        .with_images(vec![
            ImageRecord::new("https://cdn.source/front.jpg", "Front", 1),
            ImageRecord::new("https://cdn.source/back.jpg", "Back", 2),
        ]);
    let shirt_id = source.insert_product(&shirt);
    let mug_id = source.insert_product(&product("M1", "Mug"));
    let summer = source.insert_collection("Summer");
    source.insert_member(summer, shirt_id);
    source.insert_member(summer, mug_id);

    let first = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(first.summary.created, 2);
    assert_eq!(first.summary.collections_created, 1);
    assert_eq!(first.summary.memberships_linked, 2);
    assert!(first.summary.is_clean(), "{}", first.summary);

    let mutations = destination.mutation_count();
    let second = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(second.summary.created, 0);
    assert_eq!(second.summary.updated, 0);
    assert_eq!(second.summary.collections_created, 0);
    assert_eq!(second.summary.memberships_linked, 0);
    assert_eq!(
        second.summary.skipped_by_reason.get(&SkipReason::NoChange),
        Some(&2)
    );
    assert_eq!(destination.mutation_count(), mutations);

    let copied = destination.product_by_sku("S1").unwrap();
    assert_eq!(copied.variants.len(), 2);
    assert_eq!(copied.images.len(), 2);
    assert_eq!(copied.images[1].alt, "Back");
    let collections = destination.collections();
    assert_eq!(collections.len(), 1);
    assert!(collections[0].contains("S1") && collections[0].contains("M1"));
}

#[tokio::test]
async fn duplicate_skus_are_excluded() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("X1", "First"));
    source.insert_product(&product("X1", "Second"));
    source.insert_product(&product("A1", "Widget"));

    let report = engine(&source, &destination).run(&NoopSink).await.unwrap();

    assert_eq!(report.summary.created, 1);
    assert_eq!(
        report.summary.skipped_by_reason.get(&SkipReason::DuplicateSku),
        Some(&2)
    );
    assert!(destination.product_by_sku("X1").is_none());
    assert!(!report
        .outcomes
        .iter()
        .any(|o| o.operation.key == "X1" && o.operation.kind != OperationKind::Product));
}

#[tokio::test]
async fn unmatched_product_plans_single_create() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("A1", "Widget"));

    let preview = engine(&source, &destination).plan().await.unwrap();

    assert_eq!(preview.plan.len(), 1);
    match &preview.plan.operations()[0] {
        Operation::CreateProduct { product } => {
            assert_eq!(product.sku, "A1");
            assert_eq!(product.title, "Widget");
            assert_eq!(product.variants.len(), 1);
        }
        other => panic!("expected create, got {other:?}"),
    }
    assert_eq!(destination.mutation_count(), 0);
}

#[tokio::test]
async fn unchanged_product_issues_no_mutation() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("B2", "Gadget"));
    destination.insert_product(&product("B2", "Gadget"));

    let report = engine(&source, &destination).run(&NoopSink).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].skip_reason(), Some(SkipReason::NoChange));
    assert_eq!(destination.mutation_count(), 0);
}

#[tokio::test]
async fn collection_with_unresolved_member() {
    let source = source_store();
    let destination = destination_store();
    let a1 = source.insert_product(&product("A1", "Widget"));
    // Two products share Z9, so neither reaches the destination.
    let z9 = source.insert_product(&product("Z9", "Ghost"));
    source.insert_product(&product("Z9", "Ghost twin"));
    let summer = source.insert_collection("Summer");
    source.insert_member(summer, a1);
    source.insert_member(summer, z9);

    let report = engine(&source, &destination).run(&NoopSink).await.unwrap();

    assert_eq!(report.summary.collections_created, 1);
    assert_eq!(report.summary.memberships_linked, 1);
    let unresolved: Vec<&OperationOutcome> = report
        .outcomes
        .iter()
        .filter(|o| o.skip_reason() == Some(SkipReason::UnresolvedMember))
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].operation.key, "Summer/Z9");

    let collections = destination.collections();
    assert_eq!(collections[0].title, "Summer");
    assert_eq!(collections[0].members.len(), 1);
    assert!(collections[0].contains("A1"));
}

#[tokio::test]
async fn partial_failure_still_runs_later_tiers() {
    let source = source_store();
    let destination = destination_store();
    let ids = [
        source.insert_product(&product("A1", "Widget")),
        source.insert_product(&product("B2", "Gadget")),
        source.insert_product(&product("C3", "Gizmo")),
    ];
    destination.insert_product(&product("C3", "Old gizmo"));
    let summer = source.insert_collection("Summer");
    for id in ids {
        source.insert_member(summer, id);
    }
    destination.fail_when(|req| req.method == Method::Post && req.body_contains("\"B2\""));

    let report = engine(&source, &destination).run(&NoopSink).await.unwrap();

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.created + report.summary.updated, 2);
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.collections_created, 1);
    assert_eq!(report.summary.memberships_linked, 2);
    assert_eq!(
        report.summary.skipped_by_reason.get(&SkipReason::UnresolvedMember),
        Some(&1)
    );
    assert_eq!(report.summary.failures[0].operation.key, "B2");
    assert!(report.summary.failures[0].reason.contains("injected failure"));
    assert_eq!(
        destination.product_by_sku("C3").map(|p| p.title),
        Some("Gizmo".to_string())
    );
}

#[tokio::test]
async fn update_keeps_destination_only_variants() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(
        &ProductRecord::new("L1", "Lamp").with_variant(VariantRecord::new("L1", price("30"), 3)),
    );
    destination.insert_product(
        &ProductRecord::new("L1", "Lamp")
            .with_variant(VariantRecord::new("L1", price("25"), 3))
            .with_variant(VariantRecord::new("L1-BULB", price("4"), 40)),
    );

    let report = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(report.summary.updated, 1);

    let lamp = destination.product_by_sku("L1").unwrap();
    assert_eq!(lamp.variants.len(), 2);
    assert_eq!(lamp.variants[0].price, price("30"));
    assert_eq!(lamp.variants[1].sku, "L1-BULB");
}

#[tokio::test]
async fn duplicated_destination_variant_skus_do_not_grow() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(
        &ProductRecord::new("L1", "Desk Lamp")
            .with_variant(VariantRecord::new("L1", price("20"), 1))
            .with_variant(VariantRecord::new("L1-B", price("25"), 1)),
    );
    destination.insert_product(
        &ProductRecord::new("L1", "Lamp")
            .with_variant(VariantRecord::new("L1", price("20"), 1))
            .with_variant(VariantRecord::new("L1-B", price("25"), 1))
            .with_variant(VariantRecord::new("L1-B", price("25"), 1)),
    );

    let first = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(first.summary.updated, 1);
    let lamp = destination.product_by_sku("L1").unwrap();
    assert_eq!(lamp.title, "Desk Lamp");
    assert_eq!(lamp.variants.len(), 3);

    let mutations = destination.mutation_count();
    for _ in 0..2 {
        let again = engine(&source, &destination).run(&NoopSink).await.unwrap();
        assert_eq!(again.summary.updated, 0);
        assert_eq!(again.summary.created, 0);
    }
    assert_eq!(destination.mutation_count(), mutations);
    assert_eq!(destination.product_by_sku("L1").unwrap().variants.len(), 3);
}

#[tokio::test]
async fn differing_option_names_settle_after_one_update() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(
        &ProductRecord::new("T1", "Tee")
            .with_variant(VariantRecord::new("T1", price("8"), 2).with_option("Size", "S")),
    );
    destination.insert_product(
        &ProductRecord::new("T1", "Tee")
            .with_variant(VariantRecord::new("T1", price("9"), 2).with_option("Taille", "M")),
    );

    let first = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(first.summary.updated, 1);
    let tee = destination.product_by_sku("T1").unwrap();
    assert_eq!(tee.variants[0].price, price("8"));
    assert_eq!(tee.variants[0].option_values(), vec![(1, "S")]);

    let mutations = destination.mutation_count();
    let second = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(second.summary.updated, 0);
    assert_eq!(
        second.summary.skipped_by_reason.get(&SkipReason::NoChange),
        Some(&1)
    );
    assert_eq!(destination.mutation_count(), mutations);
}

#[tokio::test]
async fn relabelled_images_settle_after_one_update() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("P1", "Poster").with_images(vec![
        ImageRecord::new("https://cdn.source/1.jpg", "Front", 1),
        ImageRecord::new("https://cdn.source/2.jpg", "Back", 2),
    ]));
    destination.insert_product(&product("P1", "Poster").with_images(vec![
        ImageRecord::new("https://cdn.dest/a.jpg", "old front", 1),
        ImageRecord::new("https://cdn.dest/b.jpg", "old back", 2),
    ]));

    let first = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(first.summary.updated, 1);
    let poster = destination.product_by_sku("P1").unwrap();
    let alts: Vec<_> = poster.images.iter().map(|i| i.alt.as_str()).collect();
    assert_eq!(alts, vec!["Front", "Back"]);
    assert_eq!(poster.images[0].src, "https://cdn.dest/a.jpg");

    let mutations = destination.mutation_count();
    let second = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(second.summary.updated, 0);
    assert_eq!(destination.mutation_count(), mutations);
}

#[tokio::test]
async fn differing_image_counts_replace_then_settle() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("P1", "Poster").with_images(vec![
        ImageRecord::new("https://cdn.source/a.jpg", "A", 1),
        ImageRecord::new("https://cdn.source/b.jpg", "B", 2),
    ]));
    destination.insert_product(
        &product("P1", "Poster").with_images(vec![ImageRecord::new("https://cdn.dest/old.jpg", "Old", 1)]),
    );

    let first = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(first.summary.updated, 1);
    let poster = destination.product_by_sku("P1").unwrap();
    let alts: Vec<&str> = poster.images.iter().map(|i| i.alt.as_str()).collect();
    assert_eq!(alts, vec!["A", "B"]);

    let second = engine(&source, &destination).run(&NoopSink).await.unwrap();
    assert_eq!(second.summary.updated, 0);
    assert_eq!(second.summary.skipped, 1);
}

#[tokio::test]
async fn catalogs_are_paged_completely() {
    let source = source_store();
    let destination = destination_store();
    for i in 0..7 {
        source.insert_product(&product(&format!("P{i}"), &format!("Product {i}")));
    }
    let engine = SyncEngine::new(
        SyncConfig::new().with_page_size(2),
        Arc::clone(&source),
        Arc::clone(&destination),
    );

    let report = engine.run(&NoopSink).await.unwrap();

    assert_eq!(report.summary.created, 7);
    let product_pages = source
        .requests()
        .iter()
        .filter(|r| r.path == "products.json")
        .count();
    assert_eq!(product_pages, 4);
}

#[tokio::test]
async fn fetch_failure_aborts_with_resume_token() {
    let source = source_store();
    let destination = destination_store();
    for i in 0..5 {
        source.insert_product(&product(&format!("P{i}"), "Item"));
    }
    source.fail_when(|req| req.path == "products.json" && req.page() == Some("2"));
    let engine = SyncEngine::new(
        SyncConfig::new().with_page_size(2),
        Arc::clone(&source),
        Arc::clone(&destination),
    );

    let err = engine.run(&NoopSink).await.unwrap_err();

    match err {
        SyncError::CatalogFetch {
            store,
            resource,
            resume_from,
            ..
        } => {
            assert_eq!(store, "source");
            assert_eq!(resource, "products");
            assert_eq!(resume_from, Some(PageToken::new("2")));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert_eq!(engine.state(), SyncState::Failed);
    assert_eq!(destination.mutation_count(), 0);
}

/// Rejects the first write with a rate limit, then delegates.
struct RateLimitedOnce {
    inner: Arc<MemoryStore>,
    tripped: AtomicBool,
}

#[async_trait]
impl Transport for RateLimitedOnce {
    async fn get(&self, path: &str, query: &Query) -> TransportResult<Page> {
        self.inner.get(path, query).await
    }

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            });
        }
        self.inner.post(path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.inner.put(path, body).await
    }
}

#[tokio::test]
async fn rate_limit_is_an_ordinary_failure() {
    let source = source_store();
    let destination = destination_store();
    source.insert_product(&product("A1", "Widget"));
    let transport = RateLimitedOnce {
        inner: Arc::clone(&destination),
        tripped: AtomicBool::new(false),
    };
    let engine = SyncEngine::new(SyncConfig::new(), Arc::clone(&source), transport);

    let report = engine.run(&NoopSink).await.unwrap();

    assert_eq!(report.summary.failed, 1);
    assert_eq!(
        report.summary.failures[0].reason,
        "rate limited by store (retry after 1s)"
    );
    assert!(destination.product_by_sku("A1").is_none());
}

/// Cancels the run as soon as the first mutation completes.
struct CancelOnFirstMutation(CancelHandle);

impl ProgressSink for CancelOnFirstMutation {
    fn outcome(&self, outcome: &OperationOutcome) {
        if outcome.is_success() {
            self.0.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_lets_in_flight_work_finish() {
    let source = source_store();
    let destination = destination_store();
    for i in 0..4 {
        source.insert_product(&product(&format!("P{i}"), "Item"));
    }
    let engine = SyncEngine::new(
        SyncConfig::new().with_concurrency_limit(1),
        Arc::clone(&source),
        Arc::clone(&destination),
    );
    let sink = CancelOnFirstMutation(engine.cancel_handle());

    let report = engine.run(&sink).await.unwrap();

    assert_eq!(report.summary.created, 1);
    assert_eq!(
        report.summary.skipped_by_reason.get(&SkipReason::Cancelled),
        Some(&3)
    );
    assert_eq!(engine.state(), SyncState::Cancelled);
    assert_eq!(destination.products().len(), 1);
}
