//! Sync engine state machine.

use crate::collections::{plan_collections, ProductIdMap};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::{CancelHandle, Executor};
use crate::index::{build_index, ExcludedProduct, ExclusionReason};
use crate::planner::{plan_products, ProductPlan};
use crate::reader::{CatalogReader, CatalogSnapshot};
use crate::reporter::{summarize, RunSummary};
use crate::store::StoreClient;
use crate::transport::Transport;
use parking_lot::RwLock;
use serde::Serialize;
use skusync_model::{MigrationPlan, Operation, OperationOutcome, ProductRecord};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Engine is idle.
    Idle,
    /// Engine is fetching both catalog snapshots.
    Fetching,
    /// Engine is indexing and diffing products.
    Planning,
    /// Engine is creating and updating products.
    ExecutingProducts,
    /// Engine is matching collections and resolving members.
    ResolvingCollections,
    /// Engine is creating collections and linking members.
    ExecutingCollections,
    /// The last run completed.
    Completed,
    /// The last run aborted with an error.
    Failed,
    /// The last run was cancelled.
    Cancelled,
}

impl SyncState {
    /// Returns true if a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Fetching
                | SyncState::Planning
                | SyncState::ExecutingProducts
                | SyncState::ResolvingCollections
                | SyncState::ExecutingCollections
        )
    }

    /// Returns true if the engine can start a new run.
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }
}

/// Receives progress while a run executes.
///
/// Every method has an empty default, so sinks implement only what they
/// render.
pub trait ProgressSink: Send + Sync {
    /// Called when the engine enters a phase.
    fn phase(&self, _state: SyncState) {}

    /// Called once per outcome, as it becomes known.
    fn outcome(&self, _outcome: &OperationOutcome) {}

    /// Called once with the final summary.
    fn summary(&self, _summary: &RunSummary) {}
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {}

/// Result of a run: the summary and every outcome it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Aggregated counts.
    pub summary: RunSummary,
    /// Per-item outcomes.
    pub outcomes: Vec<OperationOutcome>,
}

/// What a run would do, computed without mutating the destination.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanPreview {
    /// Operations a run would execute, in tier order.
    ///
    /// Membership links to products not created yet carry no product id.
    pub plan: MigrationPlan,
    /// Items that would be skipped.
    pub skipped: Vec<OperationOutcome>,
}

impl PlanPreview {
    /// Returns true if a run would change nothing.
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

/// The sync engine copies a source catalog onto a destination store.
///
/// A run fetches both catalogs, plans product creates and updates by SKU,
/// executes them, then plans and executes collection creates and membership
/// links. Nothing at the destination is ever deleted.
pub struct SyncEngine<S: Transport, D: Transport> {
    config: SyncConfig,
    source: StoreClient<S>,
    destination: StoreClient<D>,
    state: RwLock<SyncState>,
    cancel: CancelHandle,
}

impl<S: Transport, D: Transport> SyncEngine<S, D> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, source: S, destination: D) -> Self {
        let source = StoreClient::new("source", source).with_page_size(config.page_size);
        let destination =
            StoreClient::new("destination", destination).with_page_size(config.page_size);
        Self {
            config,
            source,
            destination,
            state: RwLock::new(SyncState::Idle),
            cancel: CancelHandle::new(),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the source store client.
    pub fn source(&self) -> &StoreClient<S> {
        &self.source
    }

    /// Gets the destination store client.
    pub fn destination(&self) -> &StoreClient<D> {
        &self.destination
    }

    /// Returns a handle that cancels runs of this engine from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels any ongoing run. The engine stays cancelled until
    /// [`reset_cancel`](Self::reset_cancel) is called.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancel.reset();
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn enter(&self, state: SyncState, sink: &dyn ProgressSink) {
        info!(phase = ?state, "entering phase");
        self.set_state(state);
        sink.phase(state);
    }

    /// Moves from a resting state to `Fetching`, atomically.
    fn begin(&self, sink: &dyn ProgressSink) -> SyncResult<()> {
        {
            let mut state = self.state.write();
            if !state.can_start() {
                return Err(SyncError::InvalidStateTransition {
                    from: format!("{:?}", *state),
                    to: format!("{:?}", SyncState::Fetching),
                });
            }
            *state = SyncState::Fetching;
        }
        info!(phase = ?SyncState::Fetching, "entering phase");
        sink.phase(SyncState::Fetching);
        Ok(())
    }

    /// Records the terminal state of a run.
    fn finish<T>(&self, result: &SyncResult<T>, sink: &dyn ProgressSink) {
        let state = match result {
            Ok(_) if self.cancel.is_cancelled() => SyncState::Cancelled,
            Ok(_) => SyncState::Completed,
            Err(SyncError::Cancelled) => SyncState::Cancelled,
            Err(e) => {
                warn!(error = %e, "run aborted");
                SyncState::Failed
            }
        };
        self.enter(state, sink);
    }

    /// Fetches both snapshots concurrently. Either failure aborts the run.
    async fn fetch_snapshots(&self) -> SyncResult<(CatalogSnapshot, CatalogSnapshot)> {
        self.check_cancelled()?;
        let source = CatalogReader::new(&self.source);
        let destination = CatalogReader::new(&self.destination);
        futures::try_join!(source.fetch_snapshot(), destination.fetch_snapshot())
    }

    /// Indexes both catalogs and plans product operations.
    ///
    /// Returns the plan and the source products excluded from it.
    fn plan_product_phase(
        &self,
        source: Vec<ProductRecord>,
        destination: Vec<ProductRecord>,
    ) -> (ProductPlan, Vec<OperationOutcome>) {
        let (dest_index, dest_excluded) = build_index(destination);

        // A SKU shared by several destination products has no single match;
        // creating yet another product would only deepen the ambiguity.
        let ambiguous: BTreeSet<String> = dest_excluded
            .iter()
            .filter(|e| e.reason == ExclusionReason::DuplicateSku)
            .filter_map(|e| e.product.sku_key().map(str::to_string))
            .collect();
        let (source, blocked): (Vec<_>, Vec<_>) = source
            .into_iter()
            .partition(|p| p.sku_key().map_or(true, |sku| !ambiguous.contains(sku)));

        let (source_index, source_excluded) = build_index(source);

        let mut skipped: Vec<OperationOutcome> =
            source_excluded.iter().map(ExcludedProduct::to_outcome).collect();
        for product in blocked {
            warn!(sku = %product.sku, "SKU is ambiguous at destination, skipping");
            skipped.push(
                ExcludedProduct {
                    product,
                    reason: ExclusionReason::DuplicateSku,
                }
                .to_outcome(),
            );
        }

        let plan = plan_products(&source_index, &dest_index);
        info!(
            source = source_index.len(),
            destination = dest_index.len(),
            operations = plan.operations.len(),
            unchanged = plan.unchanged.len(),
            excluded = skipped.len(),
            "planned products"
        );
        (plan, skipped)
    }

    /// Computes what a run would do without mutating anything.
    pub async fn plan(&self) -> SyncResult<PlanPreview> {
        let sink = NoopSink;
        self.begin(&sink)?;
        let result = self.plan_inner(&sink).await;
        self.finish(&result, &sink);
        result
    }

    async fn plan_inner(&self, sink: &dyn ProgressSink) -> SyncResult<PlanPreview> {
        let (source, destination) = self.fetch_snapshots().await?;

        self.enter(SyncState::Planning, sink);
        let (product_plan, mut skipped) =
            self.plan_product_phase(source.products, destination.products);

        let mut ids = ProductIdMap::from_outcomes(&product_plan.unchanged);
        for op in &product_plan.operations {
            match op {
                Operation::CreateProduct { product } => ids.insert_pending(product.sku.clone()),
                Operation::UpdateProduct {
                    product_id, sku, ..
                } => ids.insert(sku.clone(), *product_id),
                _ => {}
            }
        }
        skipped.extend(product_plan.unchanged);

        let collection_plan = plan_collections(
            &source.collections,
            &destination.collections,
            &ids,
            self.config.publish_collections,
        );
        skipped.extend(collection_plan.skipped);

        let mut plan: MigrationPlan = product_plan.operations.into_iter().collect();
        plan.extend(collection_plan.operations);

        Ok(PlanPreview { plan, skipped })
    }

    /// Performs a full run and returns its report.
    ///
    /// Fails only if a snapshot cannot be fetched completely, or if the run
    /// is cancelled before any mutation. Once mutations start, every outcome
    /// ends up in the report, including failures and cancelled operations.
    pub async fn run(&self, sink: &dyn ProgressSink) -> SyncResult<RunReport> {
        self.begin(sink)?;
        let result = self.run_inner(sink).await;
        self.finish(&result, sink);
        result
    }

    async fn run_inner(&self, sink: &dyn ProgressSink) -> SyncResult<RunReport> {
        let start = Instant::now();
        let (source, destination) = self.fetch_snapshots().await?;
        self.check_cancelled()?;

        self.enter(SyncState::Planning, sink);
        let (product_plan, skipped) =
            self.plan_product_phase(source.products, destination.products);
        self.check_cancelled()?;

        let executor = Executor::new(&self.destination, self.config.concurrency_limit)
            .with_cancel(self.cancel.clone())
            .with_sink(sink);
        let mut outcomes = Vec::new();
        for outcome in skipped.into_iter().chain(product_plan.unchanged) {
            sink.outcome(&outcome);
            outcomes.push(outcome);
        }

        self.enter(SyncState::ExecutingProducts, sink);
        let plan: MigrationPlan = product_plan.operations.into_iter().collect();
        outcomes.extend(executor.execute(plan).await);

        self.enter(SyncState::ResolvingCollections, sink);
        let ids = ProductIdMap::from_outcomes(&outcomes);
        let collection_plan = plan_collections(
            &source.collections,
            &destination.collections,
            &ids,
            self.config.publish_collections,
        );
        for outcome in collection_plan.skipped {
            sink.outcome(&outcome);
            outcomes.push(outcome);
        }

        self.enter(SyncState::ExecutingCollections, sink);
        let plan: MigrationPlan = collection_plan.operations.into_iter().collect();
        outcomes.extend(executor.execute(plan).await);

        let summary = summarize(&outcomes);
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        sink.summary(&summary);

        Ok(RunReport { summary, outcomes })
    }
}
