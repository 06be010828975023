//! Tiered, bounded-concurrency execution of migration plans.

use crate::engine::{NoopSink, ProgressSink};
use crate::error::StoreResult;
use crate::store::StoreClient;
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use skusync_model::{
    MigrationPlan, Operation, OperationKind, OperationOutcome, OperationRef, RemoteId, SkipReason,
    Tier,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared cancellation flag.
///
/// Cancelling stops new operations from being admitted; operations already in
/// flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Creates an uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Destination identities learned from earlier tiers.
#[derive(Debug, Default)]
struct Resolved {
    products: HashMap<String, RemoteId>,
    collections: HashMap<String, RemoteId>,
}

impl Resolved {
    fn record(&mut self, outcome: &OperationOutcome) {
        let Some(id) = outcome.destination_id.filter(|_| outcome.is_success()) else {
            return;
        };
        match outcome.operation.kind {
            OperationKind::CreateProduct | OperationKind::UpdateProduct => {
                self.products.insert(outcome.operation.key.clone(), id);
            }
            OperationKind::CreateCollection => {
                self.collections.insert(outcome.operation.key.clone(), id);
            }
            OperationKind::Product | OperationKind::LinkCollectionMembership => {}
        }
    }
}

/// Executes the operations of a [`MigrationPlan`] against a destination store.
///
/// Tiers run strictly in order. Within a tier at most `concurrency_limit`
/// operations are in flight. Each operation is attempted once; a failure is
/// recorded and never aborts the tier or the run.
pub struct Executor<'a, T: Transport> {
    store: &'a StoreClient<T>,
    concurrency_limit: usize,
    cancel: CancelHandle,
    sink: &'a dyn ProgressSink,
}

impl<'a, T: Transport> Executor<'a, T> {
    /// Creates an executor over a destination store.
    pub fn new(store: &'a StoreClient<T>, concurrency_limit: usize) -> Self {
        Self {
            store,
            concurrency_limit: concurrency_limit.max(1),
            cancel: CancelHandle::new(),
            sink: &NoopSink,
        }
    }

    /// Uses a shared cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reports each outcome to a progress sink as it completes.
    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// Executes every tier of the plan and returns one outcome per operation,
    /// in plan order.
    pub async fn execute(&self, plan: MigrationPlan) -> Vec<OperationOutcome> {
        let mut resolved = Resolved::default();
        let mut outcomes = Vec::with_capacity(plan.len());

        for (tier, operations) in plan.into_tiers() {
            let tier_outcomes = self.execute_tier(tier, operations, &resolved).await;
            for outcome in &tier_outcomes {
                resolved.record(outcome);
            }
            outcomes.extend(tier_outcomes);
        }

        outcomes
    }

    async fn execute_tier(
        &self,
        tier: Tier,
        operations: Vec<Operation>,
        resolved: &Resolved,
    ) -> Vec<OperationOutcome> {
        if operations.is_empty() {
            return Vec::new();
        }
        info!(?tier, count = operations.len(), limit = self.concurrency_limit, "executing tier");

        let mut indexed: Vec<(usize, OperationOutcome)> =
            stream::iter(operations.into_iter().enumerate())
                .map(|(i, op)| async move { (i, self.execute_one(op, resolved).await) })
                .buffer_unordered(self.concurrency_limit)
                .collect()
                .await;

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn execute_one(&self, op: Operation, resolved: &Resolved) -> OperationOutcome {
        let op_ref = OperationRef::from(&op);

        // Checked on admission: once the stream polls this future the
        // operation either starts or is reported as cancelled.
        let outcome = if self.cancel.is_cancelled() {
            OperationOutcome::skipped(op_ref, SkipReason::Cancelled)
        } else {
            match self.apply(&op, resolved).await {
                Ok(Applied::Done(id)) => {
                    debug!(operation = %op_ref, "operation succeeded");
                    OperationOutcome::succeeded(op_ref, id)
                }
                Ok(Applied::Skipped(reason)) => {
                    debug!(operation = %op_ref, %reason, "operation skipped");
                    OperationOutcome::skipped(op_ref, reason)
                }
                Err(e) => {
                    error!(operation = %op_ref, error = %e, "operation failed");
                    OperationOutcome::failed(op_ref, e.to_string())
                }
            }
        };

        self.sink.outcome(&outcome);
        outcome
    }

    async fn apply(&self, op: &Operation, resolved: &Resolved) -> StoreResult<Applied> {
        let id = match op {
            Operation::CreateProduct { product } => Some(self.store.create_product(product).await?),
            Operation::UpdateProduct {
                product_id,
                changes,
                ..
            } => Some(self.store.update_product(*product_id, changes).await?),
            Operation::CreateCollection {
                title,
                description,
                published,
            } => Some(
                self.store
                    .create_collection(title, description, *published)
                    .await?,
            ),
            Operation::LinkCollectionMembership {
                collection,
                collection_id,
                sku,
                product_id,
            } => {
                let collection_id =
                    collection_id.or_else(|| resolved.collections.get(collection).copied());
                let Some(collection_id) = collection_id else {
                    return Ok(Applied::Skipped(SkipReason::UnresolvedCollection));
                };
                let product_id = product_id.or_else(|| resolved.products.get(sku).copied());
                let Some(product_id) = product_id else {
                    return Ok(Applied::Skipped(SkipReason::UnresolvedMember));
                };
                self.store.add_to_collection(product_id, collection_id).await?
            }
        };
        Ok(Applied::Done(id))
    }
}

enum Applied {
    Done(Option<RemoteId>),
    Skipped(SkipReason),
}

/// Executes a plan with no cancellation and no progress reporting.
pub async fn execute<T: Transport>(
    plan: MigrationPlan,
    store: &StoreClient<T>,
    concurrency_limit: usize,
) -> Vec<OperationOutcome> {
    Executor::new(store, concurrency_limit).execute(plan).await
}
