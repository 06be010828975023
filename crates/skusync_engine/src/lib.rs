//! # skusync engine
//!
//! Catalog synchronization engine: copies products, variants, images and
//! custom collections from a source store onto a destination store, keyed by
//! SKU.
//!
//! This crate provides:
//! - Catalog snapshots paged through an async transport
//! - SKU indexing with duplicate and missing SKU exclusion
//! - Field-level diffing into create and update operations
//! - Collection matching by title and member resolution by SKU
//! - Tiered execution with bounded concurrency
//! - Run summaries
//! - An in-memory store for tests and dry runs
//!
//! ## Architecture
//!
//! A run is a single pass:
//! 1. Fetch complete snapshots of both catalogs
//! 2. Index both by SKU and plan product creates and updates
//! 3. Execute product operations
//! 4. Resolve collection members against the product outcomes
//! 5. Execute collection creates, then membership links
//! 6. Summarize every outcome
//!
//! ## Key Invariants
//!
//! - Nothing at the destination is ever deleted
//! - No plan is built from a partial snapshot
//! - A failed operation never aborts the run
//! - Re-running against an unchanged source plans no operations
//! - The engine never retries; transports own backoff

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collections;
mod config;
mod engine;
mod error;
mod executor;
mod index;
mod memory;
mod planner;
mod reader;
mod reporter;
mod store;
mod transport;
mod wire;

pub use collections::{plan_collections, CollectionPlan, MemberResolution, ProductIdMap};
pub use config::{SyncConfig, MAX_PAGE_SIZE};
pub use engine::{NoopSink, PlanPreview, ProgressSink, RunReport, SyncEngine, SyncState};
pub use error::{
    StoreError, StoreResult, SyncError, SyncResult, TransportError, TransportResult,
};
pub use executor::{execute, CancelHandle, Executor};
pub use index::{build_index, partition_by_sku, ExcludedProduct, ExclusionReason, SkuIndex};
pub use memory::{MemoryStore, Method, Request};
pub use planner::{diff_images, diff_product, plan_products, ProductPlan};
pub use reader::{CatalogReader, CatalogSnapshot};
pub use reporter::{summarize, FailureEntry, RunSummary};
pub use store::StoreClient;
pub use transport::{Page, PageToken, Query, Transport};
pub use wire::Collect;
