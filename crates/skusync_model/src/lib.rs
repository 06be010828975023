//! # skusync model
//!
//! Catalog records and sync plan types for skusync.
//!
//! This crate provides:
//! - `ProductRecord`, `VariantRecord`, `ImageRecord` and `CollectionRecord`
//!   snapshot types
//! - `Operation` and `MigrationPlan` for planned remote mutations
//! - `OperationOutcome` for per-operation results
//!
//! This is a pure data crate with no I/O operations. Converting loosely typed
//! store payloads into these shapes happens at the transport boundary in
//! `skusync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod id;
mod operation;
mod outcome;
mod plan;
mod product;

pub use collection::CollectionRecord;
pub use error::{ModelError, ModelResult};
pub use id::RemoteId;
pub use operation::{
    ImageChange, ImageLabel, Operation, OperationKind, ProductChanges, Tier, VariantUpdate,
};
pub use outcome::{OperationOutcome, OperationRef, OutcomeStatus, SkipReason};
pub use plan::MigrationPlan;
pub use product::{
    normalize_images, sku_key, ImageRecord, OptionValue, Price, ProductRecord, ProductStatus,
    VariantRecord,
};
