//! Storage traits that ingestion backends implement.

use async_trait::async_trait;
use fhirsink_core::ResourceRow;
use std::sync::Arc;

use crate::error::StorageError;
use crate::types::{InsertOutcome, KindCounts};

/// One bundle's unit of atomicity.
///
/// Every row of a bundle goes through the same transaction: either the whole
/// bundle commits, or nothing does. Implementations must release the
/// underlying handle on every exit path; dropping an unfinished transaction
/// rolls it back.
#[async_trait]
pub trait BundleTransaction: Send {
    /// Stages one extracted row. Insertion is an idempotent upsert keyed by
    /// the row's identifier: an existing row is never overwritten.
    async fn insert(&mut self, row: &ResourceRow) -> Result<InsertOutcome, StorageError>;

    /// Commits every staged row.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discards every staged row.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// A store that ingests bundles and answers the validator's probes.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Opens the transaction for one bundle.
    async fn begin_bundle(&self) -> Result<Box<dyn BundleTransaction>, StorageError>;

    /// Stored row count per kind.
    async fn stored_counts(&self) -> Result<KindCounts, StorageError>;

    /// Per kind with a mandatory patient reference: the number of rows whose
    /// `patient_id` matches no stored patient. Orphans are transient while a
    /// run is in flight; only the end-of-run probe is authoritative.
    async fn orphan_counts(&self) -> Result<KindCounts, StorageError>;

    /// Identifies the backend in logs and reports.
    fn backend_name(&self) -> &'static str;
}

/// Type-erased shared store handle.
pub type DynBundleStore = Arc<dyn BundleStore>;
