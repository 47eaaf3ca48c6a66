//! Storage abstraction for the ingestion pipeline.
//!
//! The pipeline talks to a [`BundleStore`]; backends provide one transaction
//! per bundle via [`BundleTransaction`]. The PostgreSQL backend lives in
//! `fhirsink-db-postgres`; an in-memory backend for tests lives in
//! `fhirsink-db-memory`.

pub mod error;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use traits::{BundleStore, BundleTransaction, DynBundleStore};
pub use types::{InsertOutcome, KindCounts};
