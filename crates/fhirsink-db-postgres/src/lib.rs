//! PostgreSQL storage backend for the ingestion pipeline.
//!
//! One table per resource kind, `id` as primary key, extracted columns plus
//! the verbatim document as JSONB. Inserts are idempotent
//! (`ON CONFLICT (id) DO NOTHING`), one transaction per bundle.

pub mod config;
pub mod error;
pub mod pool;
pub mod schema;
pub mod writer;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use writer::PostgresBundleStore;
