//! Post-load validation: compare attempted counts against stored rows and
//! probe referential integrity.
//!
//! Runs exactly once, after the last bundle's transaction has completed;
//! orphan counts taken mid-run would report transient inconsistencies that
//! resolve on their own. A processed-vs-stored delta is expected whenever
//! duplicate identifiers were skipped by the idempotent upsert, so deltas
//! are reported for operator review, never raised as errors.

use serde::Serialize;
use tracing::{info, warn};

use fhirsink_core::ResourceKind;
use fhirsink_storage::BundleStore;

use crate::error::LoadError;
use crate::pipeline::RunTotals;

/// Reconciliation result for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub kind: ResourceKind,
    pub table: &'static str,
    /// Extraction successes, whether or not they were persisted.
    pub processed: u64,
    /// Rows actually in the store.
    pub stored: u64,
    /// `processed - stored`; positive when duplicates were skipped.
    pub delta: i64,
    /// Rows whose patient foreign key matches no stored patient.
    /// `None` for the patient table itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphans: Option<u64>,
}

/// The validator's structured report: data first, console text second, so
/// tests and downstream tooling can assert on it.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub backend: &'static str,
    pub tables: Vec<TableReport>,
}

impl ValidationReport {
    /// Any processed-vs-stored discrepancy (expected under reprocessing).
    pub fn has_count_mismatch(&self) -> bool {
        self.tables.iter().any(|table| table.delta != 0)
    }

    /// Total rows with a dangling patient reference across all tables.
    pub fn total_orphans(&self) -> u64 {
        self.tables
            .iter()
            .filter_map(|table| table.orphans)
            .sum()
    }

    pub fn table(&self, kind: ResourceKind) -> Option<&TableReport> {
        self.tables.iter().find(|table| table.kind == kind)
    }
}

/// Runs the validator against a fully loaded store.
pub async fn reconcile(
    store: &dyn BundleStore,
    totals: &RunTotals,
) -> Result<ValidationReport, LoadError> {
    let stored = store.stored_counts().await.map_err(LoadError::Validation)?;
    let orphans = store.orphan_counts().await.map_err(LoadError::Validation)?;

    let mut tables = Vec::with_capacity(ResourceKind::ALL.len());
    for kind in ResourceKind::ALL {
        let processed = totals.processed.get(&kind).copied().unwrap_or(0);
        let stored_count = stored.get(&kind).copied().unwrap_or(0);
        let report = TableReport {
            kind,
            table: kind.table_name(),
            processed,
            stored: stored_count,
            delta: processed as i64 - stored_count as i64,
            orphans: orphans.get(&kind).copied(),
        };

        info!(
            table = report.table,
            stored = report.stored,
            processed = report.processed,
            orphans = report.orphans,
            "Validated table"
        );
        if report.delta != 0 {
            warn!(
                table = report.table,
                processed = report.processed,
                stored = report.stored,
                "Processed vs stored count mismatch"
            );
        }
        if let Some(orphans) = report.orphans
            && orphans > 0
        {
            warn!(table = report.table, orphans, "Orphaned rows without a patient");
        }

        tables.push(report);
    }

    Ok(ValidationReport {
        backend: store.backend_name(),
        tables,
    })
}
