//! The ingestion loop: one bundle fully extracted and committed before the
//! next begins.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use fhirsink_core::ResourceKind;
use fhirsink_core::extract::{Extraction, extract_resource};
use fhirsink_storage::{DynBundleStore, InsertOutcome, KindCounts};

use crate::config::ErrorPolicy;
use crate::error::LoadError;
use crate::source::{self, BundleSource};

/// End-of-run totals.
///
/// `processed` counts extraction successes ("attempted"), not persisted
/// rows: it advances even when the enclosing transaction later rolls back or
/// the insert is skipped as a duplicate. The reconciler compares it against
/// stored counts explicitly.
#[derive(Debug, Clone, Serialize)]
pub struct RunTotals {
    pub processed: KindCounts,
    pub skipped: u64,
    pub bundles_loaded: u64,
    pub bundles_failed: u64,
}

impl RunTotals {
    fn new() -> Self {
        Self {
            processed: ResourceKind::ALL.into_iter().map(|kind| (kind, 0)).collect(),
            skipped: 0,
            bundles_loaded: 0,
            bundles_failed: 0,
        }
    }
}

/// What one bundle contained.
#[derive(Debug, Default)]
struct BundleSummary {
    counts: KindCounts,
    skipped: u64,
    duplicates: u64,
}

fn format_counts(counts: &KindCounts) -> String {
    counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(kind, count)| format!("{kind}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct Pipeline {
    store: DynBundleStore,
    on_error: ErrorPolicy,
}

impl Pipeline {
    pub fn new(store: DynBundleStore, on_error: ErrorPolicy) -> Self {
        Self { store, on_error }
    }

    /// Processes every bundle the source enumerates, sequentially.
    ///
    /// Under the default [`ErrorPolicy::Abort`] the first corrupt bundle
    /// ends the run; under [`ErrorPolicy::Continue`] it is skipped whole (its
    /// transaction is already gone) and loading goes on. Storage failures end
    /// the run regardless of policy.
    pub async fn run(&self, bundles: &BundleSource) -> Result<RunTotals, LoadError> {
        let paths = bundles.discover()?;
        info!(
            count = paths.len(),
            dir = %bundles.dir().display(),
            backend = self.store.backend_name(),
            "Found bundle files to process"
        );

        let mut totals = RunTotals::new();
        for (index, path) in paths.iter().enumerate() {
            let name = source::bundle_name(path);
            info!(
                bundle = %name,
                n = index + 1,
                total = paths.len(),
                "Processing bundle"
            );

            match self.load_bundle(path, &name, &mut totals).await {
                Ok(summary) => {
                    totals.bundles_loaded += 1;
                    info!(
                        bundle = %name,
                        resources = %format_counts(&summary.counts),
                        skipped = summary.skipped,
                        duplicates = summary.duplicates,
                        "Bundle committed"
                    );
                }
                Err(err) if err.is_bundle_local() && self.on_error == ErrorPolicy::Continue => {
                    totals.bundles_failed += 1;
                    warn!(error = %err, "Skipping corrupt bundle and continuing");
                }
                Err(err) => {
                    warn!(
                        bundles_loaded = totals.bundles_loaded,
                        bundles_failed = totals.bundles_failed,
                        "Aborting run after fatal error"
                    );
                    return Err(err);
                }
            }
        }

        info!(
            bundles = totals.bundles_loaded,
            failed = totals.bundles_failed,
            resources = %format_counts(&totals.processed),
            skipped = totals.skipped,
            "Run complete"
        );

        Ok(totals)
    }

    /// Extracts one bundle and commits it in a single transaction.
    async fn load_bundle(
        &self,
        path: &Path,
        name: &str,
        totals: &mut RunTotals,
    ) -> Result<BundleSummary, LoadError> {
        let bundle = source::read_bundle(path, name)?;

        // Extract every entry before touching the store, so a mapping error
        // surfaces while nothing is staged.
        let mut summary = BundleSummary::default();
        let mut rows = Vec::new();
        for entry in &bundle.entry {
            match extract_resource(&entry.resource) {
                Ok(Extraction::Row(row)) => {
                    *totals.processed.entry(row.kind()).or_insert(0) += 1;
                    *summary.counts.entry(row.kind()).or_insert(0) += 1;
                    rows.push(row);
                }
                Ok(Extraction::Skipped { resource_type }) => {
                    totals.skipped += 1;
                    summary.skipped += 1;
                    debug!(
                        bundle = %name,
                        resource_type = %resource_type,
                        "Skipped unrecognized resource type"
                    );
                }
                Err(err) => return Err(LoadError::mapping(name, err)),
            }
        }

        let mut tx = self
            .store
            .begin_bundle()
            .await
            .map_err(|err| LoadError::storage(name, err))?;

        for row in &rows {
            match tx.insert(row).await {
                Ok(InsertOutcome::Inserted) => {}
                Ok(InsertOutcome::DuplicateSkipped) => {
                    summary.duplicates += 1;
                    debug!(
                        bundle = %name,
                        kind = %row.kind(),
                        id = %row.id(),
                        "Duplicate identifier skipped, first write wins"
                    );
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback after failed insert also failed");
                    }
                    return Err(LoadError::storage(name, err));
                }
            }
        }

        tx.commit()
            .await
            .map_err(|err| LoadError::storage(name, err))?;

        Ok(summary)
    }
}
