use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use fhirsink_core::{ResourceKind, ResourceRow};
use fhirsink_storage::{BundleStore, BundleTransaction, InsertOutcome, KindCounts, StorageError};

type Tables = BTreeMap<ResourceKind, BTreeMap<Uuid, ResourceRow>>;

/// In-memory bundle store keyed like the relational schema: one map per
/// kind, row identifier as primary key.
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one stored row back, for assertions in tests.
    pub async fn get(&self, kind: ResourceKind, id: Uuid) -> Option<ResourceRow> {
        let tables = self.tables.read().await;
        tables.get(&kind).and_then(|rows| rows.get(&id)).cloned()
    }

    /// All stored rows of one kind, in identifier order.
    pub async fn rows(&self, kind: ResourceKind) -> Vec<ResourceRow> {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BundleStore for MemoryBundleStore {
    async fn begin_bundle(&self) -> Result<Box<dyn BundleTransaction>, StorageError> {
        Ok(Box::new(MemoryBundleTransaction {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
        }))
    }

    async fn stored_counts(&self) -> Result<KindCounts, StorageError> {
        let tables = self.tables.read().await;
        Ok(ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let count = tables.get(&kind).map(|rows| rows.len() as u64).unwrap_or(0);
                (kind, count)
            })
            .collect())
    }

    async fn orphan_counts(&self) -> Result<KindCounts, StorageError> {
        let tables = self.tables.read().await;
        let empty = BTreeMap::new();
        let patients = tables.get(&ResourceKind::Patient).unwrap_or(&empty);

        Ok(ResourceKind::ALL
            .into_iter()
            .filter(|kind| kind.requires_patient())
            .map(|kind| {
                let orphans = tables
                    .get(&kind)
                    .map(|rows| {
                        rows.values()
                            .filter(|row| {
                                row.patient_id()
                                    .is_some_and(|patient| !patients.contains_key(&patient))
                            })
                            .count() as u64
                    })
                    .unwrap_or(0);
                (kind, orphans)
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryBundleTransaction {
    tables: Arc<RwLock<Tables>>,
    staged: Vec<ResourceRow>,
}

#[async_trait]
impl BundleTransaction for MemoryBundleTransaction {
    async fn insert(&mut self, row: &ResourceRow) -> Result<InsertOutcome, StorageError> {
        let kind = row.kind();
        let id = row.id();

        let tables = self.tables.read().await;
        let already_stored = tables
            .get(&kind)
            .is_some_and(|rows| rows.contains_key(&id));
        drop(tables);

        let already_staged = self
            .staged
            .iter()
            .any(|staged| staged.kind() == kind && staged.id() == id);

        if already_stored || already_staged {
            return Ok(InsertOutcome::DuplicateSkipped);
        }

        self.staged.push(row.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        for row in self.staged {
            tables
                .entry(row.kind())
                .or_default()
                .entry(row.id())
                .or_insert(row);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        // Staged rows simply drop.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirsink_core::extract::{Extraction, extract_resource};
    use serde_json::json;

    const P1: &str = "530bf8f2-0fa0-4f1e-b45e-6d53c32cbf65";
    const E1: &str = "7a6ffcce-a5e4-49c6-a82b-8f273e716168";

    fn patient_row() -> ResourceRow {
        let doc = json!({"resourceType": "Patient", "id": P1, "gender": "male"});
        match extract_resource(&doc).unwrap() {
            Extraction::Row(row) => row,
            other => panic!("unexpected extraction: {other:?}"),
        }
    }

    fn encounter_row() -> ResourceRow {
        let doc = json!({
            "resourceType": "Encounter",
            "id": E1,
            "status": "finished",
            "subject": {"reference": format!("Patient/{P1}")}
        });
        match extract_resource(&doc).unwrap() {
            Extraction::Row(row) => row,
            other => panic!("unexpected extraction: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_commit_persists_staged_rows() {
        let store = MemoryBundleStore::new();
        let mut tx = store.begin_bundle().await.unwrap();
        assert_eq!(tx.insert(&patient_row()).await.unwrap(), InsertOutcome::Inserted);
        tx.commit().await.unwrap();

        let counts = store.stored_counts().await.unwrap();
        assert_eq!(counts[&ResourceKind::Patient], 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_rows() {
        let store = MemoryBundleStore::new();
        let mut tx = store.begin_bundle().await.unwrap();
        tx.insert(&patient_row()).await.unwrap();
        tx.rollback().await.unwrap();

        let counts = store.stored_counts().await.unwrap();
        assert_eq!(counts[&ResourceKind::Patient], 0);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_across_transactions() {
        let store = MemoryBundleStore::new();
        let mut tx = store.begin_bundle().await.unwrap();
        tx.insert(&patient_row()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin_bundle().await.unwrap();
        assert_eq!(
            tx.insert(&patient_row()).await.unwrap(),
            InsertOutcome::DuplicateSkipped
        );
        tx.commit().await.unwrap();

        assert_eq!(store.stored_counts().await.unwrap()[&ResourceKind::Patient], 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_one_transaction_is_skipped() {
        let store = MemoryBundleStore::new();
        let mut tx = store.begin_bundle().await.unwrap();
        assert_eq!(tx.insert(&patient_row()).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            tx.insert(&patient_row()).await.unwrap(),
            InsertOutcome::DuplicateSkipped
        );
        tx.commit().await.unwrap();

        assert_eq!(store.stored_counts().await.unwrap()[&ResourceKind::Patient], 1);
    }

    #[tokio::test]
    async fn test_orphan_probe_tracks_missing_patient() {
        let store = MemoryBundleStore::new();

        let mut tx = store.begin_bundle().await.unwrap();
        tx.insert(&encounter_row()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.orphan_counts().await.unwrap()[&ResourceKind::Encounter], 1);

        let mut tx = store.begin_bundle().await.unwrap();
        tx.insert(&patient_row()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.orphan_counts().await.unwrap()[&ResourceKind::Encounter], 0);
    }
}
