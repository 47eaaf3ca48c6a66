//! End-to-end pipeline tests against the in-memory backend.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use time::macros::datetime;
use uuid::Uuid;

use fhirsink_core::{ResourceKind, ResourceRow};
use fhirsink_db_memory::MemoryBundleStore;
use fhirsink_loader::config::ErrorPolicy;
use fhirsink_loader::pipeline::RunTotals;
use fhirsink_loader::{BundleSource, LoadError, Pipeline, reconcile};
use fhirsink_storage::{BundleStore, DynBundleStore};

const P1: &str = "530bf8f2-0fa0-4f1e-b45e-6d53c32cbf65";
const P2: &str = "0e85f322-bdc1-47ba-9c83-5a2e15c5f7ad";
const P3: &str = "c7e12a52-7b7a-4a37-98e1-41c0f518f3a7";
const E1: &str = "7a6ffcce-a5e4-49c6-a82b-8f273e716168";
const E2: &str = "2c9c3b3f-53c1-4bb3-96d0-9f21f1a4e53b";
const C1: &str = "6aa9bc1a-4a6f-4f7b-8f62-3a24c1f38a0f";

fn bundle(resources: &[Value]) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": resources.iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
    })
}

fn patient(id: &str, gender: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "gender": gender,
        "birthDate": "1970-01-01"
    })
}

fn encounter(id: &str, patient_id: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": "finished",
        "subject": {"reference": format!("Patient/{patient_id}")},
        "period": {"start": "2020-01-01T00:00:00Z"}
    })
}

fn condition(id: &str, patient_ref: &str) -> Value {
    json!({
        "resourceType": "Condition",
        "id": id,
        "subject": {"reference": patient_ref},
        "code": {"text": "Sinusitis"}
    })
}

fn write_bundle(dir: &Path, name: &str, bundle: &Value) {
    std::fs::write(dir.join(name), serde_json::to_vec_pretty(bundle).unwrap()).unwrap();
}

async fn run(
    dir: &Path,
    store: &Arc<MemoryBundleStore>,
    policy: ErrorPolicy,
) -> Result<RunTotals, LoadError> {
    let dyn_store: DynBundleStore = Arc::clone(store) as DynBundleStore;
    let pipeline = Pipeline::new(dyn_store, policy);
    pipeline.run(&BundleSource::new(dir.to_path_buf())).await
}

#[tokio::test]
async fn test_scenario_a_single_bundle_load() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "bundle_0001.json",
        &bundle(&[patient(P1, "male"), encounter(E1, P1)]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let totals = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();

    assert_eq!(totals.bundles_loaded, 1);
    assert_eq!(totals.processed[&ResourceKind::Patient], 1);
    assert_eq!(totals.processed[&ResourceKind::Encounter], 1);

    let p1 = Uuid::parse_str(P1).unwrap();
    match store.get(ResourceKind::Patient, p1).await.unwrap() {
        ResourceRow::Patient(row) => {
            assert_eq!(row.gender.as_deref(), Some("male"));
            assert_eq!(row.data["gender"], "male");
        }
        other => panic!("unexpected row: {other:?}"),
    }

    let e1 = Uuid::parse_str(E1).unwrap();
    match store.get(ResourceKind::Encounter, e1).await.unwrap() {
        ResourceRow::Encounter(row) => {
            assert_eq!(row.patient_id, p1);
            assert_eq!(row.period_start, Some(datetime!(2020-01-01 00:00:00 UTC)));
        }
        other => panic!("unexpected row: {other:?}"),
    }
}

#[tokio::test]
async fn test_scenario_b_reprocessing_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "bundle_0001.json",
        &bundle(&[patient(P1, "male"), encounter(E1, P1)]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let first = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();
    let rows_after_first = store.rows(ResourceKind::Patient).await;

    let mut totals = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();
    // Totals are per run; fold both runs together the way a single
    // duplicated enumeration would count them.
    for (kind, count) in first.processed {
        *totals.processed.entry(kind).or_insert(0) += count;
    }

    assert_eq!(store.rows(ResourceKind::Patient).await, rows_after_first);

    let report = reconcile::reconcile(store.as_ref(), &totals).await.unwrap();
    let patients = report.table(ResourceKind::Patient).unwrap();
    assert_eq!(patients.processed, 2);
    assert_eq!(patients.stored, 1);
    assert_eq!(patients.delta, 1);
    let encounters = report.table(ResourceKind::Encounter).unwrap();
    assert_eq!(encounters.delta, 1);
    assert!(report.has_count_mismatch());
}

#[tokio::test]
async fn test_scenario_c_malformed_reference_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "bundle_0001.json", &bundle(&[patient(P1, "male")]));
    write_bundle(
        dir.path(),
        "bundle_0002.json",
        &bundle(&[condition(C1, "Patient/not-a-uuid")]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let err = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap_err();

    // The error names both the bundle and the offending resource.
    let message = err.to_string();
    assert!(matches!(err, LoadError::Mapping { .. }));
    assert!(message.contains("bundle_0002.json"));
    assert!(message.contains(C1));

    // The corrupt bundle persisted nothing; the bundle before it did.
    let counts = store.stored_counts().await.unwrap();
    assert_eq!(counts[&ResourceKind::Condition], 0);
    assert_eq!(counts[&ResourceKind::Patient], 1);
}

#[tokio::test]
async fn test_failure_is_isolated_to_the_whole_bundle() {
    // One valid patient plus one condition with a malformed reference in the
    // same bundle: zero rows from that bundle, not one.
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "bundle_0001.json",
        &bundle(&[patient(P2, "female"), condition(C1, "Patient/not-a-uuid")]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let err = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap_err();
    assert!(matches!(err, LoadError::Mapping { .. }));

    let counts = store.stored_counts().await.unwrap();
    assert_eq!(counts[&ResourceKind::Patient], 0);
    assert_eq!(counts[&ResourceKind::Condition], 0);
}

#[tokio::test]
async fn test_scenario_d_orphans_resolve_regardless_of_order() {
    // Encounters enumerate first (sorted order), referencing patients that
    // only arrive in the second bundle; the inconsistency must be gone by
    // the time the validator runs.
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "a_encounters.json",
        &bundle(&[encounter(E1, P1), encounter(E2, P2)]),
    );
    write_bundle(
        dir.path(),
        "b_patients.json",
        &bundle(&[patient(P1, "male"), patient(P2, "female"), patient(P3, "other")]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let totals = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();

    assert_eq!(totals.processed[&ResourceKind::Patient], 3);

    let report = reconcile::reconcile(store.as_ref(), &totals).await.unwrap();
    assert_eq!(report.table(ResourceKind::Encounter).unwrap().orphans, Some(0));
    assert_eq!(report.table(ResourceKind::Patient).unwrap().stored, 3);
    assert_eq!(report.table(ResourceKind::Patient).unwrap().processed, 3);
    assert_eq!(report.total_orphans(), 0);
    assert!(!report.has_count_mismatch());
}

#[tokio::test]
async fn test_skip_and_continue_policy() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "bundle_0001.json",
        &bundle(&[condition(C1, "Patient/not-a-uuid")]),
    );
    write_bundle(dir.path(), "bundle_0002.json", &bundle(&[patient(P1, "male")]));

    let store = Arc::new(MemoryBundleStore::new());
    let totals = run(dir.path(), &store, ErrorPolicy::Continue).await.unwrap();

    assert_eq!(totals.bundles_failed, 1);
    assert_eq!(totals.bundles_loaded, 1);

    let counts = store.stored_counts().await.unwrap();
    assert_eq!(counts[&ResourceKind::Patient], 1);
    assert_eq!(counts[&ResourceKind::Condition], 0);
}

#[tokio::test]
async fn test_unrecognized_types_are_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        "bundle_0001.json",
        &bundle(&[
            patient(P1, "male"),
            json!({"resourceType": "Observation", "id": E1}),
            json!({"resourceType": "Immunization", "id": E2}),
        ]),
    );

    let store = Arc::new(MemoryBundleStore::new());
    let totals = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();

    assert_eq!(totals.skipped, 2);
    assert_eq!(totals.processed[&ResourceKind::Patient], 1);
}

#[tokio::test]
async fn test_report_is_structured_data() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "bundle_0001.json", &bundle(&[patient(P1, "male")]));

    let store = Arc::new(MemoryBundleStore::new());
    let totals = run(dir.path(), &store, ErrorPolicy::Abort).await.unwrap();
    let report = reconcile::reconcile(store.as_ref(), &totals).await.unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["backend"], "memory");
    let tables = value["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 7);
    let patients = tables
        .iter()
        .find(|t| t["table"] == "patients")
        .expect("patients table in report");
    assert_eq!(patients["stored"], 1);
    assert_eq!(patients["delta"], 0);
    // The patient table has no orphan probe.
    assert!(patients.get("orphans").is_none());
}
