//! Idempotent bundle writer backed by PostgreSQL transactions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgPool, PgTransaction};
use time::{Date, OffsetDateTime};

use fhirsink_core::{ResourceKind, ResourceRow};
use fhirsink_storage::{BundleStore, BundleTransaction, InsertOutcome, KindCounts, StorageError};

use crate::config::PostgresConfig;
use crate::error::PostgresError;
use crate::pool;

/// Converts a time OffsetDateTime to a chrono DateTime for column binds.
fn to_chrono(dt: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()).unwrap_or_default()
}

/// Converts a time Date to a chrono NaiveDate for column binds.
fn to_chrono_date(date: Date) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), u32::from(u8::from(date.month())), u32::from(date.day()))
        .unwrap_or_default()
}

/// PostgreSQL-backed bundle store.
#[derive(Debug, Clone)]
pub struct PostgresBundleStore {
    pool: PgPool,
}

impl PostgresBundleStore {
    /// Creates a store from the given configuration: builds the pool and
    /// probes the connection so an unusable setup fails at startup.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let pool = pool::create_pool(config).await?;
        pool::test_connection(&pool).await?;
        Ok(Self { pool })
    }

    /// Creates a store from an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BundleStore for PostgresBundleStore {
    async fn begin_bundle(&self) -> Result<Box<dyn BundleTransaction>, StorageError> {
        let tx = self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })?;
        Ok(Box::new(PostgresBundleTransaction { tx: Some(tx) }))
    }

    async fn stored_counts(&self) -> Result<KindCounts, StorageError> {
        let mut counts = KindCounts::new();
        for kind in ResourceKind::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
            let count: i64 = query_scalar(&sql).fetch_one(&self.pool).await.map_err(|e| {
                StorageError::internal(format!("Failed to count {}: {e}", kind.table_name()))
            })?;
            counts.insert(kind, count as u64);
        }
        Ok(counts)
    }

    async fn orphan_counts(&self) -> Result<KindCounts, StorageError> {
        let mut counts = KindCounts::new();
        for kind in ResourceKind::ALL.into_iter().filter(ResourceKind::requires_patient) {
            let sql = format!(
                "SELECT COUNT(*) FROM {table} child
                 LEFT JOIN patients p ON child.patient_id = p.id
                 WHERE p.id IS NULL",
                table = kind.table_name()
            );
            let count: i64 = query_scalar(&sql).fetch_one(&self.pool).await.map_err(|e| {
                StorageError::internal(format!(
                    "Orphan probe failed for {}: {e}",
                    kind.table_name()
                ))
            })?;
            counts.insert(kind, count as u64);
        }
        Ok(counts)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// One bundle's transaction. Dropped without an explicit commit or rollback,
/// the underlying sqlx transaction rolls back on its own, so a handle can
/// never leak a half-written bundle.
pub struct PostgresBundleTransaction {
    tx: Option<PgTransaction<'static>>,
}

impl PostgresBundleTransaction {
    fn tx(&mut self) -> Result<&mut PgTransaction<'static>, StorageError> {
        self.tx.as_mut().ok_or_else(|| {
            StorageError::transaction_error("Transaction already completed (committed or rolled back)")
        })
    }
}

#[async_trait]
impl BundleTransaction for PostgresBundleTransaction {
    async fn insert(&mut self, row: &ResourceRow) -> Result<InsertOutcome, StorageError> {
        let kind = row.kind();
        let id = row.id();
        let tx = self.tx()?;

        let result = match row {
            ResourceRow::Patient(row) => {
                query(
                    "INSERT INTO patients (id, resource_id, gender, birth_date, deceased_date, marital_status, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.resource_id.as_deref())
                .bind(row.gender.as_deref())
                .bind(row.birth_date.map(to_chrono_date))
                .bind(row.deceased_date.map(to_chrono))
                .bind(&row.marital_status)
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::Encounter(row) => {
                query(
                    "INSERT INTO encounters (id, patient_id, status, class, type, period_start, period_end, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.status.as_deref())
                .bind(&row.class)
                .bind(&row.r#type)
                .bind(row.period_start.map(to_chrono))
                .bind(row.period_end.map(to_chrono))
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::Condition(row) => {
                query(
                    "INSERT INTO conditions (id, patient_id, encounter_id, code, clinical_status, verification_status, onset_date, abatement_date, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.encounter_id)
                .bind(&row.code)
                .bind(&row.clinical_status)
                .bind(&row.verification_status)
                .bind(row.onset_date.map(to_chrono))
                .bind(row.abatement_date.map(to_chrono))
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::DiagnosticReport(row) => {
                query(
                    "INSERT INTO diagnostic_reports (id, patient_id, encounter_id, status, effective_date, issued, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.encounter_id)
                .bind(row.status.as_deref())
                .bind(row.effective_date.map(to_chrono))
                .bind(row.issued.map(to_chrono))
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::DocumentReference(row) => {
                query(
                    "INSERT INTO document_references (id, patient_id, encounter_id, status, type, date, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.encounter_id)
                .bind(row.status.as_deref())
                .bind(&row.r#type)
                .bind(row.date.map(to_chrono))
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::Claim(row) => {
                query(
                    "INSERT INTO claims (id, patient_id, status, type, use, billable_period_start, billable_period_end, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.status.as_deref())
                .bind(&row.r#type)
                .bind(row.r#use.as_deref())
                .bind(row.billable_period_start.map(to_chrono))
                .bind(row.billable_period_end.map(to_chrono))
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
            ResourceRow::ExplanationOfBenefit(row) => {
                query(
                    "INSERT INTO explanations_of_benefit (id, patient_id, claim_id, status, type, use, data)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(row.id)
                .bind(row.patient_id)
                .bind(row.claim_id)
                .bind(row.status.as_deref())
                .bind(&row.r#type)
                .bind(row.r#use.as_deref())
                .bind(&row.data)
                .execute(&mut **tx)
                .await
            }
        };

        let result = result
            .map_err(|e| StorageError::internal(format!("Failed to insert {kind}/{id}: {e}")))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::DuplicateSkipped)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
            })?;
            tracing::debug!("Bundle transaction committed");
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            tracing::debug!("Bundle transaction rolled back");
        }
        Ok(())
    }
}

impl Drop for PostgresBundleTransaction {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                "Bundle transaction dropped without explicit commit/rollback - will auto-rollback"
            );
            // The inner sqlx Transaction's Drop impl issues the ROLLBACK.
        }
    }
}
