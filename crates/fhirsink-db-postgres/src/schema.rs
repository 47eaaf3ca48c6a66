//! Schema bootstrap for the PostgreSQL storage backend.
//!
//! The schema is a fixed set of seven tables, one per supported resource
//! kind: extracted columns, the verbatim document as JSONB, and the resource
//! identifier as primary key. There are deliberately no foreign-key
//! constraints; bundles arrive in arbitrary order, so a child row may be
//! committed before its parent and integrity is probed at the end of the run
//! instead. Schema evolution is out of scope: the DDL is `IF NOT EXISTS`
//! only, not a migration framework.

use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::{debug, info};

use crate::error::{PostgresError, Result};

const DDL: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS patients (
        id UUID PRIMARY KEY,
        resource_id TEXT,
        gender TEXT,
        birth_date DATE,
        deceased_date TIMESTAMPTZ,
        marital_status JSONB,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS encounters (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        status TEXT,
        class JSONB,
        type JSONB,
        period_start TIMESTAMPTZ,
        period_end TIMESTAMPTZ,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS conditions (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        encounter_id UUID,
        code JSONB,
        clinical_status JSONB,
        verification_status JSONB,
        onset_date TIMESTAMPTZ,
        abatement_date TIMESTAMPTZ,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS diagnostic_reports (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        encounter_id UUID,
        status TEXT,
        effective_date TIMESTAMPTZ,
        issued TIMESTAMPTZ,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS document_references (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        encounter_id UUID,
        status TEXT,
        type JSONB,
        date TIMESTAMPTZ,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS claims (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        status TEXT,
        type JSONB,
        use TEXT,
        billable_period_start TIMESTAMPTZ,
        billable_period_end TIMESTAMPTZ,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS explanations_of_benefit (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL,
        claim_id UUID,
        status TEXT,
        type JSONB,
        use TEXT,
        data JSONB NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_encounters_patient ON encounters (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_conditions_patient ON conditions (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_diagnostic_reports_patient ON diagnostic_reports (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_document_references_patient ON document_references (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_claims_patient ON claims (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_explanations_of_benefit_patient ON explanations_of_benefit (patient_id)",
];

/// Creates the seven resource tables and their indexes if they don't exist.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing ingestion schema");

    for statement in DDL {
        query(statement)
            .execute(pool)
            .await
            .map_err(|e| PostgresError::schema(format!("DDL failed: {e}")))?;
    }

    debug!(statements = DDL.len(), "Schema bootstrap complete");

    Ok(())
}
