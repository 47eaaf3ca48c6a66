//! Flat row representations of extracted resources.
//!
//! Each struct mirrors one table: scalar columns, nullable foreign keys, and
//! the verbatim source document carried as `data`. Structured attributes
//! (coded concepts and the like) stay as opaque JSON values; absent ones are
//! stored as an empty object, matching what downstream JSONB queries expect.

use crate::kind::ResourceKind;
use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct PatientRow {
    pub id: Uuid,
    /// External identifier, the first `identifier[].value` if present.
    pub resource_id: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<Date>,
    pub deceased_date: Option<OffsetDateTime>,
    pub marital_status: Value,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: Option<String>,
    pub class: Value,
    pub r#type: Value,
    pub period_start: Option<OffsetDateTime>,
    pub period_end: Option<OffsetDateTime>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub code: Value,
    pub clinical_status: Value,
    pub verification_status: Value,
    pub onset_date: Option<OffsetDateTime>,
    pub abatement_date: Option<OffsetDateTime>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReportRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub status: Option<String>,
    pub effective_date: Option<OffsetDateTime>,
    pub issued: Option<OffsetDateTime>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReferenceRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub status: Option<String>,
    pub r#type: Value,
    pub date: Option<OffsetDateTime>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: Option<String>,
    pub r#type: Value,
    pub r#use: Option<String>,
    pub billable_period_start: Option<OffsetDateTime>,
    pub billable_period_end: Option<OffsetDateTime>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationOfBenefitRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub claim_id: Option<Uuid>,
    pub status: Option<String>,
    pub r#type: Value,
    pub r#use: Option<String>,
    pub data: Value,
}

/// A successfully extracted row, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRow {
    Patient(PatientRow),
    Encounter(EncounterRow),
    Condition(ConditionRow),
    DiagnosticReport(DiagnosticReportRow),
    DocumentReference(DocumentReferenceRow),
    Claim(ClaimRow),
    ExplanationOfBenefit(ExplanationOfBenefitRow),
}

impl ResourceRow {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRow::Patient(_) => ResourceKind::Patient,
            ResourceRow::Encounter(_) => ResourceKind::Encounter,
            ResourceRow::Condition(_) => ResourceKind::Condition,
            ResourceRow::DiagnosticReport(_) => ResourceKind::DiagnosticReport,
            ResourceRow::DocumentReference(_) => ResourceKind::DocumentReference,
            ResourceRow::Claim(_) => ResourceKind::Claim,
            ResourceRow::ExplanationOfBenefit(_) => ResourceKind::ExplanationOfBenefit,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ResourceRow::Patient(row) => row.id,
            ResourceRow::Encounter(row) => row.id,
            ResourceRow::Condition(row) => row.id,
            ResourceRow::DiagnosticReport(row) => row.id,
            ResourceRow::DocumentReference(row) => row.id,
            ResourceRow::Claim(row) => row.id,
            ResourceRow::ExplanationOfBenefit(row) => row.id,
        }
    }

    /// The mandatory patient foreign key, `None` only for Patient rows.
    pub fn patient_id(&self) -> Option<Uuid> {
        match self {
            ResourceRow::Patient(_) => None,
            ResourceRow::Encounter(row) => Some(row.patient_id),
            ResourceRow::Condition(row) => Some(row.patient_id),
            ResourceRow::DiagnosticReport(row) => Some(row.patient_id),
            ResourceRow::DocumentReference(row) => Some(row.patient_id),
            ResourceRow::Claim(row) => Some(row.patient_id),
            ResourceRow::ExplanationOfBenefit(row) => Some(row.patient_id),
        }
    }

    /// The verbatim source document.
    pub fn data(&self) -> &Value {
        match self {
            ResourceRow::Patient(row) => &row.data,
            ResourceRow::Encounter(row) => &row.data,
            ResourceRow::Condition(row) => &row.data,
            ResourceRow::DiagnosticReport(row) => &row.data,
            ResourceRow::DocumentReference(row) => &row.data,
            ResourceRow::Claim(row) => &row.data,
            ResourceRow::ExplanationOfBenefit(row) => &row.data,
        }
    }
}
