//! Per-kind field extraction.
//!
//! Each extractor is a pure function from the raw resource document to the
//! flat row for its table. Absent optional fields become null columns,
//! unparseable timestamps degrade to null, and unrecognized resource types
//! are reported as [`Extraction::Skipped`] so the pipeline can count them.
//! Malformed identifiers and references are the one hard failure: they make
//! the whole entry unextractable.

use crate::error::{CoreError, Result};
use crate::kind::ResourceKind;
use crate::reference;
use crate::rows::{
    ClaimRow, ConditionRow, DiagnosticReportRow, DocumentReferenceRow, EncounterRow,
    ExplanationOfBenefitRow, PatientRow, ResourceRow,
};
use serde_json::{Map, Value};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Outcome of classifying and extracting one resource entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Row(ResourceRow),
    /// The entry's type is outside the supported set; counted, not an error.
    Skipped { resource_type: String },
}

/// Classifies a resource entry by its `resourceType` tag and runs the
/// matching extractor.
pub fn extract_resource(resource: &Value) -> Result<Extraction> {
    let type_tag = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(CoreError::MissingResourceType)?;

    let kind = match ResourceKind::from_str(type_tag) {
        Ok(kind) => kind,
        Err(_) => {
            return Ok(Extraction::Skipped {
                resource_type: type_tag.to_string(),
            });
        }
    };

    let row = match kind {
        ResourceKind::Patient => ResourceRow::Patient(extract_patient(resource)?),
        ResourceKind::Encounter => ResourceRow::Encounter(extract_encounter(resource)?),
        ResourceKind::Condition => ResourceRow::Condition(extract_condition(resource)?),
        ResourceKind::DiagnosticReport => {
            ResourceRow::DiagnosticReport(extract_diagnostic_report(resource)?)
        }
        ResourceKind::DocumentReference => {
            ResourceRow::DocumentReference(extract_document_reference(resource)?)
        }
        ResourceKind::Claim => ResourceRow::Claim(extract_claim(resource)?),
        ResourceKind::ExplanationOfBenefit => {
            ResourceRow::ExplanationOfBenefit(extract_explanation_of_benefit(resource)?)
        }
    };

    Ok(Extraction::Row(row))
}

fn extract_patient(resource: &Value) -> Result<PatientRow> {
    let id = resource_id(resource, ResourceKind::Patient)?;

    let resource_id = resource
        .get("identifier")
        .and_then(Value::as_array)
        .and_then(|identifiers| identifiers.first())
        .and_then(|identifier| identifier.get("value"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    Ok(PatientRow {
        id,
        resource_id,
        gender: text(resource, "gender"),
        birth_date: resource
            .get("birthDate")
            .and_then(Value::as_str)
            .and_then(crate::time::parse_date),
        deceased_date: datetime(resource, "deceasedDateTime"),
        marital_status: structure(resource, "maritalStatus"),
        data: resource.clone(),
    })
}

fn extract_encounter(resource: &Value) -> Result<EncounterRow> {
    let kind = ResourceKind::Encounter;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "subject")?;

    Ok(EncounterRow {
        id,
        patient_id,
        status: text(resource, "status"),
        class: structure(resource, "class"),
        r#type: first_structure(resource, "type"),
        period_start: nested_datetime(resource, "period", "start"),
        period_end: nested_datetime(resource, "period", "end"),
        data: resource.clone(),
    })
}

fn extract_condition(resource: &Value) -> Result<ConditionRow> {
    let kind = ResourceKind::Condition;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "subject")?;
    let encounter_id = optional_reference(resource, kind, id, "encounter")?;

    Ok(ConditionRow {
        id,
        patient_id,
        encounter_id,
        code: structure(resource, "code"),
        clinical_status: structure(resource, "clinicalStatus"),
        verification_status: structure(resource, "verificationStatus"),
        onset_date: datetime(resource, "onsetDateTime"),
        abatement_date: datetime(resource, "abatementDateTime"),
        data: resource.clone(),
    })
}

fn extract_diagnostic_report(resource: &Value) -> Result<DiagnosticReportRow> {
    let kind = ResourceKind::DiagnosticReport;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "subject")?;
    let encounter_id = optional_reference(resource, kind, id, "encounter")?;

    Ok(DiagnosticReportRow {
        id,
        patient_id,
        encounter_id,
        status: text(resource, "status"),
        effective_date: datetime(resource, "effectiveDateTime"),
        issued: datetime(resource, "issued"),
        data: resource.clone(),
    })
}

fn extract_document_reference(resource: &Value) -> Result<DocumentReferenceRow> {
    let kind = ResourceKind::DocumentReference;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "subject")?;

    // The encounter link sits under context.encounter[], not a plain field.
    let encounter_id = match resource
        .get("context")
        .and_then(|context| context.get("encounter"))
        .and_then(Value::as_array)
        .and_then(|encounters| encounters.first())
    {
        Some(target) => Some(reference_in(target, kind, id, "context.encounter")?),
        None => None,
    };

    Ok(DocumentReferenceRow {
        id,
        patient_id,
        encounter_id,
        status: text(resource, "status"),
        r#type: structure(resource, "type"),
        date: datetime(resource, "date"),
        data: resource.clone(),
    })
}

fn extract_claim(resource: &Value) -> Result<ClaimRow> {
    let kind = ResourceKind::Claim;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "patient")?;

    Ok(ClaimRow {
        id,
        patient_id,
        status: text(resource, "status"),
        r#type: structure(resource, "type"),
        r#use: text(resource, "use"),
        billable_period_start: nested_datetime(resource, "billablePeriod", "start"),
        billable_period_end: nested_datetime(resource, "billablePeriod", "end"),
        data: resource.clone(),
    })
}

fn extract_explanation_of_benefit(resource: &Value) -> Result<ExplanationOfBenefitRow> {
    let kind = ResourceKind::ExplanationOfBenefit;
    let id = resource_id(resource, kind)?;
    let patient_id = required_reference(resource, kind, id, "patient")?;
    let claim_id = optional_reference(resource, kind, id, "claim")?;

    Ok(ExplanationOfBenefitRow {
        id,
        patient_id,
        claim_id,
        status: text(resource, "status"),
        r#type: structure(resource, "type"),
        r#use: text(resource, "use"),
        data: resource.clone(),
    })
}

/// Parses the resource's own `id` as a canonical UUID.
fn resource_id(resource: &Value, kind: ResourceKind) -> Result<Uuid> {
    let raw = resource
        .get("id")
        .and_then(Value::as_str)
        .ok_or(CoreError::MissingId {
            resource_type: kind,
        })?;
    Uuid::parse_str(raw).map_err(|source| CoreError::invalid_id(kind, raw, source))
}

fn text(resource: &Value, field: &str) -> Option<String> {
    resource.get(field).and_then(Value::as_str).map(str::to_owned)
}

/// A structured attribute; absent fields become an empty object.
fn structure(resource: &Value, field: &str) -> Value {
    resource
        .get(field)
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// First element of an array-valued structured attribute, or an empty object.
fn first_structure(resource: &Value, field: &str) -> Value {
    resource
        .get(field)
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn datetime(resource: &Value, field: &str) -> Option<OffsetDateTime> {
    resource
        .get(field)
        .and_then(Value::as_str)
        .and_then(crate::time::parse_datetime)
}

fn nested_datetime(resource: &Value, outer: &str, inner: &str) -> Option<OffsetDateTime> {
    resource
        .get(outer)
        .and_then(|value| value.get(inner))
        .and_then(Value::as_str)
        .and_then(crate::time::parse_datetime)
}

/// A reference field that must be present and resolvable.
fn required_reference(
    resource: &Value,
    kind: ResourceKind,
    id: Uuid,
    field: &'static str,
) -> Result<Uuid> {
    let target = resource
        .get(field)
        .filter(|value| !value.is_null())
        .ok_or_else(|| CoreError::missing_reference(kind, id, field))?;
    reference_in(target, kind, id, field)
}

/// A reference field that may legitimately be absent (null foreign key), but
/// must resolve if present.
fn optional_reference(
    resource: &Value,
    kind: ResourceKind,
    id: Uuid,
    field: &'static str,
) -> Result<Option<Uuid>> {
    match resource.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(target) => reference_in(target, kind, id, field).map(Some),
    }
}

/// Resolves the `reference` string inside a reference-shaped object.
fn reference_in(target: &Value, kind: ResourceKind, id: Uuid, field: &'static str) -> Result<Uuid> {
    let raw = target.get("reference").and_then(Value::as_str).unwrap_or("");
    reference::reference_id(raw).map_err(|source| CoreError::invalid_reference(kind, id, field, source))
}
