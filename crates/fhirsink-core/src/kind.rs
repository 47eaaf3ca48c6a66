use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of resource kinds the pipeline extracts.
///
/// Entries with any other `resourceType` are skipped (and counted), never an
/// error. Adding a kind means adding a variant here plus its extractor in
/// [`crate::extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    Encounter,
    Condition,
    DiagnosticReport,
    DocumentReference,
    Claim,
    ExplanationOfBenefit,
}

impl ResourceKind {
    /// All supported kinds, in stable order.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Patient,
        ResourceKind::Encounter,
        ResourceKind::Condition,
        ResourceKind::DiagnosticReport,
        ResourceKind::DocumentReference,
        ResourceKind::Claim,
        ResourceKind::ExplanationOfBenefit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Condition => "Condition",
            ResourceKind::DiagnosticReport => "DiagnosticReport",
            ResourceKind::DocumentReference => "DocumentReference",
            ResourceKind::Claim => "Claim",
            ResourceKind::ExplanationOfBenefit => "ExplanationOfBenefit",
        }
    }

    /// Table backing this kind in the relational store.
    pub fn table_name(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "patients",
            ResourceKind::Encounter => "encounters",
            ResourceKind::Condition => "conditions",
            ResourceKind::DiagnosticReport => "diagnostic_reports",
            ResourceKind::DocumentReference => "document_references",
            ResourceKind::Claim => "claims",
            ResourceKind::ExplanationOfBenefit => "explanations_of_benefit",
        }
    }

    /// Whether rows of this kind carry a mandatory `patient_id` foreign key.
    pub fn requires_patient(&self) -> bool {
        !matches!(self, ResourceKind::Patient)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceKind::Patient),
            "Encounter" => Ok(ResourceKind::Encounter),
            "Condition" => Ok(ResourceKind::Condition),
            "DiagnosticReport" => Ok(ResourceKind::DiagnosticReport),
            "DocumentReference" => Ok(ResourceKind::DocumentReference),
            "Claim" => Ok(ResourceKind::Claim),
            "ExplanationOfBenefit" => Ok(ResourceKind::ExplanationOfBenefit),
            other => Err(CoreError::unrecognized_resource_type(other)),
        }
    }
}
