//! Relative-reference resolution.
//!
//! Foreign keys arrive embedded in reference strings of the form
//! `<Type>/<id>` (e.g. `Patient/530bf8f2-…`). The resolver takes the trailing
//! path segment and requires it to parse as a canonical UUID. Synthea-style
//! bundles also emit `urn:uuid:<id>` references; those carry no slash, and
//! the UUID parser accepts the URN form directly, so they resolve the same
//! way.

use thiserror::Error;
use uuid::Uuid;

/// Why a present reference string could not be resolved to an identifier.
///
/// The caller decides the blast radius; within this pipeline a present but
/// unresolvable reference is always fatal to the enclosing bundle.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference is empty")]
    Empty,

    #[error("reference {reference:?} does not end in a valid UUID: {source}")]
    InvalidUuid {
        reference: String,
        #[source]
        source: uuid::Error,
    },
}

/// Extracts the identifier from a relative reference string.
pub fn reference_id(reference: &str) -> Result<Uuid, ReferenceError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let segment = reference.rsplit('/').next().unwrap_or(reference);

    Uuid::parse_str(segment).map_err(|source| ReferenceError::InvalidUuid {
        reference: reference.to_string(),
        source,
    })
}
