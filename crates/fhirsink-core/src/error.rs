use crate::kind::ResourceKind;
use crate::reference::ReferenceError;
use thiserror::Error;
use uuid::Uuid;

/// Mapping errors raised while extracting a resource entry.
///
/// Every variant here is fatal to the enclosing bundle: a malformed id or
/// reference means the input is structurally corrupt and must not be
/// partially persisted. Unparseable timestamps are deliberately *not* errors;
/// they degrade to null at the parse site (see [`crate::time`]).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unrecognized resource type: {0}")]
    UnrecognizedResourceType(String),

    #[error("Resource entry has no resourceType discriminator")]
    MissingResourceType,

    #[error("{resource_type} resource is missing an id")]
    MissingId { resource_type: ResourceKind },

    #[error("{resource_type} id {id:?} is not a valid UUID: {source}")]
    InvalidId {
        resource_type: ResourceKind,
        id: String,
        #[source]
        source: uuid::Error,
    },

    #[error("{resource_type}/{id} is missing mandatory reference {field:?}")]
    MissingReference {
        resource_type: ResourceKind,
        id: Uuid,
        field: &'static str,
    },

    #[error("{resource_type}/{id} reference {field:?}: {source}")]
    InvalidReference {
        resource_type: ResourceKind,
        id: Uuid,
        field: &'static str,
        #[source]
        source: ReferenceError,
    },
}

impl CoreError {
    pub fn unrecognized_resource_type(resource_type: impl Into<String>) -> Self {
        Self::UnrecognizedResourceType(resource_type.into())
    }

    pub fn missing_id(resource_type: ResourceKind) -> Self {
        Self::MissingId { resource_type }
    }

    pub fn invalid_id(resource_type: ResourceKind, id: impl Into<String>, source: uuid::Error) -> Self {
        Self::InvalidId {
            resource_type,
            id: id.into(),
            source,
        }
    }

    pub fn missing_reference(resource_type: ResourceKind, id: Uuid, field: &'static str) -> Self {
        Self::MissingReference {
            resource_type,
            id,
            field,
        }
    }

    pub fn invalid_reference(
        resource_type: ResourceKind,
        id: Uuid,
        field: &'static str,
        source: ReferenceError,
    ) -> Self {
        Self::InvalidReference {
            resource_type,
            id,
            field,
            source,
        }
    }
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let id = Uuid::nil();
        let err = CoreError::missing_reference(ResourceKind::Encounter, id, "subject");
        let msg = err.to_string();
        assert!(msg.contains("Encounter"));
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("subject"));
    }

    #[test]
    fn test_invalid_id_names_the_offending_value() {
        let source = Uuid::parse_str("not-a-uuid").unwrap_err();
        let err = CoreError::invalid_id(ResourceKind::Condition, "not-a-uuid", source);
        assert!(err.to_string().contains("not-a-uuid"));
        assert!(err.to_string().contains("Condition"));
    }
}
