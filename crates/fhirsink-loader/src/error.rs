use fhirsink_core::CoreError;
use fhirsink_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Run-level errors, each carrying enough context (bundle identity, and via
/// the source error the resource type and identifier) to diagnose the input
/// that caused it.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot enumerate bundle source {}: {source}", .dir.display())]
    Source {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read bundle {bundle}: {source}")]
    Read {
        bundle: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundle {bundle} is not valid JSON: {source}")]
    Parse {
        bundle: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Bundle {bundle}: {source}")]
    Mapping {
        bundle: String,
        #[source]
        source: CoreError,
    },

    #[error("Bundle {bundle}: {source}")]
    Storage {
        bundle: String,
        #[source]
        source: StorageError,
    },

    #[error("Validation probe failed: {0}")]
    Validation(#[source] StorageError),
}

impl LoadError {
    pub fn mapping(bundle: impl Into<String>, source: CoreError) -> Self {
        Self::Mapping {
            bundle: bundle.into(),
            source,
        }
    }

    pub fn storage(bundle: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            bundle: bundle.into(),
            source,
        }
    }

    /// Whether the skip-and-continue policy may absorb this error.
    ///
    /// Corrupt input (unreadable, unparseable, or unmappable bundles) is
    /// bounded to its bundle once the transaction is gone, so an operator may
    /// choose to keep going. Storage failures are never absorbed.
    pub fn is_bundle_local(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::Parse { .. } | Self::Mapping { .. }
        )
    }
}
