//! Storage error types for the ingestion storage abstraction.

/// Errors raised by a storage backend.
///
/// All of these are fatal to the enclosing bundle transaction, and the
/// pipeline treats them as fatal to the whole run: data-layer failures are
/// not assumed transient.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to reach or stay connected to the storage backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A transaction could not be started, committed, or rolled back.
    #[error("Transaction error: {message}")]
    Transaction {
        /// Description of the transaction error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Transaction` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::connection_error("refused");
        assert!(err.to_string().contains("Connection error"));

        let err = StorageError::transaction_error("already completed");
        assert!(err.to_string().contains("Transaction error"));

        let err = StorageError::internal("oops");
        assert!(err.to_string().contains("Internal error"));
    }
}
