//! Error types for depflow-state

use thiserror::Error;

/// Errors that can occur in the state persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend connection or query error
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Payload could not be encoded or decoded
    #[error("serialization failed for key '{key}': {reason}")]
    Serialization { key: String, reason: String },

    /// Schema setup error
    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    /// Lock could not be acquired before the timeout elapsed
    #[error("timed out acquiring lock '{key}' after {timeout_ms}ms")]
    LockTimeout { key: String, timeout_ms: u64 },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_displays_key_and_duration() {
        let err = StorageError::LockTimeout {
            key: "batched:org/repo:main".to_string(),
            timeout_ms: 1500,
        };
        let msg = err.to_string();
        assert!(msg.contains("batched:org/repo:main"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_serialization_error_names_key() {
        let err = StorageError::Serialization {
            key: "InProgressPullRequest:abc".to_string(),
            reason: "expected value".to_string(),
        };
        assert!(err.to_string().contains("InProgressPullRequest:abc"));
    }
}
