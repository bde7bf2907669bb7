//! Error taxonomy for dependency flow orchestration.

use depflow_state::StorageError;
use uuid::Uuid;

use crate::codeflow::CodeFlowError;
use crate::remote::RemoteError;

use super::pull_request::CoherencyErrorDetails;

/// Errors produced by the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(Uuid),

    #[error("build not found: {0}")]
    BuildNotFound(u32),

    #[error("invalid pull request updater id: {0}")]
    InvalidUpdaterId(String),

    #[error("dependency {dependency} has non-existent coherent parent {parent}")]
    MissingCoherentParent { dependency: String, parent: String },

    #[error("coherency check failed: {}", summarize(.0))]
    Coherency(Vec<CoherencyErrorDetails>),

    #[error("build asset registry error: {0}")]
    Bar(String),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("code flow error: {0}")]
    CodeFlow(#[from] CodeFlowError),

    #[error("state storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn summarize(errors: &[CoherencyErrorDetails]) -> String {
    errors
        .iter()
        .map(|e| e.error.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for orchestration operations.
pub type FlowResult<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parent_names_both_dependencies() {
        let err = FlowError::MissingCoherentParent {
            dependency: "Microsoft.Extensions.Logging".to_string(),
            parent: "Microsoft.NETCore.App".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Microsoft.Extensions.Logging"));
        assert!(msg.contains("Microsoft.NETCore.App"));
    }

    #[test]
    fn test_coherency_error_lists_every_failure() {
        let err = FlowError::Coherency(vec![
            CoherencyErrorDetails {
                error: "repo-a @ abc does not contain dependency Foo".to_string(),
                potential_solutions: vec![],
            },
            CoherencyErrorDetails {
                error: "repo-b @ def does not contain dependency Bar".to_string(),
                potential_solutions: vec![],
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("dependency Foo; repo-b"));
    }

    #[test]
    fn test_storage_error_converts() {
        let err: FlowError = StorageError::Backend("down".to_string()).into();
        assert!(matches!(err, FlowError::Storage(_)));
    }
}
