//! Merge policies gate automatic merging of tracked pull requests.
//!
//! A [`MergePolicyDefinition`](crate::domain::MergePolicyDefinition) names a
//! builder; the builder turns it into one or more [`MergePolicy`] checks.
//! Each check yields a single [`MergePolicyEvaluationResult`]. The
//! [`MergePolicyEvaluator`] runs them all and aggregates the outcome.

pub mod builtins;
pub mod evaluator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{InProgressPullRequest, MergePolicyDefinition};
use crate::remote::Remote;

pub use builtins::{default_builders, version_is_downgrade};
pub use evaluator::{DefaultMergePolicyEvaluator, MergePolicyEvaluator};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicyEvaluationStatus {
    Pending,
    Success,
    /// May succeed on a later evaluation without a new commit.
    TransientFailure,
    /// Will not change until the pull request head changes.
    PermanentFailure,
}

impl MergePolicyEvaluationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MergePolicyEvaluationStatus::TransientFailure
                | MergePolicyEvaluationStatus::PermanentFailure
        )
    }

    /// Results that stay valid while the head commit does not move.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MergePolicyEvaluationStatus::Success | MergePolicyEvaluationStatus::PermanentFailure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicyEvaluationResult {
    pub status: MergePolicyEvaluationStatus,
    pub title: String,
    pub message: String,
    pub merge_policy_name: String,
    pub merge_policy_display_name: String,
}

/// Results of one evaluation pass, tagged with the head commit they were
/// computed for. Also persisted per updater as the re-evaluation cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicyEvaluationResults {
    pub results: Vec<MergePolicyEvaluationResult>,
    pub target_commit_sha: String,
}

impl MergePolicyEvaluationResults {
    pub fn failed(&self) -> bool {
        self.results.iter().any(|r| r.status.is_failure())
    }

    pub fn pending(&self) -> bool {
        !self.failed()
            && self
                .results
                .iter()
                .any(|r| r.status == MergePolicyEvaluationStatus::Pending)
    }

    pub fn succeeded(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|r| r.status == MergePolicyEvaluationStatus::Success)
    }

    pub fn result_for(&self, policy_name: &str) -> Option<&MergePolicyEvaluationResult> {
        self.results
            .iter()
            .find(|r| r.merge_policy_name == policy_name)
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MergePolicy: Send + Sync {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        remote: &dyn Remote,
    ) -> MergePolicyEvaluationResult;

    fn result(
        &self,
        status: MergePolicyEvaluationStatus,
        title: &str,
        message: &str,
    ) -> MergePolicyEvaluationResult {
        MergePolicyEvaluationResult {
            status,
            title: title.to_string(),
            message: message.to_string(),
            merge_policy_name: self.name().to_string(),
            merge_policy_display_name: self.display_name().to_string(),
        }
    }

    fn succeed(&self, title: &str) -> MergePolicyEvaluationResult {
        self.result(MergePolicyEvaluationStatus::Success, title, "")
    }

    fn pending(&self, title: &str) -> MergePolicyEvaluationResult {
        self.result(MergePolicyEvaluationStatus::Pending, title, "")
    }

    fn fail_transiently(&self, title: &str, message: &str) -> MergePolicyEvaluationResult {
        self.result(MergePolicyEvaluationStatus::TransientFailure, title, message)
    }

    fn fail_decisively(&self, title: &str, message: &str) -> MergePolicyEvaluationResult {
        self.result(MergePolicyEvaluationStatus::PermanentFailure, title, message)
    }
}

/// Turns a named definition into concrete checks.
pub trait MergePolicyBuilder: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self, definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: MergePolicyEvaluationStatus) -> MergePolicyEvaluationResult {
        MergePolicyEvaluationResult {
            status,
            title: String::new(),
            message: String::new(),
            merge_policy_name: name.to_string(),
            merge_policy_display_name: name.to_string(),
        }
    }

    fn results(statuses: &[MergePolicyEvaluationStatus]) -> MergePolicyEvaluationResults {
        MergePolicyEvaluationResults {
            results: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| result(&format!("p{i}"), *s))
                .collect(),
            target_commit_sha: "abc".to_string(),
        }
    }

    #[test]
    fn test_aggregate_classification() {
        use MergePolicyEvaluationStatus::*;

        let empty = results(&[]);
        assert!(!empty.failed() && !empty.pending() && !empty.succeeded());

        let ok = results(&[Success, Success]);
        assert!(ok.succeeded() && !ok.pending() && !ok.failed());

        let waiting = results(&[Success, Pending]);
        assert!(waiting.pending() && !waiting.succeeded() && !waiting.failed());

        let broken = results(&[Pending, TransientFailure]);
        assert!(broken.failed() && !broken.pending());

        assert!(results(&[PermanentFailure]).failed());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(MergePolicyEvaluationStatus::Success.is_terminal());
        assert!(MergePolicyEvaluationStatus::PermanentFailure.is_terminal());
        assert!(!MergePolicyEvaluationStatus::TransientFailure.is_terminal());
        assert!(!MergePolicyEvaluationStatus::Pending.is_terminal());
    }
}
