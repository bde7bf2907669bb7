//! Runs the configured merge policies against a pull request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::builtins::default_builders;
use super::{
    MergePolicyBuilder, MergePolicyEvaluationResult, MergePolicyEvaluationResults,
    MergePolicyEvaluationStatus,
};
use crate::domain::{InProgressPullRequest, MergePolicyDefinition};
use crate::remote::Remote;

#[async_trait]
pub trait MergePolicyEvaluator: Send + Sync {
    /// Evaluate `definitions` for the pull request at `target_commit_sha`.
    ///
    /// `cached` is the previous pass for the same updater. A policy whose
    /// cached result was computed for the same commit and is terminal
    /// (success or permanent failure) is not run again.
    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        remote: &dyn Remote,
        definitions: &[MergePolicyDefinition],
        cached: Option<&MergePolicyEvaluationResults>,
        target_commit_sha: &str,
    ) -> MergePolicyEvaluationResults;
}

pub struct DefaultMergePolicyEvaluator {
    builders: HashMap<String, Arc<dyn MergePolicyBuilder>>,
}

impl Default for DefaultMergePolicyEvaluator {
    fn default() -> Self {
        Self::with_builders(default_builders())
    }
}

impl DefaultMergePolicyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builders(builders: HashMap<String, Arc<dyn MergePolicyBuilder>>) -> Self {
        Self { builders }
    }
}

fn reusable<'a>(
    cached: Option<&'a MergePolicyEvaluationResults>,
    policy_name: &str,
    target_commit_sha: &str,
) -> Option<&'a MergePolicyEvaluationResult> {
    let cached = cached?;
    if cached.target_commit_sha != target_commit_sha {
        return None;
    }
    cached
        .result_for(policy_name)
        .filter(|r| r.status.is_terminal())
}

fn unknown_policy(name: &str) -> MergePolicyEvaluationResult {
    MergePolicyEvaluationResult {
        status: MergePolicyEvaluationStatus::PermanentFailure,
        title: "Unknown Merge Policy".to_string(),
        message: format!("Unknown Merge Policy: '{name}'"),
        merge_policy_name: name.to_string(),
        merge_policy_display_name: name.to_string(),
    }
}

#[async_trait]
impl MergePolicyEvaluator for DefaultMergePolicyEvaluator {
    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        remote: &dyn Remote,
        definitions: &[MergePolicyDefinition],
        cached: Option<&MergePolicyEvaluationResults>,
        target_commit_sha: &str,
    ) -> MergePolicyEvaluationResults {
        let mut results = Vec::new();

        for definition in definitions {
            let Some(builder) = self.builders.get(&definition.name) else {
                results.push(unknown_policy(&definition.name));
                continue;
            };

            for policy in builder.build(definition) {
                if let Some(previous) = reusable(cached, policy.name(), target_commit_sha) {
                    debug!(
                        policy = %policy.name(),
                        sha = %target_commit_sha,
                        "reusing merge policy result"
                    );
                    results.push(previous.clone());
                    continue;
                }
                results.push(policy.evaluate(pr, remote).await);
            }
        }

        MergePolicyEvaluationResults {
            results,
            target_commit_sha: target_commit_sha.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeRemote;
    use crate::merge_policy::builtins::{ALL_CHECKS_SUCCESSFUL, NO_REQUESTED_CHANGES};
    use crate::remote::{Check, CheckState};

    const URL: &str = "https://git.example/org/app/pull/7";

    fn pr() -> InProgressPullRequest {
        InProgressPullRequest::new("non-batched:x", URL, "depflow-main-7")
    }

    fn checks(status: CheckState) -> Vec<Check> {
        vec![Check {
            name: "build".to_string(),
            status,
            is_merge_policy: false,
        }]
    }

    #[tokio::test]
    async fn test_unknown_policy_is_permanent_failure() {
        let remote = FakeRemote::new();
        let results = DefaultMergePolicyEvaluator::new()
            .evaluate(
                &pr(),
                &remote,
                &[MergePolicyDefinition::named("SignOffFromAlice")],
                None,
                "sha1",
            )
            .await;

        assert_eq!(results.results.len(), 1);
        let result = &results.results[0];
        assert_eq!(result.status, MergePolicyEvaluationStatus::PermanentFailure);
        assert_eq!(result.message, "Unknown Merge Policy: 'SignOffFromAlice'");
        assert!(results.failed());
        assert_eq!(results.target_commit_sha, "sha1");
    }

    #[tokio::test]
    async fn test_terminal_results_reused_for_same_commit() {
        let remote = FakeRemote::new();
        let evaluator = DefaultMergePolicyEvaluator::new();
        let definitions = [
            MergePolicyDefinition::named(ALL_CHECKS_SUCCESSFUL),
            MergePolicyDefinition::named(NO_REQUESTED_CHANGES),
        ];

        remote.set_checks(URL, checks(CheckState::Success));
        let first = evaluator
            .evaluate(&pr(), &remote, &definitions, None, "sha1")
            .await;
        assert!(first.succeeded());
        assert_eq!(remote.check_requests(), 1);

        // Same commit: the successful result is reused even though checks
        // changed on the remote.
        remote.set_checks(URL, checks(CheckState::Failure));
        let second = evaluator
            .evaluate(&pr(), &remote, &definitions, Some(&first), "sha1")
            .await;
        assert!(second.succeeded());
        assert_eq!(remote.check_requests(), 1);

        // New commit: everything runs again.
        let third = evaluator
            .evaluate(&pr(), &remote, &definitions, Some(&second), "sha2")
            .await;
        assert!(third.failed());
        assert_eq!(remote.check_requests(), 2);
    }

    #[tokio::test]
    async fn test_pending_results_are_not_reused() {
        let remote = FakeRemote::new();
        let evaluator = DefaultMergePolicyEvaluator::new();
        let definitions = [MergePolicyDefinition::named(ALL_CHECKS_SUCCESSFUL)];

        remote.set_checks(URL, checks(CheckState::Pending));
        let first = evaluator
            .evaluate(&pr(), &remote, &definitions, None, "sha1")
            .await;
        assert!(first.pending());

        remote.set_checks(URL, checks(CheckState::Success));
        let second = evaluator
            .evaluate(&pr(), &remote, &definitions, Some(&first), "sha1")
            .await;
        assert!(second.succeeded());
        assert_eq!(remote.check_requests(), 2);
    }

    #[tokio::test]
    async fn test_no_definitions_yields_no_results() {
        let remote = FakeRemote::new();
        let results = DefaultMergePolicyEvaluator::new()
            .evaluate(&pr(), &remote, &[], None, "sha1")
            .await;
        assert!(results.results.is_empty());
        assert!(!results.succeeded() && !results.pending() && !results.failed());
    }
}
