//! Git hosting remote seam: branches, pull requests, comments and checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DependencyDetail;
use crate::merge_policy::MergePolicyEvaluationResult;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("pull request {url} not found")]
    PullRequestNotFound { url: String },

    #[error("pull request {url} is not mergeable: {reason}")]
    PullRequestNotMergeable { url: String, reason: String },

    #[error("dependency file not found in {repository} at {reference}")]
    DependencyFileNotFound { repository: String, reference: String },

    #[error("branch {branch} not found in {repository}")]
    BranchNotFound { repository: String, branch: String },

    #[error("remote API error: {0}")]
    Api(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

/// A pull request as seen on the remote.
///
/// On creation only title, description and the two branches are read; on
/// update only title and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub description: String,
    pub base_branch: String,
    pub head_branch: String,
    pub status: PrStatus,
    pub updated_at: DateTime<Utc>,
    /// Commit currently at the tip of the head branch.
    #[serde(default)]
    pub head_branch_sha: String,
}

impl PullRequest {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        base_branch: impl Into<String>,
        head_branch: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            base_branch: base_branch.into(),
            head_branch: head_branch.into(),
            status: PrStatus::Open,
            updated_at: Utc::now(),
            head_branch_sha: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    None,
    Pending,
    Error,
    Failure,
    Success,
}

/// A status check reported on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: CheckState,
    /// Checks published by depflow itself for merge policies.
    #[serde(default)]
    pub is_merge_policy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Rejected,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub state: ReviewState,
    pub url: String,
}

/// Operations on one hosted repository (or organisation).
#[async_trait]
pub trait Remote: Send + Sync {
    async fn get_pull_request(&self, url: &str) -> RemoteResult<PullRequest>;

    async fn create_new_branch(&self, repository: &str, base_branch: &str, new_branch: &str) -> RemoteResult<()>;

    async fn commit_updates(
        &self,
        repository: &str,
        branch: &str,
        dependencies: &[DependencyDetail],
        message: &str,
    ) -> RemoteResult<()>;

    /// Open a pull request, returning its url.
    async fn create_pull_request(&self, repository: &str, pull_request: &PullRequest) -> RemoteResult<String>;

    async fn update_pull_request(&self, url: &str, pull_request: &PullRequest) -> RemoteResult<()>;

    async fn merge_dependency_pull_request(&self, url: &str) -> RemoteResult<()>;

    async fn delete_branch(&self, repository: &str, branch: &str) -> RemoteResult<()>;

    async fn delete_pull_request_branch(&self, url: &str) -> RemoteResult<()>;

    /// Dependencies pinned by `repository` at a branch or commit.
    async fn get_dependencies(&self, repository: &str, reference: &str) -> RemoteResult<Vec<DependencyDetail>>;

    async fn comment_pull_request(&self, url: &str, message: &str) -> RemoteResult<()>;

    async fn get_pull_request_comments(&self, url: &str) -> RemoteResult<Vec<String>>;

    async fn get_pull_request_checks(&self, url: &str) -> RemoteResult<Vec<Check>>;

    async fn get_pull_request_reviews(&self, url: &str) -> RemoteResult<Vec<Review>>;

    /// Publish merge policy results as checks on the pull request.
    async fn create_or_update_pull_request_merge_status_info(
        &self,
        url: &str,
        evaluations: &[MergePolicyEvaluationResult],
    ) -> RemoteResult<()>;

    async fn get_latest_commit(&self, repository: &str, branch: &str) -> RemoteResult<String>;
}

/// Hands out a [`Remote`] for a repository url.
#[async_trait]
pub trait RemoteFactory: Send + Sync {
    async fn create_remote(&self, repository: &str) -> RemoteResult<std::sync::Arc<dyn Remote>>;
}
