//! VMR code flow seams.
//!
//! Forward flow moves a product repository's sources into the VMR, back
//! flow moves VMR sources into a product repository. Both prepare a local
//! branch that the updater then pushes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{Build, DependencyUpdate, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum CodeFlowError {
    /// The pull request branch has changes conflicting with the new flow.
    #[error("conflict in pull request branch: {}", files.join(", "))]
    ConflictInPrBranch { files: Vec<String> },

    #[error("target branch {branch} not found")]
    TargetBranchNotFound { branch: String },

    /// Flowing would overwrite commits pushed to the branch by hand.
    #[error("flow would overwrite manual commits: {}", commits.join(", "))]
    ManualCommitsInFlow { commits: Vec<String> },

    #[error("code flow failed: {0}")]
    Failed(String),
}

pub type CodeFlowResultOf<T> = std::result::Result<T, CodeFlowError>;

/// Outcome of a forward or back flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeFlowResult {
    pub had_updates: bool,
    /// Files that conflicted with the target branch and need a human.
    pub conflicted_files: Vec<String>,
    /// Local clone holding the prepared branch.
    pub repo_path: PathBuf,
    pub dependency_updates: Vec<DependencyUpdate>,
    /// Source commit of the previous flow, when known.
    pub previous_flow_sha: Option<String>,
}

#[async_trait]
pub trait VmrForwardFlower: Send + Sync {
    async fn flow_forward(
        &self,
        subscription: &Subscription,
        build: &Build,
        head_branch: &str,
        skip_meaningless_updates: bool,
    ) -> CodeFlowResultOf<CodeFlowResult>;
}

#[async_trait]
pub trait VmrBackFlower: Send + Sync {
    async fn flow_back(
        &self,
        subscription: &Subscription,
        build: &Build,
        head_branch: &str,
    ) -> CodeFlowResultOf<CodeFlowResult>;
}

/// Local git operations needed after a flow.
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn push(&self, repo_path: &Path, branch: &str, remote_url: &str) -> CodeFlowResultOf<()>;
}
