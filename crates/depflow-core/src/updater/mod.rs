//! Pull request updaters.
//!
//! An updater owns at most one open pull request for a target branch and
//! drives it through its lifecycle:
//!
//! ```text
//! NoPR -> open (can update) <-> open (cannot update) -> completed -> NoPR
//!               \-> conflict -/
//! ```
//!
//! All state lives in the state store and reminder store under the
//! updater's id; concurrent callers are serialized by the updater lock
//! taken in [`crate::triggerer`].

mod code_flow;
pub mod id;
pub mod notify;
mod pull_request_updater;
pub mod reminder;
pub mod target;

use std::sync::Arc;

use async_trait::async_trait;
use depflow_state::{ReminderStore, StateStore};
use uuid::Uuid;

use crate::bar::BarClient;
use crate::codeflow::{GitClient, VmrBackFlower, VmrForwardFlower};
use crate::coherency::CoherencyUpdateResolver;
use crate::config::DepflowConfig;
use crate::domain::{FlowResult, PullRequestCheck, SubscriptionType, SubscriptionUpdateWorkItem};
use crate::merge_policy::MergePolicyEvaluator;
use crate::remote::RemoteFactory;

pub use id::PullRequestUpdaterId;
pub use pull_request_updater::{merge_existing_with_incoming, DefaultPullRequestUpdater};
pub use reminder::get_reminder_delay;
pub use target::{BatchedTarget, NonBatchedTarget, TargetBranch, UpdaterTarget};

/// State and reminder names; the owner key is the updater id.
pub const PULL_REQUEST_STATE: &str = "InProgressPullRequest";
pub const MERGE_POLICY_STATE: &str = "MergePolicyEvaluationResults";
pub const CODE_FLOW_STATE: &str = "CodeFlowStatus";
pub const UPDATE_REMINDER: &str = "SubscriptionUpdateWorkItem";
pub const CHECK_REMINDER: &str = "PullRequestCheck";

/// Where a tracked pull request stands after a fresh look at the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestStatus {
    /// The tracked pull request no longer exists.
    Invalid,
    /// Merged or closed; tracking stopped.
    Completed,
    InProgressCanUpdate,
    /// Policies are still running or a conflict is unresolved.
    InProgressCannotUpdate,
}

#[async_trait]
pub trait PullRequestUpdater: Send + Sync {
    fn id(&self) -> &PullRequestUpdaterId;

    /// Apply a build to the updater's pull request, creating one if needed.
    async fn update_assets(
        &self,
        subscription_id: Uuid,
        subscription_type: SubscriptionType,
        build_id: u32,
        force: bool,
    ) -> FlowResult<()>;

    /// Apply or defer one update.
    ///
    /// With `apply_newest_only` the update is dropped when a different build
    /// is queued for its subscription, unless `force` is set.
    async fn process_pending_updates(
        &self,
        update: &SubscriptionUpdateWorkItem,
        apply_newest_only: bool,
        force: bool,
    ) -> FlowResult<()>;

    /// Re-examine the tracked pull request. Returns whether it is still
    /// tracked afterwards.
    async fn check_pull_request(&self, check: &PullRequestCheck) -> FlowResult<bool>;
}

/// Collaborators shared by every updater.
#[derive(Clone)]
pub struct UpdaterContext {
    pub bar: Arc<dyn BarClient>,
    pub remote_factory: Arc<dyn RemoteFactory>,
    pub coherency: Arc<dyn CoherencyUpdateResolver>,
    pub merge_policy_evaluator: Arc<dyn MergePolicyEvaluator>,
    pub state_store: Arc<dyn StateStore>,
    pub reminder_store: Arc<dyn ReminderStore>,
    pub forward_flower: Arc<dyn VmrForwardFlower>,
    pub back_flower: Arc<dyn VmrBackFlower>,
    pub git: Arc<dyn GitClient>,
    pub config: DepflowConfig,
}
