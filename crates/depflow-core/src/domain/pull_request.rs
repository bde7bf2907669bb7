//! Persisted pull request state and the work items that drive it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::build::{Asset, DependencyUpdate};
use super::flow_event::MergePolicyCheckResult;
use super::subscription::SubscriptionType;

/// A request to apply one build to one subscription's target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionUpdateWorkItem {
    pub updater_id: String,
    pub subscription_id: Uuid,
    pub subscription_type: SubscriptionType,
    pub build_id: u32,
    pub source_sha: String,
    pub source_repo: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub is_coherency_update: bool,
}

/// Reminder payload asking the updater to re-check its pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCheck {
    pub updater_id: String,
    pub url: String,
    pub is_code_flow: bool,
}

/// A subscription build whose changes are contained in a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionPullRequestUpdate {
    pub subscription_id: Uuid,
    pub build_id: u32,
    pub source_repo: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyUpdateSummary {
    pub dependency_name: String,
    pub from_version: String,
    pub to_version: String,
    pub from_commit_sha: String,
    pub to_commit_sha: String,
}

impl From<&DependencyUpdate> for DependencyUpdateSummary {
    fn from(update: &DependencyUpdate) -> Self {
        Self {
            dependency_name: update.to.name.clone(),
            from_version: update.from.version.clone(),
            to_version: update.to.version.clone(),
            from_commit_sha: update.from.commit.clone(),
            to_commit_sha: update.to.commit.clone(),
        }
    }
}

/// A coherency constraint that could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherencyErrorDetails {
    pub error: String,
    #[serde(default)]
    pub potential_solutions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InProgressPullRequestState {
    #[default]
    Mergeable,
    Conflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeFlowDirection {
    #[default]
    None,
    ForwardFlow,
    BackFlow,
}

/// State of the open pull request an updater is tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InProgressPullRequest {
    pub updater_id: String,
    pub url: String,
    pub head_branch: String,
    /// Last source commit flowed into the head branch (code flow), or the
    /// remote head observed when a conflict was detected.
    #[serde(default)]
    pub source_sha: String,
    #[serde(default)]
    pub merge_policy_result: Option<MergePolicyCheckResult>,
    #[serde(default)]
    pub contained_subscriptions: Vec<SubscriptionPullRequestUpdate>,
    #[serde(default)]
    pub required_updates: Vec<DependencyUpdateSummary>,
    #[serde(default)]
    pub coherency_check_successful: Option<bool>,
    #[serde(default)]
    pub coherency_errors: Vec<CoherencyErrorDetails>,
    #[serde(default)]
    pub merge_state: InProgressPullRequestState,
    #[serde(default)]
    pub code_flow_direction: CodeFlowDirection,
    /// Build that must be applied next per subscription; older builds are dropped.
    #[serde(default)]
    pub next_builds_to_process: BTreeMap<Uuid, u32>,
    /// Source repository was told about failing policies.
    #[serde(default)]
    pub source_repo_notified: bool,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_check: Option<DateTime<Utc>>,
}

impl InProgressPullRequest {
    pub fn new(updater_id: impl Into<String>, url: impl Into<String>, head_branch: impl Into<String>) -> Self {
        Self {
            updater_id: updater_id.into(),
            url: url.into(),
            head_branch: head_branch.into(),
            source_sha: String::new(),
            merge_policy_result: None,
            contained_subscriptions: Vec::new(),
            required_updates: Vec::new(),
            coherency_check_successful: None,
            coherency_errors: Vec::new(),
            merge_state: InProgressPullRequestState::Mergeable,
            code_flow_direction: CodeFlowDirection::None,
            next_builds_to_process: BTreeMap::new(),
            source_repo_notified: false,
            last_update: Utc::now(),
            last_check: None,
            next_check: None,
        }
    }
}

/// Head branch reserved for a code flow whose pull request does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFlowStatus {
    pub pr_head_branch: String,
    pub source_sha: String,
}
