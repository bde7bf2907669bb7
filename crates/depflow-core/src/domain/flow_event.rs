//! Dependency flow audit events and merge outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyFlowEventType {
    Fired,
    Created,
    Updated,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyFlowEventReason {
    New,
    AutomaticallyMerged,
    ManuallyMerged,
    ManuallyClosed,
    FailedUpdate,
    NothingToDo,
}

/// Outcome of one attempt to merge a tracked pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicyCheckResult {
    NoPolicies,
    PendingPolicies,
    FailedPolicies,
    FailedToMerge,
    Merged,
}

/// Kind of action recorded against a subscription's update history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionUpdateAction {
    ApplyingUpdates,
    MergingPullRequest,
}

impl SubscriptionUpdateAction {
    pub fn message(&self) -> &'static str {
        match self {
            SubscriptionUpdateAction::ApplyingUpdates => "Applying updates",
            SubscriptionUpdateAction::MergingPullRequest => "Merging pull request",
        }
    }
}

/// One entry of the dependency flow audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyFlowEvent {
    pub subscription_id: Uuid,
    pub build_id: u32,
    pub event: DependencyFlowEventType,
    pub reason: DependencyFlowEventReason,
    pub policy: MergePolicyCheckResult,
    pub flow_type: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}
