//! Domain models for depflow.
//!
//! Canonical definitions for the entities the orchestration core consumes:
//! - `Subscription`: rule flowing a source channel into a target branch
//! - `Build`/`Asset`: published build outputs
//! - `DependencyDetail`/`DependencyUpdate`: version pins in a repository
//! - `InProgressPullRequest`: persisted state of a tracked pull request
//! - `DependencyFlowEvent`: audit trail of flow actions

pub mod build;
pub mod error;
pub mod flow_event;
pub mod pull_request;
pub mod subscription;

pub use build::{Asset, Build, BuildTime, DependencyDetail, DependencyType, DependencyUpdate};
pub use error::{FlowError, FlowResult};
pub use flow_event::{
    DependencyFlowEvent, DependencyFlowEventReason, DependencyFlowEventType,
    MergePolicyCheckResult, SubscriptionUpdateAction,
};
pub use pull_request::{
    CodeFlowDirection, CodeFlowStatus, CoherencyErrorDetails, DependencyUpdateSummary,
    InProgressPullRequest, InProgressPullRequestState, PullRequestCheck,
    SubscriptionPullRequestUpdate, SubscriptionUpdateWorkItem,
};
pub use subscription::{
    Channel, DefaultChannel, MergePolicyDefinition, Subscription, SubscriptionPolicy,
    SubscriptionType, UpdateFrequency,
};
