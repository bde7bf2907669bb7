//! depflow core library
//!
//! Dependency flow orchestration: keeps repositories up to date with the
//! builds of the repositories they depend on, by opening, updating and
//! merging pull requests, and analyses the flow graph those subscriptions
//! form.

pub mod asset_filter;
pub mod bar;
pub mod codeflow;
pub mod coherency;
pub mod config;
pub mod domain;
pub mod factory;
pub mod fakes;
pub mod graph;
pub mod merge_policy;
pub mod obs;
pub mod pr_builder;
pub mod remote;
pub mod telemetry;
pub mod triggerer;
pub mod updater;

pub use bar::BarClient;
pub use codeflow::{CodeFlowError, CodeFlowResult, GitClient, VmrBackFlower, VmrForwardFlower};
pub use coherency::{CoherencyUpdateResolver, StrictCoherencyUpdateResolver};
pub use config::DepflowConfig;
pub use domain::{FlowError, FlowResult};
pub use factory::{
    Actor, ActorFactory, ActorId, DefaultPullRequestUpdaterFactory, PullRequestActor,
    PullRequestUpdaterFactory,
};
pub use graph::{DependencyFlowGraph, GraphReport};
pub use merge_policy::{
    DefaultMergePolicyEvaluator, MergePolicyEvaluationResult, MergePolicyEvaluationResults,
    MergePolicyEvaluationStatus, MergePolicyEvaluator,
};
pub use remote::{Remote, RemoteError, RemoteFactory};
pub use triggerer::{SubscriptionTriggerer, UpdateSubscriptionWorkItem};
pub use updater::{
    DefaultPullRequestUpdater, PullRequestStatus, PullRequestUpdater, PullRequestUpdaterId,
    UpdaterContext,
};
