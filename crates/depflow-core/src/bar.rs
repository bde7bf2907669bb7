//! Build asset registry (BAR) client seam.
//!
//! The registry is the system of record for builds, channels and
//! subscriptions. The orchestration core only reads from it, apart from
//! recording applied builds, flow events and update history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Build, BuildTime, DependencyFlowEvent, FlowResult, MergePolicyDefinition, Subscription,
    SubscriptionUpdateAction,
};

#[async_trait]
pub trait BarClient: Send + Sync {
    async fn get_build(&self, build_id: u32) -> FlowResult<Option<Build>>;

    /// Builds of `repository` produced from `commit`.
    async fn get_builds(&self, repository: &str, commit: &str) -> FlowResult<Vec<Build>>;

    /// Newest build of `repository` assigned to the channel.
    async fn get_latest_build(&self, repository: &str, channel_id: u32) -> FlowResult<Option<Build>>;

    async fn get_subscription(&self, subscription_id: Uuid) -> FlowResult<Option<Subscription>>;

    async fn get_subscriptions(&self) -> FlowResult<Vec<Subscription>>;

    /// Build time statistics of a default channel over the last `days` days.
    async fn get_build_time(&self, default_channel_id: u32, days: u32) -> FlowResult<BuildTime>;

    /// Merge policies configured for a whole target branch (batched pull requests).
    async fn get_repository_merge_policies(
        &self,
        repository: &str,
        branch: &str,
    ) -> FlowResult<Vec<MergePolicyDefinition>>;

    /// Record `build_id` as applied. Returns `false` when the subscription is unknown.
    async fn update_subscription_last_applied_build(
        &self,
        subscription_id: Uuid,
        build_id: u32,
    ) -> FlowResult<bool>;

    async fn add_dependency_flow_event(&self, event: DependencyFlowEvent) -> FlowResult<()>;

    async fn register_subscription_update(
        &self,
        subscription_id: Uuid,
        action: SubscriptionUpdateAction,
        message: &str,
    ) -> FlowResult<()>;
}
