//! Subscription triggering: the entry point when a build lands on a channel.

use std::sync::Arc;

use chrono::Utc;
use depflow_state::{run_with_lock, DistributedLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bar::BarClient;
use crate::config::DepflowConfig;
use crate::domain::{
    DependencyFlowEvent, DependencyFlowEventReason, DependencyFlowEventType, FlowError, FlowResult,
    MergePolicyCheckResult, Subscription, SubscriptionType, UpdateFrequency,
};
use crate::factory::PullRequestUpdaterFactory;
use crate::obs::emit_subscription_fired;
use crate::updater::PullRequestUpdaterId;

/// A subscription with a build it has not applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSubscriptionWorkItem {
    pub subscription_id: Uuid,
    pub build_id: u32,
}

/// Triggers one subscription.
pub struct SubscriptionTriggerer {
    subscription_id: Uuid,
    bar: Arc<dyn BarClient>,
    updaters: Arc<dyn PullRequestUpdaterFactory>,
    lock: Arc<dyn DistributedLock>,
    config: DepflowConfig,
}

impl SubscriptionTriggerer {
    pub fn new(
        subscription_id: Uuid,
        bar: Arc<dyn BarClient>,
        updaters: Arc<dyn PullRequestUpdaterFactory>,
        lock: Arc<dyn DistributedLock>,
        config: DepflowConfig,
    ) -> Self {
        Self {
            subscription_id,
            bar,
            updaters,
            lock,
            config,
        }
    }

    pub fn subscription_id(&self) -> Uuid {
        self.subscription_id
    }

    /// Apply `build_id` through the subscription's updater.
    ///
    /// Holds the updater lock for the whole decide-and-apply sequence, so
    /// builds of subscriptions sharing a batched pull request never race.
    pub async fn update_subscription(&self, build_id: u32, force: bool) -> FlowResult<()> {
        let subscription = self
            .bar
            .get_subscription(self.subscription_id)
            .await?
            .ok_or(FlowError::SubscriptionNotFound(self.subscription_id))?;

        self.add_dependency_flow_event(
            build_id,
            DependencyFlowEventType::Fired,
            DependencyFlowEventReason::New,
            MergePolicyCheckResult::PendingPolicies,
            flow_type(&subscription),
            None,
        )
        .await?;

        let updater_id = PullRequestUpdaterId::for_subscription(&subscription);
        let key = updater_id.to_string();
        emit_subscription_fired(subscription.id, build_id, &key);

        let updater = self.updaters.create_updater(&updater_id);
        run_with_lock(
            self.lock.as_ref(),
            &key,
            self.config.lock_timeout,
            updater.update_assets(
                subscription.id,
                subscription.subscription_type(),
                build_id,
                force,
            ),
        )
        .await
    }

    /// Record `build_id` as applied once its pull request merged. Returns
    /// `false` when the subscription no longer exists.
    pub async fn update_for_merged_pull_request(&self, build_id: u32) -> FlowResult<bool> {
        info!(subscription_id = %self.subscription_id, build_id, "recording merged build");
        let updated = self
            .bar
            .update_subscription_last_applied_build(self.subscription_id, build_id)
            .await?;
        if !updated {
            warn!(subscription_id = %self.subscription_id, build_id, "subscription not found for merged build");
        }
        Ok(updated)
    }

    pub async fn add_dependency_flow_event(
        &self,
        build_id: u32,
        event: DependencyFlowEventType,
        reason: DependencyFlowEventReason,
        policy: MergePolicyCheckResult,
        flow_type: &str,
        url: Option<String>,
    ) -> FlowResult<()> {
        self.bar
            .add_dependency_flow_event(DependencyFlowEvent {
                subscription_id: self.subscription_id,
                build_id,
                event,
                reason,
                policy,
                flow_type: flow_type.to_string(),
                url,
                timestamp: Utc::now(),
            })
            .await
    }

    /// Enabled subscriptions firing at `frequency` whose channel carries a
    /// build other than the last one they applied.
    pub async fn get_subscriptions_to_trigger(
        bar: &dyn BarClient,
        frequency: UpdateFrequency,
    ) -> FlowResult<Vec<UpdateSubscriptionWorkItem>> {
        let mut work = Vec::new();
        for subscription in bar.get_subscriptions().await? {
            if !subscription.enabled || subscription.policy.update_frequency != frequency {
                continue;
            }
            let Some(latest) = bar
                .get_latest_build(&subscription.source_repository, subscription.channel.id)
                .await?
            else {
                continue;
            };
            if subscription.last_applied_build_id == Some(latest.id) {
                continue;
            }
            work.push(UpdateSubscriptionWorkItem {
                subscription_id: subscription.id,
                build_id: latest.id,
            });
        }
        info!(frequency = %frequency, count = work.len(), "subscriptions to trigger");
        Ok(work)
    }
}

fn flow_type(subscription: &Subscription) -> &'static str {
    match subscription.subscription_type() {
        SubscriptionType::Dependencies => "Dependency",
        SubscriptionType::DependenciesAndSources => "CodeFlow",
    }
}
