//! Where an updater's pull requests go and which policies gate them.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::bar::BarClient;
use crate::domain::{FlowError, FlowResult, MergePolicyDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBranch {
    pub repository: String,
    pub branch: String,
}

#[async_trait]
pub trait UpdaterTarget: Send + Sync {
    /// Fails with [`FlowError::SubscriptionNotFound`] when the owning
    /// subscription was deleted.
    async fn target(&self) -> FlowResult<TargetBranch>;

    async fn merge_policies(&self) -> FlowResult<Vec<MergePolicyDefinition>>;

    /// Failing checks are reported to the source repository's contacts.
    fn notifies_source_repository(&self) -> bool;
}

/// Shared pull request for every batchable subscription of a branch.
pub struct BatchedTarget {
    target: TargetBranch,
    bar: Arc<dyn BarClient>,
}

impl BatchedTarget {
    pub fn new(repository: &str, branch: &str, bar: Arc<dyn BarClient>) -> Self {
        Self {
            target: TargetBranch {
                repository: repository.to_string(),
                branch: branch.to_string(),
            },
            bar,
        }
    }
}

#[async_trait]
impl UpdaterTarget for BatchedTarget {
    async fn target(&self) -> FlowResult<TargetBranch> {
        Ok(self.target.clone())
    }

    async fn merge_policies(&self) -> FlowResult<Vec<MergePolicyDefinition>> {
        self.bar
            .get_repository_merge_policies(&self.target.repository, &self.target.branch)
            .await
    }

    fn notifies_source_repository(&self) -> bool {
        false
    }
}

/// Pull request owned by a single subscription.
pub struct NonBatchedTarget {
    subscription_id: Uuid,
    bar: Arc<dyn BarClient>,
}

impl NonBatchedTarget {
    pub fn new(subscription_id: Uuid, bar: Arc<dyn BarClient>) -> Self {
        Self {
            subscription_id,
            bar,
        }
    }
}

#[async_trait]
impl UpdaterTarget for NonBatchedTarget {
    async fn target(&self) -> FlowResult<TargetBranch> {
        let subscription = self
            .bar
            .get_subscription(self.subscription_id)
            .await?
            .ok_or(FlowError::SubscriptionNotFound(self.subscription_id))?;
        Ok(TargetBranch {
            repository: subscription.target_repository,
            branch: subscription.target_branch,
        })
    }

    async fn merge_policies(&self) -> FlowResult<Vec<MergePolicyDefinition>> {
        let subscription = self
            .bar
            .get_subscription(self.subscription_id)
            .await?
            .ok_or(FlowError::SubscriptionNotFound(self.subscription_id))?;
        Ok(subscription.policy.merge_policies)
    }

    fn notifies_source_repository(&self) -> bool {
        true
    }
}
