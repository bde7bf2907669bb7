//! Construction of updaters and actors from their ids.
//!
//! Ids are closed enums; each factory matches on them once and wires the
//! concrete type with its collaborators.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use depflow_state::{run_with_lock, DistributedLock, Reminder, ReminderStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{FlowError, FlowResult, PullRequestCheck, SubscriptionUpdateWorkItem};
use crate::triggerer::SubscriptionTriggerer;
use crate::updater::{
    BatchedTarget, DefaultPullRequestUpdater, NonBatchedTarget, PullRequestUpdater,
    PullRequestUpdaterId, UpdaterContext, UpdaterTarget, CHECK_REMINDER, UPDATE_REMINDER,
};

pub trait PullRequestUpdaterFactory: Send + Sync {
    fn create_updater(&self, id: &PullRequestUpdaterId) -> Arc<dyn PullRequestUpdater>;
}

pub struct DefaultPullRequestUpdaterFactory {
    ctx: UpdaterContext,
}

impl DefaultPullRequestUpdaterFactory {
    pub fn new(ctx: UpdaterContext) -> Self {
        Self { ctx }
    }
}

impl PullRequestUpdaterFactory for DefaultPullRequestUpdaterFactory {
    fn create_updater(&self, id: &PullRequestUpdaterId) -> Arc<dyn PullRequestUpdater> {
        let target: Arc<dyn UpdaterTarget> = match id {
            PullRequestUpdaterId::Batched { repository, branch } => Arc::new(BatchedTarget::new(
                repository,
                branch,
                Arc::clone(&self.ctx.bar),
            )),
            PullRequestUpdaterId::NonBatched { subscription_id } => Arc::new(
                NonBatchedTarget::new(*subscription_id, Arc::clone(&self.ctx.bar)),
            ),
        };
        Arc::new(DefaultPullRequestUpdater::new(
            id.clone(),
            target,
            self.ctx.clone(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Address of an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorId {
    PullRequest(PullRequestUpdaterId),
    Subscription(Uuid),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::PullRequest(id) => write!(f, "{id}"),
            ActorId::Subscription(id) => write!(f, "subscription:{id}"),
        }
    }
}

impl FromStr for ActorId {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("subscription:") {
            Some(id) => Uuid::parse_str(id)
                .map(ActorId::Subscription)
                .map_err(|_| FlowError::InvalidUpdaterId(s.to_string())),
            None => s.parse().map(ActorId::PullRequest),
        }
    }
}

pub enum Actor {
    PullRequest(PullRequestActor),
    Subscription(SubscriptionTriggerer),
}

/// Pull request updater driven by its reminders.
pub struct PullRequestActor {
    key: String,
    updater: Arc<dyn PullRequestUpdater>,
    reminders: Arc<dyn ReminderStore>,
    lock: Arc<dyn DistributedLock>,
    ctx: UpdaterContext,
}

impl PullRequestActor {
    pub fn updater(&self) -> &Arc<dyn PullRequestUpdater> {
        &self.updater
    }

    /// Handle a fired reminder under the updater lock.
    ///
    /// The reminder is removed first; handlers schedule a fresh one when
    /// they still need a follow-up.
    pub async fn receive_reminder(&self, reminder: &Reminder) -> FlowResult<()> {
        run_with_lock(
            self.lock.as_ref(),
            &self.key,
            self.ctx.config.lock_timeout,
            self.handle_reminder(reminder),
        )
        .await
    }

    async fn handle_reminder(&self, reminder: &Reminder) -> FlowResult<()> {
        // Cancelled since it was collected, usually by an earlier reminder
        // of the same sweep.
        if !self.reminders.unset(&reminder.name).await? {
            info!(reminder = %reminder.name, "reminder already cancelled");
            return Ok(());
        }
        let kind = reminder
            .name
            .split_once(':')
            .map(|(kind, _)| kind)
            .unwrap_or_default();

        match kind {
            UPDATE_REMINDER => {
                let update: SubscriptionUpdateWorkItem = serde_json::from_str(&reminder.payload)?;
                self.updater
                    .process_pending_updates(&update, true, false)
                    .await
            }
            CHECK_REMINDER => {
                let check: PullRequestCheck = serde_json::from_str(&reminder.payload)?;
                let tracked = self.updater.check_pull_request(&check).await?;
                info!(url = %check.url, tracked, "pull request checked");
                Ok(())
            }
            _ => {
                warn!(reminder = %reminder.name, "dropping unknown reminder");
                Ok(())
            }
        }
    }
}

pub struct ActorFactory {
    ctx: UpdaterContext,
    updaters: Arc<dyn PullRequestUpdaterFactory>,
    lock: Arc<dyn DistributedLock>,
}

impl ActorFactory {
    pub fn new(ctx: UpdaterContext, lock: Arc<dyn DistributedLock>) -> Self {
        Self {
            updaters: Arc::new(DefaultPullRequestUpdaterFactory::new(ctx.clone())),
            ctx,
            lock,
        }
    }

    pub fn updaters(&self) -> Arc<dyn PullRequestUpdaterFactory> {
        Arc::clone(&self.updaters)
    }

    pub fn create_actor(&self, id: &ActorId) -> Actor {
        match id {
            ActorId::PullRequest(updater_id) => {
                Actor::PullRequest(self.create_pull_request_actor(updater_id))
            }
            ActorId::Subscription(subscription_id) => {
                Actor::Subscription(self.create_subscription_actor(*subscription_id))
            }
        }
    }

    pub fn create_pull_request_actor(&self, id: &PullRequestUpdaterId) -> PullRequestActor {
        PullRequestActor {
            key: id.to_string(),
            updater: self.updaters.create_updater(id),
            reminders: Arc::clone(&self.ctx.reminder_store),
            lock: Arc::clone(&self.lock),
            ctx: self.ctx.clone(),
        }
    }

    pub fn create_subscription_actor(&self, subscription_id: Uuid) -> SubscriptionTriggerer {
        SubscriptionTriggerer::new(
            subscription_id,
            Arc::clone(&self.ctx.bar),
            Arc::clone(&self.updaters),
            Arc::clone(&self.lock),
            self.ctx.config.clone(),
        )
    }

    /// Deliver every reminder due at `now` to its pull request actor.
    /// Returns how many were handled.
    ///
    /// A failing reminder is logged and does not stop the others.
    pub async fn run_due_reminders(&self, now: DateTime<Utc>) -> FlowResult<usize> {
        let due = self.ctx.reminder_store.due(now).await?;
        let mut handled = 0;
        for reminder in due {
            let Some((_, owner)) = reminder.name.split_once(':') else {
                warn!(reminder = %reminder.name, "reminder without owner");
                continue;
            };
            let updater_id = match owner.parse::<PullRequestUpdaterId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(reminder = %reminder.name, error = %e, "reminder with invalid owner");
                    continue;
                }
            };
            let actor = self.create_pull_request_actor(&updater_id);
            match actor.receive_reminder(&reminder).await {
                Ok(()) => handled += 1,
                Err(e) => warn!(reminder = %reminder.name, error = %e, "reminder failed"),
            }
        }
        Ok(handled)
    }
}
