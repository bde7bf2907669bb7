//! The pull request state machine and the dependency update path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use depflow_state::{ReminderManager, StateCache};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::notify::source_repository_notification;
use super::reminder::get_reminder_delay;
use super::target::{TargetBranch, UpdaterTarget};
use super::{
    PullRequestStatus, PullRequestUpdater, PullRequestUpdaterId, UpdaterContext, CHECK_REMINDER,
    CODE_FLOW_STATE, MERGE_POLICY_STATE, PULL_REQUEST_STATE, UPDATE_REMINDER,
};
use crate::asset_filter::AssetMatcher;
use crate::domain::{
    Asset, Build, CodeFlowDirection, CodeFlowStatus, DependencyDetail, DependencyFlowEvent,
    DependencyFlowEventReason, DependencyFlowEventType, DependencyUpdateSummary, FlowError,
    FlowResult, InProgressPullRequest, InProgressPullRequestState, MergePolicyCheckResult,
    PullRequestCheck, SubscriptionPullRequestUpdate, SubscriptionType, SubscriptionUpdateAction,
    SubscriptionUpdateWorkItem,
};
use crate::merge_policy::MergePolicyEvaluationResults;
use crate::obs::{
    emit_policies_evaluated, emit_pr_completed, emit_pr_created, emit_pr_updated,
    emit_update_deferred, updater_span,
};
use crate::pr_builder::{PullRequestBuilder, RequiredUpdates};
use crate::remote::{PrStatus, PullRequest, Remote, RemoteError};

pub struct DefaultPullRequestUpdater {
    pub(super) id: PullRequestUpdaterId,
    pub(super) key: String,
    pub(super) target: Arc<dyn UpdaterTarget>,
    pub(super) ctx: UpdaterContext,
    pub(super) builder: PullRequestBuilder,
    pub(super) pr_state: StateCache<InProgressPullRequest>,
    pub(super) evaluation_state: StateCache<MergePolicyEvaluationResults>,
    pub(super) code_flow_state: StateCache<CodeFlowStatus>,
    pub(super) update_reminders: ReminderManager<SubscriptionUpdateWorkItem>,
    pub(super) check_reminders: ReminderManager<PullRequestCheck>,
}

impl DefaultPullRequestUpdater {
    pub fn new(
        id: PullRequestUpdaterId,
        target: Arc<dyn UpdaterTarget>,
        ctx: UpdaterContext,
    ) -> Self {
        let key = id.to_string();
        let store = Arc::clone(&ctx.state_store);
        let reminders = Arc::clone(&ctx.reminder_store);
        Self {
            builder: PullRequestBuilder::new(Arc::clone(&ctx.bar)),
            pr_state: StateCache::new(Arc::clone(&store), PULL_REQUEST_STATE, &key),
            evaluation_state: StateCache::new(Arc::clone(&store), MERGE_POLICY_STATE, &key),
            code_flow_state: StateCache::new(store, CODE_FLOW_STATE, &key),
            update_reminders: ReminderManager::new(Arc::clone(&reminders), UPDATE_REMINDER, &key),
            check_reminders: ReminderManager::new(reminders, CHECK_REMINDER, &key),
            id,
            key,
            target,
            ctx,
        }
    }

    pub(super) fn default_delay(&self) -> Duration {
        self.ctx.config.reminder_delay
    }

    /// Resolve the target branch. A deleted subscription leaves nothing to
    /// track, so its state and reminders are dropped before failing.
    pub(super) async fn resolve_target(&self) -> FlowResult<TargetBranch> {
        match self.target.target().await {
            Err(FlowError::SubscriptionNotFound(id)) => {
                warn!(subscription_id = %id, "subscription deleted, dropping updater state");
                self.update_reminders.unset_reminder().await?;
                self.check_reminders.unset_reminder().await?;
                self.pr_state.try_delete().await?;
                Err(FlowError::SubscriptionNotFound(id))
            }
            other => other,
        }
    }

    pub(super) async fn remote_for(&self, repository: &str) -> FlowResult<Arc<dyn Remote>> {
        Ok(self.ctx.remote_factory.create_remote(repository).await?)
    }

    async fn process(
        &self,
        update: &SubscriptionUpdateWorkItem,
        apply_newest_only: bool,
        force: bool,
        build: Option<Build>,
    ) -> FlowResult<()> {
        self.process_update(update, apply_newest_only, force, build)
            .instrument(updater_span(&self.key))
            .await
    }

    async fn process_update(
        &self,
        update: &SubscriptionUpdateWorkItem,
        apply_newest_only: bool,
        force: bool,
        build: Option<Build>,
    ) -> FlowResult<()> {
        info!(
            subscription_id = %update.subscription_id,
            build_id = update.build_id,
            "processing pending update"
        );

        let mut pr = self.pr_state.try_get_state().await?;
        let mut pr_info = None;
        let mut start_over = false;

        if let Some(state) = pr.as_mut() {
            if apply_newest_only && !force {
                if let Some(&queued) = state.next_builds_to_process.get(&update.subscription_id) {
                    if queued != update.build_id {
                        info!(
                            build_id = update.build_id,
                            queued_build_id = queued,
                            "skipping update superseded by a newer queued build"
                        );
                        return Ok(());
                    }
                }
            }

            let (status, info) = self.get_pull_request_status(state, true).await?;
            pr_info = info;
            match status {
                PullRequestStatus::Completed | PullRequestStatus::Invalid => start_over = true,
                PullRequestStatus::InProgressCanUpdate => {}
                PullRequestStatus::InProgressCannotUpdate if force => {
                    info!(url = %state.url, "forcing update of a pull request that cannot be updated");
                }
                PullRequestStatus::InProgressCannotUpdate => {
                    self.schedule_update_for_later(state, update).await?;
                    return Ok(());
                }
            }
        }
        if start_over {
            pr = None;
            pr_info = None;
        }

        if update.subscription_type == SubscriptionType::DependenciesAndSources {
            let build = match build {
                Some(build) => build,
                None => self.get_build(update.build_id).await?,
            };
            return self
                .process_code_flow_update(update, pr, pr_info, &build, force)
                .await;
        }

        match (pr, pr_info) {
            (Some(pr), Some(info)) => self.update_pull_request(update, pr, &info).await?,
            _ => {
                if self.create_pull_request(update).await?.is_none() {
                    info!(subscription_id = %update.subscription_id, "no pull request created");
                }
            }
        }
        self.update_reminders.unset_reminder().await?;
        Ok(())
    }

    pub(super) async fn get_build(&self, build_id: u32) -> FlowResult<Build> {
        self.ctx
            .bar
            .get_build(build_id)
            .await?
            .ok_or(FlowError::BuildNotFound(build_id))
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Look at the live pull request and act on it: merge it when policies
    /// allow, finalize it when it was merged or closed, and schedule the
    /// next check otherwise.
    pub(super) async fn get_pull_request_status(
        &self,
        pr: &mut InProgressPullRequest,
        trying_to_update: bool,
    ) -> FlowResult<(PullRequestStatus, Option<PullRequest>)> {
        let target = self.resolve_target().await?;
        let remote = self.remote_for(&target.repository).await?;

        let info = match remote.get_pull_request(&pr.url).await {
            Ok(info) => info,
            Err(RemoteError::PullRequestNotFound { url }) => {
                warn!(url = %url, "tracked pull request no longer exists");
                self.clear_all_state(true).await?;
                return Ok((PullRequestStatus::Invalid, None));
            }
            Err(e) => {
                error!(url = %pr.url, error = %e, "failed to read pull request");
                return Err(e.into());
            }
        };

        match info.status {
            PrStatus::Open => {
                let result = self.try_merging_pr(pr, &info, remote.as_ref()).await?;
                let status = match result {
                    MergePolicyCheckResult::Merged => {
                        info!(url = %pr.url, "merged pull request");
                        self.update_subscriptions_for_merged_pr(&pr.contained_subscriptions)
                            .await?;
                        self.add_flow_events(
                            &pr.contained_subscriptions,
                            pr,
                            DependencyFlowEventType::Completed,
                            DependencyFlowEventReason::AutomaticallyMerged,
                            result,
                        )
                        .await?;
                        self.clear_all_state(pr.merge_state == InProgressPullRequestState::Mergeable)
                            .await?;
                        emit_pr_completed(&self.key, &pr.url, true, true);
                        PullRequestStatus::Completed
                    }
                    MergePolicyCheckResult::FailedPolicies => {
                        if self.target.notifies_source_repository() {
                            self.tag_source_repository(pr, remote.as_ref()).await?;
                        }
                        self.open_status(pr, &info, &target, remote.as_ref(), trying_to_update)
                            .await?
                    }
                    MergePolicyCheckResult::NoPolicies | MergePolicyCheckResult::FailedToMerge => {
                        self.open_status(pr, &info, &target, remote.as_ref(), trying_to_update)
                            .await?
                    }
                    MergePolicyCheckResult::PendingPolicies => {
                        let delay = self.check_delay(&info, trying_to_update);
                        self.set_check_reminder(pr, delay).await?;
                        PullRequestStatus::InProgressCannotUpdate
                    }
                };
                Ok((status, Some(info)))
            }
            PrStatus::Merged | PrStatus::Closed => {
                let merged = info.status == PrStatus::Merged;
                if merged {
                    self.update_subscriptions_for_merged_pr(&pr.contained_subscriptions)
                        .await?;
                }
                let reason = if merged {
                    DependencyFlowEventReason::ManuallyMerged
                } else {
                    DependencyFlowEventReason::ManuallyClosed
                };
                self.add_flow_events(
                    &pr.contained_subscriptions,
                    pr,
                    DependencyFlowEventType::Completed,
                    reason,
                    pr.merge_policy_result
                        .unwrap_or(MergePolicyCheckResult::NoPolicies),
                )
                .await?;
                // A conflicted pull request still owes its parked build a flow.
                self.clear_all_state(pr.merge_state == InProgressPullRequestState::Mergeable)
                    .await?;

                if let Err(e) = remote.delete_pull_request_branch(&pr.url).await {
                    warn!(url = %pr.url, error = %e, "failed to delete pull request branch");
                }
                emit_pr_completed(&self.key, &pr.url, merged, false);
                Ok((PullRequestStatus::Completed, Some(info)))
            }
        }
    }

    /// Open pull request that may take updates unless a conflict is still
    /// unresolved on its head branch.
    async fn open_status(
        &self,
        pr: &mut InProgressPullRequest,
        info: &PullRequest,
        target: &TargetBranch,
        remote: &dyn Remote,
        trying_to_update: bool,
    ) -> FlowResult<PullRequestStatus> {
        if pr.merge_state == InProgressPullRequestState::Conflict {
            let head = remote
                .get_latest_commit(&target.repository, &pr.head_branch)
                .await?;
            if head == pr.source_sha {
                info!(url = %pr.url, "pull request still conflicted");
                return Ok(PullRequestStatus::InProgressCannotUpdate);
            }
        }

        let delay = self.check_delay(info, trying_to_update);
        self.set_check_reminder(pr, delay).await?;
        Ok(PullRequestStatus::InProgressCanUpdate)
    }

    fn check_delay(&self, info: &PullRequest, trying_to_update: bool) -> Duration {
        if trying_to_update {
            self.default_delay()
        } else {
            get_reminder_delay(self.default_delay(), info.updated_at, Utc::now())
        }
    }

    async fn try_merging_pr(
        &self,
        pr: &mut InProgressPullRequest,
        info: &PullRequest,
        remote: &dyn Remote,
    ) -> FlowResult<MergePolicyCheckResult> {
        let definitions = self.target.merge_policies().await?;
        let cached = self.evaluation_state.try_get_state().await?;
        let results = self
            .ctx
            .merge_policy_evaluator
            .evaluate(pr, remote, &definitions, cached.as_ref(), &info.head_branch_sha)
            .await;
        self.evaluation_state.set_state(&results).await?;
        remote
            .create_or_update_pull_request_merge_status_info(&pr.url, &results.results)
            .await?;

        let outcome = if results.failed() {
            MergePolicyCheckResult::FailedPolicies
        } else if results.pending() {
            MergePolicyCheckResult::PendingPolicies
        } else if !results.succeeded() {
            MergePolicyCheckResult::NoPolicies
        } else {
            match remote.merge_dependency_pull_request(&pr.url).await {
                Ok(()) => {
                    for contained in &pr.contained_subscriptions {
                        self.register_update(
                            contained.subscription_id,
                            SubscriptionUpdateAction::MergingPullRequest,
                            &format!("Merged pull request {}", pr.url),
                        )
                        .await?;
                    }
                    MergePolicyCheckResult::Merged
                }
                Err(e) => {
                    warn!(url = %pr.url, error = %e, "failed to merge pull request");
                    MergePolicyCheckResult::FailedToMerge
                }
            }
        };

        pr.merge_policy_result = Some(outcome);
        emit_policies_evaluated(&pr.url, outcome, results.results.len());
        Ok(outcome)
    }

    async fn tag_source_repository(
        &self,
        pr: &mut InProgressPullRequest,
        remote: &dyn Remote,
    ) -> FlowResult<()> {
        let comment = source_repository_notification(pr, self.ctx.bar.as_ref(), remote).await?;
        if let Some(comment) = comment {
            remote.comment_pull_request(&pr.url, &comment).await?;
        }
        self.pr_state.set_state(pr).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State and reminders
    // -----------------------------------------------------------------------

    pub(super) async fn set_check_reminder(
        &self,
        pr: &mut InProgressPullRequest,
        delay: Duration,
    ) -> FlowResult<()> {
        let check = PullRequestCheck {
            updater_id: self.key.clone(),
            url: pr.url.clone(),
            is_code_flow: pr.code_flow_direction != CodeFlowDirection::None,
        };
        let now = Utc::now();
        pr.last_check = Some(now);
        pr.next_check = chrono::Duration::from_std(delay).ok().map(|d| now + d);

        self.check_reminders.set_reminder(&check, delay).await?;
        self.pr_state.set_state(pr).await?;
        Ok(())
    }

    /// Park `update` until the pull request can take it. Only the newest
    /// build per subscription is kept.
    pub(super) async fn schedule_update_for_later(
        &self,
        pr: &mut InProgressPullRequest,
        update: &SubscriptionUpdateWorkItem,
    ) -> FlowResult<()> {
        info!(url = %pr.url, build_id = update.build_id, "pull request cannot be updated, deferring");
        self.update_reminders
            .set_reminder(update, self.default_delay())
            .await?;
        self.check_reminders.unset_reminder().await?;
        pr.next_builds_to_process
            .insert(update.subscription_id, update.build_id);
        self.pr_state.set_state(pr).await?;
        emit_update_deferred(&self.key, update.subscription_id, update.build_id);
        Ok(())
    }

    pub(super) async fn clear_all_state(&self, clear_pending_updates: bool) -> FlowResult<()> {
        self.pr_state.try_delete().await?;
        self.evaluation_state.try_delete().await?;
        self.code_flow_state.try_delete().await?;
        self.check_reminders.unset_reminder().await?;
        if clear_pending_updates {
            self.update_reminders.unset_reminder().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Registry bookkeeping
    // -----------------------------------------------------------------------

    pub(super) async fn register_update(
        &self,
        subscription_id: Uuid,
        action: SubscriptionUpdateAction,
        message: &str,
    ) -> FlowResult<()> {
        self.ctx
            .bar
            .register_subscription_update(subscription_id, action, message)
            .await
    }

    async fn update_subscriptions_for_merged_pr(
        &self,
        contained: &[SubscriptionPullRequestUpdate],
    ) -> FlowResult<()> {
        for entry in contained {
            self.record_applied_build(entry.subscription_id, entry.build_id)
                .await?;
        }
        Ok(())
    }

    pub(super) async fn record_applied_build(
        &self,
        subscription_id: Uuid,
        build_id: u32,
    ) -> FlowResult<()> {
        let updated = self
            .ctx
            .bar
            .update_subscription_last_applied_build(subscription_id, build_id)
            .await?;
        if !updated {
            warn!(subscription_id = %subscription_id, build_id, "could not record applied build");
        }
        Ok(())
    }

    pub(super) async fn add_flow_events(
        &self,
        entries: &[SubscriptionPullRequestUpdate],
        pr: &InProgressPullRequest,
        event: DependencyFlowEventType,
        reason: DependencyFlowEventReason,
        policy: MergePolicyCheckResult,
    ) -> FlowResult<()> {
        let flow_type = if pr.code_flow_direction == CodeFlowDirection::None {
            "Dependency"
        } else {
            "CodeFlow"
        };
        let url = (!pr.url.is_empty()).then(|| pr.url.clone());
        for entry in entries {
            self.ctx
                .bar
                .add_dependency_flow_event(DependencyFlowEvent {
                    subscription_id: entry.subscription_id,
                    build_id: entry.build_id,
                    event,
                    reason,
                    policy,
                    flow_type: flow_type.to_string(),
                    url: url.clone(),
                    timestamp: Utc::now(),
                })
                .await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dependency updates
    // -----------------------------------------------------------------------

    /// Open a pull request for `update`. Returns its url, or `None` when
    /// nothing needs to change.
    async fn create_pull_request(
        &self,
        update: &SubscriptionUpdateWorkItem,
    ) -> FlowResult<Option<String>> {
        let target = self.resolve_target().await?;
        let remote = self.remote_for(&target.repository).await?;

        let required = match self
            .get_required_updates(update, &target, remote.as_ref(), None)
            .await
        {
            Ok(required) => required,
            Err(FlowError::Remote(RemoteError::DependencyFileNotFound { repository, reference })) => {
                warn!(
                    repository = %repository,
                    reference = %reference,
                    "target branch has no dependency file, not opening a pull request"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if required.coherency_check_successful && required.is_empty() {
            info!(subscription_id = %update.subscription_id, "no updates required");
            return Ok(None);
        }

        self.register_update(
            update.subscription_id,
            SubscriptionUpdateAction::ApplyingUpdates,
            &format!("Applying updates from build {}", update.build_id),
        )
        .await?;

        let branch = format!(
            "{}-{}-{}",
            self.ctx.config.branch_prefix,
            target.branch,
            Uuid::new_v4()
        );
        remote
            .create_new_branch(&target.repository, &target.branch, &branch)
            .await?;

        match self
            .open_pull_request(update, &target, remote.as_ref(), &required, &branch)
            .await
        {
            Ok(url) => Ok(url),
            Err(e) => {
                if let Err(cleanup) = remote.delete_branch(&target.repository, &branch).await {
                    warn!(branch = %branch, error = %cleanup, "failed to delete orphaned branch");
                }
                Err(e)
            }
        }
    }

    async fn open_pull_request(
        &self,
        update: &SubscriptionUpdateWorkItem,
        target: &TargetBranch,
        remote: &dyn Remote,
        required: &RequiredUpdates,
        branch: &str,
    ) -> FlowResult<Option<String>> {
        let description = self
            .builder
            .calculate_description_and_commit_updates(
                remote,
                required,
                None,
                &target.repository,
                branch,
            )
            .await?;
        let contained = contained_subscriptions(required);
        let title = self.builder.generate_pr_title(&contained, &target.branch);

        let url = remote
            .create_pull_request(
                &target.repository,
                &PullRequest::new(title, description, &target.branch, branch),
            )
            .await?;

        let mut pr = InProgressPullRequest::new(&self.key, &url, branch);
        pr.source_sha = update.source_sha.clone();
        pr.contained_subscriptions = contained;
        pr.required_updates = required.summaries();
        pr.coherency_check_successful = Some(required.coherency_check_successful);
        pr.coherency_errors = required.coherency_errors.clone();

        if url.is_empty() {
            info!(branch = %branch, "remote had nothing to open, dropping branch");
            self.add_flow_events(
                &pr.contained_subscriptions,
                &pr,
                DependencyFlowEventType::Completed,
                DependencyFlowEventReason::NothingToDo,
                MergePolicyCheckResult::NoPolicies,
            )
            .await?;
            remote.delete_branch(&target.repository, branch).await?;
            return Ok(None);
        }

        self.add_flow_events(
            &pr.contained_subscriptions,
            &pr,
            DependencyFlowEventType::Created,
            DependencyFlowEventReason::New,
            MergePolicyCheckResult::PendingPolicies,
        )
        .await?;
        emit_pr_created(&self.key, &url, pr.required_updates.len());
        self.set_check_reminder(&mut pr, self.default_delay()).await?;
        Ok(Some(url))
    }

    async fn update_pull_request(
        &self,
        update: &SubscriptionUpdateWorkItem,
        mut pr: InProgressPullRequest,
        info: &PullRequest,
    ) -> FlowResult<()> {
        let target = self.resolve_target().await?;
        let remote = self.remote_for(&target.repository).await?;

        let required = self
            .get_required_updates(update, &target, remote.as_ref(), Some(&info.head_branch))
            .await?;
        if required.coherency_check_successful && required.is_empty() {
            info!(url = %pr.url, "no new updates for pull request");
            return Ok(());
        }

        pr.required_updates =
            merge_existing_with_incoming(&pr.required_updates, &required.summaries());
        if pr.required_updates.is_empty() {
            info!(url = %pr.url, "no updates to apply");
            return Ok(());
        }

        self.register_update(
            update.subscription_id,
            SubscriptionUpdateAction::ApplyingUpdates,
            &format!("Applying updates from build {}", update.build_id),
        )
        .await?;
        pr.coherency_check_successful = Some(required.coherency_check_successful);
        pr.coherency_errors = required.coherency_errors.clone();

        let previous = pr.contained_subscriptions.clone();
        pr.contained_subscriptions
            .retain(|c| c.subscription_id != update.subscription_id);
        let replaced: Vec<_> = previous
            .iter()
            .filter(|p| !pr.contained_subscriptions.contains(p))
            .cloned()
            .collect();
        self.add_flow_events(
            &replaced,
            &pr,
            DependencyFlowEventType::Updated,
            DependencyFlowEventReason::FailedUpdate,
            pr.merge_policy_result
                .unwrap_or(MergePolicyCheckResult::PendingPolicies),
        )
        .await?;

        pr.contained_subscriptions
            .extend(contained_subscriptions(&required));
        let added: Vec<_> = pr
            .contained_subscriptions
            .iter()
            .filter(|c| !previous.contains(c))
            .cloned()
            .collect();
        self.add_flow_events(
            &added,
            &pr,
            DependencyFlowEventType::Created,
            DependencyFlowEventReason::New,
            MergePolicyCheckResult::PendingPolicies,
        )
        .await?;

        // Describe moves relative to the target branch, not the PR branch.
        let target_dependencies = remote
            .get_dependencies(&target.repository, &target.branch)
            .await?;
        let described = with_original_dependencies(&required, &target_dependencies);
        let description = self
            .builder
            .calculate_description_and_commit_updates(
                remote.as_ref(),
                &described,
                Some(&info.description),
                &target.repository,
                &info.head_branch,
            )
            .await?;

        let mut updated = info.clone();
        updated.title = self
            .builder
            .generate_pr_title(&pr.contained_subscriptions, &target.branch);
        updated.description = description;
        remote.update_pull_request(&pr.url, &updated).await?;

        pr.last_update = Utc::now();
        pr.next_builds_to_process.remove(&update.subscription_id);
        emit_pr_updated(&self.key, &pr.url, pr.required_updates.len());
        self.set_check_reminder(&mut pr, self.default_delay()).await
    }

    /// Non-coherency updates for the build's assets, then the coherency
    /// updates of the resulting dependency set.
    async fn get_required_updates(
        &self,
        update: &SubscriptionUpdateWorkItem,
        target: &TargetBranch,
        remote: &dyn Remote,
        pr_branch: Option<&str>,
    ) -> FlowResult<RequiredUpdates> {
        let subscription = self
            .ctx
            .bar
            .get_subscription(update.subscription_id)
            .await?
            .ok_or(FlowError::SubscriptionNotFound(update.subscription_id))?;
        let exclusions = AssetMatcher::new(&subscription.excluded_assets);

        let reference = pr_branch.unwrap_or(&target.branch);
        let mut existing = remote.get_dependencies(&target.repository, reference).await?;

        let assets: Vec<Asset> = update
            .assets
            .iter()
            .filter(|a| !exclusions.is_excluded(&a.name))
            .cloned()
            .collect();
        let non_coherency = self.ctx.coherency.get_required_non_coherency_updates(
            &update.source_repo,
            &update.source_sha,
            &assets,
            &existing,
        );

        let mut required = RequiredUpdates {
            coherency_check_successful: true,
            ..RequiredUpdates::default()
        };

        if non_coherency.is_empty() {
            // Nothing moves, so the build counts as applied.
            self.record_applied_build(update.subscription_id, update.build_id)
                .await?;
        } else {
            for moved in &non_coherency {
                if let Some(slot) = existing.iter_mut().find(|d| **d == moved.from) {
                    *slot = moved.to.clone();
                }
            }
            required.updates.push((update.clone(), non_coherency));
        }

        match self
            .ctx
            .coherency
            .get_required_coherency_updates(&existing)
            .await
        {
            Ok(coherency) if coherency.is_empty() => {}
            Ok(coherency) => {
                let item = SubscriptionUpdateWorkItem {
                    is_coherency_update: true,
                    ..update.clone()
                };
                required.updates.push((item, coherency));
            }
            Err(FlowError::Coherency(errors)) => {
                warn!(errors = errors.len(), "coherency update failed");
                required.coherency_check_successful = false;
                required.coherency_errors = errors;
            }
            Err(e) => return Err(e),
        }

        Ok(required)
    }
}

fn contained_subscriptions(required: &RequiredUpdates) -> Vec<SubscriptionPullRequestUpdate> {
    required
        .updates
        .iter()
        .filter(|(item, _)| !item.is_coherency_update)
        .map(|(item, _)| SubscriptionPullRequestUpdate::from(item))
        .collect()
}

impl From<&SubscriptionUpdateWorkItem> for SubscriptionPullRequestUpdate {
    fn from(item: &SubscriptionUpdateWorkItem) -> Self {
        Self {
            subscription_id: item.subscription_id,
            build_id: item.build_id,
            source_repo: item.source_repo.clone(),
            commit_sha: item.source_sha.clone(),
        }
    }
}

/// Fold `incoming` into `existing` by dependency name, ignoring case.
///
/// A dependency already in the pull request keeps its original `from` and
/// takes the new `to`; new dependencies are appended.
pub fn merge_existing_with_incoming(
    existing: &[DependencyUpdateSummary],
    incoming: &[DependencyUpdateSummary],
) -> Vec<DependencyUpdateSummary> {
    let mut merged: Vec<DependencyUpdateSummary> = existing
        .iter()
        .map(|current| {
            match incoming
                .iter()
                .find(|i| i.dependency_name.eq_ignore_ascii_case(&current.dependency_name))
            {
                Some(newer) => DependencyUpdateSummary {
                    to_version: newer.to_version.clone(),
                    to_commit_sha: newer.to_commit_sha.clone(),
                    ..current.clone()
                },
                None => current.clone(),
            }
        })
        .collect();

    merged.extend(
        incoming
            .iter()
            .filter(|i| {
                !existing
                    .iter()
                    .any(|e| e.dependency_name.eq_ignore_ascii_case(&i.dependency_name))
            })
            .cloned(),
    );
    merged
}

/// Replace each update's `from` with the target branch's pin of the same
/// dependency.
fn with_original_dependencies(
    required: &RequiredUpdates,
    target_dependencies: &[DependencyDetail],
) -> RequiredUpdates {
    let mut described = required.clone();
    for (_, deps) in described.updates.iter_mut() {
        for dep in deps.iter_mut() {
            if let Some(original) = target_dependencies
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(&dep.to.name))
            {
                dep.from = original.clone();
            }
        }
    }
    described
}

#[async_trait]
impl PullRequestUpdater for DefaultPullRequestUpdater {
    fn id(&self) -> &PullRequestUpdaterId {
        &self.id
    }

    async fn update_assets(
        &self,
        subscription_id: Uuid,
        subscription_type: SubscriptionType,
        build_id: u32,
        force: bool,
    ) -> FlowResult<()> {
        let build = self.get_build(build_id).await?;
        let update = SubscriptionUpdateWorkItem {
            updater_id: self.key.clone(),
            subscription_id,
            subscription_type,
            build_id,
            source_sha: build.commit.clone(),
            source_repo: build.repository.clone(),
            assets: build.assets.clone(),
            is_coherency_update: false,
        };
        self.process(&update, false, force, Some(build)).await
    }

    async fn process_pending_updates(
        &self,
        update: &SubscriptionUpdateWorkItem,
        apply_newest_only: bool,
        force: bool,
    ) -> FlowResult<()> {
        self.process(update, apply_newest_only, force, None).await
    }

    async fn check_pull_request(&self, check: &PullRequestCheck) -> FlowResult<bool> {
        async {
            let Some(mut pr) = self.pr_state.try_get_state().await? else {
                warn!(url = %check.url, "no tracked pull request to check");
                self.clear_all_state(true).await?;
                return Ok(false);
            };

            let (status, _) = self.get_pull_request_status(&mut pr, false).await?;
            Ok(matches!(
                status,
                PullRequestStatus::InProgressCanUpdate | PullRequestStatus::InProgressCannotUpdate
            ))
        }
        .instrument(updater_span(&self.key))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, from: &str, to: &str) -> DependencyUpdateSummary {
        DependencyUpdateSummary {
            dependency_name: name.to_string(),
            from_version: from.to_string(),
            to_version: to.to_string(),
            from_commit_sha: format!("{from}-sha"),
            to_commit_sha: format!("{to}-sha"),
        }
    }

    #[test]
    fn test_merge_keeps_original_from_and_appends_new() {
        let existing = vec![summary("Foo", "1.0", "1.1"), summary("Bar", "2.0", "2.1")];
        let incoming = vec![summary("foo", "1.1", "1.2"), summary("Baz", "3.0", "3.1")];

        let merged = merge_existing_with_incoming(&existing, &incoming);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].dependency_name, "Foo");
        assert_eq!(merged[0].from_version, "1.0");
        assert_eq!(merged[0].to_version, "1.2");
        assert_eq!(merged[0].to_commit_sha, "1.2-sha");
        assert_eq!(merged[1], existing[1]);
        assert_eq!(merged[2].dependency_name, "Baz");
    }

    #[test]
    fn test_merge_with_nothing_incoming_is_identity() {
        let existing = vec![summary("Foo", "1.0", "1.1")];
        assert_eq!(merge_existing_with_incoming(&existing, &[]), existing);
        assert!(merge_existing_with_incoming(&[], &[]).is_empty());
    }
}
