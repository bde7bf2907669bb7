//! Source code flow between product repositories and the VMR.

use tracing::{error, info, warn};
use uuid::Uuid;

use super::pull_request_updater::{merge_existing_with_incoming, DefaultPullRequestUpdater};
use super::target::TargetBranch;
use crate::codeflow::{CodeFlowError, CodeFlowResult};
use crate::domain::{
    Build, CodeFlowDirection, CodeFlowStatus, DependencyFlowEventReason, DependencyFlowEventType,
    DependencyUpdateSummary, FlowResult, InProgressPullRequest,
    InProgressPullRequestState, MergePolicyCheckResult, Subscription, SubscriptionPullRequestUpdate,
    SubscriptionUpdateAction, SubscriptionUpdateWorkItem,
};
use crate::obs::{emit_conflict_detected, emit_pr_created, emit_pr_updated};
use crate::remote::{PullRequest, Remote};

const MANUAL_COMMITS_HEADER: &str =
    "Stopping code flow updates for this pull request as the following commits would get overwritten:";

impl DefaultPullRequestUpdater {
    pub(super) async fn process_code_flow_update(
        &self,
        update: &SubscriptionUpdateWorkItem,
        pr: Option<InProgressPullRequest>,
        pr_info: Option<PullRequest>,
        build: &Build,
        force: bool,
    ) -> FlowResult<()> {
        if let Some(mut existing) = pr.clone() {
            if existing.source_sha == update.source_sha {
                info!(url = %existing.url, sha = %update.source_sha, "pull request already at source commit");
                self.set_check_reminder(&mut existing, self.default_delay())
                    .await?;
                self.update_reminders.unset_reminder().await?;
                return Ok(());
            }
        }

        let Some(subscription) = self.ctx.bar.get_subscription(update.subscription_id).await? else {
            warn!(subscription_id = %update.subscription_id, "subscription deleted, dropping code flow state");
            self.clear_all_state(true).await?;
            return Ok(());
        };

        let head_branch = match &pr {
            Some(existing) => existing.head_branch.clone(),
            None => self.reserve_head_branch(&subscription, update).await?,
        };

        let target = self.resolve_target().await?;
        let remote = self.remote_for(&target.repository).await?;

        let flowed = if subscription.is_forward_flow() {
            self.ctx
                .forward_flower
                .flow_forward(&subscription, build, &head_branch, !force)
                .await
        } else {
            self.ctx
                .back_flower
                .flow_back(&subscription, build, &head_branch)
                .await
        };

        let result = match flowed {
            Ok(result) => result,
            Err(CodeFlowError::ConflictInPrBranch { files }) => {
                let Some(mut existing) = pr else {
                    error!(branch = %head_branch, "conflict without a pull request");
                    return Err(CodeFlowError::ConflictInPrBranch { files }.into());
                };
                self.handle_conflict(&mut existing, update, &target, remote.as_ref(), &files)
                    .await?;
                return Ok(());
            }
            Err(CodeFlowError::TargetBranchNotFound { branch }) => {
                if pr.is_some() {
                    return Err(CodeFlowError::TargetBranchNotFound { branch }.into());
                }
                warn!(branch = %branch, "target branch not found, skipping code flow");
                return Ok(());
            }
            Err(CodeFlowError::ManualCommitsInFlow { commits }) => {
                let Some(mut existing) = pr else {
                    return Err(CodeFlowError::ManualCommitsInFlow { commits }.into());
                };
                self.handle_manual_commits(&mut existing, update, remote.as_ref(), &commits)
                    .await?;
                return Ok(());
            }
            Err(e) => {
                error!(branch = %head_branch, error = %e, "code flow failed");
                return Err(e.into());
            }
        };

        if result.had_updates {
            self.ctx
                .git
                .push(&result.repo_path, &head_branch, &subscription.target_repository)
                .await?;
            self.register_update(
                update.subscription_id,
                SubscriptionUpdateAction::ApplyingUpdates,
                &format!("Flowed sources from build {}", update.build_id),
            )
            .await?;
        }

        let url = match (pr, pr_info) {
            (Some(existing), Some(info)) => {
                self.update_code_flow_pull_request(
                    update,
                    existing,
                    &info,
                    &subscription,
                    build,
                    &result,
                    remote.as_ref(),
                )
                .await?
            }
            _ => {
                if !result.had_updates {
                    info!(subscription_id = %subscription.id, "code flow had no updates");
                    self.code_flow_state.try_delete().await?;
                    self.update_reminders.unset_reminder().await?;
                    return Ok(());
                }
                self.create_code_flow_pull_request(
                    update,
                    &subscription,
                    build,
                    &target,
                    &head_branch,
                    &result,
                    remote.as_ref(),
                )
                .await?
            }
        };

        if !result.conflicted_files.is_empty() {
            let comment = conflict_comment(&result.conflicted_files, build);
            if let Err(e) = remote.comment_pull_request(&url, &comment).await {
                warn!(url = %url, error = %e, "failed to report conflicted files");
            }
        }
        Ok(())
    }

    /// Head branch for a pull request that does not exist yet, kept stable
    /// across retries.
    async fn reserve_head_branch(
        &self,
        subscription: &Subscription,
        update: &SubscriptionUpdateWorkItem,
    ) -> FlowResult<String> {
        if let Some(status) = self.code_flow_state.try_get_state().await? {
            return Ok(status.pr_head_branch);
        }
        let branch = format!(
            "{}-{}-{}",
            self.ctx.config.branch_prefix,
            subscription.target_branch,
            Uuid::new_v4()
        );
        self.code_flow_state
            .set_state(&CodeFlowStatus {
                pr_head_branch: branch.clone(),
                source_sha: update.source_sha.clone(),
            })
            .await?;
        Ok(branch)
    }

    async fn handle_conflict(
        &self,
        pr: &mut InProgressPullRequest,
        update: &SubscriptionUpdateWorkItem,
        target: &TargetBranch,
        remote: &dyn Remote,
        files: &[String],
    ) -> FlowResult<()> {
        let listing = files
            .iter()
            .map(|f| format!("- `{f}`"))
            .collect::<Vec<_>>()
            .join("\n");
        let comment = format!(
            "There was a conflict in the pull request branch when flowing source from build {}:\n\n{listing}\n\n\
             Updates from this subscription will resume once the conflict is resolved.",
            update.build_id
        );
        remote.comment_pull_request(&pr.url, &comment).await?;

        // Remember the head so the conflict clears once someone pushes a fix.
        match remote
            .get_latest_commit(&target.repository, &pr.head_branch)
            .await
        {
            Ok(head) => pr.source_sha = head,
            Err(e) => warn!(url = %pr.url, error = %e, "could not read pull request head"),
        }
        pr.merge_state = InProgressPullRequestState::Conflict;
        self.park(pr, update).await?;
        emit_conflict_detected(&pr.url, files);
        Ok(())
    }

    async fn handle_manual_commits(
        &self,
        pr: &mut InProgressPullRequest,
        update: &SubscriptionUpdateWorkItem,
        remote: &dyn Remote,
        commits: &[String],
    ) -> FlowResult<()> {
        let already_reported = remote
            .get_pull_request_comments(&pr.url)
            .await?
            .iter()
            .any(|c| c.starts_with(MANUAL_COMMITS_HEADER));
        if !already_reported {
            remote
                .comment_pull_request(&pr.url, &manual_commits_comment(commits))
                .await?;
        }
        warn!(url = %pr.url, commits = commits.len(), "code flow would overwrite manual commits");
        self.park(pr, update).await
    }

    /// Queue `update` behind the pull request and wait for a human.
    async fn park(
        &self,
        pr: &mut InProgressPullRequest,
        update: &SubscriptionUpdateWorkItem,
    ) -> FlowResult<()> {
        pr.next_builds_to_process
            .insert(update.subscription_id, update.build_id);
        self.pr_state.set_state(pr).await?;
        self.update_reminders
            .set_reminder(update, self.default_delay())
            .await?;
        self.check_reminders.unset_reminder().await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_code_flow_pull_request(
        &self,
        update: &SubscriptionUpdateWorkItem,
        subscription: &Subscription,
        build: &Build,
        target: &TargetBranch,
        head_branch: &str,
        result: &CodeFlowResult,
        remote: &dyn Remote,
    ) -> FlowResult<String> {
        let summaries: Vec<DependencyUpdateSummary> = result
            .dependency_updates
            .iter()
            .map(DependencyUpdateSummary::from)
            .collect();
        let title = self
            .builder
            .generate_code_flow_pr_title(&target.branch, &[subscription.source_repository.clone()]);
        let description = self.builder.generate_code_flow_description(
            build,
            subscription,
            result.previous_flow_sha.as_deref(),
            &summaries,
            None,
        );

        let created = remote
            .create_pull_request(
                &target.repository,
                &PullRequest::new(title, description, &target.branch, head_branch),
            )
            .await;
        let url = match created {
            Ok(url) => url,
            Err(e) => {
                if let Err(cleanup) = remote.delete_branch(&target.repository, head_branch).await {
                    warn!(branch = %head_branch, error = %cleanup, "failed to delete orphaned branch");
                }
                return Err(e.into());
            }
        };

        let mut pr = InProgressPullRequest::new(&self.key, &url, head_branch);
        pr.source_sha = update.source_sha.clone();
        pr.contained_subscriptions = vec![SubscriptionPullRequestUpdate::from(update)];
        pr.required_updates = summaries;
        pr.code_flow_direction = if subscription.is_forward_flow() {
            CodeFlowDirection::ForwardFlow
        } else {
            CodeFlowDirection::BackFlow
        };

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
        self.update_reminders.unset_reminder().await?;
        self.code_flow_state.try_delete().await?;
        info!(url = %url, "opened code flow pull request");
        Ok(url)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_code_flow_pull_request(
        &self,
        update: &SubscriptionUpdateWorkItem,
        mut pr: InProgressPullRequest,
        info: &PullRequest,
        subscription: &Subscription,
        build: &Build,
        result: &CodeFlowResult,
        remote: &dyn Remote,
    ) -> FlowResult<String> {
        pr.contained_subscriptions
            .retain(|c| c.subscription_id != update.subscription_id);
        pr.contained_subscriptions
            .push(SubscriptionPullRequestUpdate::from(update));

        let incoming: Vec<DependencyUpdateSummary> = result
            .dependency_updates
            .iter()
            .map(DependencyUpdateSummary::from)
            .collect();
        pr.required_updates = merge_existing_with_incoming(&pr.required_updates, &incoming);

        let mut updated = info.clone();
        updated.title = self
            .builder
            .generate_code_flow_pr_title(&info.base_branch, &[subscription.source_repository.clone()]);
        updated.description = self.builder.generate_code_flow_description(
            build,
            subscription,
            result.previous_flow_sha.as_deref(),
            &pr.required_updates,
            Some(&info.description),
        );
        if let Err(e) = remote.update_pull_request(&pr.url, &updated).await {
            error!(url = %pr.url, error = %e, "failed to update code flow pull request description");
        }

        pr.source_sha = update.source_sha.clone();
        pr.last_update = chrono::Utc::now();
        pr.merge_state = InProgressPullRequestState::Mergeable;
        pr.next_builds_to_process.remove(&update.subscription_id);
        emit_pr_updated(&self.key, &pr.url, pr.required_updates.len());
        self.set_check_reminder(&mut pr, self.default_delay()).await?;
        self.update_reminders.unset_reminder().await?;
        Ok(pr.url)
    }
}

fn manual_commits_comment(commits: &[String]) -> String {
    let listing = commits
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{MANUAL_COMMITS_HEADER}\n{listing}\n\nCodeflow will resume after this PR is merged")
}

fn conflict_comment(files: &[String], build: &Build) -> String {
    let listing = files
        .iter()
        .map(|f| format!("- `{f}`"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "The following files conflicted with the target branch while flowing build {} \
         ({}) and were left at their target version:\n\n{listing}",
        build.id, build.commit
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_commits_comment_lists_commits() {
        let comment = manual_commits_comment(&["abc123".to_string(), "def456".to_string()]);
        assert!(comment.starts_with(MANUAL_COMMITS_HEADER));
        assert!(comment.contains("\n- abc123\n- def456\n"));
        assert!(comment.ends_with("Codeflow will resume after this PR is merged"));
    }
}
