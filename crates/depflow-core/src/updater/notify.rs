//! Tagging source repository contacts on pull requests with failing checks.

use tracing::info;

use crate::bar::BarClient;
use crate::domain::{FlowResult, InProgressPullRequest, Subscription};
use crate::remote::{CheckState, Remote};

/// Comment asking the source repository's contacts to look at failing
/// checks, or `None` when nobody should be tagged.
///
/// The pull request is tagged at most once; `pr.source_repo_notified` is
/// set whenever no later attempt could do better.
pub async fn source_repository_notification(
    pr: &mut InProgressPullRequest,
    bar: &dyn BarClient,
    remote: &dyn Remote,
) -> FlowResult<Option<String>> {
    if pr.source_repo_notified {
        info!(url = %pr.url, "source repository already notified");
        return Ok(None);
    }

    let Some(first) = pr.contained_subscriptions.first() else {
        pr.source_repo_notified = true;
        return Ok(None);
    };
    let Some(subscription) = bar.get_subscription(first.subscription_id).await? else {
        pr.source_repo_notified = true;
        return Ok(None);
    };

    // Failures of our own merge policy checks are not worth a ping.
    let checks = remote.get_pull_request_checks(&pr.url).await?;
    let has_real_failure = checks.iter().any(|c| {
        !c.is_merge_policy && matches!(c.status, CheckState::Failure | CheckState::Error)
    });
    if !has_real_failure {
        return Ok(None);
    }

    let tags = notification_tags(&subscription);
    if tags.is_empty() {
        info!(
            source = %subscription.source_repository,
            target = %subscription.target_repository,
            "no notification tags configured"
        );
        return Ok(None);
    }

    pr.source_repo_notified = true;
    Ok(Some(format!(
        "#### Notification for subscribed users from {source}:\n\n\
         {tags}\n\n\
         #### Action requested: Please take a look at this failing automated dependency-flow \
         pull request's checks; failures may be related to changes which originated in the \
         source repo.\n\n\
         - This pull request contains changes from {source} and failed checks in this PR.\n\
         - You are tagged because of subscription {id}.",
        source = subscription.source_repository,
        tags = tags.join("\n"),
        id = subscription.id,
    )))
}

fn notification_tags(subscription: &Subscription) -> Vec<String> {
    subscription
        .pull_request_failure_notification_tags
        .as_deref()
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.starts_with('@') {
                t.to_string()
            } else {
                format!("@{t}")
            }
        })
        .collect()
}
