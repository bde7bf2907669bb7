//! Structured observability hooks for dependency flow.
//!
//! This module provides:
//! - Updater-scoped tracing spans via `updater_span`, attached to async
//!   work with `tracing::Instrument`
//! - Emission functions for lifecycle events: subscription fired, pull
//!   request created/updated/completed, policies evaluated, update deferred,
//!   conflict detected
//!
//! Events are emitted at `info!` level; filter them with `RUST_LOG`.

use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::domain::MergePolicyCheckResult;

/// Span carrying the updater id. Attach it to an update pass with
/// `Instrument::instrument` rather than entering it across awaits.
///
/// ```ignore
/// async { /* ... */ }
///     .instrument(updater_span("batched:https://git.example/sdk:main"))
///     .await
/// ```
pub fn updater_span(updater_id: &str) -> Span {
    tracing::info_span!("depflow.updater", updater_id = %updater_id)
}

/// Emit event: a subscription was triggered for a build.
pub fn emit_subscription_fired(subscription_id: Uuid, build_id: u32, updater_id: &str) {
    info!(
        event = "subscription.fired",
        subscription_id = %subscription_id,
        build_id = build_id,
        updater_id = %updater_id,
    );
}

/// Emit event: a pull request was opened.
pub fn emit_pr_created(updater_id: &str, url: &str, updates: usize) {
    info!(event = "pr.created", updater_id = %updater_id, url = %url, updates = updates);
}

/// Emit event: new updates were pushed to an existing pull request.
pub fn emit_pr_updated(updater_id: &str, url: &str, updates: usize) {
    info!(event = "pr.updated", updater_id = %updater_id, url = %url, updates = updates);
}

/// Emit event: the pull request left tracking (merged or closed).
pub fn emit_pr_completed(updater_id: &str, url: &str, merged: bool, automatic: bool) {
    info!(
        event = "pr.completed",
        updater_id = %updater_id,
        url = %url,
        merged = merged,
        automatic = automatic,
    );
}

/// Emit event: merge policies were evaluated.
pub fn emit_policies_evaluated(url: &str, result: MergePolicyCheckResult, policies: usize) {
    info!(
        event = "policies.evaluated",
        url = %url,
        result = ?result,
        policies = policies,
    );
}

/// Emit event: an update was parked until the pull request can take it.
pub fn emit_update_deferred(updater_id: &str, subscription_id: Uuid, build_id: u32) {
    info!(
        event = "update.deferred",
        updater_id = %updater_id,
        subscription_id = %subscription_id,
        build_id = build_id,
    );
}

/// Emit event: a code flow conflicted with the pull request branch (warning level).
pub fn emit_conflict_detected(url: &str, files: &[String]) {
    warn!(event = "pr.conflict", url = %url, files = files.len(), first = ?files.first());
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing::Instrument;

    #[test]
    fn test_updater_span_in_sync_scope() {
        let span = updater_span("non-batched:00000000-0000-0000-0000-000000000000");
        let _guard = span.enter();
        emit_pr_created("u", "https://git.example/pr/1", 2);
    }

    #[tokio::test]
    async fn test_updater_span_instruments_send_future() {
        fn assert_send<F: std::future::Future + Send>(f: F) -> F {
            f
        }
        let fut = async {
            tokio::task::yield_now().await;
            emit_pr_updated("u", "https://git.example/pr/1", 1);
            7
        }
        .instrument(updater_span("batched:https://git.example/sdk:main"));
        assert_eq!(tokio::spawn(assert_send(fut)).await.unwrap(), 7);
    }
}
