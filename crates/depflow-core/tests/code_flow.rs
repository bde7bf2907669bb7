//! Source code flow pull requests: creation, conflicts and manual commits.

use std::path::PathBuf;
use std::sync::Arc;

use depflow_core::codeflow::{CodeFlowError, CodeFlowResult};
use depflow_core::domain::{
    CodeFlowDirection, InProgressPullRequest, InProgressPullRequestState, PullRequestCheck,
    Subscription, SubscriptionType, SubscriptionUpdateWorkItem,
};
use depflow_core::factory::{DefaultPullRequestUpdaterFactory, PullRequestUpdaterFactory};
use depflow_core::fakes::{build, subscription, FakeServices};
use depflow_core::remote::PrStatus;
use depflow_core::updater::{PullRequestUpdater, PullRequestUpdaterId, PULL_REQUEST_STATE};
use depflow_core::FlowError;
use depflow_state::StateCache;

const LIB: &str = "https://github.com/org/lib";
const APP: &str = "https://github.com/org/app";
const FIRST_PR: &str = "https://github.com/org/app/pull/1";

struct Fixture {
    services: FakeServices,
    sub: Subscription,
    id: PullRequestUpdaterId,
    updater: Arc<dyn PullRequestUpdater>,
}

impl Fixture {
    fn new(configure: impl FnOnce(&mut Subscription)) -> Self {
        let services = FakeServices::new();
        let mut sub = subscription(LIB, APP, "main", ".NET 10");
        sub.source_enabled = true;
        configure(&mut sub);
        services.bar.add_subscription(sub.clone());
        services.bar.add_build(build(42, LIB, "new"));
        services.bar.add_build(build(43, LIB, "newer"));
        services.bar.add_build(build(44, LIB, "newest"));

        let id = PullRequestUpdaterId::for_subscription(&sub);
        let updater = DefaultPullRequestUpdaterFactory::new(services.context()).create_updater(&id);
        Self {
            services,
            sub,
            id,
            updater,
        }
    }

    async fn apply(&self, build_id: u32) -> Result<(), FlowError> {
        self.updater
            .update_assets(self.sub.id, SubscriptionType::DependenciesAndSources, build_id, false)
            .await
    }

    async fn replay(&self, build_id: u32, sha: &str) {
        let update = SubscriptionUpdateWorkItem {
            updater_id: self.id.to_string(),
            subscription_id: self.sub.id,
            subscription_type: SubscriptionType::DependenciesAndSources,
            build_id,
            source_sha: sha.to_string(),
            source_repo: LIB.to_string(),
            assets: vec![],
            is_coherency_update: false,
        };
        self.updater
            .process_pending_updates(&update, true, false)
            .await
            .unwrap();
    }

    async fn tracked(&self) -> InProgressPullRequest {
        StateCache::<InProgressPullRequest>::new(
            self.services.state.clone(),
            PULL_REQUEST_STATE,
            &self.id.to_string(),
        )
        .try_get_state()
        .await
        .unwrap()
        .expect("tracked pull request")
    }

    fn head_branch(&self) -> String {
        self.services
            .remote()
            .pull_request(FIRST_PR)
            .unwrap()
            .head_branch
    }
}

fn flowed(conflicted_files: Vec<String>, had_updates: bool) -> CodeFlowResult {
    CodeFlowResult {
        had_updates,
        conflicted_files,
        repo_path: PathBuf::from("/tmp/depflow/app"),
        ..CodeFlowResult::default()
    }
}

#[tokio::test]
async fn test_back_flow_pushes_and_opens_pull_request() {
    let fx = Fixture::new(|_| {});
    fx.apply(42).await.unwrap();

    let head = fx.head_branch();
    let pushes = fx.services.git.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].1, head);
    assert_eq!(pushes[0].2, APP);
    assert_eq!(fx.services.flower.flows()[0].2, head);

    let pr = fx.services.remote().pull_request(FIRST_PR).unwrap();
    assert_eq!(pr.title, "[main] Source code updates from org/lib");
    assert!(pr.description.contains("This is a codeflow update"));

    let tracked = fx.tracked().await;
    assert_eq!(tracked.code_flow_direction, CodeFlowDirection::BackFlow);
    assert_eq!(tracked.source_sha, "new");
    assert_eq!(
        fx.services.state.keys(),
        vec![format!("InProgressPullRequest:{}", fx.id)]
    );
}

#[tokio::test]
async fn test_forward_flow_direction() {
    let fx = Fixture::new(|sub| sub.target_directory = Some("src/lib".to_string()));
    fx.apply(42).await.unwrap();
    assert_eq!(fx.tracked().await.code_flow_direction, CodeFlowDirection::ForwardFlow);
}

#[tokio::test]
async fn test_same_source_commit_is_not_flowed_again() {
    let fx = Fixture::new(|_| {});
    fx.apply(42).await.unwrap();
    fx.apply(42).await.unwrap();
    assert_eq!(fx.services.flower.flows().len(), 1);
}

#[tokio::test]
async fn test_flow_without_updates_opens_nothing() {
    let fx = Fixture::new(|_| {});
    fx.services.flower.push_outcome(Ok(flowed(vec![], false)));
    fx.apply(42).await.unwrap();

    assert!(fx.services.git.pushes().is_empty());
    assert!(fx.services.remote().pull_request_urls().is_empty());
    assert!(fx.services.state.keys().is_empty());
}

#[tokio::test]
async fn test_failed_flow_reuses_reserved_branch() {
    let fx = Fixture::new(|_| {});
    fx.services
        .flower
        .push_outcome(Err(CodeFlowError::Failed("clone failed".to_string())));

    let err = fx.apply(42).await.unwrap_err();
    assert!(matches!(err, FlowError::CodeFlow(CodeFlowError::Failed(_))));

    fx.apply(42).await.unwrap();
    let flows = fx.services.flower.flows();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].2, flows[1].2);
    assert_eq!(fx.head_branch(), flows[0].2);
}

#[tokio::test]
async fn test_conflicted_files_are_reported_on_the_pull_request() {
    let fx = Fixture::new(|_| {});
    fx.services
        .flower
        .push_outcome(Ok(flowed(vec!["eng/Versions.props".to_string()], true)));
    fx.apply(42).await.unwrap();

    let comments = fx.services.remote().comments(FIRST_PR);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("eng/Versions.props"));
}

#[tokio::test]
async fn test_conflict_blocks_updates_until_branch_moves() {
    let fx = Fixture::new(|_| {});
    fx.apply(42).await.unwrap();
    let remote = fx.services.remote();
    let head = fx.head_branch();
    remote.set_latest_commit(APP, &head, "human-head");

    fx.services
        .flower
        .push_outcome(Err(CodeFlowError::ConflictInPrBranch {
            files: vec!["src/Program.cs".to_string()],
        }));
    fx.apply(43).await.unwrap();

    assert!(remote.comments(FIRST_PR)[0].contains("src/Program.cs"));
    let tracked = fx.tracked().await;
    assert_eq!(tracked.merge_state, InProgressPullRequestState::Conflict);
    assert_eq!(tracked.source_sha, "human-head");
    assert_eq!(tracked.next_builds_to_process.get(&fx.sub.id), Some(&43));
    assert_eq!(
        fx.services.reminders.names(),
        vec![format!("SubscriptionUpdateWorkItem:{}", fx.id)]
    );

    // Nobody pushed a fix yet.
    fx.replay(43, "newer").await;
    assert_eq!(fx.services.flower.flows().len(), 2);

    remote.set_latest_commit(APP, &head, "fixed-head");
    fx.replay(43, "newer").await;
    assert_eq!(fx.services.flower.flows().len(), 3);

    let tracked = fx.tracked().await;
    assert_eq!(tracked.merge_state, InProgressPullRequestState::Mergeable);
    assert_eq!(tracked.source_sha, "newer");
    assert!(tracked.next_builds_to_process.is_empty());
    assert_eq!(
        fx.services.reminders.names(),
        vec![format!("PullRequestCheck:{}", fx.id)]
    );
}

#[tokio::test]
async fn test_closing_conflicted_pull_request_keeps_parked_build() {
    let fx = Fixture::new(|_| {});
    fx.apply(42).await.unwrap();
    let remote = fx.services.remote();
    remote.set_latest_commit(APP, &fx.head_branch(), "human-head");
    fx.services
        .flower
        .push_outcome(Err(CodeFlowError::ConflictInPrBranch {
            files: vec!["src/Program.cs".to_string()],
        }));
    fx.apply(43).await.unwrap();
    let parked = vec![format!("SubscriptionUpdateWorkItem:{}", fx.id)];
    assert_eq!(fx.services.reminders.names(), parked);

    remote.set_pull_request_status(FIRST_PR, PrStatus::Closed);
    let check = PullRequestCheck {
        updater_id: fx.id.to_string(),
        url: FIRST_PR.to_string(),
        is_code_flow: true,
    };
    assert!(!fx.updater.check_pull_request(&check).await.unwrap());
    assert!(fx.services.state.keys().is_empty());
    assert_eq!(fx.services.reminders.names(), parked);

    // The parked build flows into a fresh pull request.
    fx.replay(43, "newer").await;
    assert_eq!(fx.services.flower.flows().len(), 3);
    let urls = remote.pull_request_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(fx.services.remote().pull_request(&urls[1]).unwrap().status, PrStatus::Open);
}

#[tokio::test]
async fn test_manual_commits_are_reported_once() {
    let fx = Fixture::new(|_| {});
    fx.apply(42).await.unwrap();
    for _ in 0..2 {
        fx.services
            .flower
            .push_outcome(Err(CodeFlowError::ManualCommitsInFlow {
                commits: vec!["abc123".to_string()],
            }));
    }

    fx.apply(43).await.unwrap();
    fx.apply(44).await.unwrap();

    let comments = fx.services.remote().comments(FIRST_PR);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("- abc123"));
    assert_eq!(
        fx.tracked().await.next_builds_to_process.get(&fx.sub.id),
        Some(&44)
    );
}

#[tokio::test]
async fn test_missing_target_branch() {
    let fx = Fixture::new(|_| {});
    let missing = || CodeFlowError::TargetBranchNotFound {
        branch: "main".to_string(),
    };

    fx.services.flower.push_outcome(Err(missing()));
    fx.apply(42).await.unwrap();
    assert!(fx.services.remote().pull_request_urls().is_empty());

    fx.apply(42).await.unwrap();
    fx.services.flower.push_outcome(Err(missing()));
    let err = fx.apply(43).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::CodeFlow(CodeFlowError::TargetBranchNotFound { .. })
    ));
}
