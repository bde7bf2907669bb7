//! In-memory collaborators for tests and dry runs.
//!
//! Provides `MemoryBarClient`, `FakeRemote`/`FakeRemoteFactory`,
//! `FakeCodeFlower` and `FakeGitClient`, plus small builders for the domain
//! types. `FakeServices` wires all of them into an [`UpdaterContext`].

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use depflow_state::fakes::{MemoryDistributedLock, MemoryReminderStore, MemoryStateStore};
use uuid::Uuid;

use crate::bar::BarClient;
use crate::codeflow::{
    CodeFlowResult, CodeFlowResultOf, GitClient, VmrBackFlower, VmrForwardFlower,
};
use crate::coherency::StrictCoherencyUpdateResolver;
use crate::config::DepflowConfig;
use crate::domain::{
    Build, BuildTime, Channel, DependencyDetail, DependencyFlowEvent, DependencyType, FlowResult,
    MergePolicyDefinition, Subscription, SubscriptionPolicy, SubscriptionUpdateAction,
    UpdateFrequency,
};
use crate::merge_policy::{DefaultMergePolicyEvaluator, MergePolicyEvaluationResult};
use crate::remote::{
    Check, PrStatus, PullRequest, Remote, RemoteError, RemoteFactory, RemoteResult, Review,
};
use crate::updater::UpdaterContext;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Enabled, non-batchable, daily dependency subscription without policies.
pub fn subscription(source: &str, target: &str, branch: &str, channel: &str) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        channel: Channel {
            id: 1,
            name: channel.to_string(),
        },
        source_repository: source.to_string(),
        target_repository: target.to_string(),
        target_branch: branch.to_string(),
        enabled: true,
        source_enabled: false,
        source_directory: None,
        target_directory: None,
        excluded_assets: Vec::new(),
        policy: SubscriptionPolicy {
            batchable: false,
            update_frequency: UpdateFrequency::EveryDay,
            merge_policies: Vec::new(),
        },
        last_applied_build_id: None,
        pull_request_failure_notification_tags: None,
    }
}

pub fn dependency(name: &str, version: &str, repo: &str, commit: &str) -> DependencyDetail {
    DependencyDetail {
        name: name.to_string(),
        version: version.to_string(),
        repo_uri: repo.to_string(),
        commit: commit.to_string(),
        dependency_type: DependencyType::Product,
        pinned: false,
        coherent_parent_dependency_name: None,
    }
}

pub fn build(id: u32, repo: &str, commit: &str) -> Build {
    Build {
        id,
        repository: repo.to_string(),
        branch: "main".to_string(),
        commit: commit.to_string(),
        date_produced: Utc::now(),
        assets: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// MemoryBarClient
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BarState {
    builds: Vec<Build>,
    build_channels: Vec<(u32, u32)>,
    subscriptions: Vec<Subscription>,
    build_times: HashMap<u32, BuildTime>,
    build_time_requests: Vec<(u32, u32)>,
    repository_policies: HashMap<(String, String), Vec<MergePolicyDefinition>>,
    applied_builds: Vec<(Uuid, u32)>,
    events: Vec<DependencyFlowEvent>,
    updates: Vec<(Uuid, SubscriptionUpdateAction, String)>,
}

/// Registry kept in memory. Every write is recorded for inspection.
#[derive(Debug, Default)]
pub struct MemoryBarClient {
    state: Mutex<BarState>,
}

impl MemoryBarClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build(&self, build: Build) {
        let mut state = self.state.lock().unwrap();
        state.builds.retain(|b| b.id != build.id);
        state.builds.push(build);
    }

    pub fn assign_build_to_channel(&self, build_id: u32, channel_id: u32) {
        self.state
            .lock()
            .unwrap()
            .build_channels
            .push((build_id, channel_id));
    }

    /// Insert or replace a subscription.
    pub fn add_subscription(&self, subscription: Subscription) {
        let mut state = self.state.lock().unwrap();
        match state.subscriptions.iter_mut().find(|s| s.id == subscription.id) {
            Some(slot) => *slot = subscription,
            None => state.subscriptions.push(subscription),
        }
    }

    pub fn remove_subscription(&self, subscription_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .retain(|s| s.id != subscription_id);
    }

    pub fn set_build_time(&self, default_channel_id: u32, build_time: BuildTime) {
        self.state
            .lock()
            .unwrap()
            .build_times
            .insert(default_channel_id, build_time);
    }

    pub fn set_repository_merge_policies(
        &self,
        repository: &str,
        branch: &str,
        policies: Vec<MergePolicyDefinition>,
    ) {
        self.state
            .lock()
            .unwrap()
            .repository_policies
            .insert((repository.to_string(), branch.to_string()), policies);
    }

    /// `(default channel id, days)` of every build time lookup.
    pub fn build_time_requests(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().build_time_requests.clone()
    }

    pub fn applied_builds(&self) -> Vec<(Uuid, u32)> {
        self.state.lock().unwrap().applied_builds.clone()
    }

    pub fn events(&self) -> Vec<DependencyFlowEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn registered_updates(&self) -> Vec<(Uuid, SubscriptionUpdateAction, String)> {
        self.state.lock().unwrap().updates.clone()
    }
}

#[async_trait]
impl BarClient for MemoryBarClient {
    async fn get_build(&self, build_id: u32) -> FlowResult<Option<Build>> {
        let state = self.state.lock().unwrap();
        Ok(state.builds.iter().find(|b| b.id == build_id).cloned())
    }

    async fn get_builds(&self, repository: &str, commit: &str) -> FlowResult<Vec<Build>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .builds
            .iter()
            .filter(|b| b.repository.eq_ignore_ascii_case(repository) && b.commit == commit)
            .cloned()
            .collect())
    }

    async fn get_latest_build(&self, repository: &str, channel_id: u32) -> FlowResult<Option<Build>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .builds
            .iter()
            .filter(|b| b.repository.eq_ignore_ascii_case(repository))
            .filter(|b| state.build_channels.contains(&(b.id, channel_id)))
            .max_by_key(|b| (b.date_produced, b.id))
            .cloned())
    }

    async fn get_subscription(&self, subscription_id: Uuid) -> FlowResult<Option<Subscription>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn get_subscriptions(&self) -> FlowResult<Vec<Subscription>> {
        Ok(self.state.lock().unwrap().subscriptions.clone())
    }

    async fn get_build_time(&self, default_channel_id: u32, days: u32) -> FlowResult<BuildTime> {
        let mut state = self.state.lock().unwrap();
        state.build_time_requests.push((default_channel_id, days));
        Ok(state
            .build_times
            .get(&default_channel_id)
            .copied()
            .unwrap_or_default())
    }

    async fn get_repository_merge_policies(
        &self,
        repository: &str,
        branch: &str,
    ) -> FlowResult<Vec<MergePolicyDefinition>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .repository_policies
            .get(&(repository.to_string(), branch.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_subscription_last_applied_build(
        &self,
        subscription_id: Uuid,
        build_id: u32,
    ) -> FlowResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(subscription) = state.subscriptions.iter_mut().find(|s| s.id == subscription_id)
        else {
            return Ok(false);
        };
        subscription.last_applied_build_id = Some(build_id);
        state.applied_builds.push((subscription_id, build_id));
        Ok(true)
    }

    async fn add_dependency_flow_event(&self, event: DependencyFlowEvent) -> FlowResult<()> {
        self.state.lock().unwrap().events.push(event);
        Ok(())
    }

    async fn register_subscription_update(
        &self,
        subscription_id: Uuid,
        action: SubscriptionUpdateAction,
        message: &str,
    ) -> FlowResult<()> {
        self.state
            .lock()
            .unwrap()
            .updates
            .push((subscription_id, action, message.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeRemote
// ---------------------------------------------------------------------------

/// `(repository, branch, dependencies, message)` of one commit.
pub type RecordedCommit = (String, String, Vec<DependencyDetail>, String);

#[derive(Debug, Default)]
struct RemoteState {
    dependencies: HashMap<(String, String), Vec<DependencyDetail>>,
    dependency_requests: usize,
    latest_commits: HashMap<(String, String), String>,
    pull_requests: HashMap<String, PullRequest>,
    next_pull_request: u32,
    checks: HashMap<String, Vec<Check>>,
    check_requests: usize,
    reviews: HashMap<String, Vec<Review>>,
    comments: HashMap<String, Vec<String>>,
    merge_status: HashMap<String, Vec<MergePolicyEvaluationResult>>,
    commits: Vec<RecordedCommit>,
    created_branches: Vec<String>,
    deleted_branches: Vec<String>,
    merged: Vec<String>,
    fail_merges: bool,
    open_empty_pull_requests: bool,
}

/// Hosted repository kept in memory.
///
/// Branches created through the remote start with their base branch's
/// dependencies, and commits move the pins of the branch they land on.
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dependencies(&self, repository: &str, reference: &str, dependencies: Vec<DependencyDetail>) {
        self.state
            .lock()
            .unwrap()
            .dependencies
            .insert((repository.to_string(), reference.to_string()), dependencies);
    }

    pub fn set_latest_commit(&self, repository: &str, branch: &str, sha: &str) {
        self.state
            .lock()
            .unwrap()
            .latest_commits
            .insert((repository.to_string(), branch.to_string()), sha.to_string());
    }

    pub fn set_checks(&self, url: &str, checks: Vec<Check>) {
        self.state.lock().unwrap().checks.insert(url.to_string(), checks);
    }

    pub fn set_reviews(&self, url: &str, reviews: Vec<Review>) {
        self.state.lock().unwrap().reviews.insert(url.to_string(), reviews);
    }

    /// Move a pull request to `status`, as if a human merged or closed it.
    pub fn set_pull_request_status(&self, url: &str, status: PrStatus) {
        if let Some(pr) = self.state.lock().unwrap().pull_requests.get_mut(url) {
            pr.status = status;
        }
    }

    pub fn set_pull_request_head(&self, url: &str, sha: &str) {
        if let Some(pr) = self.state.lock().unwrap().pull_requests.get_mut(url) {
            pr.head_branch_sha = sha.to_string();
        }
    }

    pub fn fail_merges(&self, fail: bool) {
        self.state.lock().unwrap().fail_merges = fail;
    }

    /// Answer pull request creation with an empty url.
    pub fn open_empty_pull_requests(&self, empty: bool) {
        self.state.lock().unwrap().open_empty_pull_requests = empty;
    }

    pub fn pull_request(&self, url: &str) -> Option<PullRequest> {
        self.state.lock().unwrap().pull_requests.get(url).cloned()
    }

    pub fn pull_request_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .pull_requests
            .keys()
            .cloned()
            .collect();
        urls.sort();
        urls
    }

    pub fn dependencies(&self, repository: &str, reference: &str) -> Vec<DependencyDetail> {
        self.state
            .lock()
            .unwrap()
            .dependencies
            .get(&(repository.to_string(), reference.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn dependency_requests(&self) -> usize {
        self.state.lock().unwrap().dependency_requests
    }

    pub fn check_requests(&self) -> usize {
        self.state.lock().unwrap().check_requests
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn comments(&self, url: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    pub fn merge_status(&self, url: &str) -> Vec<MergePolicyEvaluationResult> {
        self.state
            .lock()
            .unwrap()
            .merge_status
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    pub fn created_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().created_branches.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_branches.clone()
    }

    pub fn merged(&self) -> Vec<String> {
        self.state.lock().unwrap().merged.clone()
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn get_pull_request(&self, url: &str) -> RemoteResult<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pull_requests
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::PullRequestNotFound { url: url.to_string() })
    }

    async fn create_new_branch(&self, repository: &str, base_branch: &str, new_branch: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let base = (repository.to_string(), base_branch.to_string());
        let new = (repository.to_string(), new_branch.to_string());
        if let Some(deps) = state.dependencies.get(&base).cloned() {
            state.dependencies.insert(new.clone(), deps);
        }
        if let Some(sha) = state.latest_commits.get(&base).cloned() {
            state.latest_commits.insert(new, sha);
        }
        state.created_branches.push(new_branch.to_string());
        Ok(())
    }

    async fn commit_updates(
        &self,
        repository: &str,
        branch: &str,
        dependencies: &[DependencyDetail],
        message: &str,
    ) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let pins = state
            .dependencies
            .entry((repository.to_string(), branch.to_string()))
            .or_default();
        for dep in dependencies {
            match pins.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&dep.name)) {
                Some(slot) => *slot = dep.clone(),
                None => pins.push(dep.clone()),
            }
        }
        state.commits.push((
            repository.to_string(),
            branch.to_string(),
            dependencies.to_vec(),
            message.to_string(),
        ));
        Ok(())
    }

    async fn create_pull_request(&self, repository: &str, pull_request: &PullRequest) -> RemoteResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.open_empty_pull_requests {
            return Ok(String::new());
        }
        state.next_pull_request += 1;
        let url = format!("{repository}/pull/{}", state.next_pull_request);
        let head_sha = state
            .latest_commits
            .get(&(repository.to_string(), pull_request.head_branch.clone()))
            .cloned()
            .unwrap_or_else(|| format!("head-{}", state.next_pull_request));
        state.pull_requests.insert(
            url.clone(),
            PullRequest {
                status: PrStatus::Open,
                updated_at: Utc::now(),
                head_branch_sha: head_sha,
                ..pull_request.clone()
            },
        );
        Ok(url)
    }

    async fn update_pull_request(&self, url: &str, pull_request: &PullRequest) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .pull_requests
            .get_mut(url)
            .ok_or_else(|| RemoteError::PullRequestNotFound { url: url.to_string() })?;
        existing.title = pull_request.title.clone();
        existing.description = pull_request.description.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn merge_dependency_pull_request(&self, url: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_merges {
            return Err(RemoteError::PullRequestNotMergeable {
                url: url.to_string(),
                reason: "merge blocked".to_string(),
            });
        }
        if let Some(pr) = state.pull_requests.get_mut(url) {
            pr.status = PrStatus::Merged;
        }
        state.merged.push(url.to_string());
        Ok(())
    }

    async fn delete_branch(&self, _repository: &str, branch: &str) -> RemoteResult<()> {
        self.state
            .lock()
            .unwrap()
            .deleted_branches
            .push(branch.to_string());
        Ok(())
    }

    async fn delete_pull_request_branch(&self, url: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let head = state
            .pull_requests
            .get(url)
            .map(|pr| pr.head_branch.clone())
            .ok_or_else(|| RemoteError::PullRequestNotFound { url: url.to_string() })?;
        state.deleted_branches.push(head);
        Ok(())
    }

    async fn get_dependencies(&self, repository: &str, reference: &str) -> RemoteResult<Vec<DependencyDetail>> {
        let mut state = self.state.lock().unwrap();
        state.dependency_requests += 1;
        state
            .dependencies
            .get(&(repository.to_string(), reference.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::DependencyFileNotFound {
                repository: repository.to_string(),
                reference: reference.to_string(),
            })
    }

    async fn comment_pull_request(&self, url: &str, message: &str) -> RemoteResult<()> {
        self.state
            .lock()
            .unwrap()
            .comments
            .entry(url.to_string())
            .or_default()
            .push(message.to_string());
        Ok(())
    }

    async fn get_pull_request_comments(&self, url: &str) -> RemoteResult<Vec<String>> {
        Ok(self.comments(url))
    }

    async fn get_pull_request_checks(&self, url: &str) -> RemoteResult<Vec<Check>> {
        let mut state = self.state.lock().unwrap();
        state.check_requests += 1;
        Ok(state.checks.get(url).cloned().unwrap_or_default())
    }

    async fn get_pull_request_reviews(&self, url: &str) -> RemoteResult<Vec<Review>> {
        let state = self.state.lock().unwrap();
        Ok(state.reviews.get(url).cloned().unwrap_or_default())
    }

    async fn create_or_update_pull_request_merge_status_info(
        &self,
        url: &str,
        evaluations: &[MergePolicyEvaluationResult],
    ) -> RemoteResult<()> {
        self.state
            .lock()
            .unwrap()
            .merge_status
            .insert(url.to_string(), evaluations.to_vec());
        Ok(())
    }

    async fn get_latest_commit(&self, repository: &str, branch: &str) -> RemoteResult<String> {
        self.state
            .lock()
            .unwrap()
            .latest_commits
            .get(&(repository.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::BranchNotFound {
                repository: repository.to_string(),
                branch: branch.to_string(),
            })
    }
}

/// Hands out one shared [`FakeRemote`] for every repository.
#[derive(Debug, Default)]
pub struct FakeRemoteFactory {
    remote: Arc<FakeRemote>,
}

impl FakeRemoteFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(&self) -> Arc<FakeRemote> {
        Arc::clone(&self.remote)
    }
}

#[async_trait]
impl RemoteFactory for FakeRemoteFactory {
    async fn create_remote(&self, _repository: &str) -> RemoteResult<Arc<dyn Remote>> {
        let remote: Arc<dyn Remote> = self.remote.clone();
        Ok(remote)
    }
}

// ---------------------------------------------------------------------------
// Code flow
// ---------------------------------------------------------------------------

/// `(subscription id, build id, head branch)` of one flow.
pub type RecordedFlow = (Uuid, u32, String);

/// Forward and back flower answering with queued outcomes.
///
/// With nothing queued a flow succeeds with updates.
#[derive(Debug, Default)]
pub struct FakeCodeFlower {
    outcomes: Mutex<VecDeque<CodeFlowResultOf<CodeFlowResult>>>,
    flows: Mutex<Vec<RecordedFlow>>,
}

impl FakeCodeFlower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: CodeFlowResultOf<CodeFlowResult>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn flows(&self) -> Vec<RecordedFlow> {
        self.flows.lock().unwrap().clone()
    }

    fn next(&self, subscription: &Subscription, build: &Build, head_branch: &str) -> CodeFlowResultOf<CodeFlowResult> {
        self.flows
            .lock()
            .unwrap()
            .push((subscription.id, build.id, head_branch.to_string()));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(CodeFlowResult {
                    had_updates: true,
                    repo_path: PathBuf::from("/tmp/depflow/vmr"),
                    ..CodeFlowResult::default()
                })
            })
    }
}

#[async_trait]
impl VmrForwardFlower for FakeCodeFlower {
    async fn flow_forward(
        &self,
        subscription: &Subscription,
        build: &Build,
        head_branch: &str,
        _skip_meaningless_updates: bool,
    ) -> CodeFlowResultOf<CodeFlowResult> {
        self.next(subscription, build, head_branch)
    }
}

#[async_trait]
impl VmrBackFlower for FakeCodeFlower {
    async fn flow_back(
        &self,
        subscription: &Subscription,
        build: &Build,
        head_branch: &str,
    ) -> CodeFlowResultOf<CodeFlowResult> {
        self.next(subscription, build, head_branch)
    }
}

/// Records pushes instead of running git.
#[derive(Debug, Default)]
pub struct FakeGitClient {
    pushes: Mutex<Vec<(PathBuf, String, String)>>,
}

impl FakeGitClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<(PathBuf, String, String)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitClient for FakeGitClient {
    async fn push(&self, repo_path: &Path, branch: &str, remote_url: &str) -> CodeFlowResultOf<()> {
        self.pushes.lock().unwrap().push((
            repo_path.to_path_buf(),
            branch.to_string(),
            remote_url.to_string(),
        ));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeServices
// ---------------------------------------------------------------------------

/// Every collaborator of an updater, in memory.
pub struct FakeServices {
    pub bar: Arc<MemoryBarClient>,
    pub remotes: Arc<FakeRemoteFactory>,
    pub state: Arc<MemoryStateStore>,
    pub reminders: Arc<MemoryReminderStore>,
    pub lock: Arc<MemoryDistributedLock>,
    pub flower: Arc<FakeCodeFlower>,
    pub git: Arc<FakeGitClient>,
    pub config: DepflowConfig,
}

impl Default for FakeServices {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServices {
    pub fn new() -> Self {
        Self {
            bar: Arc::new(MemoryBarClient::new()),
            remotes: Arc::new(FakeRemoteFactory::new()),
            state: Arc::new(MemoryStateStore::new()),
            reminders: Arc::new(MemoryReminderStore::new()),
            lock: Arc::new(MemoryDistributedLock::new()),
            flower: Arc::new(FakeCodeFlower::new()),
            git: Arc::new(FakeGitClient::new()),
            config: DepflowConfig::default(),
        }
    }

    pub fn remote(&self) -> Arc<FakeRemote> {
        self.remotes.remote()
    }

    /// Context using the strict coherency resolver and the built-in merge
    /// policies.
    pub fn context(&self) -> UpdaterContext {
        UpdaterContext {
            bar: self.bar.clone(),
            remote_factory: self.remotes.clone(),
            coherency: Arc::new(StrictCoherencyUpdateResolver::new(self.remotes.clone())),
            merge_policy_evaluator: Arc::new(DefaultMergePolicyEvaluator::new()),
            state_store: self.state.clone(),
            reminder_store: self.reminders.clone(),
            forward_flower: self.flower.clone(),
            back_flower: self.flower.clone(),
            git: self.git.clone(),
            config: self.config.clone(),
        }
    }
}
