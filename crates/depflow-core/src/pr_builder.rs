//! Pull request titles, descriptions and update commits.
//!
//! Descriptions are built from marked sections, one per subscription, so an
//! update rewrites only the section of the subscription that changed:
//!
//! ```text
//! <!-- Begin:{subscription id} -->
//! ## From https://github.com/org/runtime
//! ...
//! <!-- End:{subscription id} -->
//! ```

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::bar::BarClient;
use crate::domain::{
    Build, CoherencyErrorDetails, DependencyDetail, DependencyUpdate, DependencyUpdateSummary,
    FlowResult, Subscription, SubscriptionPullRequestUpdate, SubscriptionUpdateWorkItem,
};
use crate::remote::Remote;

/// Titles listing more repositories than fit are shortened to a count.
pub const TITLE_LENGTH_LIMIT: usize = 150;

/// Commit SHAs are shortened to this length in compare links.
pub const SHORT_SHA_LENGTH: usize = 10;

const DEFAULT_DESCRIPTION_HEADER: &str = "This pull request updates the following dependencies";
const COHERENCY_SECTION: &str = "Coherency Updates";
const COHERENCY_FAILURE_MESSAGE: &str =
    "Failed to perform coherency update for one or more dependencies.";
const COMMIT_DIFF_NOT_AVAILABLE: &str = "Not available";

/// Updates computed for one target branch in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredUpdates {
    pub coherency_check_successful: bool,
    pub coherency_errors: Vec<CoherencyErrorDetails>,
    /// Work items with the dependency moves they cause. Coherency moves are
    /// carried by a work item flagged `is_coherency_update`.
    pub updates: Vec<(SubscriptionUpdateWorkItem, Vec<DependencyUpdate>)>,
}

impl RequiredUpdates {
    pub fn is_empty(&self) -> bool {
        self.updates.iter().all(|(_, deps)| deps.is_empty())
    }

    pub fn summaries(&self) -> Vec<DependencyUpdateSummary> {
        self.updates
            .iter()
            .flat_map(|(_, deps)| deps.iter().map(DependencyUpdateSummary::from))
            .collect()
    }
}

pub struct PullRequestBuilder {
    bar: Arc<dyn BarClient>,
}

impl PullRequestBuilder {
    pub fn new(bar: Arc<dyn BarClient>) -> Self {
        Self { bar }
    }

    /// Title of a dependency update pull request.
    pub fn generate_pr_title(
        &self,
        contained: &[SubscriptionPullRequestUpdate],
        target_branch: &str,
    ) -> String {
        if contained.is_empty() {
            return format!("[{target_branch}] Update dependencies to ensure coherency");
        }

        let mut repos: Vec<String> = Vec::new();
        for entry in contained {
            if !entry.source_repo.is_empty() && !repos.contains(&entry.source_repo) {
                repos.push(entry.source_repo.clone());
            }
        }
        generate_title(&format!("[{target_branch}] Update dependencies from"), &repos)
    }

    pub fn generate_code_flow_pr_title(&self, target_branch: &str, repos: &[String]) -> String {
        generate_title(&format!("[{target_branch}] Source code updates from"), repos)
    }

    /// Commit every required update to `branch` and return the new
    /// description.
    ///
    /// With nothing to commit (the coherency pass failed and no asset moved)
    /// an empty commit records the failure and the description says so.
    pub async fn calculate_description_and_commit_updates(
        &self,
        remote: &dyn Remote,
        required: &RequiredUpdates,
        current_description: Option<&str>,
        target_repository: &str,
        branch: &str,
    ) -> FlowResult<String> {
        if required.is_empty() {
            remote
                .commit_updates(target_repository, branch, &[], COHERENCY_FAILURE_MESSAGE)
                .await?;
            return Ok(format!(
                "Coherency update: {COHERENCY_FAILURE_MESSAGE} Please review the checks on this \
                 pull request or run a coherency-only update locally against {branch} for more \
                 information."
            ));
        }

        let mut description = match current_description {
            Some(current) => current.to_string(),
            None => format!("{DEFAULT_DESCRIPTION_HEADER}\n\n"),
        };

        for (update, deps) in &required.updates {
            if deps.is_empty() {
                continue;
            }
            let to: Vec<DependencyDetail> = deps.iter().map(|d| d.to.clone()).collect();

            if update.is_coherency_update {
                let message = coherency_commit_message(deps);
                remote
                    .commit_updates(target_repository, branch, &to, &message)
                    .await?;
                replace_section(&mut description, COHERENCY_SECTION, &coherency_section(deps));
                continue;
            }

            let build = self.bar.get_build(update.build_id).await?;
            let message = commit_message(&update.source_repo, update.build_id, deps);
            remote
                .commit_updates(target_repository, branch, &to, &message)
                .await?;
            let section = build_section(update, build.as_ref(), deps);
            replace_section(&mut description, &update.subscription_id.to_string(), &section);
        }

        if !required.coherency_check_successful {
            let section = coherency_failure_section(&required.coherency_errors);
            replace_section(&mut description, COHERENCY_SECTION, &section);
        }

        Ok(description)
    }

    /// Description of a code flow pull request.
    ///
    /// A new pull request gets a header plus the subscription's section; an
    /// existing description only has that section rewritten.
    pub fn generate_code_flow_description(
        &self,
        build: &Build,
        subscription: &Subscription,
        previous_source_commit: Option<&str>,
        dependency_updates: &[DependencyUpdateSummary],
        current_description: Option<&str>,
    ) -> String {
        let section = code_flow_section(
            subscription.id,
            build,
            previous_source_commit,
            dependency_updates,
        );

        match current_description.filter(|d| !d.is_empty()) {
            Some(current) => {
                let mut description = current.to_string();
                replace_section(&mut description, &subscription.id.to_string(), &section);
                description
            }
            None => {
                let origin = if subscription.is_forward_flow() {
                    "the source repo"
                } else {
                    "the VMR"
                };
                format!(
                    "> [!NOTE]\n\
                     > This is a codeflow update. It may contain both source code changes from\n\
                     > [{origin}]({}) as well as dependency updates.\n\n\
                     This pull request brings the following source code changes\n\n{section}",
                    build.repository
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

fn simple_repo_name(repo: &str) -> String {
    repo.replace("https://github.com/", "")
        .replace("https://dev.azure.com/", "")
        .replace("_git/", "")
}

fn generate_title(base: &str, repos: &[String]) -> String {
    if repos.is_empty() {
        return String::new();
    }

    let mut names: Vec<String> = repos.iter().map(|r| simple_repo_name(r)).collect();
    names.sort();
    let delimiter = ", ";
    let total = base.len()
        + names.iter().map(String::len).sum::<usize>()
        + delimiter.len() * (names.len() - 1);

    if total > TITLE_LENGTH_LIMIT {
        format!("{base} {} repositories", names.len())
    } else {
        format!("{base} {}", names.join(delimiter))
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn start_marker(id: &str) -> String {
    format!("<!-- Begin:{id} -->")
}

fn end_marker(id: &str) -> String {
    format!("<!-- End:{id} -->")
}

/// Swap the section called `id` for `section`, appending when absent.
fn replace_section(description: &mut String, id: &str, section: &str) {
    let start = start_marker(id);
    let end = end_marker(id);
    if let (Some(from), Some(to)) = (description.find(&start), description.find(&end)) {
        if from < to {
            description.replace_range(from..to + end.len(), section.trim_end());
            return;
        }
    }
    if !description.is_empty() && !description.ends_with('\n') {
        description.push('\n');
    }
    description.push_str(section);
}

/// Compare link between two commits of a repository.
pub fn changes_uri(repo: &str, from_sha: &str, to_sha: &str) -> String {
    if repo.contains("github.com") {
        let short = |sha: &str| sha.chars().take(SHORT_SHA_LENGTH).collect::<String>();
        format!("{repo}/compare/{}...{}", short(from_sha), short(to_sha))
    } else {
        format!("{repo}/branches?baseVersion=GC{from_sha}&targetVersion=GC{to_sha}&_a=files")
    }
}

/// Groups keep first-seen order; each group is one version range.
fn group_by_range<'a, T, K: PartialEq>(
    items: &'a [T],
    key: impl Fn(&T) -> K,
) -> Vec<(K, Vec<&'a T>)> {
    let mut groups: Vec<(K, Vec<&T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}

fn build_details(out: &mut String, update: &SubscriptionUpdateWorkItem, build: Option<&Build>) {
    out.push_str(&format!("- **Subscription**: {}\n", update.subscription_id));
    out.push_str(&format!("- **Build**: {}\n", update.build_id));
    if let Some(build) = build {
        out.push_str(&format!(
            "- **Date Produced**: {}\n",
            build.date_produced.format("%B %-d, %Y %-I:%M:%S %p UTC")
        ));
        out.push_str(&format!("- **Commit**: {}\n", build.commit));
        if !build.branch.is_empty() {
            out.push_str(&format!("- **Branch**: {}\n", build.branch));
        }
    } else {
        warn!(build_id = update.build_id, "build missing while describing pull request");
        out.push_str(&format!("- **Commit**: {}\n", update.source_sha));
    }
}

fn build_section(
    update: &SubscriptionUpdateWorkItem,
    build: Option<&Build>,
    deps: &[DependencyUpdate],
) -> String {
    let id = update.subscription_id.to_string();
    let mut out = format!("{}\n## From {}\n", start_marker(&id), update.source_repo);
    build_details(&mut out, update, build);
    out.push_str("\n- **Dependency Updates**:\n");

    let groups = group_by_range(deps, |d| {
        (
            d.from.version.clone(),
            d.to.version.clone(),
            d.from.commit.clone(),
            d.to.commit.clone(),
        )
    });
    for ((from_version, to_version, from_commit, to_commit), members) in groups {
        let repo = &members[0].to.repo_uri;
        out.push_str(&format!(
            "  - From [{from_version} to {to_version}]({})\n",
            changes_uri(repo, &from_commit, &to_commit)
        ));
        for dep in members {
            out.push_str(&format!("     - {}\n", dep.to.name));
        }
    }
    out.push_str(&format!("{}\n", end_marker(&id)));
    out
}

fn coherency_section(deps: &[DependencyUpdate]) -> String {
    let mut out = format!("{}\n## Coherency Updates\n\n", start_marker(COHERENCY_SECTION));
    out.push_str(
        "The following updates ensure that dependencies with a coherent parent\n\
         were produced in a build used as input to the parent dependency's build.\n\n",
    );
    out.push_str("- **Coherency Updates**:\n");
    for dep in deps {
        out.push_str(&format!(
            "  - **{}**: from {} to {} (parent: {})\n",
            dep.to.name,
            dep.from.version,
            dep.to.version,
            dep.to.coherent_parent_dependency_name.as_deref().unwrap_or("")
        ));
    }
    out.push_str(&format!("{}\n", end_marker(COHERENCY_SECTION)));
    out
}

fn coherency_failure_section(errors: &[CoherencyErrorDetails]) -> String {
    let mut out = format!("{}\n## Coherency Updates\n\n", start_marker(COHERENCY_SECTION));
    out.push_str(&format!("{COHERENCY_FAILURE_MESSAGE}\n\n"));
    for details in errors {
        out.push_str(&format!("- {}\n", details.error));
        for solution in &details.potential_solutions {
            out.push_str(&format!("  - {solution}\n"));
        }
    }
    out.push_str(&format!("{}\n", end_marker(COHERENCY_SECTION)));
    out
}

fn code_flow_section(
    subscription_id: Uuid,
    build: &Build,
    previous_source_commit: Option<&str>,
    dependency_updates: &[DependencyUpdateSummary],
) -> String {
    let id = subscription_id.to_string();
    let diff = match previous_source_commit.filter(|c| !c.is_empty()) {
        Some(previous) => {
            let short = |sha: &str| sha.chars().take(SHORT_SHA_LENGTH).collect::<String>();
            format!(
                "[{}...{}]({})",
                short(previous),
                short(&build.commit),
                changes_uri(&build.repository, previous, &build.commit)
            )
        }
        None => COMMIT_DIFF_NOT_AVAILABLE.to_string(),
    };

    let mut out = format!("{}\n## From {}\n", start_marker(&id), build.repository);
    out.push_str(&format!("- **Subscription**: {subscription_id}\n"));
    out.push_str(&format!("- **Build**: {}\n", build.id));
    out.push_str(&format!(
        "- **Date Produced**: {}\n",
        build.date_produced.format("%B %-d, %Y %-I:%M:%S %p UTC")
    ));
    out.push_str(&format!("- **Commit**: {}\n", build.commit));
    out.push_str(&format!("- **Commit Diff**: {diff}\n"));
    out.push_str(&format!("- **Branch**: {}\n", build.branch));
    out.push_str(&dependency_update_block(dependency_updates));
    out.push_str(&format!("{}\n", end_marker(&id)));
    out
}

/// New, removed and updated dependencies of a code flow.
pub fn dependency_update_block(summaries: &[DependencyUpdateSummary]) -> String {
    let groups = group_by_range(summaries, |s| (s.from_version.clone(), s.to_version.clone()));
    let mut out = String::new();

    for kind in [ChangeKind::Added, ChangeKind::Removed, ChangeKind::Updated] {
        let mut lines = Vec::new();
        for ((from, to), members) in &groups {
            if ChangeKind::of(from, to) != Some(kind) {
                continue;
            }
            lines.push(match kind {
                ChangeKind::Added => format!("- Added {to}"),
                ChangeKind::Removed => format!("- Removed {from}"),
                ChangeKind::Updated => format!("- From {from} to {to}"),
            });
            let mut names: Vec<&str> = members.iter().map(|m| m.dependency_name.as_str()).collect();
            names.sort();
            lines.extend(names.into_iter().map(|n| format!("  - {n}")));
        }
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("\n**{}**\n", kind.title()));
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Added,
    Removed,
    Updated,
}

impl ChangeKind {
    fn of(from: &str, to: &str) -> Option<Self> {
        match (from.is_empty(), to.is_empty()) {
            (true, false) => Some(ChangeKind::Added),
            (false, true) => Some(ChangeKind::Removed),
            (false, false) => Some(ChangeKind::Updated),
            (true, true) => None,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ChangeKind::Added => "New Dependencies",
            ChangeKind::Removed => "Removed Dependencies",
            ChangeKind::Updated => "Updated Dependencies",
        }
    }
}

// ---------------------------------------------------------------------------
// Commit messages
// ---------------------------------------------------------------------------

fn commit_message(source_repo: &str, build_id: u32, deps: &[DependencyUpdate]) -> String {
    let mut message = format!("Update dependencies from {source_repo} build {build_id}\n");
    for ((from, to), members) in group_by_range(deps, |d| (d.from.version.clone(), d.to.version.clone())) {
        let names: Vec<&str> = members.iter().map(|d| d.to.name.as_str()).collect();
        message.push_str(&format!(
            "{} From Version {from} -> To Version {to}\n",
            names.join(" , ")
        ));
    }
    message
}

fn coherency_commit_message(deps: &[DependencyUpdate]) -> String {
    let mut message = String::from("Dependency coherency updates\n");
    for dep in deps {
        message.push_str(&format!(
            "{} From Version {} -> To Version {} (parent: {})\n",
            dep.to.name,
            dep.from.version,
            dep.to.version,
            dep.to.coherent_parent_dependency_name.as_deref().unwrap_or("")
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubscriptionType;
    use crate::fakes::{build, dependency, subscription, FakeRemote, MemoryBarClient};

    const APP: &str = "https://github.com/org/app";

    fn contained(repo: &str) -> SubscriptionPullRequestUpdate {
        SubscriptionPullRequestUpdate {
            subscription_id: Uuid::new_v4(),
            build_id: 1,
            source_repo: repo.to_string(),
            commit_sha: "abc".to_string(),
        }
    }

    fn work_item(subscription_id: Uuid, build_id: u32) -> SubscriptionUpdateWorkItem {
        SubscriptionUpdateWorkItem {
            updater_id: "non-batched:x".to_string(),
            subscription_id,
            subscription_type: SubscriptionType::Dependencies,
            build_id,
            source_sha: "new".to_string(),
            source_repo: "https://github.com/org/runtime".to_string(),
            assets: vec![],
            is_coherency_update: false,
        }
    }

    fn update(name: &str, from: &str, to: &str) -> DependencyUpdate {
        DependencyUpdate {
            from: dependency(name, from, "https://github.com/org/runtime", "old"),
            to: dependency(name, to, "https://github.com/org/runtime", "new"),
        }
    }

    #[test]
    fn test_titles() {
        let builder = PullRequestBuilder::new(Arc::new(MemoryBarClient::new()));
        assert_eq!(
            builder.generate_pr_title(&[], "main"),
            "[main] Update dependencies to ensure coherency"
        );
        assert_eq!(
            builder.generate_pr_title(
                &[
                    contained("https://github.com/org/runtime"),
                    contained("https://dev.azure.com/org/proj/_git/arcade"),
                    contained("https://github.com/org/runtime"),
                ],
                "main"
            ),
            "[main] Update dependencies from org/proj/arcade, org/runtime"
        );
        assert_eq!(
            builder.generate_code_flow_pr_title("release/9.0", &["https://github.com/dotnet/sdk".to_string()]),
            "[release/9.0] Source code updates from dotnet/sdk"
        );
    }

    #[test]
    fn test_long_titles_count_repositories() {
        let builder = PullRequestBuilder::new(Arc::new(MemoryBarClient::new()));
        let many: Vec<SubscriptionPullRequestUpdate> = (0..12)
            .map(|i| contained(&format!("https://github.com/some-organisation/repository-{i}")))
            .collect();
        assert_eq!(
            builder.generate_pr_title(&many, "main"),
            "[main] Update dependencies from 12 repositories"
        );
    }

    #[test]
    fn test_replace_section_keeps_other_sections() {
        let mut description = String::from("header\n");
        replace_section(&mut description, "a", "<!-- Begin:a -->\none\n<!-- End:a -->\n");
        replace_section(&mut description, "b", "<!-- Begin:b -->\ntwo\n<!-- End:b -->\n");
        replace_section(&mut description, "a", "<!-- Begin:a -->\nthree\n<!-- End:a -->\n");

        assert!(description.starts_with("header\n<!-- Begin:a -->\nthree\n<!-- End:a -->"));
        assert!(description.contains("two"));
        assert!(!description.contains("one"));
    }

    #[test]
    fn test_changes_uri_forms() {
        assert_eq!(
            changes_uri("https://github.com/org/runtime", "0123456789abcdef", "fedcba9876543210"),
            "https://github.com/org/runtime/compare/0123456789...fedcba9876"
        );
        assert_eq!(
            changes_uri("https://dev.azure.com/org/p/_git/r", "a", "b"),
            "https://dev.azure.com/org/p/_git/r/branches?baseVersion=GCa&targetVersion=GCb&_a=files"
        );
    }

    #[tokio::test]
    async fn test_description_and_commits() {
        let bar = Arc::new(MemoryBarClient::new());
        bar.add_build(build(42, "https://github.com/org/runtime", "new"));
        let remote = FakeRemote::new();
        let builder = PullRequestBuilder::new(bar);
        let sub = Uuid::new_v4();

        let required = RequiredUpdates {
            coherency_check_successful: true,
            coherency_errors: vec![],
            updates: vec![(
                work_item(sub, 42),
                vec![update("A", "1.0.0", "1.1.0"), update("B", "1.0.0", "1.1.0")],
            )],
        };
        let description = builder
            .calculate_description_and_commit_updates(&remote, &required, None, APP, "depflow-main-1")
            .await
            .unwrap();

        assert!(description.starts_with(DEFAULT_DESCRIPTION_HEADER));
        assert!(description.contains(&format!("<!-- Begin:{sub} -->")));
        assert!(description.contains("  - From [1.0.0 to 1.1.0]"));
        assert!(description.contains("     - B"));

        let commits = remote.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].2.len(), 2);
        assert!(commits[0]
            .3
            .starts_with("Update dependencies from https://github.com/org/runtime build 42"));
        assert!(commits[0].3.contains("A , B From Version 1.0.0 -> To Version 1.1.0"));
    }

    #[tokio::test]
    async fn test_coherency_failure_commits_empty_note() {
        let remote = FakeRemote::new();
        let builder = PullRequestBuilder::new(Arc::new(MemoryBarClient::new()));
        let required = RequiredUpdates {
            coherency_check_successful: false,
            ..RequiredUpdates::default()
        };
        let description = builder
            .calculate_description_and_commit_updates(&remote, &required, None, APP, "b")
            .await
            .unwrap();

        assert!(description.starts_with("Coherency update: Failed to perform coherency update"));
        let commits = remote.commits();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].2.is_empty());
    }

    #[tokio::test]
    async fn test_coherency_errors_listed_next_to_applied_updates() {
        let remote = FakeRemote::new();
        let builder = PullRequestBuilder::new(Arc::new(MemoryBarClient::new()));
        let required = RequiredUpdates {
            coherency_check_successful: false,
            coherency_errors: vec![CoherencyErrorDetails {
                error: "https://github.com/org/runtime @ new does not contain dependency C".to_string(),
                potential_solutions: vec!["Pin the dependency.".to_string()],
            }],
            updates: vec![(work_item(Uuid::new_v4(), 42), vec![update("A", "1.0.0", "1.1.0")])],
        };
        let description = builder
            .calculate_description_and_commit_updates(&remote, &required, None, APP, "b")
            .await
            .unwrap();

        assert!(description.starts_with(DEFAULT_DESCRIPTION_HEADER));
        assert!(description.contains("<!-- Begin:Coherency Updates -->"));
        assert!(description.contains(COHERENCY_FAILURE_MESSAGE));
        assert!(description.contains("- https://github.com/org/runtime @ new does not contain dependency C"));
        assert!(description.contains("  - Pin the dependency."));
        assert_eq!(remote.commits().len(), 1);
    }

    #[test]
    fn test_code_flow_description_rewrites_own_section() {
        let builder = PullRequestBuilder::new(Arc::new(MemoryBarClient::new()));
        let mut sub = subscription("https://github.com/dotnet/dotnet", APP, "main", ".NET 10");
        sub.source_enabled = true;
        let first = build(10, "https://github.com/dotnet/dotnet", "aaaaaaaaaaaa1");
        let second = build(11, "https://github.com/dotnet/dotnet", "bbbbbbbbbbbb2");

        let created = builder.generate_code_flow_description(&first, &sub, None, &[], None);
        assert!(created.contains("This is a codeflow update"));
        assert!(created.contains("[the VMR]"));
        assert!(created.contains("- **Commit Diff**: Not available"));

        let updates = vec![DependencyUpdateSummary {
            dependency_name: "Microsoft.NET.Sdk".to_string(),
            from_version: "10.0.100".to_string(),
            to_version: "10.0.101".to_string(),
            from_commit_sha: "a".to_string(),
            to_commit_sha: "b".to_string(),
        }];
        let updated = builder.generate_code_flow_description(
            &second,
            &sub,
            Some("aaaaaaaaaaaa1"),
            &updates,
            Some(&created),
        );
        assert!(updated.contains("This is a codeflow update"));
        assert!(updated.contains("- **Build**: 11"));
        assert!(!updated.contains("- **Build**: 10"));
        assert!(updated.contains("[aaaaaaaaaa...bbbbbbbbbb]"));
        assert!(updated.contains("**Updated Dependencies**\n- From 10.0.100 to 10.0.101\n  - Microsoft.NET.Sdk"));
    }

    #[test]
    fn test_dependency_update_block_kinds() {
        let summary = |name: &str, from: &str, to: &str| DependencyUpdateSummary {
            dependency_name: name.to_string(),
            from_version: from.to_string(),
            to_version: to.to_string(),
            from_commit_sha: String::new(),
            to_commit_sha: String::new(),
        };
        let block = dependency_update_block(&[
            summary("New.Pkg", "", "1.0.0"),
            summary("Old.Pkg", "2.0.0", ""),
            summary("Z.Pkg", "1.0.0", "1.1.0"),
            summary("A.Pkg", "1.0.0", "1.1.0"),
        ]);
        assert!(block.contains("**New Dependencies**\n- Added 1.0.0\n  - New.Pkg\n"));
        assert!(block.contains("**Removed Dependencies**\n- Removed 2.0.0\n  - Old.Pkg\n"));
        assert!(block.contains("**Updated Dependencies**\n- From 1.0.0 to 1.1.0\n  - A.Pkg\n  - Z.Pkg\n"));
    }
}
