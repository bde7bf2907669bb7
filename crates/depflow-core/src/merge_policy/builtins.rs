//! Builtin merge policies.
//!
//! | Definition name          | Checks                                              |
//! |--------------------------|-----------------------------------------------------|
//! | `AllChecksSuccessful`    | every status check passed (`ignoreChecks` skipped)  |
//! | `NoRequestedChanges`     | no review requests changes                          |
//! | `DontAutomergeDowngrades`| no dependency moves to a lower version              |
//! | `ValidateCoherency`      | the coherency pass succeeded                        |
//! | `Standard`               | checks, reviews and downgrades together             |

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{MergePolicy, MergePolicyBuilder, MergePolicyEvaluationResult};
use crate::domain::{InProgressPullRequest, MergePolicyDefinition};
use crate::remote::{CheckState, Remote, ReviewState};

pub const ALL_CHECKS_SUCCESSFUL: &str = "AllChecksSuccessful";
pub const NO_REQUESTED_CHANGES: &str = "NoRequestedChanges";
pub const DONT_AUTOMERGE_DOWNGRADES: &str = "DontAutomergeDowngrades";
pub const VALIDATE_COHERENCY: &str = "ValidateCoherency";
pub const STANDARD: &str = "Standard";

/// Checks ignored by the `Standard` policy.
const STANDARD_IGNORED_CHECKS: &[&str] = &["WIP", "license/cla"];

/// Builders for every builtin policy, keyed by definition name.
pub fn default_builders() -> HashMap<String, Arc<dyn MergePolicyBuilder>> {
    let builders: Vec<Arc<dyn MergePolicyBuilder>> = vec![
        Arc::new(AllChecksSuccessfulBuilder),
        Arc::new(NoRequestedChangesBuilder),
        Arc::new(DontAutomergeDowngradesBuilder),
        Arc::new(ValidateCoherencyBuilder),
        Arc::new(StandardBuilder),
    ];
    builders
        .into_iter()
        .map(|b| (b.name().to_string(), b))
        .collect()
}

// ---------------------------------------------------------------------------
// AllChecksSuccessful
// ---------------------------------------------------------------------------

pub struct AllChecksSuccessfulPolicy {
    ignore_checks: Vec<String>,
}

impl AllChecksSuccessfulPolicy {
    pub fn new(ignore_checks: Vec<String>) -> Self {
        Self { ignore_checks }
    }
}

#[async_trait]
impl MergePolicy for AllChecksSuccessfulPolicy {
    fn name(&self) -> &str {
        ALL_CHECKS_SUCCESSFUL
    }

    fn display_name(&self) -> &str {
        "All Checks Successful"
    }

    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        remote: &dyn Remote,
    ) -> MergePolicyEvaluationResult {
        let checks = match remote.get_pull_request_checks(&pr.url).await {
            Ok(checks) => checks,
            Err(e) => return self.fail_transiently("Failed to read checks", &e.to_string()),
        };

        // Our own merge policy checks never gate themselves.
        let relevant: Vec<_> = checks
            .iter()
            .filter(|c| !c.is_merge_policy)
            .filter(|c| !self.ignore_checks.iter().any(|i| i.eq_ignore_ascii_case(&c.name)))
            .collect();

        if relevant.is_empty() {
            return self.fail_transiently("No un-ignored checks.", "");
        }

        let failing: Vec<&str> = relevant
            .iter()
            .filter(|c| matches!(c.status, CheckState::Error | CheckState::Failure))
            .map(|c| c.name.as_str())
            .collect();
        if !failing.is_empty() {
            return self.fail_transiently(
                "Unsuccessful checks",
                &format!("Failing checks: {}", failing.join(", ")),
            );
        }

        if relevant
            .iter()
            .any(|c| matches!(c.status, CheckState::Pending | CheckState::None))
        {
            return self.pending("Waiting for checks.");
        }

        self.succeed("All checks successful.")
    }
}

struct AllChecksSuccessfulBuilder;

impl MergePolicyBuilder for AllChecksSuccessfulBuilder {
    fn name(&self) -> &str {
        ALL_CHECKS_SUCCESSFUL
    }

    fn build(&self, definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>> {
        vec![Box::new(AllChecksSuccessfulPolicy::new(
            definition.string_list("ignoreChecks"),
        ))]
    }
}

// ---------------------------------------------------------------------------
// NoRequestedChanges
// ---------------------------------------------------------------------------

pub struct NoRequestedChangesPolicy;

#[async_trait]
impl MergePolicy for NoRequestedChangesPolicy {
    fn name(&self) -> &str {
        NO_REQUESTED_CHANGES
    }

    fn display_name(&self) -> &str {
        "No Requested Changes"
    }

    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        remote: &dyn Remote,
    ) -> MergePolicyEvaluationResult {
        let reviews = match remote.get_pull_request_reviews(&pr.url).await {
            Ok(reviews) => reviews,
            Err(e) => return self.fail_transiently("Failed to read reviews", &e.to_string()),
        };

        let blocking: Vec<&str> = reviews
            .iter()
            .filter(|r| matches!(r.state, ReviewState::ChangesRequested | ReviewState::Rejected))
            .map(|r| r.url.as_str())
            .collect();
        if blocking.is_empty() {
            self.succeed("No changes requested")
        } else {
            self.fail_transiently("Changes requested", &blocking.join("\n"))
        }
    }
}

struct NoRequestedChangesBuilder;

impl MergePolicyBuilder for NoRequestedChangesBuilder {
    fn name(&self) -> &str {
        NO_REQUESTED_CHANGES
    }

    fn build(&self, _definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>> {
        vec![Box::new(NoRequestedChangesPolicy)]
    }
}

// ---------------------------------------------------------------------------
// DontAutomergeDowngrades
// ---------------------------------------------------------------------------

pub struct DontAutomergeDowngradesPolicy;

#[async_trait]
impl MergePolicy for DontAutomergeDowngradesPolicy {
    fn name(&self) -> &str {
        DONT_AUTOMERGE_DOWNGRADES
    }

    fn display_name(&self) -> &str {
        "Do not automerge downgrades"
    }

    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        _remote: &dyn Remote,
    ) -> MergePolicyEvaluationResult {
        let downgrades: Vec<String> = pr
            .required_updates
            .iter()
            .filter(|u| version_is_downgrade(&u.from_version, &u.to_version))
            .map(|u| {
                format!(
                    "- {} from {} to {}",
                    u.dependency_name, u.from_version, u.to_version
                )
            })
            .collect();

        if downgrades.is_empty() {
            self.succeed("No version downgrade detected")
        } else {
            self.fail_decisively(
                "Version downgrade detected",
                &format!(
                    "Some dependency updates are downgrades or invalid versions:\n{}",
                    downgrades.join("\n")
                ),
            )
        }
    }
}

struct DontAutomergeDowngradesBuilder;

impl MergePolicyBuilder for DontAutomergeDowngradesBuilder {
    fn name(&self) -> &str {
        DONT_AUTOMERGE_DOWNGRADES
    }

    fn build(&self, _definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>> {
        vec![Box::new(DontAutomergeDowngradesPolicy)]
    }
}

/// `true` when `to` sorts below `from`, or when either is not a version.
pub fn version_is_downgrade(from: &str, to: &str) -> bool {
    match (Version::parse(from), Version::parse(to)) {
        (Some(from), Some(to)) => to.cmp(&from) == Ordering::Less,
        _ => true,
    }
}

/// `major.minor.patch[.revision][-prerelease][+metadata]`
#[derive(Debug)]
struct Version<'a> {
    numbers: Vec<u64>,
    prerelease: Vec<&'a str>,
}

impl<'a> Version<'a> {
    fn parse(raw: &'a str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.split_once('+').map_or(raw, |(v, _)| v);
        let (core, prerelease) = match raw.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, pre.split('.').collect()),
            Some(_) => return None,
            None => (raw, Vec::new()),
        };
        let numbers = core
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if numbers.is_empty() || numbers.len() > 4 {
            return None;
        }
        Some(Self { numbers, prerelease })
    }
}

impl Ord for Version<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.numbers.len().max(other.numbers.len());
        let component = |v: &Version, i: usize| v.numbers.get(i).copied().unwrap_or(0);
        for i in 0..width {
            match component(self, i).cmp(&component(other, i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.prerelease.iter().zip(&other.prerelease) {
                    let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(a), Ok(b)) => a.cmp(&b),
                        (Ok(_), Err(_)) => Ordering::Less,
                        (Err(_), Ok(_)) => Ordering::Greater,
                        (Err(_), Err(_)) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                self.prerelease.len().cmp(&other.prerelease.len())
            }
        }
    }
}

impl PartialEq for Version<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version<'_> {}

impl PartialOrd for Version<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// ValidateCoherency
// ---------------------------------------------------------------------------

pub struct ValidateCoherencyPolicy;

#[async_trait]
impl MergePolicy for ValidateCoherencyPolicy {
    fn name(&self) -> &str {
        VALIDATE_COHERENCY
    }

    fn display_name(&self) -> &str {
        "Validate coherency"
    }

    async fn evaluate(
        &self,
        pr: &InProgressPullRequest,
        _remote: &dyn Remote,
    ) -> MergePolicyEvaluationResult {
        if pr.coherency_check_successful != Some(false) {
            return self.succeed("Coherency check passed");
        }

        let mut message = String::from("Coherency update failed for the following dependencies:\n");
        for error in &pr.coherency_errors {
            message.push_str(&format!("- {}\n", error.error));
            for solution in &error.potential_solutions {
                message.push_str(&format!("  - {solution}\n"));
            }
        }
        self.fail_decisively("Coherency check failed", message.trim_end())
    }
}

struct ValidateCoherencyBuilder;

impl MergePolicyBuilder for ValidateCoherencyBuilder {
    fn name(&self) -> &str {
        VALIDATE_COHERENCY
    }

    fn build(&self, _definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>> {
        vec![Box::new(ValidateCoherencyPolicy)]
    }
}

// ---------------------------------------------------------------------------
// Standard
// ---------------------------------------------------------------------------

struct StandardBuilder;

impl MergePolicyBuilder for StandardBuilder {
    fn name(&self) -> &str {
        STANDARD
    }

    fn build(&self, _definition: &MergePolicyDefinition) -> Vec<Box<dyn MergePolicy>> {
        vec![
            Box::new(AllChecksSuccessfulPolicy::new(
                STANDARD_IGNORED_CHECKS.iter().map(|c| c.to_string()).collect(),
            )),
            Box::new(NoRequestedChangesPolicy),
            Box::new(DontAutomergeDowngradesPolicy),
        ]
    }
}
