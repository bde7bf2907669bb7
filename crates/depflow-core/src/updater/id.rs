//! Identity of a pull request updater.
//!
//! Batched subscriptions share one updater per target branch; every other
//! subscription gets its own. The string form keys all persisted state,
//! reminders and the updater lock.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::domain::{FlowError, Subscription};

const BATCHED_PREFIX: &str = "batched:";
const NON_BATCHED_PREFIX: &str = "non-batched:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PullRequestUpdaterId {
    Batched { repository: String, branch: String },
    NonBatched { subscription_id: Uuid },
}

impl PullRequestUpdaterId {
    pub fn for_subscription(subscription: &Subscription) -> Self {
        if subscription.policy.batchable {
            PullRequestUpdaterId::Batched {
                repository: subscription.target_repository.clone(),
                branch: subscription.target_branch.clone(),
            }
        } else {
            PullRequestUpdaterId::NonBatched {
                subscription_id: subscription.id,
            }
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, PullRequestUpdaterId::Batched { .. })
    }
}

impl fmt::Display for PullRequestUpdaterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestUpdaterId::Batched { repository, branch } => {
                write!(f, "{BATCHED_PREFIX}{repository}:{branch}")
            }
            PullRequestUpdaterId::NonBatched { subscription_id } => {
                write!(f, "{NON_BATCHED_PREFIX}{subscription_id}")
            }
        }
    }
}

impl FromStr for PullRequestUpdaterId {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlowError::InvalidUpdaterId(s.to_string());

        if let Some(rest) = s.strip_prefix(NON_BATCHED_PREFIX) {
            let subscription_id = Uuid::parse_str(rest).map_err(|_| invalid())?;
            return Ok(PullRequestUpdaterId::NonBatched { subscription_id });
        }

        // Repository urls contain colons, branch names cannot.
        let rest = s.strip_prefix(BATCHED_PREFIX).ok_or_else(invalid)?;
        let (repository, branch) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if repository.is_empty() || branch.is_empty() {
            return Err(invalid());
        }
        Ok(PullRequestUpdaterId::Batched {
            repository: repository.to_string(),
            branch: branch.to_string(),
        })
    }
}
