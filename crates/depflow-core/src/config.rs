//! Runtime configuration for the orchestration core.

use std::time::Duration;

/// Default reminder delay for release deployments.
pub const DEFAULT_REMINDER_DELAY: Duration = Duration::from_secs(5 * 60);

/// Shorter reminder delay used for local development.
pub const DEVELOPMENT_REMINDER_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepflowConfig {
    /// Delay before re-checking a pull request right after acting on it.
    pub reminder_delay: Duration,
    /// Prefix of pull request head branches, `{prefix}-{target}-{uuid}`.
    pub branch_prefix: String,
    /// Window of build time statistics used for graph estimates.
    pub build_time_days: u32,
    /// How long a trigger waits for the updater lock.
    pub lock_timeout: Duration,
}

impl Default for DepflowConfig {
    fn default() -> Self {
        Self {
            reminder_delay: DEFAULT_REMINDER_DELAY,
            branch_prefix: "depflow".to_string(),
            build_time_days: 7,
            lock_timeout: Duration::from_secs(60),
        }
    }
}

impl DepflowConfig {
    /// Read `DEPFLOW_*` variables, keeping defaults for missing or
    /// unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            reminder_delay: secs("DEPFLOW_REMINDER_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reminder_delay),
            branch_prefix: lookup("DEPFLOW_BRANCH_PREFIX")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.branch_prefix),
            build_time_days: lookup("DEPFLOW_BUILD_TIME_DAYS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.build_time_days),
            lock_timeout: secs("DEPFLOW_LOCK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.lock_timeout),
        }
    }

    pub fn with_reminder_delay(mut self, delay: Duration) -> Self {
        self.reminder_delay = delay;
        self
    }

    pub fn with_branch_prefix(mut self, prefix: &str) -> Self {
        self.branch_prefix = prefix.to_string();
        self
    }
}
