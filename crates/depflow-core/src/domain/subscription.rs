//! Subscriptions, channels and their policies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named publication feed builds are assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: u32,
    pub name: String,
}

/// Automatic assignment of builds from a repository branch to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultChannel {
    pub id: u32,
    pub repository: String,
    pub branch: String,
    pub channel: Channel,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// How often a subscription fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateFrequency {
    None,
    EveryDay,
    EveryBuild,
    TwiceDaily,
    EveryWeek,
    EveryTwoWeeks,
    EveryMonth,
}

impl UpdateFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateFrequency::None => "none",
            UpdateFrequency::EveryDay => "everyDay",
            UpdateFrequency::EveryBuild => "everyBuild",
            UpdateFrequency::TwiceDaily => "twiceDaily",
            UpdateFrequency::EveryWeek => "everyWeek",
            UpdateFrequency::EveryTwoWeeks => "everyTwoWeeks",
            UpdateFrequency::EveryMonth => "everyMonth",
        }
    }
}

impl fmt::Display for UpdateFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named merge policy plus its free-form configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePolicyDefinition {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl MergePolicyDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// String list stored under `key`, empty when missing or mistyped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.properties
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPolicy {
    /// Batchable subscriptions share one pull request per target branch.
    pub batchable: bool,
    pub update_frequency: UpdateFrequency,
    #[serde(default)]
    pub merge_policies: Vec<MergePolicyDefinition>,
}

/// Metadata-only dependency updates, or full source code flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionType {
    Dependencies,
    DependenciesAndSources,
}

/// Rule: builds of `source_repository` on `channel` flow into
/// `target_repository@target_branch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub channel: Channel,
    pub source_repository: String,
    pub target_repository: String,
    pub target_branch: String,
    pub enabled: bool,
    /// Flow sources through the VMR instead of version metadata only.
    #[serde(default)]
    pub source_enabled: bool,
    /// VMR directory of the source repository (back flow).
    #[serde(default)]
    pub source_directory: Option<String>,
    /// VMR directory of the target repository (forward flow).
    #[serde(default)]
    pub target_directory: Option<String>,
    /// Asset name patterns never flowed by this subscription; `*` wildcards.
    #[serde(default)]
    pub excluded_assets: Vec<String>,
    pub policy: SubscriptionPolicy,
    #[serde(default)]
    pub last_applied_build_id: Option<u32>,
    /// `;`-separated logins tagged when a pull request fails its checks.
    #[serde(default)]
    pub pull_request_failure_notification_tags: Option<String>,
}

impl Subscription {
    pub fn subscription_type(&self) -> SubscriptionType {
        if self.source_enabled {
            SubscriptionType::DependenciesAndSources
        } else {
            SubscriptionType::Dependencies
        }
    }

    /// Forward flow pushes into the VMR; the target directory names where.
    pub fn is_forward_flow(&self) -> bool {
        self.target_directory
            .as_deref()
            .is_some_and(|dir| !dir.is_empty())
    }
}
