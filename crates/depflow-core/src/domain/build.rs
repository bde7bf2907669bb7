//! Builds, their assets, and the dependency pins they update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published package or file produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u32,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub id: u32,
    pub repository: String,
    pub branch: String,
    pub commit: String,
    pub date_produced: DateTime<Utc>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Build duration statistics for one default channel, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildTime {
    pub official_build_time: Option<f64>,
    pub pr_build_time: Option<f64>,
    pub goal_time_in_minutes: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    #[default]
    Product,
    Toolset,
}

/// One pinned dependency in a repository's version manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDetail {
    pub name: String,
    pub version: String,
    pub repo_uri: String,
    pub commit: String,
    #[serde(default)]
    pub dependency_type: DependencyType,
    /// Pinned dependencies are never moved by automation.
    #[serde(default)]
    pub pinned: bool,
    /// Name of the dependency whose repository dictates this one's version.
    #[serde(default)]
    pub coherent_parent_dependency_name: Option<String>,
}

impl DependencyDetail {
    pub fn has_coherent_parent(&self) -> bool {
        self.coherent_parent_dependency_name
            .as_deref()
            .is_some_and(|p| !p.is_empty())
    }
}

/// A single dependency moving from one pin to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyUpdate {
    pub from: DependencyDetail,
    pub to: DependencyDetail,
}

impl DependencyUpdate {
    pub fn dependency_name(&self) -> &str {
        &self.to.name
    }
}
