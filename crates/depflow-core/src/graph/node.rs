//! Graph nodes: one per repository branch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::edge::EdgeId;

/// Index of a node inside its [`super::DependencyFlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Set of channel names compared case-insensitively.
///
/// The first spelling inserted for a name is the one kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet {
    by_folded: BTreeMap<String, String>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equal name (ignoring case) was present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let folded = name.to_lowercase();
        if self.by_folded.contains_key(&folded) {
            return false;
        }
        self.by_folded.insert(folded, name);
        true
    }

    /// Case-insensitive membership.
    pub fn contains(&self, name: &str) -> bool {
        self.by_folded.contains_key(&name.to_lowercase())
    }

    /// Case-sensitive membership against the stored spellings.
    pub fn contains_exact(&self, name: &str) -> bool {
        self.by_folded.values().any(|c| c == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.by_folded.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_folded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_folded.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ChannelSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl Serialize for ChannelSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ChannelSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names.into_iter().collect())
    }
}

/// Stable identifier for a repository branch: a digest of the
/// case-folded `repo@branch` key.
pub fn stable_node_id(repository: &str, branch: &str) -> String {
    let key = format!("{repository}@{branch}").to_lowercase();
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

/// A repository branch taking part in dependency flow.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyFlowNode {
    pub id: String,
    pub repository: String,
    pub branch: String,
    /// Minutes for an official build.
    pub official_build_time: f64,
    /// Minutes for a pull request validation build.
    pub pr_build_time: f64,
    pub goal_time_in_minutes: f64,
    pub best_case_path_time: f64,
    pub worst_case_path_time: f64,
    pub on_longest_build_path: bool,
    pub input_channels: ChannelSet,
    pub output_channels: ChannelSet,
    pub(crate) incoming_edges: Vec<EdgeId>,
    pub(crate) outgoing_edges: Vec<EdgeId>,
}

impl DependencyFlowNode {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            branch: branch.into(),
            official_build_time: 0.0,
            pr_build_time: 0.0,
            goal_time_in_minutes: 0.0,
            best_case_path_time: 0.0,
            worst_case_path_time: 0.0,
            on_longest_build_path: false,
            input_channels: ChannelSet::new(),
            output_channels: ChannelSet::new(),
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
        }
    }

    pub fn incoming_edges(&self) -> &[EdgeId] {
        &self.incoming_edges
    }

    pub fn outgoing_edges(&self) -> &[EdgeId] {
        &self.outgoing_edges
    }

    /// Fold the slowest downstream path into this node's times.
    ///
    /// `downstream_best`/`downstream_worst` are the maxima over the eligible
    /// outgoing edges, `None` when no edge is eligible. Recorded times never
    /// decrease.
    pub fn record_path_time(&mut self, downstream_best: Option<f64>, downstream_worst: Option<f64>) {
        let best = self.official_build_time + downstream_best.unwrap_or(0.0);
        let worst = self.official_build_time + downstream_worst.unwrap_or(0.0);
        self.best_case_path_time = self.best_case_path_time.max(best);
        self.worst_case_path_time = self.worst_case_path_time.max(worst);
    }

    /// Leaf nodes take their own official build time as both path times.
    pub(crate) fn record_leaf_path_time(&mut self) {
        self.best_case_path_time = self.official_build_time;
        self.worst_case_path_time = self.official_build_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_set_is_case_insensitive_but_keeps_spelling() {
        let mut set = ChannelSet::new();
        assert!(set.insert(".NET 9"));
        assert!(!set.insert(".net 9"));
        assert_eq!(set.len(), 1);
        assert!(set.contains(".NET 9"));
        assert!(set.contains(".net 9"));
        assert!(set.contains_exact(".NET 9"));
        assert!(!set.contains_exact(".net 9"));
    }

    #[test]
    fn test_stable_node_id_folds_case() {
        assert_eq!(
            stable_node_id("https://github.com/dotnet/runtime", "main"),
            stable_node_id("https://github.com/Dotnet/Runtime", "MAIN")
        );
        assert_ne!(
            stable_node_id("https://github.com/dotnet/runtime", "main"),
            stable_node_id("https://github.com/dotnet/runtime", "release/9.0")
        );
    }

    #[test]
    fn test_record_path_time_never_decreases() {
        let mut node = DependencyFlowNode::new("repo", "main", "n");
        node.official_build_time = 5.0;
        node.record_path_time(Some(10.0), Some(20.0));
        assert_eq!(node.best_case_path_time, 15.0);
        assert_eq!(node.worst_case_path_time, 25.0);

        node.record_path_time(Some(1.0), None);
        assert_eq!(node.best_case_path_time, 15.0);
        assert_eq!(node.worst_case_path_time, 25.0);
    }
}
