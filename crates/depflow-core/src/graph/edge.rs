//! Graph edges: one per subscription fed by a produced channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::NodeId;
use crate::domain::Subscription;

/// Index of an edge inside its [`super::DependencyFlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Directed flow `from → to`.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyFlowEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// `None` for synthetic edges added during analysis.
    pub subscription: Option<Subscription>,
    pub subscription_id: Option<Uuid>,
    pub back_edge: bool,
    pub on_longest_build_path: bool,
    /// Flow carries toolset dependencies only.
    pub is_tooling_only: bool,
    pub part_of_cycle: Option<bool>,
}

impl DependencyFlowEdge {
    pub fn new(from: NodeId, to: NodeId, subscription: Option<Subscription>) -> Self {
        let subscription_id = subscription.as_ref().map(|s| s.id);
        Self {
            from,
            to,
            subscription,
            subscription_id,
            back_edge: false,
            on_longest_build_path: false,
            is_tooling_only: false,
            part_of_cycle: None,
        }
    }

    /// Channel the edge's subscription listens to.
    pub fn channel_name(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.channel.name.as_str())
    }
}
