//! Serializable snapshot of an analysed graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::flow_graph::DependencyFlowGraph;
use super::node::ChannelSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub official_build_time: f64,
    pub pr_build_time: f64,
    pub goal_time_in_minutes: f64,
    pub best_case_path_time: f64,
    pub worst_case_path_time: f64,
    pub on_longest_build_path: bool,
    pub input_channels: ChannelSet,
    pub output_channels: ChannelSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeReport {
    /// Stable id of the source node.
    pub from: String,
    /// Stable id of the target node.
    pub to: String,
    pub subscription_id: Option<Uuid>,
    pub channel: Option<String>,
    pub back_edge: bool,
    pub on_longest_build_path: bool,
    pub is_tooling_only: bool,
    pub part_of_cycle: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphReport {
    pub nodes: Vec<NodeReport>,
    pub edges: Vec<EdgeReport>,
    /// Best-case time of the marked longest path's first node.
    pub longest_build_path_minutes: f64,
}

impl From<&DependencyFlowGraph> for GraphReport {
    fn from(graph: &DependencyFlowGraph) -> Self {
        let nodes: Vec<NodeReport> = graph
            .nodes()
            .map(|(_, n)| NodeReport {
                id: n.id.clone(),
                repository: n.repository.clone(),
                branch: n.branch.clone(),
                official_build_time: n.official_build_time,
                pr_build_time: n.pr_build_time,
                goal_time_in_minutes: n.goal_time_in_minutes,
                best_case_path_time: n.best_case_path_time,
                worst_case_path_time: n.worst_case_path_time,
                on_longest_build_path: n.on_longest_build_path,
                input_channels: n.input_channels.clone(),
                output_channels: n.output_channels.clone(),
            })
            .collect();

        let edges = graph
            .edges()
            .map(|(_, e)| EdgeReport {
                from: graph.node(e.from).id.clone(),
                to: graph.node(e.to).id.clone(),
                subscription_id: e.subscription_id,
                channel: e.channel_name().map(str::to_string),
                back_edge: e.back_edge,
                on_longest_build_path: e.on_longest_build_path,
                is_tooling_only: e.is_tooling_only,
                part_of_cycle: e.part_of_cycle,
            })
            .collect();

        let longest_build_path_minutes = nodes
            .iter()
            .filter(|n| n.on_longest_build_path)
            .map(|n| n.best_case_path_time)
            .fold(0.0, f64::max);

        Self {
            nodes,
            edges,
            longest_build_path_minutes,
        }
    }
}
