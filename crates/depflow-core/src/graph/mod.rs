//! Dependency flow graph analysis.
//!
//! Provides:
//! - [`DependencyFlowGraph`]: nodes per repository branch, edges per subscription
//! - back-edge and cycle detection, longest build path estimation and marking
//! - pruning to the part of the graph feeding a channel
//! - [`GraphReport`]: serializable view for reporting consumers

pub mod edge;
pub mod flow_graph;
pub mod node;
pub mod report;

pub use edge::{DependencyFlowEdge, EdgeId};
pub use flow_graph::DependencyFlowGraph;
pub use node::{stable_node_id, ChannelSet, DependencyFlowNode, NodeId};
pub use report::{EdgeReport, GraphReport, NodeReport};
