//! Dependency flow graph and its analyses.
//!
//! Nodes are repository branches, edges are subscriptions. An edge
//! `A → B` means builds of A flow into B, so B's official build can only
//! start after A's. Sinks (nodes without outgoing edges) are the end of the
//! product build.
//!
//! Nodes and edges live in arenas addressed by [`NodeId`]/[`EdgeId`]. The
//! `nodes`/`edges` lists hold the current members; removal only drops
//! membership and detaches adjacency lists, so ids stay valid.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::bar::BarClient;
use crate::domain::{DefaultChannel, FlowResult, Subscription};

use super::edge::{DependencyFlowEdge, EdgeId};
use super::node::{stable_node_id, ChannelSet, DependencyFlowNode, NodeId};

#[derive(Debug, Clone, Default)]
pub struct DependencyFlowGraph {
    node_store: Vec<DependencyFlowNode>,
    edge_store: Vec<DependencyFlowEdge>,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
}

impl DependencyFlowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Add a node for `repository@branch` and make it a member.
    pub fn add_node(&mut self, repository: &str, branch: &str) -> NodeId {
        let node = DependencyFlowNode::new(repository, branch, stable_node_id(repository, branch));
        self.push_node(node)
    }

    fn push_node(&mut self, node: DependencyFlowNode) -> NodeId {
        let id = NodeId(self.node_store.len());
        self.node_store.push(node);
        self.nodes.push(id);
        id
    }

    /// Add a member edge and register it on both endpoints.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, subscription: Option<Subscription>) -> EdgeId {
        let id = self.attach_edge(from, to, subscription);
        self.edges.push(id);
        id
    }

    /// Create an edge registered on both endpoints but not in `edges`.
    fn attach_edge(&mut self, from: NodeId, to: NodeId, subscription: Option<Subscription>) -> EdgeId {
        let id = EdgeId(self.edge_store.len());
        self.edge_store.push(DependencyFlowEdge::new(from, to, subscription));
        self.node_store[from.0].outgoing_edges.push(id);
        self.node_store[to.0].incoming_edges.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &DependencyFlowNode {
        &self.node_store[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DependencyFlowNode {
        &mut self.node_store[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &DependencyFlowEdge {
        &self.edge_store[id.0]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut DependencyFlowEdge {
        &mut self.edge_store[id.0]
    }

    /// Member node ids in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Member edge ids in insertion order.
    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyFlowNode)> {
        self.nodes.iter().map(|&id| (id, self.node(id)))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &DependencyFlowEdge)> {
        self.edges.iter().map(|&id| (id, self.edge(id)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Member node for `repository@branch`, compared case-insensitively.
    pub fn find_node(&self, repository: &str, branch: &str) -> Option<NodeId> {
        self.nodes.iter().copied().find(|&id| {
            let node = self.node(id);
            node.repository.eq_ignore_ascii_case(repository) && node.branch.eq_ignore_ascii_case(branch)
        })
    }

    /// `true` when no outgoing edge carries product dependencies.
    ///
    /// Leaves count as tooling-only.
    pub fn is_tooling_only(&self, id: NodeId) -> bool {
        !self
            .node(id)
            .outgoing_edges
            .iter()
            .any(|&e| !self.edge(e).is_tooling_only)
    }

    /// Remove a node and detach its edges from their other endpoints.
    ///
    /// Targets of the node's outgoing edges get their input channels
    /// recalculated. The node's edges also leave the edge list. Absent
    /// nodes are ignored.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(pos) = self.nodes.iter().position(|&n| n == id) else {
            return;
        };
        self.nodes.remove(pos);

        let incoming = self.node(id).incoming_edges.clone();
        for edge_id in &incoming {
            let from = self.edge(*edge_id).from;
            self.node_store[from.0].outgoing_edges.retain(|e| e != edge_id);
        }

        let outgoing = self.node(id).outgoing_edges.clone();
        for edge_id in &outgoing {
            let to = self.edge(*edge_id).to;
            self.node_store[to.0].incoming_edges.retain(|e| e != edge_id);
            self.recalculate_input_channels(to);
        }

        self.edges
            .retain(|e| !incoming.contains(e) && !outgoing.contains(e));
    }

    /// Remove a member edge from both endpoints and recalculate the target's
    /// input channels. Absent edges are ignored.
    pub fn remove_edge(&mut self, id: EdgeId) {
        let Some(pos) = self.edges.iter().position(|&e| e == id) else {
            return;
        };
        self.edges.remove(pos);
        self.detach_edge(id);
    }

    fn detach_edge(&mut self, id: EdgeId) {
        let (from, to) = {
            let edge = self.edge(id);
            (edge.from, edge.to)
        };
        self.node_store[from.0].outgoing_edges.retain(|&e| e != id);
        self.node_store[to.0].incoming_edges.retain(|&e| e != id);
        self.recalculate_input_channels(to);
    }

    fn recalculate_input_channels(&mut self, id: NodeId) {
        let channels: ChannelSet = self
            .node(id)
            .incoming_edges
            .iter()
            .filter_map(|&e| self.edge(e).channel_name().map(str::to_string))
            .collect();
        self.node_store[id.0].input_channels = channels;
    }

    /// Keep only nodes from which an interesting node can be reached through
    /// interesting edges, and only the interesting edges on those walks.
    pub fn prune_graph<N, E>(&mut self, is_interesting_node: N, is_interesting_edge: E)
    where
        N: Fn(&DependencyFlowNode) -> bool,
        E: Fn(&DependencyFlowEdge) -> bool,
    {
        let mut unreachable_nodes: HashSet<NodeId> = self.nodes.iter().copied().collect();
        let mut unreachable_edges: HashSet<EdgeId> = self.edges.iter().copied().collect();
        let mut stack = Vec::new();

        for &node_id in &self.nodes {
            if !is_interesting_node(self.node(node_id)) {
                continue;
            }
            stack.push(node_id);
            while let Some(current) = stack.pop() {
                if !unreachable_nodes.remove(&current) {
                    continue;
                }
                for &edge_id in &self.node(current).incoming_edges {
                    let edge = self.edge(edge_id);
                    if is_interesting_edge(edge) {
                        unreachable_edges.remove(&edge_id);
                        stack.push(edge.from);
                    }
                }
            }
        }

        let doomed_nodes: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|n| unreachable_nodes.contains(n))
            .collect();
        for node_id in doomed_nodes {
            self.remove_node(node_id);
        }

        let doomed_edges: Vec<EdgeId> = self
            .edges
            .iter()
            .copied()
            .filter(|e| unreachable_edges.contains(e))
            .collect();
        for edge_id in doomed_edges {
            self.remove_edge(edge_id);
        }
        debug!(nodes = self.node_count(), edges = self.edge_count(), "graph pruned");
    }

    // -----------------------------------------------------------------------
    // Analyses
    // -----------------------------------------------------------------------

    /// Flag edges that close a cycle.
    ///
    /// A temporary start node receives an edge from every sink, then
    /// dominators are computed over the reversed graph rooted at it. An edge
    /// whose target dominates its source is a back edge. Without any sink
    /// nothing reaches the start node and every edge ends up flagged.
    pub fn mark_back_edges(&mut self) {
        let node_mark = self.node_store.len();
        let edge_mark = self.edge_store.len();

        let start = self.push_node(DependencyFlowNode::new("start", "start", "start"));
        let sinks: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| n != start && self.node(n).outgoing_edges.is_empty())
            .collect();
        for sink in sinks {
            self.attach_edge(sink, start, None);
        }

        let all: HashSet<NodeId> = self.nodes.iter().copied().collect();
        let mut dominators: HashMap<NodeId, HashSet<NodeId>> =
            self.nodes.iter().map(|&n| (n, all.clone())).collect();

        let mut work_list = VecDeque::from([start]);
        while let Some(current) = work_list.pop_front() {
            let node = self.node(current);
            let mut new_dom: Option<HashSet<NodeId>> = None;
            for &edge_id in &node.outgoing_edges {
                let pred = self.edge(edge_id).to;
                let pred_dom = &dominators[&pred];
                new_dom = Some(match new_dom {
                    None => pred_dom.clone(),
                    Some(dom) => dom.intersection(pred_dom).copied().collect(),
                });
            }
            let mut new_dom = new_dom.unwrap_or_default();
            new_dom.insert(current);

            if dominators[&current] != new_dom {
                dominators.insert(current, new_dom);
                for &edge_id in &node.incoming_edges {
                    work_list.push_back(self.edge(edge_id).from);
                }
            }
        }

        for &edge_id in &self.edges {
            let edge = &self.edge_store[edge_id.0];
            if dominators[&edge.to].contains(&edge.from) {
                self.edge_store[edge_id.0].back_edge = true;
            }
        }

        self.nodes.retain(|&n| n != start);
        let synthetic: Vec<EdgeId> = self.node(start).incoming_edges.clone();
        for edge_id in synthetic {
            let from = self.edge(edge_id).from;
            self.node_store[from.0].outgoing_edges.retain(|&e| e != edge_id);
        }
        self.node_store.truncate(node_mark);
        self.edge_store.truncate(edge_mark);
    }

    /// Set `part_of_cycle` on every edge: `true` when both endpoints lie in
    /// the same strongly connected component.
    pub fn mark_cycles(&mut self) {
        let components = self.strongly_connected_components();
        for &edge_id in &self.edges {
            let edge = &self.edge_store[edge_id.0];
            let in_cycle = edge.from == edge.to || components[&edge.from] == components[&edge.to];
            self.edge_store[edge_id.0].part_of_cycle = Some(in_cycle);
        }
    }

    /// Kosaraju's algorithm over member nodes, iterative.
    fn strongly_connected_components(&self) -> HashMap<NodeId, usize> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for &root in &self.nodes {
            if !visited.insert(root) {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            while let Some((node, next)) = stack.pop() {
                let outgoing = &self.node(node).outgoing_edges;
                if next < outgoing.len() {
                    stack.push((node, next + 1));
                    let to = self.edge(outgoing[next]).to;
                    if visited.insert(to) {
                        stack.push((to, 0));
                    }
                } else {
                    order.push(node);
                }
            }
        }

        let mut component = HashMap::new();
        for (index, &root) in order.iter().rev().enumerate() {
            if component.contains_key(&root) {
                continue;
            }
            let mut stack = vec![root];
            component.insert(root, index);
            while let Some(node) = stack.pop() {
                for &edge_id in &self.node(node).incoming_edges {
                    let from = self.edge(edge_id).from;
                    if !component.contains_key(&from) {
                        component.insert(from, index);
                        stack.push(from);
                    }
                }
            }
        }
        component
    }

    /// Compute best/worst cumulative build times for every node reachable
    /// backwards from a sink.
    ///
    /// A node is re-evaluated each time it is dequeued; a node is not
    /// requeued along a walk that already passed through it.
    pub fn calculate_longest_build_paths(&mut self) {
        let roots: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| self.node(n).outgoing_edges.is_empty())
            .collect();

        let mut visited: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        let mut to_visit: VecDeque<NodeId> = VecDeque::new();

        for root in roots {
            to_visit.push_back(root);
            while let Some(node) = to_visit.pop_front() {
                visited.entry(node).or_default().insert(node);
                let walk = visited[&node].clone();

                for &edge_id in &self.node(node).incoming_edges {
                    let child = self.edge(edge_id).from;
                    if walk.contains(&child) || to_visit.contains(&child) {
                        continue;
                    }
                    visited
                        .entry(child)
                        .or_default()
                        .extend(walk.iter().copied());
                    to_visit.push_back(child);
                }

                self.calculate_longest_path_time(node);
            }
        }
    }

    /// Per-node path time from the node's downstream neighbours.
    ///
    /// Leaves take their official build time. Otherwise the eligible edges
    /// are the non-back outgoing edges (all outgoing edges when every one is
    /// a back edge) that are not tooling-only.
    pub fn calculate_longest_path_time(&mut self, id: NodeId) {
        let outgoing = &self.node(id).outgoing_edges;
        if outgoing.is_empty() {
            self.node_store[id.0].record_leaf_path_time();
            return;
        }

        let mut eligible: Vec<EdgeId> = outgoing
            .iter()
            .copied()
            .filter(|&e| !self.edge(e).back_edge)
            .collect();
        if eligible.is_empty() {
            eligible = outgoing.clone();
        }
        eligible.retain(|&e| !self.edge(e).is_tooling_only);

        let mut best: Option<f64> = None;
        let mut worst: Option<f64> = None;
        for edge_id in eligible {
            let target = self.node(self.edge(edge_id).to);
            let target_worst = target.worst_case_path_time + target.pr_build_time;
            best = Some(best.map_or(target.best_case_path_time, |b| b.max(target.best_case_path_time)));
            worst = Some(worst.map_or(target_worst, |w| w.max(target_worst)));
        }

        self.node_store[id.0].record_path_time(best, worst);
    }

    /// Mark the chain of slowest product flows, starting from the
    /// non-tooling-only node with the highest best-case path time.
    pub fn mark_longest_build_path(&mut self) {
        let mut start: Option<NodeId> = None;
        for &id in &self.nodes {
            if self.is_tooling_only(id) {
                continue;
            }
            let better = match start {
                None => true,
                Some(s) => self.node(id).best_case_path_time > self.node(s).best_case_path_time,
            };
            if better {
                start = Some(id);
            }
        }

        let Some(mut current) = start else {
            return;
        };
        self.node_store[current.0].on_longest_build_path = true;

        loop {
            let mut chosen: Option<EdgeId> = None;
            for &edge_id in &self.node(current).outgoing_edges {
                let edge = self.edge(edge_id);
                if edge.on_longest_build_path || edge.back_edge || edge.is_tooling_only {
                    continue;
                }
                chosen = match chosen {
                    Some(prev)
                        if self.node(self.edge(prev).to).best_case_path_time
                            > self.node(edge.to).best_case_path_time =>
                    {
                        Some(prev)
                    }
                    _ => Some(edge_id),
                };
            }

            let Some(edge_id) = chosen else {
                break;
            };
            let to = self.edge(edge_id).to;
            self.edge_store[edge_id.0].on_longest_build_path = true;
            self.node_store[to.0].on_longest_build_path = true;
            current = to;
        }
    }

    // -----------------------------------------------------------------------
    // Pruning predicates
    // -----------------------------------------------------------------------

    /// The node publishes to `target_channel` (exact, case-sensitive).
    pub fn is_interesting_node(target_channel: &str, node: &DependencyFlowNode) -> bool {
        node.output_channels.contains_exact(target_channel)
    }

    /// The edge's subscription is enabled (or disabled ones are included)
    /// and fires at one of `included_frequencies`, compared ignoring case.
    /// Synthetic edges are never interesting.
    pub fn is_interesting_edge<S: AsRef<str>>(
        edge: &DependencyFlowEdge,
        include_disabled_subscriptions: bool,
        included_frequencies: &[S],
    ) -> bool {
        let Some(subscription) = &edge.subscription else {
            return false;
        };
        if !include_disabled_subscriptions && !subscription.enabled {
            return false;
        }
        let frequency = subscription.policy.update_frequency.as_str();
        included_frequencies
            .iter()
            .any(|f| f.as_ref().eq_ignore_ascii_case(frequency))
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Build the graph from default channels and subscriptions.
    ///
    /// Nodes are keyed by case-insensitive `repo@branch`. Default channels
    /// contribute output channels and build times (statistics over the last
    /// `days` days). A subscription always adds its channel to the target's
    /// input channels, and gets an edge from every default channel of its
    /// source repository publishing exactly that channel name.
    pub async fn build(
        default_channels: &[DefaultChannel],
        subscriptions: &[Subscription],
        bar_client: &dyn BarClient,
        days: u32,
    ) -> FlowResult<Self> {
        let mut graph = DependencyFlowGraph::new();
        let mut by_key: HashMap<String, NodeId> = HashMap::new();

        for channel in default_channels {
            let node_id = graph.get_or_create_node(&channel.repository, &channel.branch, &mut by_key);
            if channel.id != 0 {
                let build_time = bar_client.get_build_time(channel.id, days).await?;
                let node = graph.node_mut(node_id);
                node.official_build_time = build_time.official_build_time.unwrap_or(0.0);
                node.pr_build_time = build_time.pr_build_time.unwrap_or(0.0);
                node.goal_time_in_minutes = build_time.goal_time_in_minutes.unwrap_or(0.0);
            } else {
                let node = graph.node_mut(node_id);
                node.official_build_time = 0.0;
                node.pr_build_time = 0.0;
            }
            graph
                .node_mut(node_id)
                .output_channels
                .insert(channel.channel.name.clone());
        }

        for subscription in subscriptions {
            let target = graph.get_or_create_node(
                &subscription.target_repository,
                &subscription.target_branch,
                &mut by_key,
            );
            graph
                .node_mut(target)
                .input_channels
                .insert(subscription.channel.name.clone());

            let feeding = default_channels.iter().filter(|d| {
                d.channel.name == subscription.channel.name
                    && d.repository.eq_ignore_ascii_case(&subscription.source_repository)
            });
            for default_channel in feeding {
                let source = graph.get_or_create_node(
                    &default_channel.repository,
                    &default_channel.branch,
                    &mut by_key,
                );
                graph.add_edge(source, target, Some(subscription.clone()));
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "dependency flow graph built"
        );
        Ok(graph)
    }

    fn get_or_create_node(
        &mut self,
        repository: &str,
        branch: &str,
        by_key: &mut HashMap<String, NodeId>,
    ) -> NodeId {
        let key = format!("{repository}@{branch}").to_lowercase();
        if let Some(&id) = by_key.get(&key) {
            return id;
        }
        let id = self.add_node(repository, branch);
        by_key.insert(key, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildTime, Channel};
    use crate::fakes::{subscription, MemoryBarClient};

    fn node_with_times(graph: &mut DependencyFlowGraph, name: &str, official: f64, pr: f64) -> NodeId {
        let id = graph.add_node(&format!("https://git.example/{name}"), "main");
        let node = graph.node_mut(id);
        node.official_build_time = official;
        node.pr_build_time = pr;
        id
    }

    fn chain(graph: &mut DependencyFlowGraph, ids: &[NodeId]) -> Vec<EdgeId> {
        ids.windows(2)
            .map(|pair| graph.add_edge(pair[0], pair[1], None))
            .collect()
    }

    fn flow(graph: &mut DependencyFlowGraph, from: NodeId, to: NodeId, channel: &str) -> EdgeId {
        let sub = subscription("https://git.example/src", "https://git.example/dst", "main", channel);
        let edge = graph.add_edge(from, to, Some(sub));
        graph.node_mut(to).input_channels.insert(channel);
        edge
    }

    // ---- structural edits ----

    #[test]
    fn test_remove_node_absent_is_noop() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("repoA", "main");
        graph.remove_node(a);
        graph.remove_node(a);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_remove_node_detaches_edges_and_recalculates_targets() {
        let mut graph = DependencyFlowGraph::new();
        let src = graph.add_node("src", "main");
        let victim = graph.add_node("victim", "main");
        let other = graph.add_node("other", "main");
        let target = graph.add_node("target", "main");
        flow(&mut graph, src, victim, "in");
        flow(&mut graph, victim, target, "from-victim");
        flow(&mut graph, other, target, "from-other");

        graph.remove_node(victim);

        assert_eq!(graph.node_count(), 3);
        assert!(graph.node(src).outgoing_edges().is_empty());
        assert_eq!(graph.node(target).incoming_edges().len(), 1);
        let channels: Vec<&str> = graph.node(target).input_channels.iter().collect();
        assert_eq!(channels, vec!["from-other"]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_remove_edge_recalculates_input_channels() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("a", "main");
        let b = graph.add_node("b", "main");
        let c = graph.add_node("c", "main");
        let ab = flow(&mut graph, a, b, "channel-a");
        flow(&mut graph, c, b, "channel-c");
        graph.node_mut(b).input_channels.insert("stale-channel");

        graph.remove_edge(ab);

        assert!(graph.node(a).outgoing_edges().is_empty());
        let channels: Vec<&str> = graph.node(b).input_channels.iter().collect();
        assert_eq!(channels, vec!["channel-c"]);

        // Second removal leaves everything untouched.
        graph.node_mut(b).input_channels.insert("manual");
        graph.remove_edge(ab);
        assert!(graph.node(b).input_channels.contains("manual"));
        assert_eq!(graph.edge_count(), 1);
    }

    // ---- back edges and cycles ----

    #[test]
    fn test_mark_back_edges_dag_marks_nothing() {
        let mut graph = DependencyFlowGraph::new();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"].iter().map(|n| graph.add_node(n, "main")).collect();
        chain(&mut graph, &ids);
        graph.add_edge(ids[0], ids[2], None);

        graph.mark_back_edges();

        assert!(graph.edges().all(|(_, e)| !e.back_edge));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.node(ids[3]).outgoing_edges().is_empty());
    }

    #[test]
    fn test_mark_back_edges_pure_cycle_marks_every_edge() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("a", "main");
        let b = graph.add_node("b", "main");
        let c = graph.add_node("c", "main");
        chain(&mut graph, &[a, b, c, a]);

        graph.mark_back_edges();

        assert_eq!(graph.edge_count(), 3);
        assert!(graph.edges().all(|(_, e)| e.back_edge));
    }

    #[test]
    fn test_mark_back_edges_flags_only_cycle_closing_edge() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("a", "main");
        let b = graph.add_node("b", "main");
        let c = graph.add_node("c", "main");
        let ab = graph.add_edge(a, b, None);
        let ba = graph.add_edge(b, a, None);
        let bc = graph.add_edge(b, c, None);

        graph.mark_back_edges();

        assert!(!graph.edge(ab).back_edge);
        assert!(graph.edge(ba).back_edge);
        assert!(!graph.edge(bc).back_edge);
        assert_eq!(graph.node_count(), 3);
        assert!(graph.node(c).outgoing_edges().is_empty());
    }

    #[test]
    fn test_mark_cycles_flags_strongly_connected_edges() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("a", "main");
        let b = graph.add_node("b", "main");
        let c = graph.add_node("c", "main");
        let ab = graph.add_edge(a, b, None);
        let ba = graph.add_edge(b, a, None);
        let bc = graph.add_edge(b, c, None);
        let cc = graph.add_edge(c, c, None);

        graph.mark_cycles();

        assert_eq!(graph.edge(ab).part_of_cycle, Some(true));
        assert_eq!(graph.edge(ba).part_of_cycle, Some(true));
        assert_eq!(graph.edge(bc).part_of_cycle, Some(false));
        assert_eq!(graph.edge(cc).part_of_cycle, Some(true));
    }

    // ---- build path times ----

    #[test]
    fn test_longest_build_paths_on_chain() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 5.0, 10.0);
        let b = node_with_times(&mut graph, "b", 4.0, 2.0);
        let c = node_with_times(&mut graph, "c", 3.0, 1.0);
        chain(&mut graph, &[a, b, c]);

        graph.calculate_longest_build_paths();

        let times = |id| {
            let n = graph.node(id);
            (n.best_case_path_time, n.worst_case_path_time)
        };
        assert_eq!(times(c), (3.0, 3.0));
        assert_eq!(times(b), (7.0, 8.0));
        assert_eq!(times(a), (12.0, 15.0));
    }

    #[test]
    fn test_longest_path_time_skips_tooling_only_edges() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 5.0, 0.0);
        let b = node_with_times(&mut graph, "b", 10.0, 1.0);
        let c = node_with_times(&mut graph, "c", 20.0, 2.0);
        graph.add_edge(a, b, None);
        let ac = graph.add_edge(a, c, None);
        graph.edge_mut(ac).is_tooling_only = true;

        graph.calculate_longest_build_paths();

        assert_eq!(graph.node(a).best_case_path_time, 15.0);
        assert_eq!(graph.node(a).worst_case_path_time, 16.0);
    }

    #[test]
    fn test_longest_path_time_all_tooling_uses_own_time() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 5.0, 0.0);
        let b = node_with_times(&mut graph, "b", 10.0, 1.0);
        let ab = graph.add_edge(a, b, None);
        graph.edge_mut(ab).is_tooling_only = true;

        graph.calculate_longest_build_paths();

        assert_eq!(graph.node(a).best_case_path_time, 5.0);
        assert_eq!(graph.node(a).worst_case_path_time, 5.0);
        assert!(graph.is_tooling_only(a));
    }

    #[test]
    fn test_longest_path_time_falls_back_to_back_edges() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 2.0, 0.0);
        let b = node_with_times(&mut graph, "b", 7.0, 3.0);
        let ab = graph.add_edge(a, b, None);
        graph.edge_mut(ab).back_edge = true;

        graph.calculate_longest_build_paths();

        assert_eq!(graph.node(a).best_case_path_time, 9.0);
        assert_eq!(graph.node(a).worst_case_path_time, 12.0);
    }

    #[test]
    fn test_longest_path_time_leaf_equals_official_time() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 42.0, 9.0);
        graph.calculate_longest_path_time(a);
        assert_eq!(graph.node(a).best_case_path_time, 42.0);
        assert_eq!(graph.node(a).worst_case_path_time, 42.0);
    }

    #[test]
    fn test_pure_cycle_has_no_roots_and_keeps_zero_times() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 2.0, 1.0);
        let b = node_with_times(&mut graph, "b", 3.0, 1.0);
        chain(&mut graph, &[a, b, a]);

        graph.calculate_longest_build_paths();

        assert_eq!(graph.node(a).best_case_path_time, 0.0);
        assert_eq!(graph.node(b).best_case_path_time, 0.0);
    }

    // ---- longest path marking ----

    #[test]
    fn test_mark_longest_build_path_follows_slowest_chain() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 5.0, 10.0);
        let b = node_with_times(&mut graph, "b", 4.0, 2.0);
        let c = node_with_times(&mut graph, "c", 3.0, 1.0);
        let d = node_with_times(&mut graph, "d", 1.0, 1.0);
        let edges = chain(&mut graph, &[a, b, c]);
        let ad = graph.add_edge(a, d, None);

        graph.calculate_longest_build_paths();
        graph.mark_longest_build_path();

        for id in [a, b, c] {
            assert!(graph.node(id).on_longest_build_path);
        }
        assert!(!graph.node(d).on_longest_build_path);
        assert!(edges.iter().all(|&e| graph.edge(e).on_longest_build_path));
        assert!(!graph.edge(ad).on_longest_build_path);
    }

    #[test]
    fn test_mark_longest_build_path_prefers_later_edge_on_tie() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 1.0, 0.0);
        let b = node_with_times(&mut graph, "b", 4.0, 0.0);
        let c = node_with_times(&mut graph, "c", 4.0, 0.0);
        let ab = graph.add_edge(a, b, None);
        let ac = graph.add_edge(a, c, None);

        graph.calculate_longest_build_paths();
        graph.mark_longest_build_path();

        assert!(!graph.edge(ab).on_longest_build_path);
        assert!(graph.edge(ac).on_longest_build_path);
        assert!(graph.node(c).on_longest_build_path);
    }

    #[test]
    fn test_mark_longest_build_path_without_start_marks_nothing() {
        let mut graph = DependencyFlowGraph::new();
        let a = node_with_times(&mut graph, "a", 1.0, 0.0);
        let b = node_with_times(&mut graph, "b", 2.0, 0.0);
        graph.mark_longest_build_path();
        assert!(!graph.node(a).on_longest_build_path);
        assert!(!graph.node(b).on_longest_build_path);

        let mut empty = DependencyFlowGraph::new();
        empty.mark_longest_build_path();
        assert_eq!(empty.node_count(), 0);
    }

    // ---- pruning ----

    #[test]
    fn test_is_interesting_node_is_case_sensitive() {
        let mut node = DependencyFlowNode::new("repo", "main", "n");
        node.output_channels.insert(".NET 9");
        assert!(DependencyFlowGraph::is_interesting_node(".NET 9", &node));
        assert!(!DependencyFlowGraph::is_interesting_node(".net 9", &node));
    }

    #[test]
    fn test_is_interesting_edge_checks_enabled_and_frequency() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.add_node("a", "main");
        let b = graph.add_node("b", "main");
        let e = flow(&mut graph, a, b, "ch");

        let frequencies = ["EVERYDAY", "everyWeek"];
        assert!(DependencyFlowGraph::is_interesting_edge(graph.edge(e), false, &frequencies));
        assert!(!DependencyFlowGraph::is_interesting_edge(graph.edge(e), false, &["everyBuild"]));

        graph.edge_mut(e).subscription.as_mut().unwrap().enabled = false;
        assert!(!DependencyFlowGraph::is_interesting_edge(graph.edge(e), false, &frequencies));
        assert!(DependencyFlowGraph::is_interesting_edge(graph.edge(e), true, &frequencies));

        let synthetic = graph.add_edge(a, b, None);
        assert!(!DependencyFlowGraph::is_interesting_edge(graph.edge(synthetic), true, &frequencies));
    }

    #[test]
    fn test_prune_graph_keeps_nodes_feeding_interesting_nodes() {
        let mut graph = DependencyFlowGraph::new();
        let product = graph.add_node("product", "main");
        graph.node_mut(product).output_channels.insert(".NET 9");
        let runtime = graph.add_node("runtime", "main");
        let tooling = graph.add_node("tooling", "main");
        graph.add_node("stray", "main");

        let kept = flow(&mut graph, runtime, product, "runtime-ch");
        let disabled = flow(&mut graph, tooling, runtime, "tooling-ch");
        graph.edge_mut(disabled).subscription.as_mut().unwrap().enabled = false;

        graph.prune_graph(
            |n| DependencyFlowGraph::is_interesting_node(".NET 9", n),
            |e| DependencyFlowGraph::is_interesting_edge(e, false, &["everyDay"]),
        );

        let remaining: Vec<&str> = graph.nodes().map(|(_, n)| n.repository.as_str()).collect();
        assert_eq!(remaining, vec!["product", "runtime"]);
        assert_eq!(graph.edge_ids(), &[kept]);
        assert!(graph.node(runtime).input_channels.is_empty());
        assert!(graph.find_node("stray", "main").is_none());
        assert!(graph.find_node("PRODUCT", "Main").is_some());
        assert!(graph.find_node("tooling", "main").is_none());
    }

    // ---- construction ----

    #[tokio::test]
    async fn test_build_keys_nodes_case_insensitively_and_links_fed_subscriptions() {
        let bar = MemoryBarClient::new();
        bar.set_build_time(
            1,
            BuildTime {
                official_build_time: Some(30.0),
                pr_build_time: Some(12.0),
                goal_time_in_minutes: None,
            },
        );
        let default_channels = vec![
            DefaultChannel {
                id: 1,
                repository: "https://git.example/runtime".to_string(),
                branch: "main".to_string(),
                channel: Channel { id: 10, name: ".NET 9".to_string() },
                enabled: true,
            },
            DefaultChannel {
                id: 0,
                repository: "https://git.example/Runtime".to_string(),
                branch: "MAIN".to_string(),
                channel: Channel { id: 11, name: ".NET 9 Internal".to_string() },
                enabled: true,
            },
        ];
        let subscriptions = vec![
            subscription("https://git.example/RUNTIME", "https://git.example/sdk", "main", ".NET 9"),
            subscription("https://git.example/runtime", "https://git.example/sdk", "main", ".net 9"),
        ];

        let graph = DependencyFlowGraph::build(&default_channels, &subscriptions, &bar, 7)
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let runtime = graph.find_node("https://git.example/runtime", "main").unwrap();
        let node = graph.node(runtime);
        assert_eq!(node.official_build_time, 0.0);
        assert_eq!(node.pr_build_time, 0.0);
        assert_eq!(node.output_channels.len(), 2);

        let sdk = graph.find_node("https://git.example/sdk", "main").unwrap();
        assert_eq!(graph.node(sdk).input_channels.len(), 1);
        assert_eq!(graph.node(sdk).incoming_edges().len(), 1);
    }

    #[tokio::test]
    async fn test_build_records_build_times_defaulting_missing_to_zero() {
        let bar = MemoryBarClient::new();
        bar.set_build_time(
            7,
            BuildTime {
                official_build_time: Some(45.5),
                pr_build_time: None,
                goal_time_in_minutes: Some(60.0),
            },
        );
        let default_channels = vec![DefaultChannel {
            id: 7,
            repository: "https://git.example/aspnetcore".to_string(),
            branch: "main".to_string(),
            channel: Channel { id: 3, name: ".NET 10".to_string() },
            enabled: true,
        }];

        let graph = DependencyFlowGraph::build(&default_channels, &[], &bar, 14)
            .await
            .unwrap();

        let (_, node) = graph.nodes().next().unwrap();
        assert_eq!(node.official_build_time, 45.5);
        assert_eq!(node.pr_build_time, 0.0);
        assert_eq!(node.goal_time_in_minutes, 60.0);
        assert_eq!(bar.build_time_requests(), vec![(7, 14)]);
    }
}
