//! depflow - dependency flow CLI
//!
//! Offline analysis over a JSON snapshot of the build asset registry.
//!
//! ## Commands
//!
//! - `graph`: build the dependency flow graph, mark back edges, cycles and
//!   the longest build path, optionally pruned to the part feeding a channel
//! - `triggers`: list subscriptions with a build they have not applied yet

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use depflow_core::domain::{
    Build, BuildTime, DefaultChannel, DependencyFlowEvent, FlowResult, MergePolicyDefinition,
    Subscription, SubscriptionUpdateAction, UpdateFrequency,
};
use depflow_core::{
    BarClient, DependencyFlowGraph, DepflowConfig, GraphReport, SubscriptionTriggerer,
    UpdateSubscriptionWorkItem,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use uuid::Uuid;

const ALL_FREQUENCIES: &str =
    "none,everyDay,everyBuild,twiceDaily,everyWeek,everyTwoWeeks,everyMonth";

#[derive(Parser)]
#[command(name = "depflow")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency flow analysis", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the dependency flow graph of a snapshot
    Graph {
        /// Snapshot JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Keep only the part of the graph feeding this channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Update frequencies of subscriptions kept when pruning
        #[arg(long, value_delimiter = ',', default_value = ALL_FREQUENCIES)]
        frequency: Vec<String>,

        /// Keep disabled subscriptions when pruning
        #[arg(long)]
        include_disabled: bool,

        /// Build time statistics window in days (default: DEPFLOW_BUILD_TIME_DAYS)
        #[arg(long)]
        days: Option<u32>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List subscriptions that would fire at a frequency
    Triggers {
        /// Snapshot JSON file
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "everyDay")]
        frequency: String,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Registry contents the analysis reads.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    default_channels: Vec<DefaultChannel>,
    #[serde(default)]
    subscriptions: Vec<Subscription>,
    /// Build time statistics keyed by default channel id.
    #[serde(default)]
    build_times: BTreeMap<u32, BuildTime>,
    #[serde(default)]
    builds: Vec<Build>,
    /// Build ids assigned to each channel id.
    #[serde(default)]
    channel_builds: BTreeMap<u32, Vec<u32>>,
}

/// Read-only registry backed by a snapshot. Writes are rejected.
struct SnapshotBarClient {
    snapshot: Snapshot,
}

#[async_trait]
impl BarClient for SnapshotBarClient {
    async fn get_build(&self, build_id: u32) -> FlowResult<Option<Build>> {
        Ok(self.snapshot.builds.iter().find(|b| b.id == build_id).cloned())
    }

    async fn get_builds(&self, repository: &str, commit: &str) -> FlowResult<Vec<Build>> {
        Ok(self
            .snapshot
            .builds
            .iter()
            .filter(|b| b.repository.eq_ignore_ascii_case(repository) && b.commit == commit)
            .cloned()
            .collect())
    }

    async fn get_latest_build(&self, repository: &str, channel_id: u32) -> FlowResult<Option<Build>> {
        let Some(ids) = self.snapshot.channel_builds.get(&channel_id) else {
            return Ok(None);
        };
        Ok(self
            .snapshot
            .builds
            .iter()
            .filter(|b| ids.contains(&b.id) && b.repository.eq_ignore_ascii_case(repository))
            .max_by_key(|b| (b.date_produced, b.id))
            .cloned())
    }

    async fn get_subscription(&self, subscription_id: Uuid) -> FlowResult<Option<Subscription>> {
        Ok(self
            .snapshot
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn get_subscriptions(&self) -> FlowResult<Vec<Subscription>> {
        Ok(self.snapshot.subscriptions.clone())
    }

    async fn get_build_time(&self, default_channel_id: u32, _days: u32) -> FlowResult<BuildTime> {
        Ok(self
            .snapshot
            .build_times
            .get(&default_channel_id)
            .copied()
            .unwrap_or_default())
    }

    async fn get_repository_merge_policies(
        &self,
        _repository: &str,
        _branch: &str,
    ) -> FlowResult<Vec<MergePolicyDefinition>> {
        Ok(Vec::new())
    }

    async fn update_subscription_last_applied_build(
        &self,
        _subscription_id: Uuid,
        _build_id: u32,
    ) -> FlowResult<bool> {
        Ok(false)
    }

    async fn add_dependency_flow_event(&self, _event: DependencyFlowEvent) -> FlowResult<()> {
        Ok(())
    }

    async fn register_subscription_update(
        &self,
        _subscription_id: Uuid,
        _action: SubscriptionUpdateAction,
        _message: &str,
    ) -> FlowResult<()> {
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

fn parse_frequency(value: &str) -> Result<UpdateFrequency> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Unknown update frequency '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    depflow_core::telemetry::init_tracing(cli.json, level);

    let config = DepflowConfig::from_env();

    match cli.command {
        Commands::Graph {
            input,
            channel,
            frequency,
            include_disabled,
            days,
            format,
        } => {
            let options = GraphOptions {
                channel,
                frequencies: frequency,
                include_disabled,
                days: days.unwrap_or(config.build_time_days),
            };
            let report = cmd_graph(&input, &options).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print!("{}", render_graph_text(&report)),
            }
            Ok(())
        }
        Commands::Triggers {
            input,
            frequency,
            format,
        } => {
            let work = cmd_triggers(&input, &frequency).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&work)?),
                OutputFormat::Text => {
                    if work.is_empty() {
                        println!("No subscriptions to trigger");
                    }
                    for item in &work {
                        println!("{}  build {}", item.subscription_id, item.build_id);
                    }
                }
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct GraphOptions {
    channel: Option<String>,
    frequencies: Vec<String>,
    include_disabled: bool,
    days: u32,
}

async fn cmd_graph(input: &Path, options: &GraphOptions) -> Result<GraphReport> {
    let snapshot = read_snapshot(input)?;
    for frequency in &options.frequencies {
        parse_frequency(frequency)?;
    }

    let default_channels = snapshot.default_channels.clone();
    let subscriptions = snapshot.subscriptions.clone();
    let bar = SnapshotBarClient { snapshot };
    let mut graph =
        DependencyFlowGraph::build(&default_channels, &subscriptions, &bar, options.days).await?;

    if let Some(channel) = &options.channel {
        graph.prune_graph(
            |node| DependencyFlowGraph::is_interesting_node(channel, node),
            |edge| {
                DependencyFlowGraph::is_interesting_edge(
                    edge,
                    options.include_disabled,
                    &options.frequencies,
                )
            },
        );
        if graph.node_count() == 0 {
            bail!("No repository publishes to channel '{channel}'");
        }
    }

    graph.mark_back_edges();
    graph.mark_cycles();
    graph.calculate_longest_build_paths();
    graph.mark_longest_build_path();

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph analysed"
    );
    Ok(GraphReport::from(&graph))
}

async fn cmd_triggers(input: &Path, frequency: &str) -> Result<Vec<UpdateSubscriptionWorkItem>> {
    let frequency = parse_frequency(frequency)?;
    let bar = SnapshotBarClient {
        snapshot: read_snapshot(input)?,
    };
    Ok(SubscriptionTriggerer::get_subscriptions_to_trigger(&bar, frequency).await?)
}

fn render_graph_text(report: &GraphReport) -> String {
    let mut out = String::new();
    let name = |id: &str| {
        report
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| format!("{}@{}", n.repository, n.branch))
            .unwrap_or_else(|| id.to_string())
    };

    out.push_str(&format!(
        "Longest build path: {:.1} min\n\nNodes ({}):\n",
        report.longest_build_path_minutes,
        report.nodes.len()
    ));
    for node in &report.nodes {
        let marker = if node.on_longest_build_path { "*" } else { " " };
        out.push_str(&format!(
            "{marker} {}@{}  official {:.1}  best {:.1}  worst {:.1}\n",
            node.repository,
            node.branch,
            node.official_build_time,
            node.best_case_path_time,
            node.worst_case_path_time
        ));
    }

    out.push_str(&format!("\nEdges ({}):\n", report.edges.len()));
    for edge in &report.edges {
        let mut flags = Vec::new();
        if edge.on_longest_build_path {
            flags.push("longest");
        }
        if edge.back_edge {
            flags.push("back");
        }
        if edge.part_of_cycle == Some(true) {
            flags.push("cycle");
        }
        if edge.is_tooling_only {
            flags.push("tooling");
        }
        out.push_str(&format!(
            "  {} -> {}  [{}]{}\n",
            name(&edge.from),
            name(&edge.to),
            edge.channel.as_deref().unwrap_or("-"),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscription(source: &str, target: &str, channel: &str, frequency: &str, enabled: bool) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "channel": { "id": 1, "name": channel },
            "source_repository": source,
            "target_repository": target,
            "target_branch": "main",
            "enabled": enabled,
            "policy": { "batchable": false, "update_frequency": frequency },
        })
    }

    fn default_channel(id: u32, repository: &str, channel: &str) -> serde_json::Value {
        json!({
            "id": id,
            "repository": repository,
            "branch": "main",
            "channel": { "id": 1, "name": channel },
        })
    }

    fn write_snapshot(dir: &tempfile::TempDir, snapshot: serde_json::Value) -> PathBuf {
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();
        path
    }

    /// runtime -> aspnetcore -> sdk, sdk publishes to the product channel.
    fn chain() -> serde_json::Value {
        json!({
            "default_channels": [
                default_channel(1, "https://github.com/org/runtime", ".NET 10"),
                default_channel(2, "https://github.com/org/aspnetcore", ".NET 10"),
                default_channel(3, "https://github.com/org/sdk", ".NET 10 SDK"),
                default_channel(4, "https://github.com/org/docs", "Docs"),
            ],
            "subscriptions": [
                subscription("https://github.com/org/runtime", "https://github.com/org/aspnetcore", ".NET 10", "everyBuild", true),
                subscription("https://github.com/org/aspnetcore", "https://github.com/org/sdk", ".NET 10", "everyDay", true),
                subscription("https://github.com/org/runtime", "https://github.com/org/docs", ".NET 10", "everyWeek", false),
            ],
            "build_times": {
                "1": { "official_build_time": 60.0, "pr_build_time": 40.0, "goal_time_in_minutes": 50.0 },
                "2": { "official_build_time": 30.0, "pr_build_time": 20.0, "goal_time_in_minutes": 25.0 },
                "3": { "official_build_time": 10.0, "pr_build_time": 5.0, "goal_time_in_minutes": 8.0 },
            },
        })
    }

    fn options(channel: Option<&str>) -> GraphOptions {
        GraphOptions {
            channel: channel.map(str::to_string),
            frequencies: ALL_FREQUENCIES.split(',').map(str::to_string).collect(),
            include_disabled: false,
            days: 7,
        }
    }

    #[tokio::test]
    async fn test_graph_marks_longest_path_through_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(&dir, chain());

        let report = cmd_graph(&path, &options(None)).await.unwrap();
        assert_eq!(report.nodes.len(), 4);
        assert_eq!(report.edges.len(), 3);
        assert!(report.edges.iter().all(|e| !e.back_edge));

        let on_path: Vec<_> = report
            .nodes
            .iter()
            .filter(|n| n.on_longest_build_path)
            .map(|n| n.repository.as_str())
            .collect();
        assert!(on_path.contains(&"https://github.com/org/runtime"));
        assert!(on_path.contains(&"https://github.com/org/sdk"));
        assert!(report.longest_build_path_minutes > 0.0);
    }

    #[tokio::test]
    async fn test_graph_pruned_to_channel_drops_unrelated_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(&dir, chain());

        let report = cmd_graph(&path, &options(Some(".NET 10 SDK"))).await.unwrap();
        let repos: Vec<_> = report.nodes.iter().map(|n| n.repository.as_str()).collect();
        assert_eq!(repos.len(), 3);
        assert!(!repos.contains(&"https://github.com/org/docs"));

        let text = render_graph_text(&report);
        assert!(text.contains("Nodes (3)"));
    }

    #[tokio::test]
    async fn test_graph_rejects_unknown_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(&dir, chain());
        let mut opts = options(None);
        opts.frequencies = vec!["hourly".to_string()];
        assert!(cmd_graph(&path, &opts).await.is_err());
    }

    #[tokio::test]
    async fn test_graph_missing_channel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(&dir, chain());
        let err = cmd_graph(&path, &options(Some("Nobody"))).await.unwrap_err();
        assert!(err.to_string().contains("Nobody"));
    }

    #[tokio::test]
    async fn test_triggers_lists_subscription_with_new_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = chain();
        snapshot["builds"] = json!([{
            "id": 7,
            "repository": "https://github.com/org/aspnetcore",
            "branch": "main",
            "commit": "abc",
            "date_produced": "2026-01-01T00:00:00Z",
        }]);
        snapshot["channel_builds"] = json!({ "1": [7] });
        let path = write_snapshot(&dir, snapshot);

        let work = cmd_triggers(&path, "everyDay").await.unwrap();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].build_id, 7);
        assert!(cmd_triggers(&path, "everyWeek").await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_snapshot_reports_path() {
        let err = read_snapshot(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snapshot.json"));
    }
}
