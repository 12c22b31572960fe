use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use origins_types::{Dependence, Direction, RevisionId};

#[derive(Parser)]
#[command(
    name = "origins",
    about = "Origins: versioned provenance graph",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with store settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store URI, overriding the config file and environment
    #[arg(long, global = true)]
    pub uri: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile a resource with a snapshot file
    Sync(SyncArgs),
    /// Add, show, revise, or remove nodes
    Node(NodeArgs),
    /// Add, show, or remove edges
    Edge(EdgeArgs),
    /// Show the provenance history of an id
    Timeline(TimelineArgs),
    /// Show what was invalidated because of a revision
    Impact(ImpactArgs),
    /// Create collections and list their resources
    Collection(CollectionArgs),
    /// Rank components, resources, or relationship types
    Trends(TrendsArgs),
    /// Show the effective store configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct SyncArgs {
    /// Snapshot document (JSON)
    pub file: PathBuf,
    #[arg(long)]
    pub no_create: bool,
    #[arg(long)]
    pub no_add: bool,
    #[arg(long)]
    pub no_update: bool,
    #[arg(long)]
    pub no_remove: bool,
}

/// First-class attributes and properties shared by add commands.
#[derive(Args)]
pub struct AttributeArgs {
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<String>,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Property as key=value; the value is read as JSON when it parses
    #[arg(short = 'p', long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, Value)>,
}

#[derive(Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Subcommand)]
pub enum NodeAction {
    Add(AttributeArgs),
    /// Show a node by uuid, or the latest revision of an id
    Get { target: String },
    Set {
        uuid: RevisionId,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short = 'p', long = "property", value_parser = parse_property)]
        properties: Vec<(String, Value)>,
        /// Delete a property
        #[arg(long)]
        unset: Vec<String>,
        /// Create a revision even if nothing changed
        #[arg(long)]
        force: bool,
    },
    Remove {
        uuid: RevisionId,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Args)]
pub struct EdgeArgs {
    #[command(subcommand)]
    pub action: EdgeAction,
}

#[derive(Subcommand)]
pub enum EdgeAction {
    Add {
        start: RevisionId,
        end: RevisionId,
        #[command(flatten)]
        attrs: AttributeArgs,
        #[arg(long)]
        direction: Option<Direction>,
        #[arg(long)]
        dependence: Option<Dependence>,
    },
    /// Show an edge by uuid, or the latest revision of an id
    Get { target: String },
    Remove {
        uuid: RevisionId,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Args)]
pub struct TimelineArgs {
    pub id: String,
}

#[derive(Args)]
pub struct ImpactArgs {
    pub uuid: RevisionId,
}

#[derive(Args)]
pub struct CollectionArgs {
    #[command(subcommand)]
    pub action: CollectionAction,
}

#[derive(Subcommand)]
pub enum CollectionAction {
    Create(AttributeArgs),
    /// Include the latest revision of a resource
    Add { collection: String, resource: String },
    /// List the resources of a collection
    List {
        collection: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Trend {
    ConnectedComponents,
    UsedComponents,
    ConnectedResources,
    UsedResources,
    ComponentSources,
    CommonRelationships,
}

#[derive(Args)]
pub struct TrendsArgs {
    pub trend: Trend,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args)]
pub struct ConfigArgs {}

fn parse_property(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.is_empty() {
        return Err("property key must not be empty".into());
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_values_read_as_json() {
        assert_eq!(parse_property("rows=3").unwrap(), ("rows".into(), json!(3)));
        assert_eq!(parse_property("tags=[\"a\"]").unwrap(), ("tags".into(), json!(["a"])));
        assert_eq!(parse_property("name=orders").unwrap(), ("name".into(), json!("orders")));
        assert_eq!(parse_property("eq=a=b").unwrap(), ("eq".into(), json!("a=b")));
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=1").is_err());
    }

    #[test]
    fn parses_edge_add() {
        let start = RevisionId::new().to_string();
        let end = RevisionId::new().to_string();
        let cli = Cli::try_parse_from([
            "origins", "--format", "json", "edge", "add", &start, &end,
            "--id", "ab", "--direction", "bidirected", "--dependence", "mutual", "-p", "w=0.5",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Edge(EdgeArgs {
                action: EdgeAction::Add { attrs, direction, dependence, .. },
            }) => {
                assert_eq!(attrs.id.as_deref(), Some("ab"));
                assert_eq!(direction, Some(Direction::Bidirected));
                assert_eq!(dependence, Some(Dependence::Mutual));
                assert_eq!(attrs.properties, vec![("w".to_string(), json!(0.5))]);
            }
            _ => panic!("expected edge add"),
        }
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from(["origins", "sync", "snap.json", "--no-remove", "--uri", "http://db/"])
            .unwrap();
        assert_eq!(cli.uri.as_deref(), Some("http://db/"));
        match cli.command {
            Command::Sync(args) => {
                assert!(args.no_remove);
                assert!(!args.no_add);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn parses_trends() {
        let cli = Cli::try_parse_from(["origins", "trends", "used-resources", "--limit", "3"]).unwrap();
        match cli.command {
            Command::Trends(args) => {
                assert_eq!(args.trend, Trend::UsedResources);
                assert_eq!(args.limit, 3);
            }
            _ => panic!("expected trends"),
        }
        assert!(Cli::try_parse_from(["origins", "trends", "popular"]).is_err());
    }

    #[test]
    fn bad_uuid_rejected() {
        assert!(Cli::try_parse_from(["origins", "impact", "not-a-uuid"]).is_err());
    }
}
