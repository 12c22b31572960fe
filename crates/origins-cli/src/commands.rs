use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use origins_prov::{Impact, Timeline};
use origins_sdk::Origins;
use origins_store::StoreConfig;
use origins_sync::{Counts, Snapshot, SyncOptions, SyncReport};
use origins_types::{Attributes, Changes, Edge, Entity, Node, Reason, RevisionId};

use origins_graph::{NewEdge, Predicate, Ranked, SetOptions, TypeCount};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Config(_) => cmd_config(&config, format),
        Command::Sync(args) => cmd_sync(&mut connect(config)?, args, format),
        Command::Node(args) => cmd_node(&mut connect(config)?, args, format),
        Command::Edge(args) => cmd_edge(&mut connect(config)?, args, format),
        Command::Timeline(args) => cmd_timeline(&mut connect(config)?, args, format),
        Command::Impact(args) => cmd_impact(&mut connect(config)?, args, format),
        Command::Collection(args) => cmd_collection(&mut connect(config)?, args, format),
        Command::Trends(args) => cmd_trends(&mut connect(config)?, args, format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(uri) = &cli.uri {
        config.uri = uri.clone();
        config.validate()?;
    }
    Ok(config)
}

fn connect(config: StoreConfig) -> anyhow::Result<Origins> {
    Origins::connect(config).context("connecting to the graph store")
}

/// Print `value` as JSON, or run `text` for the colored rendering.
fn output<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn attributes(args: AttributeArgs) -> Attributes {
    Attributes {
        id: args.id,
        kind: args.kind,
        label: args.label,
        description: args.description,
        properties: args.properties.into_iter().collect(),
    }
}

fn reason(raw: Option<String>) -> Reason {
    raw.as_deref().map(Reason::from).unwrap_or(Reason::RemovedByUser)
}

// ---- sync ----

fn cmd_sync(origins: &mut Origins, args: SyncArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let snapshot = Snapshot::from_json(&text)?;
    let options = SyncOptions {
        create: !args.no_create,
        add: !args.no_add,
        update: !args.no_update,
        remove: !args.no_remove,
    };
    let report = origins.sync(&snapshot, options)?;
    output(format, &report, print_report)
}

fn print_report(report: &SyncReport) {
    let verb = if report.created { "Created" } else { "Synced" };
    println!(
        "{} {} resource {}",
        "✓".green().bold(),
        verb,
        report.resource.entity.id.bold()
    );
    print_counts("Components", &report.components);
    print_counts("Relationships", &report.relationships);
    for diff in &report.diffs {
        println!(
            "  {} {} {} → {}",
            "~".yellow(),
            diff.id.bold(),
            diff.previous.short_id().dimmed(),
            diff.uuid.short_id().yellow()
        );
        for change in &diff.diff.changes {
            println!("      {}", change.key());
        }
    }
}

fn print_counts(label: &str, counts: &Counts) {
    println!(
        "  {label}: {} added, {} updated, {} removed",
        counts.added.to_string().green(),
        counts.updated.to_string().yellow(),
        counts.removed.to_string().red()
    );
}

// ---- nodes and edges ----

fn print_entity(entity: &Entity) {
    let state = if entity.is_valid() {
        "valid".green()
    } else {
        "invalidated".red()
    };
    println!(
        "{}  {}  {} ({})",
        entity.uuid.short_id().yellow().bold(),
        entity.id.bold(),
        entity.model.to_string().cyan(),
        state
    );
    if let Some(kind) = &entity.kind {
        println!("  Type: {kind}");
    }
    if let Some(label) = &entity.label {
        println!("  Label: {label}");
    }
    if let Some(description) = &entity.description {
        println!("  Description: {description}");
    }
    println!("  Time: {}", entity.time.to_string().dimmed());
    for (key, value) in &entity.properties {
        println!("  {} = {value}", key.bold());
    }
    if let Some(inv) = &entity.invalidation {
        println!("  Invalidated: {} at {}", inv.reason, inv.time);
    }
}

fn print_node(node: &Node) {
    print_entity(&node.entity);
}

fn print_edge(edge: &Edge) {
    print_entity(&edge.entity);
    println!(
        "  {} → {}  [{}, {}]",
        edge.start.short_id().yellow(),
        edge.end.short_id().yellow(),
        edge.direction,
        edge.dependence
    );
}

fn cmd_node(origins: &mut Origins, args: NodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        NodeAction::Add(attrs) => {
            let node = origins.add_node(attributes(attrs))?;
            output(format, &node, print_node)
        }
        NodeAction::Get { target } => {
            let node = match target.parse::<RevisionId>() {
                Ok(uuid) => origins.node(uuid)?,
                Err(_) => origins.node_by_id(&target)?,
            };
            let node = node.with_context(|| format!("no node {target:?}"))?;
            output(format, &node, print_node)
        }
        NodeAction::Set {
            uuid,
            kind,
            label,
            description,
            properties,
            unset,
            force,
        } => {
            let mut changes = Changes {
                kind,
                label,
                description,
                properties: properties.into_iter().collect(),
                ..Changes::new()
            };
            for key in unset {
                changes = changes.without_property(key);
            }
            let options = SetOptions { force };
            match origins.set_node(uuid, &changes, options)? {
                Some(node) => output(format, &node, print_node),
                None => output(format, &serde_json::Value::Null, |_| {
                    println!("{} Nothing changed.", "·".dimmed())
                }),
            }
        }
        NodeAction::Remove { uuid, reason: raw } => {
            let node = origins.remove_node(uuid, reason(raw))?;
            output(format, &node, print_node)
        }
    }
}

fn cmd_edge(origins: &mut Origins, args: EdgeArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        EdgeAction::Add {
            start,
            end,
            attrs,
            direction,
            dependence,
        } => {
            let mut new = NewEdge::new(start, end).with_attributes(attributes(attrs));
            if let Some(direction) = direction {
                new = new.with_direction(direction);
            }
            if let Some(dependence) = dependence {
                new = new.with_dependence(dependence);
            }
            let edge = origins.add_edge(new)?;
            output(format, &edge, print_edge)
        }
        EdgeAction::Get { target } => {
            let edge = match target.parse::<RevisionId>() {
                Ok(uuid) => origins.edge(uuid)?,
                Err(_) => origins.edge_by_id(&target)?,
            };
            let edge = edge.with_context(|| format!("no edge {target:?}"))?;
            output(format, &edge, print_edge)
        }
        EdgeAction::Remove { uuid, reason: raw } => {
            let edge = origins.remove_edge(uuid, reason(raw))?;
            output(format, &edge, print_edge)
        }
    }
}

// ---- provenance ----

fn cmd_timeline(origins: &mut Origins, args: TimelineArgs, format: OutputFormat) -> anyhow::Result<()> {
    let timeline = origins.timeline(&args.id)?;
    output(format, &timeline, print_timeline)
}

fn print_timeline(timeline: &Timeline) {
    if timeline.is_empty() {
        println!("No history for {}.", timeline.id.bold());
        return;
    }
    println!("History of {}", timeline.id.bold());
    let mut last = None;
    for entry in &timeline.entries {
        if last != Some(entry.bundle) {
            println!(
                "{}  {}  {}",
                entry.bundle.short_id().yellow(),
                entry.operation.to_string().cyan().bold(),
                entry.time.to_string().dimmed()
            );
            last = Some(entry.bundle);
        }
        println!("  {}", entry.record);
    }
}

fn cmd_impact(origins: &mut Origins, args: ImpactArgs, format: OutputFormat) -> anyhow::Result<()> {
    let impact = origins.impact(args.uuid)?;
    output(format, &impact, print_impact)
}

fn print_impact(impact: &Impact) {
    if impact.is_empty() {
        println!("Nothing else changed because of {}.", impact.origin.short_id().yellow());
        return;
    }
    println!("Impact of {}", impact.origin.short_id().yellow().bold());
    for entry in &impact.affected {
        match entry.replacement {
            Some(next) => println!(
                "  {} {} → {} ({})",
                "~".yellow(),
                entry.entity.short_id(),
                next.short_id().yellow(),
                entry.reason
            ),
            None => println!("  {} {} ({})", "✗".red(), entry.entity.short_id(), entry.reason),
        }
    }
}

// ---- collections and trends ----

fn cmd_collection(origins: &mut Origins, args: CollectionArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        CollectionAction::Create(attrs) => {
            let collection = origins.create_collection(attributes(attrs))?;
            output(format, &collection, print_node)
        }
        CollectionAction::Add { collection, resource } => {
            origins.add_to_collection(&collection, &resource)?;
            println!("{} {} to {}", "Added".green().bold(), resource.bold(), collection.bold());
            Ok(())
        }
        CollectionAction::List { collection, limit } => {
            let predicate = Predicate { limit, ..Predicate::default() };
            let resources = origins.collection_resources(&collection, &predicate)?;
            output(format, &resources, |resources| {
                if resources.is_empty() {
                    println!("{} has no resources.", collection.bold());
                }
                for resource in resources {
                    print_node(resource);
                }
            })
        }
    }
}

fn cmd_trends(origins: &mut Origins, args: TrendsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let limit = args.limit;
    let ranked = match args.trend {
        Trend::ConnectedComponents => origins.connected_components(limit)?,
        Trend::UsedComponents => origins.used_components(limit)?,
        Trend::ConnectedResources => origins.connected_resources(limit)?,
        Trend::UsedResources => origins.used_resources(limit)?,
        Trend::ComponentSources => origins.component_sources(limit)?,
        Trend::CommonRelationships => {
            let types = origins.common_relationships(limit)?;
            return output(format, &types, |t| print_types(t));
        }
    };
    output(format, &ranked, |r| print_ranked(r))
}

fn print_ranked(ranked: &[Ranked<Node>]) {
    if ranked.is_empty() {
        println!("Nothing to rank.");
    }
    for entry in ranked {
        let label = entry.item.entity.label.as_deref().unwrap_or_default();
        println!(
            "{:>6}  {}  {}",
            entry.count.to_string().yellow().bold(),
            entry.item.entity.id.bold(),
            label.dimmed()
        );
    }
}

fn print_types(types: &[TypeCount]) {
    if types.is_empty() {
        println!("No typed relationships.");
    }
    for entry in types {
        println!("{:>6}  {}", entry.count.to_string().yellow().bold(), entry.kind.bold());
    }
}

// ---- config ----

fn cmd_config(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    output(format, config, |c| {
        println!("{} = {}", "uri".bold(), c.uri);
        println!("{} = {}", "max_batch_size".bold(), c.max_batch_size);
        println!("{} = {}", "timeout_secs".bold(), c.timeout_secs);
    })
}
