//! Statement execution against a [`GraphState`].
//!
//! Each statement is recognised by its template text and evaluated
//! directly against the arena, producing the same result shape the
//! external store would return.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use origins_types::pack::attr;
use origins_types::Packed;

use super::graph::{GraphState, Link, Slot};
use crate::cypher::Query;
use crate::protocol::{RemoteError, Statement, StatementResult};

const RESOURCE_MODEL: &str = "origins:Resource";
const COMPONENT_MODEL: &str = "origins:Component";
const RELATIONSHIP_MODEL: &str = "origins:Relationship";
const COLLECTION_MODEL: &str = "origins:Collection";

type ExecResult = Result<StatementResult, RemoteError>;

fn missing(name: &str) -> RemoteError {
    RemoteError::new(
        "Neo.ClientError.Statement.ParameterMissing",
        format!("expected parameter: {name}"),
    )
}

fn str_param<'a>(stmt: &'a Statement, name: &str) -> Result<&'a str, RemoteError> {
    stmt.get(name).and_then(Value::as_str).ok_or_else(|| missing(name))
}

fn map_param(stmt: &Statement, name: &str) -> Result<Map<String, Value>, RemoteError> {
    match stmt.get(name) {
        Some(Value::Object(m)) => Ok(m.clone()),
        _ => Err(missing(name)),
    }
}

fn usize_param(stmt: &Statement, name: &str) -> Result<usize, RemoteError> {
    stmt.get(name)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| missing(name))
}

fn node_value(graph: &GraphState, slot: Slot) -> Value {
    Value::Object(graph.attrs(slot).clone())
}

fn invalidation_value(graph: &GraphState, slot: Slot) -> Value {
    graph
        .invalidation_of(slot)
        .map(|r| Value::Object(r.clone()))
        .unwrap_or(Value::Null)
}

fn by_time(graph: &GraphState, slots: &mut Vec<Slot>) {
    slots.sort_by_key(|&s| (graph.time(s), s));
    slots.dedup();
}

fn single(columns: &[&str], row: Option<Vec<Value>>) -> StatementResult {
    let mut result = StatementResult::new(columns);
    if let Some(row) = row {
        result.push(row);
    }
    result
}

fn listing(graph: &GraphState, column: &str, slots: Vec<Slot>) -> StatementResult {
    let mut result = StatementResult::new(&[column]);
    for slot in slots {
        result.push(vec![node_value(graph, slot)]);
    }
    result
}

fn has_model(graph: &GraphState, slot: Slot, model: &str) -> bool {
    graph.str_attr(slot, attr::MODEL) == Some(model)
}

/// Valid members linked from any revision of the `owner_model` entity `owner`.
fn members_of(graph: &GraphState, owner_model: &str, owner: &str, kind: Link, model: &str) -> Vec<Slot> {
    let mut out: Vec<Slot> = graph
        .with_id(owner, Some(owner_model))
        .flat_map(|r| graph.targets(r, kind).iter().copied())
        .filter(|&n| graph.is_valid(n) && has_model(graph, n, model))
        .collect();
    by_time(graph, &mut out);
    out
}

/// Members linked from any revision of the resource `resource`.
fn members(graph: &GraphState, resource: &str, kind: Link, model: &str) -> Vec<Slot> {
    members_of(graph, RESOURCE_MODEL, resource, kind, model)
}

fn valid_of_model<'a>(graph: &'a GraphState, model: &'a str) -> impl Iterator<Item = Slot> + 'a {
    graph
        .slots()
        .filter(move |&s| graph.is_valid(s) && has_model(graph, s, model))
}

/// Returns `true` if the resource id still has a valid revision.
fn live_resource(graph: &GraphState, id: &str) -> bool {
    graph.with_id(id, Some(RESOURCE_MODEL)).any(|s| graph.is_valid(s))
}

/// Distinct ids of the resources linking to `member` with `kind`.
fn owner_ids(graph: &GraphState, member: Slot, kind: Link) -> BTreeSet<&str> {
    graph
        .sources(member, kind)
        .iter()
        .filter(|&&r| has_model(graph, r, RESOURCE_MODEL))
        .filter_map(|&r| graph.str_attr(r, attr::ID))
        .collect()
}

/// Rows of `[entity, count]`, highest count first, ties by age. Zero
/// counts are dropped.
fn ranked(graph: &GraphState, column: &str, mut scored: Vec<(Slot, usize)>, limit: usize) -> StatementResult {
    scored.retain(|&(_, n)| n > 0);
    scored.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| (graph.time(a.0), a.0).cmp(&(graph.time(b.0), b.0)))
    });
    scored.truncate(limit);
    let mut result = StatementResult::new(&[column, "cnt"]);
    for (slot, n) in scored {
        result.push(vec![node_value(graph, slot), Value::from(n as u64)]);
    }
    result
}

fn connected_components(graph: &GraphState) -> Vec<(Slot, usize)> {
    valid_of_model(graph, COMPONENT_MODEL)
        .map(|c| {
            let relationships: BTreeSet<Slot> = graph
                .sources(c, Link::Start)
                .iter()
                .chain(graph.sources(c, Link::End))
                .copied()
                .filter(|&r| graph.is_valid(r) && has_model(graph, r, RELATIONSHIP_MODEL))
                .collect();
            (c, relationships.len())
        })
        .collect()
}

fn used_components(graph: &GraphState) -> Vec<(Slot, usize)> {
    valid_of_model(graph, COMPONENT_MODEL)
        .map(|c| {
            let managers = owner_ids(graph, c, Link::Manages);
            let users = owner_ids(graph, c, Link::Includes)
                .into_iter()
                .filter(|id| !managers.contains(id) && live_resource(graph, id))
                .count();
            (c, users)
        })
        .collect()
}

fn connected_resources(graph: &GraphState) -> Vec<(Slot, usize)> {
    valid_of_model(graph, RESOURCE_MODEL)
        .map(|r| {
            let id = graph.str_attr(r, attr::ID).unwrap_or_default();
            (r, members(graph, id, Link::Manages, RELATIONSHIP_MODEL).len())
        })
        .collect()
}

fn used_resources(graph: &GraphState) -> Vec<(Slot, usize)> {
    valid_of_model(graph, RESOURCE_MODEL)
        .map(|r| {
            let id = graph.str_attr(r, attr::ID).unwrap_or_default();
            let used = members(graph, id, Link::Manages, COMPONENT_MODEL)
                .into_iter()
                .filter(|&c| {
                    owner_ids(graph, c, Link::Includes)
                        .into_iter()
                        .any(|other| other != id && live_resource(graph, other))
                })
                .count();
            (r, used)
        })
        .collect()
}

fn component_sources(graph: &GraphState) -> Vec<(Slot, usize)> {
    let mut uses: BTreeMap<&str, usize> = BTreeMap::new();
    for record in graph.records() {
        let is_source = record.get("kind").and_then(Value::as_str) == Some("prov:Derivation")
            && record.get("type").and_then(Value::as_str) == Some("prov:PrimarySource");
        if let Some(used) = record.get("used").and_then(Value::as_str).filter(|_| is_source) {
            *uses.entry(used).or_default() += 1;
        }
    }
    valid_of_model(graph, COMPONENT_MODEL)
        .map(|c| {
            let uuid = graph.str_attr(c, attr::UUID).unwrap_or_default();
            (c, uses.get(uuid).copied().unwrap_or_default())
        })
        .collect()
}

fn common_relationships(graph: &GraphState, limit: usize) -> StatementResult {
    let mut types: BTreeMap<&str, usize> = BTreeMap::new();
    for r in valid_of_model(graph, RELATIONSHIP_MODEL) {
        if let Some(kind) = graph.str_attr(r, attr::TYPE) {
            *types.entry(kind).or_default() += 1;
        }
    }
    let mut counted: Vec<(&str, usize)> = types.into_iter().collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut result = StatementResult::new(&["type", "cnt"]);
    for (kind, n) in counted.into_iter().take(limit) {
        result.push(vec![Value::from(kind), Value::from(n as u64)]);
    }
    result
}

fn copy_links(graph: &mut GraphState, stmt: &Statement, kind: Link) -> ExecResult {
    let previous = graph.slot(str_param(stmt, "previous")?);
    let next = graph.slot(str_param(stmt, "next")?);
    let mut result = StatementResult::new(&["r"]);
    if let (Some(previous), Some(next)) = (previous, next) {
        let owners = graph.sources(previous, kind).to_vec();
        for owner in owners {
            graph.link(owner, kind, next);
            result.push(vec![node_value(graph, owner)]);
        }
    }
    Ok(result)
}

fn link(graph: &mut GraphState, stmt: &Statement, kind: Link) -> ExecResult {
    let resource = graph.slot(str_param(stmt, "resource")?);
    let member = graph.slot(str_param(stmt, "uuid")?);
    Ok(single(
        &["n"],
        match (resource, member) {
            (Some(r), Some(n)) => {
                graph.link(r, kind, n);
                Some(vec![node_value(graph, n)])
            }
            _ => None,
        },
    ))
}

/// Execute one statement, mutating `graph` for writes.
pub(crate) fn execute(graph: &mut GraphState, stmt: &Statement) -> ExecResult {
    let query = Query::from_text(&stmt.statement).ok_or_else(|| {
        RemoteError::new(
            "Neo.ClientError.Statement.SyntaxError",
            "unrecognised statement",
        )
    })?;

    match query {
        Query::CreateEntity => {
            let attrs = map_param(stmt, "attrs")?;
            let slot = graph.insert(attrs).ok_or_else(|| {
                RemoteError::new(
                    "Neo.ClientError.Schema.ConstraintValidationFailed",
                    "entity uuid missing or already exists",
                )
            })?;
            Ok(single(&["n"], Some(vec![node_value(graph, slot)])))
        }
        Query::CreateEdge => {
            let attrs = map_param(stmt, "attrs")?;
            let start = graph
                .slot(str_param(stmt, "start")?)
                .filter(|&s| graph.is_valid(s));
            let end = graph
                .slot(str_param(stmt, "end")?)
                .filter(|&s| graph.is_valid(s));
            let (Some(start), Some(end)) = (start, end) else {
                return Ok(StatementResult::new(&["n"]));
            };
            let slot = graph.insert(attrs).ok_or_else(|| {
                RemoteError::new(
                    "Neo.ClientError.Schema.ConstraintValidationFailed",
                    "edge uuid missing or already exists",
                )
            })?;
            graph.link(slot, Link::Start, start);
            graph.link(slot, Link::End, end);
            Ok(single(&["n"], Some(vec![node_value(graph, slot)])))
        }
        Query::GetEntity => {
            let slot = graph.slot(str_param(stmt, "uuid")?);
            Ok(single(
                &["n", "i"],
                slot.map(|s| vec![node_value(graph, s), invalidation_value(graph, s)]),
            ))
        }
        Query::GetLatest => {
            let id = str_param(stmt, "id")?;
            let model = str_param(stmt, "model")?;
            let mut slots: Vec<Slot> = graph
                .with_id(id, Some(model))
                .filter(|&s| graph.is_valid(s))
                .collect();
            by_time(graph, &mut slots);
            Ok(listing(graph, "n", slots))
        }
        Query::MatchEntities => {
            let model = str_param(stmt, "model")?;
            let predicate = map_param(stmt, "predicate")?;
            let skip = usize_param(stmt, "skip")?;
            let limit = usize_param(stmt, "limit")?;
            let mut slots: Vec<Slot> = graph
                .slots()
                .filter(|&s| {
                    graph.is_valid(s)
                        && graph.str_attr(s, attr::MODEL) == Some(model)
                        && predicate
                            .iter()
                            .all(|(k, v)| graph.attrs(s).get(k) == Some(v))
                })
                .collect();
            by_time(graph, &mut slots);
            let slots = slots.into_iter().skip(skip).take(limit).collect();
            Ok(listing(graph, "n", slots))
        }
        Query::Revisions => {
            let id = str_param(stmt, "id")?;
            let model = str_param(stmt, "model")?;
            let mut slots: Vec<Slot> = graph.with_id(id, Some(model)).collect();
            by_time(graph, &mut slots);
            let mut result = StatementResult::new(&["n", "i"]);
            for s in slots {
                result.push(vec![node_value(graph, s), invalidation_value(graph, s)]);
            }
            Ok(result)
        }
        Query::IncidentEdges => {
            let Some(node) = graph.slot(str_param(stmt, "uuid")?) else {
                return Ok(StatementResult::new(&["e"]));
            };
            let mut edges: Vec<Slot> = graph
                .sources(node, Link::Start)
                .iter()
                .chain(graph.sources(node, Link::End))
                .copied()
                .filter(|&e| graph.is_valid(e))
                .collect();
            by_time(graph, &mut edges);
            Ok(listing(graph, "e", edges))
        }
        Query::Record => {
            let record = map_param(stmt, "record")?;
            let Some(subject) = graph.slot(str_param(stmt, "uuid")?) else {
                return Ok(StatementResult::new(&["r"]));
            };
            graph.add_record(subject, record.clone());
            Ok(single(&["r"], Some(vec![Value::Object(record)])))
        }
        Query::RecordInvalidation => {
            let record = map_param(stmt, "record")?;
            let subject = graph.slot(str_param(stmt, "uuid")?);
            match subject {
                Some(s) if graph.invalidate(s) => {
                    graph.add_record(s, record.clone());
                    Ok(single(&["r"], Some(vec![Value::Object(record)])))
                }
                _ => Ok(StatementResult::new(&["r"])),
            }
        }
        Query::LinkManaged => link(graph, stmt, Link::Manages),
        Query::LinkIncluded => link(graph, stmt, Link::Includes),
        Query::CopyManaged => copy_links(graph, stmt, Link::Manages),
        Query::CopyIncluded => copy_links(graph, stmt, Link::Includes),
        Query::Managed => {
            let resource = str_param(stmt, "resource")?;
            let model = str_param(stmt, "model")?;
            let slots = members(graph, resource, Link::Manages, model);
            Ok(listing(graph, "n", slots))
        }
        Query::Included => {
            let resource = str_param(stmt, "resource")?;
            let model = str_param(stmt, "model")?;
            let slots = members(graph, resource, Link::Includes, model);
            Ok(listing(graph, "n", slots))
        }
        Query::ManagedById => {
            let resource = str_param(stmt, "resource")?;
            let id = str_param(stmt, "id")?;
            let model = str_param(stmt, "model")?;
            let slots = members(graph, resource, Link::Manages, model)
                .into_iter()
                .filter(|&s| graph.str_attr(s, attr::ID) == Some(id))
                .collect();
            Ok(listing(graph, "n", slots))
        }
        Query::Owner => {
            let owner = graph.slot(str_param(stmt, "uuid")?).and_then(|n| {
                graph
                    .sources(n, Link::Manages)
                    .iter()
                    .copied()
                    .max_by_key(|&r| (graph.time(r), r))
            });
            Ok(single(&["r"], owner.map(|r| vec![node_value(graph, r)])))
        }
        Query::CountManaged => {
            let resource = str_param(stmt, "resource")?;
            let model = str_param(stmt, "model")?;
            let count = members(graph, resource, Link::Manages, model).len();
            Ok(single(&["count(DISTINCT n)"], Some(vec![Value::from(count as u64)])))
        }
        Query::History => {
            let id = str_param(stmt, "id")?;
            let mut records: Vec<&Packed> = graph
                .with_id(id, None)
                .flat_map(|s| graph.records_of(s))
                .collect();
            records.sort_by_key(|r| {
                (
                    r.get("bundle_time").and_then(Value::as_i64).unwrap_or_default(),
                    r.get("bundle").and_then(Value::as_str).unwrap_or_default().to_string(),
                    r.get("seq").and_then(Value::as_u64).unwrap_or_default(),
                )
            });
            let mut result = StatementResult::new(&["r"]);
            for r in records {
                result.push(vec![Value::Object(r.clone())]);
            }
            Ok(result)
        }
        Query::Triggered => {
            let origin = str_param(stmt, "uuid")?;
            let mut seen = BTreeSet::new();
            let mut result = StatementResult::new(&["r", "d"]);
            let invalidations = graph.records().filter(|r| {
                r.get("kind").and_then(Value::as_str) == Some("prov:Invalidation")
                    && r.get("trigger").and_then(Value::as_str) == Some(origin)
            });
            for inv in invalidations {
                let entity = inv.get("entity").and_then(Value::as_str).unwrap_or_default();
                if !seen.insert(entity.to_string()) {
                    continue;
                }
                let derivation = graph
                    .records()
                    .find(|r| {
                        r.get("kind").and_then(Value::as_str) == Some("prov:Derivation")
                            && r.get("type").and_then(Value::as_str) == Some("prov:Revision")
                            && r.get("used").and_then(Value::as_str) == Some(entity)
                    })
                    .map(|d| Value::Object(d.clone()))
                    .unwrap_or(Value::Null);
                result.push(vec![Value::Object(inv.clone()), derivation]);
            }
            Ok(result)
        }
        Query::CollectionResources => {
            let collection = str_param(stmt, "collection")?;
            let predicate = map_param(stmt, "predicate")?;
            let skip = usize_param(stmt, "skip")?;
            let limit = usize_param(stmt, "limit")?;
            let slots = members_of(graph, COLLECTION_MODEL, collection, Link::Includes, RESOURCE_MODEL)
                .into_iter()
                .filter(|&s| predicate.iter().all(|(k, v)| graph.attrs(s).get(k) == Some(v)))
                .skip(skip)
                .take(limit)
                .collect();
            Ok(listing(graph, "n", slots))
        }
        Query::ConnectedComponents => {
            let limit = usize_param(stmt, "limit")?;
            Ok(ranked(graph, "c", connected_components(graph), limit))
        }
        Query::UsedComponents => {
            let limit = usize_param(stmt, "limit")?;
            Ok(ranked(graph, "c", used_components(graph), limit))
        }
        Query::ConnectedResources => {
            let limit = usize_param(stmt, "limit")?;
            Ok(ranked(graph, "res", connected_resources(graph), limit))
        }
        Query::UsedResources => {
            let limit = usize_param(stmt, "limit")?;
            Ok(ranked(graph, "res", used_resources(graph), limit))
        }
        Query::ComponentSources => {
            let limit = usize_param(stmt, "limit")?;
            Ok(ranked(graph, "c", component_sources(graph), limit))
        }
        Query::CommonRelationships => {
            let limit = usize_param(stmt, "limit")?;
            Ok(common_relationships(graph, limit))
        }
    }
}
