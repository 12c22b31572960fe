//! Decoding of store rows into revisions and provenance records.

use serde_json::Value;

use origins_prov::{BundleId, Operation, Record, TimelineEntry};
use origins_store::StatementResult;
use origins_types::{Edge, Invalidation, Model, Node, Packed, Timestamp};

use crate::error::{GraphError, GraphResult};

fn object(value: &Value) -> GraphResult<&Packed> {
    value.as_object().ok_or_else(|| {
        GraphError::Store(origins_store::StoreError::UnexpectedResponse(format!(
            "expected a map, found {value}"
        )))
    })
}

fn field<'a>(map: &'a Packed, key: &str) -> GraphResult<&'a Value> {
    map.get(key).ok_or_else(|| {
        GraphError::Store(origins_store::StoreError::UnexpectedResponse(format!(
            "record is missing `{key}`"
        )))
    })
}

/// Decode a stored provenance record. Bundle bookkeeping fields are
/// ignored.
pub(crate) fn record(value: &Value) -> GraphResult<Record> {
    object(value)?;
    serde_json::from_value(value.clone())
        .map_err(|e| GraphError::Store(origins_store::StoreError::from(e)))
}

/// Decode a stored record together with its bundle placement.
pub(crate) fn timeline_entry(value: &Value) -> GraphResult<TimelineEntry> {
    let map = object(value)?;
    let bundle: BundleId = serde_json::from_value(field(map, "bundle")?.clone())
        .map_err(origins_store::StoreError::from)?;
    let operation: Operation = serde_json::from_value(field(map, "operation")?.clone())
        .map_err(origins_store::StoreError::from)?;
    let time = field(map, "bundle_time")?.as_i64().unwrap_or_default();
    let seq = field(map, "seq")?.as_u64().unwrap_or_default() as usize;
    Ok(TimelineEntry {
        bundle,
        operation,
        time: Timestamp::from_millis(time),
        seq,
        record: record(value)?,
    })
}

fn invalidation(value: Option<&Value>) -> GraphResult<Option<Invalidation>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match record(v)? {
            Record::Invalidation {
                reason,
                time,
                trigger,
                ..
            } => Ok(Some(Invalidation {
                reason,
                time,
                trigger,
            })),
            other => Err(GraphError::Store(
                origins_store::StoreError::UnexpectedResponse(format!(
                    "expected an invalidation, found {}",
                    other.kind()
                )),
            )),
        },
    }
}

fn model_of(map: &Packed) -> Option<Model> {
    map.get(origins_types::pack::attr::MODEL)
        .and_then(Value::as_str)
        .and_then(|m| m.parse().ok())
}

/// Decode a `[n]` or `[n, i]` row as a node. Edge-shaped rows yield
/// `None`.
pub(crate) fn node(row: &[Value]) -> GraphResult<Option<Node>> {
    let Some(first) = row.first() else {
        return Ok(None);
    };
    let map = object(first)?;
    if model_of(map).map_or(true, Model::is_edge) {
        return Ok(None);
    }
    let mut node = Node::unpack(map)?;
    node.entity.invalidation = invalidation(row.get(1))?;
    Ok(Some(node))
}

/// Decode a `[n]` or `[n, i]` row as an edge. Node-shaped rows yield
/// `None`.
pub(crate) fn edge(row: &[Value]) -> GraphResult<Option<Edge>> {
    let Some(first) = row.first() else {
        return Ok(None);
    };
    let map = object(first)?;
    if !model_of(map).is_some_and(Model::is_edge) {
        return Ok(None);
    }
    let mut edge = Edge::unpack(map)?;
    edge.entity.invalidation = invalidation(row.get(1))?;
    Ok(Some(edge))
}

pub(crate) fn nodes(result: &StatementResult) -> GraphResult<Vec<Node>> {
    let mut out = Vec::with_capacity(result.len());
    for row in result.rows() {
        out.extend(node(row)?);
    }
    Ok(out)
}

pub(crate) fn edges(result: &StatementResult) -> GraphResult<Vec<Edge>> {
    let mut out = Vec::with_capacity(result.len());
    for row in result.rows() {
        out.extend(edge(row)?);
    }
    Ok(out)
}
