//! Edge operations.
//!
//! Edges are revisions with two endpoints. Their endpoints must be valid
//! nodes when the revision is stored; after that, node revisions carry
//! edges forward according to direction (see [`crate::cascade`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use origins_prov::recorder;
use origins_store::Transaction;
use origins_types::{
    Attributes, Changes, Dependence, Direction, Edge, Model, Reason, RevisionId, Versioned,
};

use crate::access;
use crate::emit::emit;
use crate::error::{GraphError, GraphResult};
use crate::nodes;
use crate::options::{Predicate, SetOptions};
use crate::rows;

/// Input for a new edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEdge {
    #[serde(flatten)]
    pub attrs: Attributes,
    pub start: RevisionId,
    pub end: RevisionId,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub dependence: Dependence,
}

impl NewEdge {
    pub fn new(start: RevisionId, end: RevisionId) -> Self {
        Self {
            attrs: Attributes::new(),
            start,
            end,
            direction: Direction::default(),
            dependence: Dependence::default(),
        }
    }

    pub fn with_attributes(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.attrs = self.attrs.with_id(id);
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.attrs = self.attrs.with_type(kind);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs = self.attrs.with_property(key, value);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_dependence(mut self, dependence: Dependence) -> Self {
        self.dependence = dependence;
        self
    }
}

fn current(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Edge> {
    let edge = access::fetch_edge(tx, uuid)?
        .ok_or_else(|| GraphError::NotFound(format!("edge {uuid}")))?;
    access::ensure_valid(&edge)?;
    Ok(edge)
}

fn ensure_endpoint(tx: &mut Transaction, uuid: RevisionId, side: &str) -> GraphResult<()> {
    match access::fetch_node(tx, uuid)? {
        Some(node) if node.is_valid() => Ok(()),
        Some(_) => Err(GraphError::Validation(format!(
            "{side} node {uuid} is not the latest revision"
        ))),
        None => Err(GraphError::Validation(format!("{side} node {uuid} does not exist"))),
    }
}

/// Store a brand-new edge of `model` and record its generation.
pub(crate) fn create(tx: &mut Transaction, model: Model, new: NewEdge) -> GraphResult<Edge> {
    nodes::validate_id(new.attrs.id.as_deref())?;
    ensure_endpoint(tx, new.start, "start")?;
    ensure_endpoint(tx, new.end, "end")?;
    let edge = Edge::new(model, new.attrs, new.start, new.end, new.direction, new.dependence);
    access::persist_edge(tx, &edge)?;
    emit(tx, &recorder::added(&edge.entity))?;
    Ok(edge)
}

pub(crate) fn ensure_unused(tx: &mut Transaction, id: Option<&str>, model: Model) -> GraphResult<()> {
    let Some(id) = id else {
        return Ok(());
    };
    if access::latest_edge(tx, id, model)?.is_some() {
        return Err(GraphError::Validation(format!("{model} {id:?} already exists")));
    }
    Ok(())
}

/// Add an edge between two valid nodes.
pub fn add(tx: &mut Transaction, new: NewEdge) -> GraphResult<Edge> {
    tx.scope(|tx| {
        ensure_unused(tx, new.attrs.id.as_deref(), Model::Edge)?;
        create(tx, Model::Edge, new)
    })
}

/// Any revision by uuid, including invalidated ones.
pub fn get(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Option<Edge>> {
    tx.scope(|tx| access::fetch_edge(tx, uuid))
}

/// The latest revision of an edge id.
pub fn get_by_id(tx: &mut Transaction, id: &str) -> GraphResult<Option<Edge>> {
    tx.scope(|tx| access::latest_edge(tx, id, Model::Edge))
}

pub(crate) fn matching_model(
    tx: &mut Transaction,
    model: Model,
    predicate: &Predicate,
) -> GraphResult<Vec<Edge>> {
    let stmt = origins_store::cypher::match_entities(
        model,
        predicate.packed()?,
        predicate.skip,
        predicate.limit.unwrap_or(usize::MAX),
    );
    let result = tx.execute(stmt)?;
    rows::edges(&result)
}

/// Latest edge revisions matching `predicate`.
pub fn matching(tx: &mut Transaction, predicate: &Predicate) -> GraphResult<Vec<Edge>> {
    tx.scope(|tx| matching_model(tx, Model::Edge, predicate))
}

pub(crate) fn revisions_of(tx: &mut Transaction, id: &str, model: Model) -> GraphResult<Vec<Edge>> {
    let result = tx.execute(origins_store::cypher::revisions(id, model))?;
    rows::edges(&result)
}

/// Every revision of an edge id, oldest first.
pub fn revisions(tx: &mut Transaction, id: &str) -> GraphResult<Vec<Edge>> {
    tx.scope(|tx| revisions_of(tx, id, Model::Edge))
}

/// Supersede an edge revision with `changes` applied. Endpoints are kept.
pub fn set(
    tx: &mut Transaction,
    uuid: RevisionId,
    changes: &Changes,
    options: SetOptions,
) -> GraphResult<Option<Edge>> {
    tx.scope(|tx| {
        let previous = current(tx, uuid)?;
        let next = previous.revise(changes);
        if !options.force && next.same_content(&previous) {
            debug!(uuid = %uuid.short_id(), "set is a no-op");
            return Ok(None);
        }
        access::persist_edge(tx, &next)?;
        access::carry_links(tx, previous.uuid(), next.uuid());
        emit(
            tx,
            &recorder::revised(&previous.entity, &next.entity, Reason::AttributeChange, None),
        )?;
        debug!(
            id = next.id(),
            previous = %previous.uuid().short_id(),
            next = %next.uuid().short_id(),
            "revised edge"
        );
        Ok(Some(next))
    })
}

/// Invalidate an edge revision. Edges never cascade.
pub fn remove(tx: &mut Transaction, uuid: RevisionId, reason: Reason) -> GraphResult<Edge> {
    tx.scope(|tx| {
        let edge = current(tx, uuid)?;
        emit(tx, &recorder::removed(&edge.entity, reason, None))?;
        debug!(uuid = %uuid.short_id(), id = edge.id(), "removed edge");
        access::fetch_edge(tx, uuid)?
            .ok_or_else(|| GraphError::NotFound(format!("edge {uuid}")))
    })
}
