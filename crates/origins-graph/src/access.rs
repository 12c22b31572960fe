//! Revision reads and writes shared by every entity kind.

use tracing::debug;

use origins_store::{cypher, Transaction};
use origins_types::{Edge, Model, Node, RevisionId, Versioned};

use crate::error::{GraphError, GraphResult};
use crate::rows;

/// Any stored revision shaped like a node, valid or not.
pub(crate) fn fetch_node(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Option<Node>> {
    let result = tx.execute(cypher::get_entity(uuid))?;
    let node = match result.rows().next() {
        Some(row) => rows::node(row)?,
        None => None,
    };
    Ok(node)
}

/// Any stored revision shaped like an edge, valid or not.
pub(crate) fn fetch_edge(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Option<Edge>> {
    let result = tx.execute(cypher::get_entity(uuid))?;
    let edge = match result.rows().next() {
        Some(row) => rows::edge(row)?,
        None => None,
    };
    Ok(edge)
}

/// Fail unless `revision` is the latest of its id.
pub(crate) fn ensure_valid<V: Versioned>(revision: &V) -> GraphResult<()> {
    if revision.is_valid() {
        Ok(())
    } else {
        Err(GraphError::InvalidState(format!(
            "revision {} of {} is not the latest",
            revision.uuid(),
            revision.id()
        )))
    }
}

/// The latest node revision of `id`, if any.
pub(crate) fn latest_node(tx: &mut Transaction, id: &str, model: Model) -> GraphResult<Option<Node>> {
    let result = tx.execute(cypher::get_latest(id, model))?;
    Ok(rows::nodes(&result)?.pop())
}

/// The latest edge revision of `id`, if any.
pub(crate) fn latest_edge(tx: &mut Transaction, id: &str, model: Model) -> GraphResult<Option<Edge>> {
    let result = tx.execute(cypher::get_latest(id, model))?;
    Ok(rows::edges(&result)?.pop())
}

pub(crate) fn persist_node(tx: &mut Transaction, node: &Node) -> GraphResult<()> {
    tx.execute(cypher::create_entity(node.pack()?))?;
    debug!(uuid = %node.uuid().short_id(), id = node.id(), model = %node.entity.model, "stored node");
    Ok(())
}

/// Store an edge revision. Both endpoints must be valid at this point.
pub(crate) fn persist_edge(tx: &mut Transaction, edge: &Edge) -> GraphResult<()> {
    let result = tx.execute(cypher::create_edge(edge.pack()?, edge.start, edge.end))?;
    if result.is_empty() {
        return Err(GraphError::Validation(format!(
            "edge {} needs valid endpoints {} and {}",
            edge.id(),
            edge.start,
            edge.end
        )));
    }
    debug!(
        uuid = %edge.uuid().short_id(),
        id = edge.id(),
        start = %edge.start.short_id(),
        end = %edge.end.short_id(),
        "stored edge"
    );
    Ok(())
}

/// Carry resource membership from `previous` to `next`. Deferred; it
/// rides along with the next request.
pub(crate) fn carry_links(tx: &mut Transaction, previous: RevisionId, next: RevisionId) {
    tx.defer(cypher::copy_managed(previous, next));
    tx.defer(cypher::copy_included(previous, next));
}
