//! Resources and their members.
//!
//! A resource is a node that *manages* a private sub-graph of components
//! and relationships, and may *include* entities it does not own. Both
//! kinds of membership are store-level links from a resource revision to
//! a member revision. Member revisions carry their links forward, and
//! membership is looked up across every revision of the resource id.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info};

use origins_store::{cypher, StoreError, Transaction};
use origins_types::{Attributes, Edge, Model, Node, Reason, RevisionId, Versioned};

use crate::access;
use crate::cascade;
use crate::error::{GraphError, GraphResult};
use crate::nodes;
use crate::rows;

/// The latest revision of a resource, or `NotFound`.
pub(crate) fn require(tx: &mut Transaction, id: &str) -> GraphResult<Node> {
    access::latest_node(tx, id, Model::Resource)?
        .ok_or_else(|| GraphError::NotFound(format!("resource {id:?}")))
}

/// Create a resource. Its id must not be in use by another resource.
pub fn create(tx: &mut Transaction, attrs: Attributes) -> GraphResult<Node> {
    tx.scope(|tx| {
        nodes::ensure_unused(tx, attrs.id.as_deref(), Model::Resource)?;
        let resource = nodes::create(tx, Model::Resource, attrs)?;
        info!(id = resource.id(), uuid = %resource.uuid().short_id(), "created resource");
        Ok(resource)
    })
}

/// The latest revision of a resource id.
pub fn get_by_id(tx: &mut Transaction, id: &str) -> GraphResult<Option<Node>> {
    tx.scope(|tx| access::latest_node(tx, id, Model::Resource))
}

/// Fetch the resource named by `attrs.id`, creating it if missing.
/// Returns the resource and whether it was created.
pub fn get_or_create(tx: &mut Transaction, attrs: Attributes) -> GraphResult<(Node, bool)> {
    let id = attrs
        .id
        .clone()
        .ok_or_else(|| GraphError::Validation("resource id is required".into()))?;
    tx.scope(|tx| match access::latest_node(tx, &id, Model::Resource)? {
        Some(resource) => Ok((resource, false)),
        None => create(tx, attrs).map(|r| (r, true)),
    })
}

fn dedup_by_uuid<V: Versioned>(items: Vec<V>) -> Vec<V> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|v| seen.insert(v.uuid())).collect()
}

pub(crate) fn managed_nodes(tx: &mut Transaction, resource: &str, model: Model) -> GraphResult<Vec<Node>> {
    let result = tx.execute(cypher::managed(resource, model))?;
    rows::nodes(&result)
}

pub(crate) fn managed_edges(tx: &mut Transaction, resource: &str, model: Model) -> GraphResult<Vec<Edge>> {
    let result = tx.execute(cypher::managed(resource, model))?;
    rows::edges(&result)
}

/// Latest components of a resource. With `managed_only` false, included
/// components and plain nodes are listed as well.
pub fn components(tx: &mut Transaction, resource: &str, managed_only: bool) -> GraphResult<Vec<Node>> {
    tx.scope(|tx| {
        require(tx, resource)?;
        let mut out = managed_nodes(tx, resource, Model::Component)?;
        if !managed_only {
            for model in [Model::Component, Model::Node] {
                let result = tx.execute(cypher::included(resource, model))?;
                out.extend(rows::nodes(&result)?);
            }
        }
        Ok(dedup_by_uuid(out))
    })
}

/// Latest relationships of a resource. With `managed_only` false, included
/// relationships and plain edges are listed as well.
pub fn relationships(tx: &mut Transaction, resource: &str, managed_only: bool) -> GraphResult<Vec<Edge>> {
    tx.scope(|tx| {
        require(tx, resource)?;
        let mut out = managed_edges(tx, resource, Model::Relationship)?;
        if !managed_only {
            for model in [Model::Relationship, Model::Edge] {
                let result = tx.execute(cypher::included(resource, model))?;
                out.extend(rows::edges(&result)?);
            }
        }
        Ok(dedup_by_uuid(out))
    })
}

/// Reference an entity the resource does not own.
pub fn include(tx: &mut Transaction, resource: &str, uuid: RevisionId) -> GraphResult<()> {
    tx.scope(|tx| {
        let owner = require(tx, resource)?;
        let valid = match access::fetch_node(tx, uuid)? {
            Some(node) => node.is_valid(),
            None => access::fetch_edge(tx, uuid)?.is_some_and(|e| e.is_valid()),
        };
        if !valid {
            return Err(GraphError::Validation(format!(
                "{uuid} is not a valid entity to include"
            )));
        }
        tx.execute(cypher::link_included(owner.uuid(), uuid))?;
        debug!(resource, member = %uuid.short_id(), "included entity");
        Ok(())
    })
}

fn count(tx: &mut Transaction, resource: &str, model: Model) -> GraphResult<usize> {
    let result = tx.execute(cypher::count_managed(resource, model))?;
    let value = result.scalar()?;
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::UnexpectedResponse(format!("count is {value}")).into())
}

/// Number of latest components the resource manages.
pub fn component_count(tx: &mut Transaction, resource: &str) -> GraphResult<usize> {
    tx.scope(|tx| count(tx, resource, Model::Component))
}

/// Number of latest relationships the resource manages.
pub fn relationship_count(tx: &mut Transaction, resource: &str) -> GraphResult<usize> {
    tx.scope(|tx| count(tx, resource, Model::Relationship))
}

/// Remove a resource together with everything it manages.
///
/// Managed components go first, each with its own cascade; relationships
/// left over are removed next, then the resource itself. Member removals
/// are attributed to the resource revision.
pub fn remove(tx: &mut Transaction, resource: &str, reason: Reason) -> GraphResult<Node> {
    tx.scope(|tx| {
        let owner = require(tx, resource)?;
        let cause = Some(owner.uuid());

        let mut components = 0usize;
        for component in managed_nodes(tx, resource, Model::Component)? {
            // An earlier cascade may already have taken it.
            let still_valid = access::fetch_node(tx, component.uuid())?.is_some_and(|c| c.is_valid());
            if still_valid {
                cascade::remove_node(tx, &component, Reason::NodeRemoved, cause)?;
                components += 1;
            }
        }
        let leftovers = managed_edges(tx, resource, Model::Relationship)?;
        for edge in &leftovers {
            crate::emit::emit(
                tx,
                &origins_prov::recorder::removed(&edge.entity, Reason::NodeRemoved, cause),
            )?;
        }
        cascade::remove_node(tx, &owner, reason, None)?;
        info!(
            resource,
            components,
            relationships = leftovers.len(),
            "removed resource"
        );
        access::fetch_node(tx, owner.uuid())?
            .ok_or_else(|| GraphError::NotFound(format!("resource {resource:?}")))
    })
}

/// The latest revision of the resource managing `uuid`, if any.
pub fn resource_of(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Option<Node>> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::owner(uuid))?;
        let Some(owner) = result.first_column().next() else {
            return Ok(None);
        };
        let id = owner
            .get(origins_types::pack::attr::ID)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::UnexpectedResponse("owner without id".into()))?
            .to_string();
        access::latest_node(tx, &id, Model::Resource)
    })
}
