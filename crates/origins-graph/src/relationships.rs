//! Relationships: edges managed by a resource.
//!
//! Relationship ids are unique within their resource. Endpoints may be any
//! valid nodes, inside the resource or not.

use tracing::debug;

use origins_store::{cypher, Transaction};
use origins_types::{Changes, Edge, Model, Reason, RevisionId, Versioned};

use crate::edges::{self, NewEdge};
use crate::error::{GraphError, GraphResult};
use crate::options::SetOptions;
use crate::{resources, rows};

pub(crate) fn managed_by_id(tx: &mut Transaction, resource: &str, id: &str) -> GraphResult<Option<Edge>> {
    let result = tx.execute(cypher::managed_by_id(resource, id, Model::Relationship))?;
    Ok(rows::edges(&result)?.pop())
}

/// Add a relationship to a resource.
pub fn add(tx: &mut Transaction, resource: &str, new: NewEdge) -> GraphResult<Edge> {
    tx.scope(|tx| {
        let owner = resources::require(tx, resource)?;
        if let Some(id) = new.attrs.id.as_deref() {
            if managed_by_id(tx, resource, id)?.is_some() {
                return Err(GraphError::Validation(format!(
                    "resource {resource:?} already has relationship {id:?}"
                )));
            }
        }
        let relationship = edges::create(tx, Model::Relationship, new)?;
        tx.execute(cypher::link_managed(owner.uuid(), relationship.uuid()))?;
        debug!(resource, id = relationship.id(), "added relationship");
        Ok(relationship)
    })
}

/// The latest revision of a relationship within a resource.
pub fn get_by_id(tx: &mut Transaction, resource: &str, id: &str) -> GraphResult<Option<Edge>> {
    tx.scope(|tx| managed_by_id(tx, resource, id))
}

/// Revise a relationship. Membership carries over to the new revision.
pub fn set(
    tx: &mut Transaction,
    uuid: RevisionId,
    changes: &Changes,
    options: SetOptions,
) -> GraphResult<Option<Edge>> {
    edges::set(tx, uuid, changes, options)
}

pub fn remove(tx: &mut Transaction, uuid: RevisionId, reason: Reason) -> GraphResult<Edge> {
    edges::remove(tx, uuid, reason)
}
