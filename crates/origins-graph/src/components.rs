//! Components: nodes managed by a resource.
//!
//! Component ids are unique within their resource, not globally.

use tracing::debug;

use origins_store::{cypher, Transaction};
use origins_types::{Attributes, Changes, Model, Node, Reason, RevisionId, Versioned};

use crate::error::{GraphError, GraphResult};
use crate::options::SetOptions;
use crate::{nodes, resources, rows};

pub(crate) fn managed_by_id(tx: &mut Transaction, resource: &str, id: &str) -> GraphResult<Option<Node>> {
    let result = tx.execute(cypher::managed_by_id(resource, id, Model::Component))?;
    Ok(rows::nodes(&result)?.pop())
}

/// Add a component to a resource.
pub fn add(tx: &mut Transaction, resource: &str, attrs: Attributes) -> GraphResult<Node> {
    tx.scope(|tx| {
        let owner = resources::require(tx, resource)?;
        if let Some(id) = attrs.id.as_deref() {
            if managed_by_id(tx, resource, id)?.is_some() {
                return Err(GraphError::Validation(format!(
                    "resource {resource:?} already has component {id:?}"
                )));
            }
        }
        let component = nodes::create(tx, Model::Component, attrs)?;
        tx.execute(cypher::link_managed(owner.uuid(), component.uuid()))?;
        debug!(resource, id = component.id(), "added component");
        Ok(component)
    })
}

/// The latest revision of a component within a resource.
pub fn get_by_id(tx: &mut Transaction, resource: &str, id: &str) -> GraphResult<Option<Node>> {
    tx.scope(|tx| managed_by_id(tx, resource, id))
}

/// Revise a component. Membership carries over to the new revision.
pub fn set(
    tx: &mut Transaction,
    uuid: RevisionId,
    changes: &Changes,
    options: SetOptions,
) -> GraphResult<Option<Node>> {
    nodes::set(tx, uuid, changes, options)
}

/// Remove a component and cascade along its dependent edges.
pub fn remove(tx: &mut Transaction, uuid: RevisionId, reason: Reason) -> GraphResult<Node> {
    nodes::remove(tx, uuid, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory;

    #[test]
    fn ids_are_unique_per_resource() {
        let (_store, mut tx) = memory();
        resources::create(&mut tx, Attributes::new().with_id("r1")).unwrap();
        resources::create(&mut tx, Attributes::new().with_id("r2")).unwrap();
        add(&mut tx, "r1", Attributes::new().with_id("users")).unwrap();
        add(&mut tx, "r2", Attributes::new().with_id("users")).unwrap();
        let dup = add(&mut tx, "r1", Attributes::new().with_id("users"));
        assert!(matches!(dup, Err(GraphError::Validation(_))));
    }

    #[test]
    fn lookup_is_scoped_to_the_resource() {
        let (_store, mut tx) = memory();
        resources::create(&mut tx, Attributes::new().with_id("r1")).unwrap();
        resources::create(&mut tx, Attributes::new().with_id("r2")).unwrap();
        let c = add(&mut tx, "r1", Attributes::new().with_id("users")).unwrap();
        assert_eq!(get_by_id(&mut tx, "r1", "users").unwrap(), Some(c));
        assert!(get_by_id(&mut tx, "r2", "users").unwrap().is_none());
    }

    #[test]
    fn revised_component_stays_managed() {
        let (_store, mut tx) = memory();
        resources::create(&mut tx, Attributes::new().with_id("r")).unwrap();
        let c = add(&mut tx, "r", Attributes::new().with_id("users")).unwrap();
        let c2 = set(&mut tx, c.uuid(), &Changes::new().with_property("rows", 5), SetOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(get_by_id(&mut tx, "r", "users").unwrap().unwrap().uuid(), c2.uuid());

        remove(&mut tx, c2.uuid(), Reason::RemovedByUser).unwrap();
        assert!(get_by_id(&mut tx, "r", "users").unwrap().is_none());
        // A removed id can be reused.
        add(&mut tx, "r", Attributes::new().with_id("users")).unwrap();
    }

    #[test]
    fn missing_resource() {
        let (_store, mut tx) = memory();
        let err = add(&mut tx, "nope", Attributes::new()).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }
}
