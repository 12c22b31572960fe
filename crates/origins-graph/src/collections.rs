//! Collections of resources.
//!
//! A collection is a node that *includes* resources without owning them.
//! Removing a collection leaves its resources alone, and a resource keeps
//! its place in every collection across revisions.

use tracing::{debug, info};

use origins_store::{cypher, Transaction};
use origins_types::{Attributes, Model, Node, Reason, Versioned};

use crate::access;
use crate::cascade;
use crate::error::{GraphError, GraphResult};
use crate::nodes;
use crate::options::Predicate;
use crate::resources;
use crate::rows;

fn require(tx: &mut Transaction, id: &str) -> GraphResult<Node> {
    access::latest_node(tx, id, Model::Collection)?
        .ok_or_else(|| GraphError::NotFound(format!("collection {id:?}")))
}

/// Create a collection. Its id must not be in use by another collection.
pub fn create(tx: &mut Transaction, attrs: Attributes) -> GraphResult<Node> {
    tx.scope(|tx| {
        nodes::ensure_unused(tx, attrs.id.as_deref(), Model::Collection)?;
        let collection = nodes::create(tx, Model::Collection, attrs)?;
        info!(id = collection.id(), uuid = %collection.uuid().short_id(), "created collection");
        Ok(collection)
    })
}

/// The latest revision of a collection id.
pub fn get_by_id(tx: &mut Transaction, id: &str) -> GraphResult<Option<Node>> {
    tx.scope(|tx| access::latest_node(tx, id, Model::Collection))
}

/// Latest collection revisions matching `predicate`.
pub fn matching(tx: &mut Transaction, predicate: &Predicate) -> GraphResult<Vec<Node>> {
    tx.scope(|tx| nodes::matching_model(tx, Model::Collection, predicate))
}

/// Include the latest revision of `resource` in the collection.
///
/// Including a resource twice is a no-op.
pub fn add_resource(tx: &mut Transaction, collection: &str, resource: &str) -> GraphResult<()> {
    tx.scope(|tx| {
        let owner = require(tx, collection)?;
        let member = resources::require(tx, resource)?;
        let already = members(tx, collection, &Predicate::new())?
            .iter()
            .any(|r| r.uuid() == member.uuid());
        if !already {
            tx.execute(cypher::link_included(owner.uuid(), member.uuid()))?;
            debug!(collection, resource, "added resource to collection");
        }
        Ok(())
    })
}

fn members(tx: &mut Transaction, collection: &str, predicate: &Predicate) -> GraphResult<Vec<Node>> {
    let stmt = cypher::collection_resources(
        collection,
        predicate.packed()?,
        predicate.skip,
        predicate.limit.unwrap_or(usize::MAX),
    );
    let result = tx.execute(stmt)?;
    rows::nodes(&result)
}

/// Latest resources in the collection matching `predicate`, oldest first.
pub fn resources(tx: &mut Transaction, collection: &str, predicate: &Predicate) -> GraphResult<Vec<Node>> {
    tx.scope(|tx| {
        require(tx, collection)?;
        members(tx, collection, predicate)
    })
}

/// Invalidate the collection. Its resources stay valid.
pub fn remove(tx: &mut Transaction, collection: &str, reason: Reason) -> GraphResult<Node> {
    tx.scope(|tx| {
        let node = require(tx, collection)?;
        cascade::remove_node(tx, &node, reason, None)?;
        info!(collection, "removed collection");
        access::fetch_node(tx, node.uuid())?
            .ok_or_else(|| GraphError::NotFound(format!("collection {collection:?}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SetOptions;
    use crate::testing::memory;
    use origins_types::Changes;

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id()).collect()
    }

    fn setup(tx: &mut Transaction) -> Node {
        let c = create(tx, Attributes::new().with_id("warehouse")).unwrap();
        for (id, team) in [("sales", "ops"), ("billing", "finance"), ("audit", "finance")] {
            resources::create(tx, Attributes::new().with_id(id).with_property("team", team)).unwrap();
        }
        for id in ["sales", "billing", "audit"] {
            add_resource(tx, "warehouse", id).unwrap();
        }
        c
    }

    // ---------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------

    #[test]
    fn resources_are_listed_and_filtered() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        let all = resources(&mut tx, "warehouse", &Predicate::new()).unwrap();
        assert_eq!(ids(&all), vec!["sales", "billing", "audit"]);

        let finance = Predicate::new().with_property("team", "finance");
        let found = resources(&mut tx, "warehouse", &finance).unwrap();
        assert_eq!(ids(&found), vec!["billing", "audit"]);

        let page = resources(&mut tx, "warehouse", &finance.skip(1).limit(5)).unwrap();
        assert_eq!(ids(&page), vec!["audit"]);
    }

    #[test]
    fn adding_twice_keeps_one_membership() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        add_resource(&mut tx, "warehouse", "sales").unwrap();
        assert_eq!(resources(&mut tx, "warehouse", &Predicate::new()).unwrap().len(), 3);
    }

    #[test]
    fn membership_survives_revisions() {
        let (_store, mut tx) = memory();
        let c = setup(&mut tx);
        let sales = resources::get_by_id(&mut tx, "sales").unwrap().unwrap();
        let sales2 = nodes::set(&mut tx, sales.uuid(), &Changes::new().with_label("Sales"), SetOptions::default())
            .unwrap()
            .unwrap();
        nodes::set(&mut tx, c.uuid(), &Changes::new().with_label("DW"), SetOptions::default())
            .unwrap()
            .unwrap();

        let all = resources(&mut tx, "warehouse", &Predicate::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|r| r.uuid() == sales2.uuid()));
        assert!(!all.iter().any(|r| r.uuid() == sales.uuid()));
    }

    #[test]
    fn removed_resources_leave_and_removal_spares_members() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        resources::remove(&mut tx, "audit", Reason::RemovedByUser).unwrap();
        let all = resources(&mut tx, "warehouse", &Predicate::new()).unwrap();
        assert_eq!(ids(&all), vec!["sales", "billing"]);

        let removed = remove(&mut tx, "warehouse", Reason::RemovedByUser).unwrap();
        assert!(!removed.is_valid());
        assert!(get_by_id(&mut tx, "warehouse").unwrap().is_none());
        assert!(resources::get_by_id(&mut tx, "sales").unwrap().is_some());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        assert!(matches!(
            add_resource(&mut tx, "lake", "sales"),
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            add_resource(&mut tx, "warehouse", "missing"),
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            create(&mut tx, Attributes::new().with_id("warehouse")),
            Err(GraphError::Validation(_))
        ));
        assert!(matches!(
            resources(&mut tx, "lake", &Predicate::new()),
            Err(GraphError::NotFound(_))
        ));
    }
}
