//! Ranked views over the whole graph.
//!
//! Each trend counts something about the latest revisions and returns the
//! highest counts first, ties broken by age. Entities with a zero count
//! are left out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use origins_store::{cypher, Query, StoreError, Transaction};
use origins_types::Node;

use crate::error::GraphResult;
use crate::rows;

/// An entity and how often it was counted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ranked<T> {
    pub item: T,
    pub count: u64,
}

/// A relationship type and how many latest relationships carry it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

fn count_of(value: Option<&Value>) -> GraphResult<u64> {
    value
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::UnexpectedResponse(format!("trend count is {value:?}")).into())
}

fn ranked_nodes(tx: &mut Transaction, query: Query, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::trend(query, limit))?;
        let mut out = Vec::with_capacity(result.len());
        for row in result.rows() {
            // The count column must not be read as an invalidation.
            let entity = row.get(..1).unwrap_or_default();
            if let Some(item) = rows::node(entity)? {
                out.push(Ranked { item, count: count_of(row.get(1))? });
            }
        }
        Ok(out)
    })
}

/// Components touched by the most relationships.
pub fn connected_components(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    ranked_nodes(tx, Query::ConnectedComponents, limit)
}

/// Components included by the most resources that do not manage them.
pub fn used_components(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    ranked_nodes(tx, Query::UsedComponents, limit)
}

/// Resources managing the most relationships.
pub fn connected_resources(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    ranked_nodes(tx, Query::ConnectedResources, limit)
}

/// Resources whose components are included most often elsewhere. Each
/// component counts once however many resources use it.
pub fn used_resources(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    ranked_nodes(tx, Query::UsedResources, limit)
}

/// Components most often named as the primary source of a derivation.
pub fn component_sources(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<Ranked<Node>>> {
    ranked_nodes(tx, Query::ComponentSources, limit)
}

/// The most common relationship types.
pub fn common_relationships(tx: &mut Transaction, limit: usize) -> GraphResult<Vec<TypeCount>> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::trend(Query::CommonRelationships, limit))?;
        let mut out = Vec::with_capacity(result.len());
        for row in result.rows() {
            let kind = row
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::UnexpectedResponse("relationship type missing".into()))?;
            out.push(TypeCount { kind: kind.to_string(), count: count_of(row.get(1))? });
        }
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components;
    use crate::edges::NewEdge;
    use crate::provenance;
    use crate::relationships;
    use crate::resources;
    use crate::testing::memory;
    use origins_prov::DerivationKind;
    use origins_types::{Attributes, Reason, Versioned};

    fn ranking(items: &[Ranked<Node>]) -> Vec<(&str, u64)> {
        items.iter().map(|r| (r.item.id(), r.count)).collect()
    }

    fn link(tx: &mut Transaction, resource: &str, kind: &str, start: &Node, end: &Node) {
        relationships::add(
            tx,
            resource,
            NewEdge::new(start.uuid(), end.uuid()).with_type(kind),
        )
        .unwrap();
    }

    /// Two resources: `shop` with three connected components and `report`
    /// which includes one of them.
    fn setup(tx: &mut Transaction) -> (Node, Node, Node) {
        resources::create(tx, Attributes::new().with_id("shop")).unwrap();
        resources::create(tx, Attributes::new().with_id("report")).unwrap();
        let users = components::add(tx, "shop", Attributes::new().with_id("users")).unwrap();
        let orders = components::add(tx, "shop", Attributes::new().with_id("orders")).unwrap();
        let items = components::add(tx, "shop", Attributes::new().with_id("items")).unwrap();
        link(tx, "shop", "fk", &orders, &users);
        link(tx, "shop", "fk", &items, &orders);
        link(tx, "shop", "owner", &users, &orders);
        resources::include(tx, "report", orders.uuid()).unwrap();
        (users, orders, items)
    }

    // ---------------------------------------------------------------
    // Rankings
    // ---------------------------------------------------------------

    #[test]
    fn components_rank_by_relationships() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        let top = connected_components(&mut tx, 10).unwrap();
        assert_eq!(ranking(&top), vec![("orders", 3), ("users", 2), ("items", 1)]);
        assert_eq!(connected_components(&mut tx, 1).unwrap().len(), 1);
    }

    #[test]
    fn resources_rank_by_relationships_and_use() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        assert_eq!(ranking(&connected_resources(&mut tx, 10).unwrap()), vec![("shop", 3)]);
        assert_eq!(ranking(&used_components(&mut tx, 10).unwrap()), vec![("orders", 1)]);
        assert_eq!(ranking(&used_resources(&mut tx, 10).unwrap()), vec![("shop", 1)]);

        resources::remove(&mut tx, "report", Reason::RemovedByUser).unwrap();
        assert!(used_components(&mut tx, 10).unwrap().is_empty());
        assert!(used_resources(&mut tx, 10).unwrap().is_empty());
    }

    #[test]
    fn relationship_types_rank_by_frequency() {
        let (_store, mut tx) = memory();
        setup(&mut tx);
        let types = common_relationships(&mut tx, 10).unwrap();
        assert_eq!(
            types,
            vec![
                TypeCount { kind: "fk".into(), count: 2 },
                TypeCount { kind: "owner".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn sources_rank_by_primary_source_derivations() {
        let (_store, mut tx) = memory();
        let (users, orders, items) = setup(&mut tx);
        provenance::derive(&mut tx, orders.uuid(), users.uuid(), DerivationKind::PrimarySource).unwrap();
        provenance::derive(&mut tx, items.uuid(), users.uuid(), DerivationKind::PrimarySource).unwrap();
        provenance::derive(&mut tx, items.uuid(), orders.uuid(), DerivationKind::Quotation).unwrap();

        let sources = component_sources(&mut tx, 10).unwrap();
        assert_eq!(ranking(&sources), vec![("users", 2)]);
    }

    #[test]
    fn empty_graph_has_no_trends() {
        let (_store, mut tx) = memory();
        assert!(connected_components(&mut tx, 5).unwrap().is_empty());
        assert!(common_relationships(&mut tx, 5).unwrap().is_empty());
    }
}
