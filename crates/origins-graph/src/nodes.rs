//! Node operations.
//!
//! Every write runs in a transaction scope, so a call on its own commits
//! and a call inside an outer scope joins it. Nodes are never deleted:
//! `set` supersedes a revision and `remove` invalidates it, and both leave
//! the old revision readable by uuid.

use tracing::debug;

use origins_prov::recorder;
use origins_store::{cypher, Transaction};
use origins_types::{Attributes, Changes, Edge, Model, Node, Reason, RevisionId, Versioned};

use crate::access;
use crate::cascade;
use crate::emit::emit;
use crate::error::{GraphError, GraphResult};
use crate::options::{Predicate, SetOptions};
use crate::rows;

pub(crate) fn validate_id(id: Option<&str>) -> GraphResult<()> {
    match id {
        Some(id) if id.trim().is_empty() => {
            Err(GraphError::Validation("id must not be empty".into()))
        }
        _ => Ok(()),
    }
}

/// The latest revision behind `uuid`, or an error saying why there is none.
pub(crate) fn current(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Node> {
    let node = access::fetch_node(tx, uuid)?
        .ok_or_else(|| GraphError::NotFound(format!("node {uuid}")))?;
    access::ensure_valid(&node)?;
    Ok(node)
}

/// Store a brand-new node of `model` and record its generation.
pub(crate) fn create(tx: &mut Transaction, model: Model, attrs: Attributes) -> GraphResult<Node> {
    validate_id(attrs.id.as_deref())?;
    let node = Node::new(model, attrs);
    access::persist_node(tx, &node)?;
    emit(tx, &recorder::added(&node.entity))?;
    Ok(node)
}

/// Fail if a latest revision of `model` already carries `id`.
pub(crate) fn ensure_unused(tx: &mut Transaction, id: Option<&str>, model: Model) -> GraphResult<()> {
    let Some(id) = id else {
        return Ok(());
    };
    if access::latest_node(tx, id, model)?.is_some() {
        return Err(GraphError::Validation(format!("{model} {id:?} already exists")));
    }
    Ok(())
}

/// Add a node.
pub fn add(tx: &mut Transaction, attrs: Attributes) -> GraphResult<Node> {
    tx.scope(|tx| {
        ensure_unused(tx, attrs.id.as_deref(), Model::Node)?;
        create(tx, Model::Node, attrs)
    })
}

/// Any revision by uuid, including invalidated ones.
pub fn get(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Option<Node>> {
    tx.scope(|tx| access::fetch_node(tx, uuid))
}

/// The latest revision of a node id.
pub fn get_by_id(tx: &mut Transaction, id: &str) -> GraphResult<Option<Node>> {
    tx.scope(|tx| access::latest_node(tx, id, Model::Node))
}

pub(crate) fn matching_model(
    tx: &mut Transaction,
    model: Model,
    predicate: &Predicate,
) -> GraphResult<Vec<Node>> {
    let stmt = cypher::match_entities(
        model,
        predicate.packed()?,
        predicate.skip,
        predicate.limit.unwrap_or(usize::MAX),
    );
    let result = tx.execute(stmt)?;
    rows::nodes(&result)
}

/// Latest node revisions matching `predicate`.
pub fn matching(tx: &mut Transaction, predicate: &Predicate) -> GraphResult<Vec<Node>> {
    tx.scope(|tx| matching_model(tx, Model::Node, predicate))
}

pub(crate) fn revisions_of(tx: &mut Transaction, id: &str, model: Model) -> GraphResult<Vec<Node>> {
    let result = tx.execute(cypher::revisions(id, model))?;
    rows::nodes(&result)
}

/// Every revision of a node id, oldest first.
pub fn revisions(tx: &mut Transaction, id: &str) -> GraphResult<Vec<Node>> {
    tx.scope(|tx| revisions_of(tx, id, Model::Node))
}

/// Valid edges touching a node revision.
pub fn incident_edges(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<Vec<Edge>> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::incident_edges(uuid))?;
        rows::edges(&result)
    })
}

/// Supersede a node revision with `changes` applied.
///
/// Returns `None` without touching the store if nothing would change,
/// unless forced. Valid edges touching the old revision are rewired or
/// detached according to their direction.
pub fn set(
    tx: &mut Transaction,
    uuid: RevisionId,
    changes: &Changes,
    options: SetOptions,
) -> GraphResult<Option<Node>> {
    if changes.touches_edge_attributes() {
        return Err(GraphError::Validation(
            "direction and dependence only apply to edges".into(),
        ));
    }
    tx.scope(|tx| {
        let previous = current(tx, uuid)?;
        let next = previous.revise(changes);
        if !options.force && next.entity.same_content(&previous.entity) {
            debug!(uuid = %uuid.short_id(), "set is a no-op");
            return Ok(None);
        }

        access::persist_node(tx, &next)?;
        access::carry_links(tx, previous.uuid(), next.uuid());
        let mut bundle = recorder::revised(
            &previous.entity,
            &next.entity,
            Reason::AttributeChange,
            None,
        );
        cascade::propagate_update(tx, &previous, &next, &mut bundle)?;
        emit(tx, &bundle)?;

        debug!(
            id = next.id(),
            previous = %previous.uuid().short_id(),
            next = %next.uuid().short_id(),
            "revised node"
        );
        Ok(Some(next))
    })
}

/// Invalidate a node revision and cascade the removal along dependent
/// edges. Returns the removed revision with its invalidation.
pub fn remove(tx: &mut Transaction, uuid: RevisionId, reason: Reason) -> GraphResult<Node> {
    tx.scope(|tx| {
        let node = current(tx, uuid)?;
        cascade::remove_node(tx, &node, reason, None)?;
        access::fetch_node(tx, uuid)?
            .ok_or_else(|| GraphError::NotFound(format!("node {uuid}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::{self, NewEdge};
    use crate::testing::memory;
    use origins_types::{Dependence, Direction};
    use serde_json::json;

    fn attrs(id: &str) -> Attributes {
        Attributes::new().with_id(id).with_property("size", 1)
    }

    // ---------------------------------------------------------------
    // Add and read
    // ---------------------------------------------------------------

    #[test]
    fn get_returns_what_add_stored() {
        let (_store, mut tx) = memory();
        let n = add(
            &mut tx,
            attrs("a")
                .with_type("table")
                .with_label("A")
                .with_property("schema", json!({"pk": ["id"]})),
        )
        .unwrap();
        assert_eq!(get(&mut tx, n.uuid()).unwrap(), Some(n.clone()));
        assert_eq!(get_by_id(&mut tx, "a").unwrap(), Some(n));
    }

    #[test]
    fn duplicate_and_empty_ids_rejected() {
        let (_store, mut tx) = memory();
        add(&mut tx, attrs("a")).unwrap();
        assert!(matches!(add(&mut tx, attrs("a")), Err(GraphError::Validation(_))));
        assert!(matches!(add(&mut tx, attrs(" ")), Err(GraphError::Validation(_))));
    }

    #[test]
    fn add_commits_on_its_own() {
        let (store, mut tx) = memory();
        add(&mut tx, attrs("a")).unwrap();
        assert!(!tx.is_open());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn matching_filters_latest_revisions() {
        let (_store, mut tx) = memory();
        add(&mut tx, attrs("a").with_type("table")).unwrap();
        let b = add(&mut tx, attrs("b").with_type("table")).unwrap();
        add(&mut tx, attrs("c").with_type("view")).unwrap();
        set(&mut tx, b.uuid(), &Changes::new().with_property("size", 2), SetOptions::default())
            .unwrap();

        let tables = matching(&mut tx, &Predicate::new().with_type("table")).unwrap();
        assert_eq!(tables.len(), 2);
        let big = matching(&mut tx, &Predicate::new().with_property("size", 2)).unwrap();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].id(), "b");
        let page = matching(&mut tx, &Predicate::new().with_type("table").skip(1).limit(5)).unwrap();
        assert_eq!(page.len(), 1);
    }

    // ---------------------------------------------------------------
    // Set
    // ---------------------------------------------------------------

    #[test]
    fn set_keeps_one_latest_revision() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a")).unwrap();
        let mut last = n.uuid();
        for size in 2..5 {
            let next = set(
                &mut tx,
                last,
                &Changes::new().with_property("size", size),
                SetOptions::default(),
            )
            .unwrap()
            .unwrap();
            last = next.uuid();
        }
        let latest = get_by_id(&mut tx, "a").unwrap().unwrap();
        assert_eq!(latest.uuid(), last);
        assert_eq!(latest.entity.properties["size"], json!(4));

        let all = revisions(&mut tx, "a").unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().filter(|r| r.is_valid()).count(), 1);
        assert_eq!(all[0].uuid(), n.uuid());
        let inv = all[0].entity.invalidation.as_ref().unwrap();
        assert_eq!(inv.reason, Reason::AttributeChange);

        // The original stays readable.
        assert!(!get(&mut tx, n.uuid()).unwrap().unwrap().is_valid());
    }

    #[test]
    fn identical_set_is_refused_unless_forced() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a").with_label("A")).unwrap();
        let same = Changes::new().with_property("size", 1).with_label("A");
        assert_eq!(set(&mut tx, n.uuid(), &same, SetOptions::default()).unwrap(), None);
        assert_eq!(revisions(&mut tx, "a").unwrap().len(), 1);
        assert_eq!(crate::provenance::timeline(&mut tx, "a").unwrap().len(), 2);

        let forced = set(&mut tx, n.uuid(), &same, SetOptions::forced()).unwrap().unwrap();
        assert_eq!(forced.entity.hash, n.entity.hash);
        assert_eq!(revisions(&mut tx, "a").unwrap().len(), 2);
    }

    #[test]
    fn label_change_alone_is_not_a_noop() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a")).unwrap();
        let next = set(&mut tx, n.uuid(), &Changes::new().with_label("new"), SetOptions::default())
            .unwrap();
        assert!(next.is_some());
    }

    #[test]
    fn null_property_removes_key() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a").with_property("tmp", true)).unwrap();
        let next = set(&mut tx, n.uuid(), &Changes::new().without_property("tmp"), SetOptions::default())
            .unwrap()
            .unwrap();
        assert!(!next.entity.properties.contains_key("tmp"));
        assert!(next.entity.properties.contains_key("size"));
    }

    #[test]
    fn set_on_stale_or_missing_revision_fails() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a")).unwrap();
        set(&mut tx, n.uuid(), &Changes::new().with_label("x"), SetOptions::default()).unwrap();
        let stale = set(&mut tx, n.uuid(), &Changes::new().with_label("y"), SetOptions::default());
        assert!(matches!(stale, Err(GraphError::InvalidState(_))));
        let missing = set(&mut tx, RevisionId::new(), &Changes::new(), SetOptions::default());
        assert!(matches!(missing, Err(GraphError::NotFound(_))));
    }

    #[test]
    fn set_rejects_edge_attributes() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a")).unwrap();
        let changes = Changes::new().with_direction(Direction::Reverse);
        assert!(matches!(
            set(&mut tx, n.uuid(), &changes, SetOptions::default()),
            Err(GraphError::Validation(_))
        ));
    }

    // ---------------------------------------------------------------
    // Update propagation through the store
    // ---------------------------------------------------------------

    #[test]
    fn directed_edge_follows_start_and_detaches_from_end() {
        let (_store, mut tx) = memory();
        let a = add(&mut tx, attrs("a")).unwrap();
        let b = add(&mut tx, attrs("b")).unwrap();
        let e = edges::add(&mut tx, NewEdge::new(a.uuid(), b.uuid()).with_id("ab")).unwrap();

        let a2 = set(&mut tx, a.uuid(), &Changes::new().with_label("A2"), SetOptions::default())
            .unwrap()
            .unwrap();
        let e2 = edges::get_by_id(&mut tx, "ab").unwrap().unwrap();
        assert_ne!(e2.uuid(), e.uuid());
        assert_eq!((e2.start, e2.end), (a2.uuid(), b.uuid()));
        let old = edges::get(&mut tx, e.uuid()).unwrap().unwrap();
        let inv = old.entity.invalidation.unwrap();
        assert_eq!(inv.reason, Reason::NodeChange);
        assert_eq!(inv.trigger, Some(a2.uuid()));

        // Superseding the end of a directed edge drops it.
        set(&mut tx, b.uuid(), &Changes::new().with_label("B2"), SetOptions::default()).unwrap();
        assert!(edges::get_by_id(&mut tx, "ab").unwrap().is_none());
        assert!(incident_edges(&mut tx, a2.uuid()).unwrap().is_empty());
    }

    #[test]
    fn bidirected_edge_survives_both_sides() {
        let (_store, mut tx) = memory();
        let a = add(&mut tx, attrs("a")).unwrap();
        let b = add(&mut tx, attrs("b")).unwrap();
        edges::add(
            &mut tx,
            NewEdge::new(a.uuid(), b.uuid())
                .with_id("ab")
                .with_direction(Direction::Bidirected),
        )
        .unwrap();
        let a2 = set(&mut tx, a.uuid(), &Changes::new().with_label("x"), SetOptions::default())
            .unwrap()
            .unwrap();
        let b2 = set(&mut tx, b.uuid(), &Changes::new().with_label("y"), SetOptions::default())
            .unwrap()
            .unwrap();
        let e = edges::get_by_id(&mut tx, "ab").unwrap().unwrap();
        assert_eq!((e.start, e.end), (a2.uuid(), b2.uuid()));
        assert_eq!(edges::revisions(&mut tx, "ab").unwrap().len(), 3);
    }

    #[test]
    fn reverse_edge_follows_end_only() {
        let (_store, mut tx) = memory();
        let a = add(&mut tx, attrs("a")).unwrap();
        let b = add(&mut tx, attrs("b")).unwrap();
        edges::add(
            &mut tx,
            NewEdge::new(a.uuid(), b.uuid())
                .with_id("ab")
                .with_direction(Direction::Reverse),
        )
        .unwrap();
        let b2 = set(&mut tx, b.uuid(), &Changes::new().with_label("y"), SetOptions::default())
            .unwrap()
            .unwrap();
        let e = edges::get_by_id(&mut tx, "ab").unwrap().unwrap();
        assert_eq!(e.end, b2.uuid());
        set(&mut tx, a.uuid(), &Changes::new().with_label("x"), SetOptions::default()).unwrap();
        assert!(edges::get_by_id(&mut tx, "ab").unwrap().is_none());
    }

    // ---------------------------------------------------------------
    // Remove
    // ---------------------------------------------------------------

    #[test]
    fn remove_keeps_revision_readable() {
        let (_store, mut tx) = memory();
        let n = add(&mut tx, attrs("a")).unwrap();
        let removed = remove(&mut tx, n.uuid(), Reason::RemovedByUser).unwrap();
        assert_eq!(removed.uuid(), n.uuid());
        let inv = removed.entity.invalidation.unwrap();
        assert_eq!(inv.reason, Reason::RemovedByUser);
        assert_eq!(inv.trigger, None);
        assert!(get_by_id(&mut tx, "a").unwrap().is_none());
        assert!(matches!(
            remove(&mut tx, n.uuid(), Reason::Removed),
            Err(GraphError::InvalidState(_))
        ));
    }

    #[test]
    fn removal_cascades_through_the_store() {
        let (_store, mut tx) = memory();
        let ids = ["n0", "n1", "n2", "n3"];
        let nodes: Vec<Node> = ids.iter().map(|id| add(&mut tx, attrs(id)).unwrap()).collect();
        for i in 0..nodes.len() {
            let next = &nodes[(i + 1) % nodes.len()];
            edges::add(
                &mut tx,
                NewEdge::new(nodes[i].uuid(), next.uuid()).with_dependence(Dependence::Forward),
            )
            .unwrap();
        }
        let outsider = add(&mut tx, attrs("out")).unwrap();
        edges::add(&mut tx, NewEdge::new(outsider.uuid(), nodes[2].uuid())).unwrap();

        remove(&mut tx, nodes[0].uuid(), Reason::RemovedByUser).unwrap();
        for id in ids {
            assert!(get_by_id(&mut tx, id).unwrap().is_none(), "{id} should be gone");
        }
        assert!(get_by_id(&mut tx, "out").unwrap().is_some());

        let n3 = get(&mut tx, nodes[3].uuid()).unwrap().unwrap();
        let inv = n3.entity.invalidation.unwrap();
        assert_eq!(inv.reason, Reason::NodeRemoved);
        assert_eq!(inv.trigger, Some(nodes[0].uuid()));
        assert!(incident_edges(&mut tx, outsider.uuid()).unwrap().is_empty());
    }

    #[test]
    fn failed_operation_inside_scope_rolls_back() {
        let (store, mut tx) = memory();
        let result: GraphResult<()> = tx.scope(|tx| {
            add(tx, attrs("a"))?;
            add(tx, attrs("a"))?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(store.is_empty().unwrap());
    }
}
