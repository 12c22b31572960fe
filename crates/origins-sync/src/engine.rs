//! Reconciliation of a resource with a submitted snapshot.
//!
//! The whole pass runs inside one transaction scope. Any error, including a
//! conflict discovered half way through, rolls back everything the pass
//! wrote.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use origins_graph::{components, nodes, relationships, resources, NewEdge, SetOptions};
use origins_store::Transaction;
use origins_types::{Direction, Model, Node, Reason, RevisionId, Versioned};

use crate::diff::{diff_attributes, diff_relationship, AttributeDiff};
use crate::error::{SyncError, SyncResult};
use crate::snapshot::{Snapshot, ValidSnapshot};
use crate::validate::validate;

/// Which parts of the reconciliation may run. All enabled by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Create the resource if it does not exist.
    pub create: bool,
    /// Add entries that are new in the snapshot.
    pub add: bool,
    /// Revise entries whose attributes differ from the snapshot.
    pub update: bool,
    /// Remove entries that are missing from the snapshot.
    pub remove: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            create: true,
            add: true,
            update: true,
            remove: true,
        }
    }
}

/// Per-kind change counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl Counts {
    pub fn is_zero(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// A revision made by a sync, with the diff that caused it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDiff {
    pub model: Model,
    pub id: String,
    pub previous: RevisionId,
    pub uuid: RevisionId,
    pub diff: AttributeDiff,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// The latest revision of the resource after the pass.
    pub resource: Node,
    /// `true` if the pass created the resource.
    pub created: bool,
    pub components: Counts,
    pub relationships: Counts,
    /// Local component id to the uuid of its latest revision.
    pub component_ids: BTreeMap<String, RevisionId>,
    /// Local relationship id to the uuid of its latest revision.
    pub relationship_ids: BTreeMap<String, RevisionId>,
    /// Diffs of every updated entry, in the order they were applied.
    pub diffs: Vec<EntityDiff>,
}

impl SyncReport {
    fn new(resource: Node, created: bool) -> Self {
        Self {
            resource,
            created,
            components: Counts::default(),
            relationships: Counts::default(),
            component_ids: BTreeMap::new(),
            relationship_ids: BTreeMap::new(),
            diffs: Vec::new(),
        }
    }

    /// Returns `true` if the pass changed nothing.
    pub fn is_unchanged(&self) -> bool {
        !self.created && self.components.is_zero() && self.relationships.is_zero() && self.diffs.is_empty()
    }
}

/// Reconcile the resource named by `snapshot` with its contents.
///
/// The snapshot is validated before anything touches the store.
///
/// # Errors
///
/// - [`SyncError::Format`] if the snapshot is malformed.
/// - [`SyncError::NotFound`] if the resource is missing and `create` is off.
/// - [`SyncError::Conflict`] if a relationship kept by the snapshot lost an
///   endpoint to a removal in this pass, or if a dependence cascade from a
///   removal took out a component the snapshot keeps. Retrying the same
///   snapshot fails the same way; drop the dependent entry or change the
///   relationship's dependence first.
///
/// Relationships that were only detached because an endpoint was revised
/// are recreated against the new endpoint revisions.
pub fn sync(tx: &mut Transaction, snapshot: &Snapshot, options: SyncOptions) -> SyncResult<SyncReport> {
    let plan = validate(snapshot)?;
    tx.scope(|tx| reconcile(tx, &plan, options))
}

fn reconcile(tx: &mut Transaction, plan: &ValidSnapshot, options: SyncOptions) -> SyncResult<SyncReport> {
    let (resource, created) = resolve_resource(tx, plan, options)?;
    let mut report = SyncReport::new(resource, created);

    if !created {
        // Taken before components change: those changes can cascade into
        // relationships.
        let before: BTreeSet<String> = resources::relationships(tx, plan.resource_id(), true)?
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        let removed = converge_components(tx, plan, options, &mut report)?;
        converge_relationships(tx, plan, options, &before, &removed, &mut report)?;
    }

    if options.add {
        add_components(tx, plan, &mut report)?;
        add_relationships(tx, plan, &mut report)?;
    }

    info!(
        resource = plan.resource_id(),
        created = report.created,
        components_added = report.components.added,
        components_updated = report.components.updated,
        components_removed = report.components.removed,
        relationships_added = report.relationships.added,
        relationships_updated = report.relationships.updated,
        relationships_removed = report.relationships.removed,
        "sync complete"
    );
    Ok(report)
}

fn resolve_resource(
    tx: &mut Transaction,
    plan: &ValidSnapshot,
    options: SyncOptions,
) -> SyncResult<(Node, bool)> {
    let id = plan.resource_id();
    match resources::get_by_id(tx, id)? {
        Some(existing) => {
            if !(options.update && plan.describes_resource) {
                return Ok((existing, false));
            }
            let diff = diff_attributes(&existing.entity, &plan.resource);
            if diff.is_empty() {
                return Ok((existing, false));
            }
            let revised = nodes::set(tx, existing.uuid(), &diff.to_changes(), SetOptions::default())?;
            Ok((revised.unwrap_or(existing), false))
        }
        None if !options.create => Err(SyncError::NotFound(format!("resource {id:?}"))),
        None => Ok((resources::create(tx, plan.resource.clone())?, true)),
    }
}

/// Returns the local ids of every component this pass removed, directly
/// or by cascade.
fn converge_components(
    tx: &mut Transaction,
    plan: &ValidSnapshot,
    options: SyncOptions,
    report: &mut SyncReport,
) -> SyncResult<BTreeSet<String>> {
    let resource = plan.resource_id();
    let before = resources::components(tx, resource, true)?;
    let mut removed = BTreeSet::new();

    for remote in &before {
        let key = remote.id();
        // An earlier removal may have cascaded here.
        let Some(current) = components::get_by_id(tx, resource, key)? else {
            continue;
        };
        match plan.components.get(key) {
            None if options.remove => {
                components::remove(tx, current.uuid(), Reason::Removed)?;
                report.components.removed += 1;
                removed.insert(key.to_string());
            }
            None => {}
            Some(local) => {
                let diff = diff_attributes(&current.entity, local);
                let mut uuid = current.uuid();
                if options.update && !diff.is_empty() {
                    if let Some(next) =
                        components::set(tx, current.uuid(), &diff.to_changes(), SetOptions::default())?
                    {
                        uuid = next.uuid();
                        report.components.updated += 1;
                        report.diffs.push(EntityDiff {
                            model: Model::Component,
                            id: key.to_string(),
                            previous: current.uuid(),
                            uuid,
                            diff,
                        });
                    }
                }
                report.component_ids.insert(key.to_string(), uuid);
            }
        }
    }

    let live: BTreeSet<String> = resources::components(tx, resource, true)?
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    for remote in &before {
        let key = remote.id();
        if live.contains(key) || removed.contains(key) {
            continue;
        }
        if plan.components.contains_key(key) {
            return Err(SyncError::Conflict(format!(
                "component {key:?} was removed by a cascade but is still in the snapshot"
            )));
        }
        debug!(resource, id = key, "component removed by cascade");
        report.components.removed += 1;
        removed.insert(key.to_string());
    }
    Ok(removed)
}

fn converge_relationships(
    tx: &mut Transaction,
    plan: &ValidSnapshot,
    options: SyncOptions,
    before: &BTreeSet<String>,
    removed: &BTreeSet<String>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let resource = plan.resource_id();
    let mut seen = BTreeSet::new();

    for remote in resources::relationships(tx, resource, true)? {
        let key = remote.id().to_string();
        seen.insert(key.clone());
        match plan.relationships.get(&key) {
            None if options.remove => {
                relationships::remove(tx, remote.uuid(), Reason::Removed)?;
                report.relationships.removed += 1;
            }
            None => {}
            Some(local) => {
                let diff = diff_relationship(&remote, local);
                let mut uuid = remote.uuid();
                if options.update && !diff.is_empty() {
                    if let Some(next) =
                        relationships::set(tx, remote.uuid(), &diff.to_changes(), SetOptions::default())?
                    {
                        uuid = next.uuid();
                        report.relationships.updated += 1;
                        report.diffs.push(EntityDiff {
                            model: Model::Relationship,
                            id: key.clone(),
                            previous: remote.uuid(),
                            uuid,
                            diff,
                        });
                    }
                }
                report.relationship_ids.insert(key, uuid);
            }
        }
    }

    // Relationships that vanished during the pass. One detached by an
    // endpoint revision is left unmapped, so the add step recreates it
    // between the current endpoints.
    for key in before.difference(&seen) {
        match plan.relationships.get(key) {
            Some(local) if removed.contains(&local.start) || removed.contains(&local.end) => {
                return Err(SyncError::Conflict(format!(
                    "relationship {key:?} is still in the snapshot but an endpoint was removed"
                )));
            }
            Some(_) => debug!(resource, id = %key, "relationship detached by an endpoint revision"),
            None => {
                debug!(resource, id = %key, "relationship removed by cascade");
                report.relationships.removed += 1;
            }
        }
    }
    Ok(())
}

fn add_components(tx: &mut Transaction, plan: &ValidSnapshot, report: &mut SyncReport) -> SyncResult<()> {
    let resource = plan.resource_id();
    for (key, attrs) in &plan.components {
        if report.component_ids.contains_key(key) {
            continue;
        }
        let component = components::add(tx, resource, attrs.clone())?;
        report.component_ids.insert(key.clone(), component.uuid());
        report.components.added += 1;
    }
    Ok(())
}

fn add_relationships(tx: &mut Transaction, plan: &ValidSnapshot, report: &mut SyncReport) -> SyncResult<()> {
    let resource = plan.resource_id();
    for (key, entry) in &plan.relationships {
        if report.relationship_ids.contains_key(key) {
            continue;
        }
        let start = endpoint(report, key, &entry.start)?;
        let end = endpoint(report, key, &entry.end)?;
        let new = NewEdge::new(start, end)
            .with_attributes(entry.attrs.clone())
            .with_direction(entry.direction.unwrap_or(Direction::Bidirected))
            .with_dependence(entry.dependence.unwrap_or_default());
        let relationship = relationships::add(tx, resource, new)?;
        report.relationship_ids.insert(key.clone(), relationship.uuid());
        report.relationships.added += 1;
    }
    Ok(())
}

fn endpoint(report: &SyncReport, relationship: &str, component: &str) -> SyncResult<RevisionId> {
    report.component_ids.get(component).copied().ok_or_else(|| {
        SyncError::Conflict(format!(
            "relationship {relationship:?} needs component {component:?}, which has no live revision"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use origins_graph::edges;
    use origins_store::MemoryStore;
    use origins_types::Dependence;
    use serde_json::{json, Value};

    fn memory() -> (Arc<MemoryStore>, Transaction) {
        let store = Arc::new(MemoryStore::new());
        let tx = MemoryStore::transaction(&store);
        (store, tx)
    }

    fn snapshot(doc: Value) -> Snapshot {
        serde_json::from_value(doc).unwrap()
    }

    fn warehouse(orders_rows: i64) -> Snapshot {
        snapshot(json!({
            "version": "1.0",
            "resource": "warehouse",
            "components": {
                "orders": {"type": "table", "properties": {"rows": orders_rows}},
                "customers": {"type": "table", "properties": {"rows": 5}}
            },
            "relationships": {
                "fk": {"start": "orders", "end": "customers", "type": "references"}
            }
        }))
    }

    fn with_rows(doc: &Snapshot, component: &str, rows: i64) -> Snapshot {
        let mut doc = doc.clone();
        doc.components.insert(
            component.into(),
            json!({"type": "table", "properties": {"rows": rows}}),
        );
        doc
    }

    fn counts(added: usize, updated: usize, removed: usize) -> Counts {
        Counts { added, updated, removed }
    }

    // ---- reconciliation ----

    #[test]
    fn reconciliation_scenario() {
        let (_store, mut tx) = memory();

        let first = sync(&mut tx, &warehouse(10), SyncOptions::default()).unwrap();
        assert!(first.created);
        assert_eq!(first.components, counts(2, 0, 0));
        assert_eq!(first.relationships, counts(1, 0, 0));
        assert_eq!(first.component_ids.len(), 2);
        assert_eq!(first.relationship_ids.len(), 1);

        let again = sync(&mut tx, &warehouse(10), SyncOptions::default()).unwrap();
        assert!(again.is_unchanged());
        assert_eq!(again.component_ids, first.component_ids);

        let changed = sync(&mut tx, &warehouse(11), SyncOptions::default()).unwrap();
        assert_eq!(changed.components, counts(0, 1, 0));
        assert_eq!(changed.relationships, counts(0, 0, 0));
        assert_eq!(changed.diffs.len(), 1);
        assert_eq!(changed.diffs[0].id, "orders");
        assert_eq!(changed.diffs[0].diff.modifications(), 1);

        let mut dropped = warehouse(11);
        dropped.components.remove("customers");
        dropped.relationships.clear();
        let last = sync(&mut tx, &dropped, SyncOptions::default()).unwrap();
        assert_eq!(last.components, counts(0, 0, 1));
        assert_eq!(last.relationships, counts(0, 0, 1));
        assert_eq!(resources::component_count(&mut tx, "warehouse").unwrap(), 1);
        assert_eq!(resources::relationship_count(&mut tx, "warehouse").unwrap(), 0);
    }

    #[test]
    fn component_update_carries_relationships() {
        let (_store, mut tx) = memory();
        sync(&mut tx, &warehouse(10), SyncOptions::default()).unwrap();

        let report = sync(&mut tx, &warehouse(20), SyncOptions::default()).unwrap();
        let orders = report.component_ids["orders"];
        let fk = resources::relationships(&mut tx, "warehouse", true).unwrap();
        assert_eq!(fk.len(), 1);
        assert_eq!(fk[0].start, orders);
        assert_eq!(fk[0].direction, Direction::Bidirected);
        assert_eq!(report.relationship_ids["fk"], fk[0].uuid());
        assert_eq!(report.relationships, counts(0, 0, 0));
    }

    #[test]
    fn relationship_attributes_converge() {
        let (_store, mut tx) = memory();
        sync(&mut tx, &warehouse(10), SyncOptions::default()).unwrap();

        let mut doc = warehouse(10);
        doc.relationships.insert(
            "fk".into(),
            json!({"start": "orders", "end": "customers", "dependence": "mutual",
                   "properties": {"on": "customer_id"}}),
        );
        let report = sync(&mut tx, &doc, SyncOptions::default()).unwrap();
        assert_eq!(report.relationships, counts(0, 1, 0));
        let fk = edges::get(&mut tx, report.relationship_ids["fk"]).unwrap().unwrap();
        assert_eq!(fk.dependence, Dependence::Mutual);
        assert_eq!(fk.entity.properties["on"], json!("customer_id"));
        assert_eq!(fk.entity.kind.as_deref(), Some("references"));
    }

    #[test]
    fn resource_attributes_converge() {
        let (_store, mut tx) = memory();
        let described = |label: &str| {
            snapshot(json!({"resource": {"id": "warehouse", "label": label}}))
        };
        let first = sync(&mut tx, &described("Old"), SyncOptions::default()).unwrap();
        let second = sync(&mut tx, &described("New"), SyncOptions::default()).unwrap();
        assert_ne!(second.resource.uuid(), first.resource.uuid());
        assert_eq!(second.resource.entity.label.as_deref(), Some("New"));

        let bare = sync(&mut tx, &snapshot(json!({"resource": "warehouse"})), SyncOptions::default())
            .unwrap();
        assert_eq!(bare.resource.uuid(), second.resource.uuid());
    }

    // ---- options ----

    #[test]
    fn disabled_steps_change_nothing() {
        let (_store, mut tx) = memory();
        sync(&mut tx, &warehouse(10), SyncOptions::default()).unwrap();

        let mut doc = warehouse(99);
        doc.components.remove("customers");
        doc.relationships.clear();
        doc.components.insert("extra".into(), json!({}));
        let frozen = SyncOptions {
            create: false,
            add: false,
            update: false,
            remove: false,
        };
        let report = sync(&mut tx, &doc, frozen).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(resources::component_count(&mut tx, "warehouse").unwrap(), 2);
        let orders = components::get_by_id(&mut tx, "warehouse", "orders").unwrap().unwrap();
        assert_eq!(orders.entity.properties["rows"], json!(10));
    }

    #[test]
    fn missing_resource_without_create() {
        let (store, mut tx) = memory();
        let options = SyncOptions {
            create: false,
            ..SyncOptions::default()
        };
        let err = sync(&mut tx, &warehouse(1), options).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(store.is_empty().unwrap());
    }

    // ---- cascades ----

    #[test]
    fn cascade_removals_are_counted() {
        let (_store, mut tx) = memory();
        let mut doc = warehouse(1);
        doc.relationships.insert(
            "fk".into(),
            json!({"start": "orders", "end": "customers", "dependence": "mutual"}),
        );
        sync(&mut tx, &doc, SyncOptions::default()).unwrap();

        let empty = snapshot(json!({"resource": "warehouse"}));
        let report = sync(&mut tx, &empty, SyncOptions::default()).unwrap();
        assert_eq!(report.components, counts(0, 0, 2));
        assert_eq!(report.relationships, counts(0, 0, 1));
        assert_eq!(resources::component_count(&mut tx, "warehouse").unwrap(), 0);
    }

    #[test]
    fn cascade_into_kept_component_conflicts() {
        let (store, mut tx) = memory();
        let mut doc = warehouse(1);
        doc.relationships.insert(
            "fk".into(),
            json!({"start": "orders", "end": "customers", "dependence": "inverse"}),
        );
        sync(&mut tx, &doc, SyncOptions::default()).unwrap();
        let stored = store.len().unwrap();

        let only_customers = snapshot(json!({
            "resource": "warehouse",
            "components": {"customers": {"type": "table", "properties": {"rows": 5}}}
        }));
        let err = sync(&mut tx, &only_customers, SyncOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)), "{err}");
        assert_eq!(store.len().unwrap(), stored);
        assert_eq!(resources::component_count(&mut tx, "warehouse").unwrap(), 2);
    }

    #[test]
    fn detached_relationship_is_recreated() {
        let (_store, mut tx) = memory();
        let mut doc = warehouse(1);
        doc.relationships.insert(
            "fk".into(),
            json!({"start": "orders", "end": "customers", "direction": "undirected"}),
        );
        let first = sync(&mut tx, &doc, SyncOptions::default()).unwrap();

        // Revising either endpoint of an undirected relationship detaches it.
        doc.components.insert(
            "customers".into(),
            json!({"type": "table", "properties": {"rows": 6}}),
        );
        let report = sync(&mut tx, &doc, SyncOptions::default()).unwrap();
        assert_eq!(report.components, counts(0, 1, 0));
        assert_eq!(report.relationships, counts(1, 0, 0));
        assert_ne!(report.relationship_ids["fk"], first.relationship_ids["fk"]);

        let fk = resources::relationships(&mut tx, "warehouse", true).unwrap();
        assert_eq!(fk.len(), 1);
        assert_eq!(fk[0].uuid(), report.relationship_ids["fk"]);
        assert_eq!(fk[0].start, report.component_ids["orders"]);
        assert_eq!(fk[0].end, report.component_ids["customers"]);
        assert_eq!(fk[0].direction, Direction::Undirected);

        let again = sync(&mut tx, &doc, SyncOptions::default()).unwrap();
        assert!(again.is_unchanged());
        assert_eq!(again.relationship_ids, report.relationship_ids);
    }

    #[test]
    fn directed_relationship_follows_only_its_start() {
        let (_store, mut tx) = memory();
        let mut doc = warehouse(1);
        doc.relationships.insert(
            "fk".into(),
            json!({"start": "orders", "end": "customers", "direction": "directed"}),
        );
        let first = sync(&mut tx, &doc, SyncOptions::default()).unwrap();

        // A new start revision rewires the relationship in place.
        let rewired = sync(&mut tx, &with_rows(&doc, "orders", 2), SyncOptions::default()).unwrap();
        assert_eq!(rewired.relationships, counts(0, 0, 0));
        let fk = edges::get(&mut tx, rewired.relationship_ids["fk"]).unwrap().unwrap();
        assert_eq!(fk.start, rewired.component_ids["orders"]);
        assert_eq!(fk.entity.id, "fk");

        // A new end revision detaches it, and the add step reconnects it.
        let doc = with_rows(&with_rows(&doc, "orders", 2), "customers", 9);
        let reattached = sync(&mut tx, &doc, SyncOptions::default()).unwrap();
        assert_eq!(reattached.relationships, counts(1, 0, 0));
        let fk = edges::get(&mut tx, reattached.relationship_ids["fk"]).unwrap().unwrap();
        assert_eq!(fk.end, reattached.component_ids["customers"]);
        assert!(fk.is_valid());
        assert_ne!(fk.uuid(), first.relationship_ids["fk"]);
    }

    // ---- validation ----

    #[test]
    fn format_errors_touch_nothing() {
        let (store, mut tx) = memory();
        let bad = snapshot(json!({
            "resource": "warehouse",
            "components": {"a": {"colour": "red"}},
            "relationships": {"r": {"start": "a"}}
        }));
        match sync(&mut tx, &bad, SyncOptions::default()) {
            Err(SyncError::Format(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected format errors, got {other:?}"),
        }
        assert!(store.is_empty().unwrap());
    }
}
