//! Export of a source graph into a [`Snapshot`].
//!
//! A source is anything that can enumerate components and the relationships
//! around them. The exporter walks it breadth-first from a set of roots:
//! a component's neighbours are queued before its relationships, so every
//! relationship is written after both of its endpoints.
//!
//! Component ids are component paths and relationship ids are
//! `start:type:end`. Relationships whose endpoints belong to different
//! resources are skipped.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::hash::Hash;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use origins_types::Properties;

use crate::error::{SyncError, SyncResult};
use crate::snapshot::{ResourceRef, Snapshot, FORMAT_VERSION};

/// A component of a source graph.
pub trait SourceComponent: Clone + Eq + Hash {
    /// Unique path of the component. Used as its local id.
    fn path(&self) -> String;

    /// The resource the component belongs to.
    fn root(&self) -> String;

    fn kind(&self) -> String;

    fn label(&self) -> Option<String> {
        None
    }

    fn properties(&self) -> Properties {
        Properties::new()
    }
}

/// A relationship between two components of a source graph.
pub trait SourceRelationship: Clone + Eq + Hash {
    type Component: SourceComponent;

    fn start(&self) -> Self::Component;

    fn end(&self) -> Self::Component;

    fn kind(&self) -> String;

    fn properties(&self) -> Properties {
        Properties::new()
    }
}

/// Read access to a source graph.
pub trait SourceGraph {
    type Component: SourceComponent;
    type Relationship: SourceRelationship<Component = Self::Component>;

    /// Every relationship with `component` as either endpoint.
    fn relationships(&self, component: &Self::Component) -> Vec<Self::Relationship>;
}

/// Which relationships the walk follows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Follow relationships at all. Without this only the roots are written.
    pub traverse: bool,
    /// Only follow relationships of this type.
    pub kind: Option<String>,
    pub incoming: bool,
    pub outgoing: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            traverse: true,
            kind: None,
            incoming: true,
            outgoing: true,
        }
    }
}

enum Item<C, R> {
    Component(C),
    Relationship(R),
}

struct Exporter<'a, G: SourceGraph> {
    graph: &'a G,
    options: &'a ExportOptions,
    queue: VecDeque<Item<G::Component, G::Relationship>>,
    queued_components: HashSet<G::Component>,
    queued_relationships: HashSet<G::Relationship>,
    components: BTreeMap<String, Value>,
    relationships: BTreeMap<String, Value>,
}

impl<'a, G: SourceGraph> Exporter<'a, G> {
    fn new(graph: &'a G, options: &'a ExportOptions) -> Self {
        Self {
            graph,
            options,
            queue: VecDeque::new(),
            queued_components: HashSet::new(),
            queued_relationships: HashSet::new(),
            components: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    fn queue_component(&mut self, component: G::Component) {
        if self.queued_components.insert(component.clone()) {
            self.queue.push_back(Item::Component(component));
        }
    }

    fn queue_relationship(&mut self, relationship: G::Relationship) {
        if self.queued_relationships.contains(&relationship) {
            return;
        }
        self.queue_component(relationship.start());
        self.queue_component(relationship.end());
        self.queued_relationships.insert(relationship.clone());
        self.queue.push_back(Item::Relationship(relationship));
    }

    fn follows(&self, component: &G::Component, relationship: &G::Relationship) -> bool {
        if self
            .options
            .kind
            .as_ref()
            .is_some_and(|kind| *kind != relationship.kind())
        {
            return false;
        }
        (self.options.outgoing && relationship.start() == *component)
            || (self.options.incoming && relationship.end() == *component)
    }

    fn export_component(&mut self, component: G::Component) -> SyncResult<()> {
        let key = component.path();
        if self.components.contains_key(&key) {
            return Err(SyncError::Export(format!("component id {key:?} is not unique")));
        }
        let mut data = Map::new();
        if let Some(label) = component.label() {
            data.insert("label".into(), Value::String(label));
        }
        data.insert("type".into(), Value::String(component.kind()));
        data.insert("properties".into(), json!(component.properties()));
        self.components.insert(key, Value::Object(data));

        if self.options.traverse {
            let mut deferred = Vec::new();
            for relationship in self.graph.relationships(&component) {
                if !self.follows(&component, &relationship) {
                    continue;
                }
                self.queue_component(relationship.start());
                self.queue_component(relationship.end());
                deferred.push(relationship);
            }
            // Relationships go after the neighbours to keep the walk
            // breadth-first.
            for relationship in deferred {
                self.queue_relationship(relationship);
            }
        }
        Ok(())
    }

    fn export_relationship(&mut self, relationship: G::Relationship) -> SyncResult<()> {
        let (start, end) = (relationship.start(), relationship.end());
        if start.root() != end.root() {
            warn!(
                start = %start.path(),
                end = %end.path(),
                "skipping cross-resource relationship"
            );
            return Ok(());
        }
        let kind = relationship.kind();
        let key = format!("{}:{}:{}", start.path(), kind, end.path());
        if self.relationships.contains_key(&key) {
            return Err(SyncError::Export(format!("relationship id {key:?} is not unique")));
        }
        self.relationships.insert(
            key,
            json!({
                "type": kind,
                "start": start.path(),
                "end": end.path(),
                "properties": relationship.properties(),
            }),
        );
        Ok(())
    }

    fn run(mut self, resource: ResourceRef) -> SyncResult<Snapshot> {
        while let Some(item) = self.queue.pop_front() {
            match item {
                Item::Component(c) => self.export_component(c)?,
                Item::Relationship(r) => self.export_relationship(r)?,
            }
        }
        debug!(
            components = self.components.len(),
            relationships = self.relationships.len(),
            "exported resource"
        );
        Ok(Snapshot {
            version: Some(Value::String(FORMAT_VERSION.into())),
            resource,
            components: self.components,
            relationships: self.relationships,
        })
    }
}

/// Walk `graph` from `roots` and write everything reached into a snapshot
/// of `resource`.
pub fn export_resource<G: SourceGraph>(
    graph: &G,
    resource: impl Into<ResourceRef>,
    roots: impl IntoIterator<Item = G::Component>,
    options: &ExportOptions,
) -> SyncResult<Snapshot> {
    let mut exporter = Exporter::new(graph, options);
    for root in roots {
        exporter.queue_component(root);
    }
    exporter.run(resource.into())
}
