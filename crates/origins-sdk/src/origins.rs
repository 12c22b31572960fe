use std::sync::Arc;

use tracing::info;

use origins_graph::{
    collections, components, edges, nodes, provenance, relationships, resources, trends, NewEdge,
    Predicate, Ranked, SetOptions, TypeCount,
};
use origins_prov::{Bundle, DerivationKind, Impact, Timeline};
use origins_store::{HttpTransport, MemoryStore, StoreConfig, Transaction, Transport};
use origins_sync::{Snapshot, SyncOptions, SyncReport};
use origins_types::{Attributes, Changes, Edge, Node, Reason, RevisionId};

use crate::error::OriginsResult;

/// High-level Origins API.
///
/// Every method runs in its own outermost scope and commits on success.
/// Use [`Origins::transaction`] to group several operations atomically.
pub struct Origins {
    tx: Transaction,
    config: StoreConfig,
}

impl Origins {
    /// Connect to a graph store over HTTP.
    pub fn connect(config: StoreConfig) -> OriginsResult<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        info!(uri = %config.uri, "connected to graph store");
        Ok(Self::with_transport(transport, config))
    }

    /// A fresh, empty in-memory store. Nothing outlives the handle.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = store.config();
        Self::with_transport(store, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: StoreConfig) -> Self {
        let tx = Transaction::new(transport, &config);
        Self { tx, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run `f` as one atomic unit. Operations called on the transaction
    /// inside `f` join its scope; an error anywhere rolls all of them back.
    pub fn transaction<T, F>(&mut self, f: F) -> OriginsResult<T>
    where
        F: FnOnce(&mut Transaction) -> OriginsResult<T>,
    {
        self.tx.scope(f)
    }

    // ---- Nodes ----

    pub fn add_node(&mut self, attrs: Attributes) -> OriginsResult<Node> {
        Ok(nodes::add(&mut self.tx, attrs)?)
    }

    pub fn node(&mut self, uuid: RevisionId) -> OriginsResult<Option<Node>> {
        Ok(nodes::get(&mut self.tx, uuid)?)
    }

    pub fn node_by_id(&mut self, id: &str) -> OriginsResult<Option<Node>> {
        Ok(nodes::get_by_id(&mut self.tx, id)?)
    }

    pub fn nodes(&mut self, predicate: &Predicate) -> OriginsResult<Vec<Node>> {
        Ok(nodes::matching(&mut self.tx, predicate)?)
    }

    pub fn node_revisions(&mut self, id: &str) -> OriginsResult<Vec<Node>> {
        Ok(nodes::revisions(&mut self.tx, id)?)
    }

    pub fn set_node(
        &mut self,
        uuid: RevisionId,
        changes: &Changes,
        options: SetOptions,
    ) -> OriginsResult<Option<Node>> {
        Ok(nodes::set(&mut self.tx, uuid, changes, options)?)
    }

    pub fn remove_node(&mut self, uuid: RevisionId, reason: Reason) -> OriginsResult<Node> {
        Ok(nodes::remove(&mut self.tx, uuid, reason)?)
    }

    // ---- Edges ----

    pub fn add_edge(&mut self, new: NewEdge) -> OriginsResult<Edge> {
        Ok(edges::add(&mut self.tx, new)?)
    }

    pub fn edge(&mut self, uuid: RevisionId) -> OriginsResult<Option<Edge>> {
        Ok(edges::get(&mut self.tx, uuid)?)
    }

    pub fn edge_by_id(&mut self, id: &str) -> OriginsResult<Option<Edge>> {
        Ok(edges::get_by_id(&mut self.tx, id)?)
    }

    pub fn edges(&mut self, predicate: &Predicate) -> OriginsResult<Vec<Edge>> {
        Ok(edges::matching(&mut self.tx, predicate)?)
    }

    pub fn set_edge(
        &mut self,
        uuid: RevisionId,
        changes: &Changes,
        options: SetOptions,
    ) -> OriginsResult<Option<Edge>> {
        Ok(edges::set(&mut self.tx, uuid, changes, options)?)
    }

    pub fn remove_edge(&mut self, uuid: RevisionId, reason: Reason) -> OriginsResult<Edge> {
        Ok(edges::remove(&mut self.tx, uuid, reason)?)
    }

    // ---- Resources ----

    pub fn create_resource(&mut self, attrs: Attributes) -> OriginsResult<Node> {
        Ok(resources::create(&mut self.tx, attrs)?)
    }

    pub fn resource(&mut self, id: &str) -> OriginsResult<Option<Node>> {
        Ok(resources::get_by_id(&mut self.tx, id)?)
    }

    pub fn resource_of(&mut self, uuid: RevisionId) -> OriginsResult<Option<Node>> {
        Ok(resources::resource_of(&mut self.tx, uuid)?)
    }

    pub fn add_component(&mut self, resource: &str, attrs: Attributes) -> OriginsResult<Node> {
        Ok(components::add(&mut self.tx, resource, attrs)?)
    }

    pub fn add_relationship(&mut self, resource: &str, new: NewEdge) -> OriginsResult<Edge> {
        Ok(relationships::add(&mut self.tx, resource, new)?)
    }

    pub fn components(&mut self, resource: &str, managed_only: bool) -> OriginsResult<Vec<Node>> {
        Ok(resources::components(&mut self.tx, resource, managed_only)?)
    }

    pub fn relationships(&mut self, resource: &str, managed_only: bool) -> OriginsResult<Vec<Edge>> {
        Ok(resources::relationships(&mut self.tx, resource, managed_only)?)
    }

    pub fn remove_resource(&mut self, id: &str, reason: Reason) -> OriginsResult<Node> {
        Ok(resources::remove(&mut self.tx, id, reason)?)
    }

    // ---- Collections ----

    pub fn create_collection(&mut self, attrs: Attributes) -> OriginsResult<Node> {
        Ok(collections::create(&mut self.tx, attrs)?)
    }

    pub fn collection(&mut self, id: &str) -> OriginsResult<Option<Node>> {
        Ok(collections::get_by_id(&mut self.tx, id)?)
    }

    pub fn add_to_collection(&mut self, collection: &str, resource: &str) -> OriginsResult<()> {
        Ok(collections::add_resource(&mut self.tx, collection, resource)?)
    }

    pub fn collection_resources(
        &mut self,
        collection: &str,
        predicate: &Predicate,
    ) -> OriginsResult<Vec<Node>> {
        Ok(collections::resources(&mut self.tx, collection, predicate)?)
    }

    pub fn remove_collection(&mut self, id: &str, reason: Reason) -> OriginsResult<Node> {
        Ok(collections::remove(&mut self.tx, id, reason)?)
    }

    // ---- Trends ----

    pub fn connected_components(&mut self, limit: usize) -> OriginsResult<Vec<Ranked<Node>>> {
        Ok(trends::connected_components(&mut self.tx, limit)?)
    }

    pub fn used_components(&mut self, limit: usize) -> OriginsResult<Vec<Ranked<Node>>> {
        Ok(trends::used_components(&mut self.tx, limit)?)
    }

    pub fn connected_resources(&mut self, limit: usize) -> OriginsResult<Vec<Ranked<Node>>> {
        Ok(trends::connected_resources(&mut self.tx, limit)?)
    }

    pub fn used_resources(&mut self, limit: usize) -> OriginsResult<Vec<Ranked<Node>>> {
        Ok(trends::used_resources(&mut self.tx, limit)?)
    }

    pub fn component_sources(&mut self, limit: usize) -> OriginsResult<Vec<Ranked<Node>>> {
        Ok(trends::component_sources(&mut self.tx, limit)?)
    }

    pub fn common_relationships(&mut self, limit: usize) -> OriginsResult<Vec<TypeCount>> {
        Ok(trends::common_relationships(&mut self.tx, limit)?)
    }

    // ---- Sync ----

    pub fn sync(&mut self, snapshot: &Snapshot, options: SyncOptions) -> OriginsResult<SyncReport> {
        Ok(origins_sync::sync(&mut self.tx, snapshot, options)?)
    }

    // ---- Provenance ----

    pub fn timeline(&mut self, id: &str) -> OriginsResult<Timeline> {
        Ok(provenance::timeline(&mut self.tx, id)?)
    }

    pub fn impact(&mut self, origin: RevisionId) -> OriginsResult<Impact> {
        Ok(provenance::impact(&mut self.tx, origin)?)
    }

    /// Declare that `generated` was derived from `used`.
    pub fn derive(
        &mut self,
        generated: RevisionId,
        used: RevisionId,
        kind: DerivationKind,
    ) -> OriginsResult<Bundle> {
        Ok(provenance::derive(&mut self.tx, generated, used, kind)?)
    }
}

impl std::fmt::Debug for Origins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origins")
            .field("uri", &self.config.uri)
            .field("transaction", &self.tx)
            .finish()
    }
}
