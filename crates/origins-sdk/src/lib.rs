//! High-level SDK for Origins.
//!
//! [`Origins`] owns a store transaction and exposes the graph, sync, and
//! provenance operations as methods. This is the main entry point for
//! applications embedding Origins.

pub mod error;
pub mod origins;

pub use error::{OriginsError, OriginsResult};
pub use origins::Origins;

// Re-export key types
pub use origins_graph::{NewEdge, Predicate, Ranked, SetOptions, TypeCount};
pub use origins_prov::{Bundle, DerivationKind, Impact, Timeline};
pub use origins_store::{MemoryStore, StoreConfig, Transaction};
pub use origins_sync::{Snapshot, SyncOptions, SyncReport};
pub use origins_types::{
    Attributes, Changes, Dependence, Direction, Edge, Node, Reason, RevisionId, Versioned,
};
