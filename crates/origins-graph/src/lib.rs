//! Versioned graph operations for Origins.
//!
//! Nodes and edges are never updated in place. Every change creates a new
//! revision with a fresh uuid and invalidates the previous one, and every
//! operation records a provenance bundle describing what it did.
//!
//! # Modules
//!
//! - [`nodes`] / [`edges`] -- add, set, remove, and read revisions
//! - [`cascade`] -- how edges follow or fall with their endpoints
//! - [`resources`], [`components`], [`relationships`] -- resource-managed
//!   sub-graphs
//! - [`collections`] -- named groups of resources
//! - [`trends`] -- ranked counts over the latest revisions
//! - [`provenance`] -- timelines, impact reports, and declared derivations
//!
//! Every operation takes an explicit [`Transaction`](origins_store::Transaction)
//! and runs inside a scope on it: called alone it commits, called inside an
//! outer scope it joins that scope and fails or succeeds with it.
//!
//! # Invariants
//!
//! 1. A uuid is assigned once and never reused.
//! 2. At most one revision per id is valid at a time.
//! 3. Edges are only stored between valid nodes.
//! 4. A `set` that changes nothing is refused unless forced.

mod access;
mod emit;
mod rows;

pub mod cascade;
pub mod collections;
pub mod components;
pub mod edges;
pub mod error;
pub mod nodes;
pub mod options;
pub mod provenance;
pub mod relationships;
pub mod resources;
pub mod trends;

pub use cascade::{plan_removal, plan_update, EdgeAction, Neighbourhood, RemovalPlan};
pub use edges::NewEdge;
pub use error::{GraphError, GraphResult};
pub use options::{Predicate, SetOptions};
pub use trends::{Ranked, TypeCount};
