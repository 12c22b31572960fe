//! Store layer of the Origins provenance graph.
//!
//! Everything the engine persists goes through parameterized statements
//! posted in batches to a transactional endpoint. This crate owns that
//! protocol and nothing above it.
//!
//! # Pieces
//!
//! - [`cypher`] -- the fixed statement templates and their builders
//! - [`protocol`] -- request and response wire types
//! - [`Transaction`] -- the explicit, reentrant transaction context
//! - [`Transport`] -- how batches move; [`HttpTransport`] for a remote
//!   store and [`MemoryStore`] for tests and embedding
//! - [`StoreConfig`] -- connection settings from TOML and the environment
//!
//! # Design Rules
//!
//! 1. Attribute values are always parameters, never spliced into text.
//! 2. A statement error aborts the whole transaction.
//! 3. Only the outermost scope commits.

pub mod config;
pub mod cypher;
pub mod error;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod transaction;
pub mod transport;

pub use config::StoreConfig;
pub use cypher::Query;
pub use error::{StoreError, StoreResult};
pub use http::HttpTransport;
pub use memory::MemoryStore;
pub use protocol::{BatchRequest, BatchResponse, RemoteError, Row, Statement, StatementResult};
pub use transaction::Transaction;
pub use transport::{Transport, TransportResponse};
