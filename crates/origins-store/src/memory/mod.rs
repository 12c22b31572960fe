//! In-process graph store speaking the transactional endpoint protocol.
//!
//! [`MemoryStore`] implements [`Transport`], so a [`Transaction`] drives it
//! exactly as it would drive a remote store: the first post opens a
//! transaction and redirects to its location, later posts continue it, a
//! post to `…/commit` publishes its working copy and a delete discards it.
//! Each open transaction works on its own copy of the committed graph.

mod exec;
mod graph;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{BatchRequest, BatchResponse, RemoteError};
use crate::transaction::Transaction;
use crate::transport::{Transport, TransportResponse};

use self::graph::GraphState;

const DEFAULT_BASE: &str = "memory://origins/";

#[derive(Default)]
struct MemoryState {
    committed: GraphState,
    open: HashMap<u64, GraphState>,
    next_id: u64,
}

/// Where a posted URL points.
#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    Begin,
    Autocommit,
    Continue(u64),
    Commit(u64),
}

/// In-memory graph store.
///
/// Intended for tests and embedding. State lives behind a `RwLock`;
/// committed data is visible to every transaction opened afterwards.
pub struct MemoryStore {
    base: String,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store rooted at `memory://origins/`.
    pub fn new() -> Self {
        Self::with_base(DEFAULT_BASE)
    }

    /// Create an empty store answering under `base`.
    pub fn with_base(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            base,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// A config whose endpoints resolve to this store.
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            uri: self.base.clone(),
            ..Default::default()
        }
    }

    /// A fresh transaction context bound to `store`.
    pub fn transaction(store: &Arc<Self>) -> Transaction {
        Transaction::new(store.clone(), &store.config())
    }

    /// Number of committed entities, including invalidated revisions.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.committed.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of transactions currently open.
    pub fn open_transactions(&self) -> StoreResult<usize> {
        Ok(self.read()?.open.len())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn transaction_url(&self, id: u64) -> String {
        format!("{}transaction/{id}", self.base)
    }

    fn endpoint(&self, url: &str) -> StoreResult<Endpoint> {
        let rest = url
            .strip_prefix(self.base.as_str())
            .and_then(|r| r.strip_prefix("transaction"))
            .ok_or_else(|| StoreError::Http {
                status: 404,
                body: format!("no endpoint at {url}"),
            })?;
        let parse = |id: &str| {
            id.parse::<u64>().map_err(|_| StoreError::Http {
                status: 404,
                body: format!("no endpoint at {url}"),
            })
        };
        match rest.trim_start_matches('/') {
            "" => Ok(Endpoint::Begin),
            "commit" => Ok(Endpoint::Autocommit),
            path => match path.split_once('/') {
                Some((id, "commit")) => Ok(Endpoint::Commit(parse(id)?)),
                Some(_) => Err(StoreError::Http {
                    status: 404,
                    body: format!("no endpoint at {url}"),
                }),
                None => Ok(Endpoint::Continue(parse(path)?)),
            },
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("base", &self.base).finish()
    }
}

/// Run every statement, stopping at the first error.
fn run(graph: &mut GraphState, request: &BatchRequest) -> BatchResponse {
    let mut response = BatchResponse::default();
    for stmt in &request.statements {
        match exec::execute(graph, stmt) {
            Ok(result) => response.results.push(result),
            Err(e) => {
                response.errors.push(e);
                break;
            }
        }
    }
    response
}

fn not_found(id: u64) -> BatchResponse {
    BatchResponse {
        errors: vec![RemoteError::new(
            "Neo.ClientError.Transaction.TransactionNotFound",
            format!("unrecognised transaction id {id}"),
        )],
        ..Default::default()
    }
}

impl Transport for MemoryStore {
    fn post(&self, url: &str, request: &BatchRequest) -> StoreResult<TransportResponse> {
        let endpoint = self.endpoint(url)?;
        debug!(?endpoint, statements = request.statements.len(), "memory store batch");
        let mut state = self.write()?;

        match endpoint {
            Endpoint::Autocommit => {
                let mut working = state.committed.clone();
                let body = run(&mut working, request);
                if body.errors.is_empty() {
                    state.committed = working;
                }
                Ok(TransportResponse {
                    location: None,
                    body,
                })
            }
            Endpoint::Begin => {
                let mut working = state.committed.clone();
                let mut body = run(&mut working, request);
                if !body.errors.is_empty() {
                    return Ok(TransportResponse {
                        location: None,
                        body,
                    });
                }
                let id = state.next_id;
                state.next_id += 1;
                state.open.insert(id, working);
                let location = self.transaction_url(id);
                body.commit = Some(format!("{location}/commit"));
                Ok(TransportResponse {
                    location: Some(location),
                    body,
                })
            }
            Endpoint::Continue(id) => {
                let Some(working) = state.open.get_mut(&id) else {
                    return Ok(TransportResponse {
                        location: None,
                        body: not_found(id),
                    });
                };
                let mut body = run(working, request);
                if body.errors.is_empty() {
                    body.commit = Some(format!("{}/commit", self.transaction_url(id)));
                } else {
                    state.open.remove(&id);
                }
                Ok(TransportResponse {
                    location: None,
                    body,
                })
            }
            Endpoint::Commit(id) => {
                let Some(mut working) = state.open.remove(&id) else {
                    return Ok(TransportResponse {
                        location: None,
                        body: not_found(id),
                    });
                };
                let body = run(&mut working, request);
                if body.errors.is_empty() {
                    state.committed = working;
                    info!(transaction = id, entities = state.committed.len(), "memory store committed");
                }
                Ok(TransportResponse {
                    location: None,
                    body,
                })
            }
        }
    }

    fn delete(&self, url: &str) -> StoreResult<()> {
        match self.endpoint(url)? {
            Endpoint::Continue(id) => {
                self.write()?.open.remove(&id);
                debug!(transaction = id, "memory store rolled back");
                Ok(())
            }
            _ => Err(StoreError::Http {
                status: 405,
                body: format!("cannot delete {url}"),
            }),
        }
    }
}
