//! The transaction context every engine operation runs in.
//!
//! A [`Transaction`] is an explicit, caller-owned object rather than a
//! process-wide default, so independent graphs can coexist in one process.
//!
//! # Scoping
//!
//! [`Transaction::scope`] is reentrant. Entering a scope while another is
//! active joins it; only the outermost scope commits. An error at any depth
//! rolls back the whole transaction, and the outer scopes then fail with
//! [`StoreError::Aborted`] even if they swallowed the inner error.
//!
//! # Batching
//!
//! Statements are posted at most `max_batch_size` per request. Deferred
//! statements ride along with the next request or the commit. After the
//! first request the store hands back a transaction location which all
//! later requests target.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{BatchRequest, Statement, StatementResult};
use crate::transport::Transport;

pub struct Transaction {
    transport: Arc<dyn Transport>,
    begin_url: String,
    autocommit_url: String,
    max_batch_size: usize,
    location: Option<String>,
    commit_url: Option<String>,
    deferred: Vec<Statement>,
    depth: usize,
    aborted: bool,
    round_trips: usize,
}

impl Transaction {
    pub fn new(transport: Arc<dyn Transport>, config: &StoreConfig) -> Self {
        Self {
            transport,
            begin_url: config.begin_url(),
            autocommit_url: config.autocommit_url(),
            max_batch_size: config.max_batch_size.max(1),
            location: None,
            commit_url: None,
            deferred: Vec::new(),
            depth: 0,
            aborted: false,
            round_trips: 0,
        }
    }

    /// Returns `true` once the store has opened a transaction for us.
    pub fn is_open(&self) -> bool {
        self.location.is_some()
    }

    /// Current scope nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of deferred statements not yet sent.
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Total requests posted through this context.
    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Queue a statement whose result is not needed. It is sent with the
    /// next request or at commit.
    pub fn defer(&mut self, statement: Statement) {
        self.deferred.push(statement);
    }

    /// Send statements and return their results, in order.
    ///
    /// Deferred statements are flushed first; their results are dropped.
    pub fn send(&mut self, statements: Vec<Statement>) -> StoreResult<Vec<StatementResult>> {
        if self.aborted {
            return Err(StoreError::Aborted);
        }
        let skip = self.deferred.len();
        let mut all = std::mem::take(&mut self.deferred);
        all.extend(statements);

        let mut results = Vec::with_capacity(all.len());
        for chunk in all.chunks(self.max_batch_size) {
            let url = self.current_url();
            results.extend(self.post(&url, chunk)?);
        }
        Ok(results.split_off(skip.min(results.len())))
    }

    /// Send a single statement and return its result.
    pub fn execute(&mut self, statement: Statement) -> StoreResult<StatementResult> {
        self.send(vec![statement])?
            .pop()
            .ok_or_else(|| StoreError::UnexpectedResponse("missing statement result".into()))
    }

    /// Commit the open transaction, flushing deferred statements.
    ///
    /// With nothing open and nothing deferred this is a no-op.
    pub fn commit(&mut self) -> StoreResult<()> {
        if self.aborted {
            return Err(StoreError::Aborted);
        }
        let mut pending = std::mem::take(&mut self.deferred);
        if self.location.is_none() && pending.is_empty() {
            return Ok(());
        }
        while pending.len() > self.max_batch_size {
            let rest = pending.split_off(self.max_batch_size);
            let url = self.current_url();
            self.post(&url, &pending)?;
            pending = rest;
        }
        let url = match (&self.commit_url, &self.location) {
            (Some(commit), _) => commit.clone(),
            (None, Some(location)) => format!("{location}/commit"),
            (None, None) => self.autocommit_url.clone(),
        };
        self.post(&url, &pending)?;
        info!(round_trips = self.round_trips, "transaction committed");
        self.reset();
        Ok(())
    }

    /// Discard the transaction and any deferred statements.
    pub fn rollback(&mut self) -> StoreResult<()> {
        self.deferred.clear();
        let location = self.location.take();
        self.reset();
        if let Some(url) = location {
            warn!(url = %url, "rolling back transaction");
            self.transport.delete(&url)?;
        }
        Ok(())
    }

    /// Run `f` inside a (possibly nested) transaction scope.
    pub fn scope<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.depth += 1;
        let outcome = f(self);
        self.depth -= 1;

        match outcome {
            Ok(value) if self.depth == 0 => {
                if std::mem::take(&mut self.aborted) {
                    return Err(StoreError::Aborted.into());
                }
                self.commit()?;
                Ok(value)
            }
            Ok(value) => Ok(value),
            Err(err) => {
                if let Err(e) = self.rollback() {
                    warn!(error = %e, "rollback failed");
                }
                self.aborted = self.depth > 0;
                Err(err)
            }
        }
    }

    fn current_url(&self) -> String {
        self.location
            .clone()
            .unwrap_or_else(|| self.begin_url.clone())
    }

    fn post(&mut self, url: &str, statements: &[Statement]) -> StoreResult<Vec<StatementResult>> {
        let request = BatchRequest {
            statements: statements.to_vec(),
        };
        self.round_trips += 1;
        debug!(url, statements = statements.len(), "sending batch");

        let response = match self.transport.post(url, &request) {
            Ok(response) => response,
            Err(e) => {
                self.fail();
                if let Some(location) = self.location.take() {
                    if let Err(rb) = self.transport.delete(&location) {
                        warn!(error = %rb, "rollback after transport failure failed");
                    }
                }
                self.reset();
                return Err(e);
            }
        };

        if let Some(location) = response.location {
            self.location = Some(location);
        }
        if let Some(commit) = response.body.commit.clone() {
            self.commit_url = Some(commit);
        }

        match response.body.into_results() {
            Ok(results) if results.len() == statements.len() => Ok(results),
            Ok(results) => {
                self.fail();
                Err(StoreError::UnexpectedResponse(format!(
                    "sent {} statements, received {} results",
                    statements.len(),
                    results.len()
                )))
            }
            Err(e) => {
                // The store discards a transaction on statement errors.
                self.fail();
                self.location = None;
                self.reset();
                Err(e)
            }
        }
    }

    fn fail(&mut self) {
        self.deferred.clear();
        if self.depth > 0 {
            self.aborted = true;
        }
    }

    fn reset(&mut self) {
        self.location = None;
        self.commit_url = None;
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("location", &self.location)
            .field("depth", &self.depth)
            .field("pending", &self.deferred.len())
            .field("aborted", &self.aborted)
            .finish()
    }
}
