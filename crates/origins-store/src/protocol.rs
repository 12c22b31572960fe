//! Wire types of the batched statement protocol.
//!
//! A batch is posted as `{"statements": [{"statement", "parameters"}, ...]}`
//! and answered with `{"results": [...], "errors": [...]}`. Any non-empty
//! `errors` list aborts the transaction on the store side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// One templated query plus its named parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub statement: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Statement {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    /// Add a named parameter.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// Request body for one round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub statements: Vec<Statement>,
}

/// One row of a statement result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row: Vec<Value>,
}

/// Result of a single statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Row>,
}

impl StatementResult {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.data.push(Row { row });
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Iterate over the raw rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.data.iter().map(|r| r.row.as_slice())
    }

    /// Values of the first column.
    pub fn first_column(&self) -> impl Iterator<Item = &Value> {
        self.data.iter().filter_map(|r| r.row.first())
    }

    /// The single value of a single-row, single-column result.
    pub fn scalar(&self) -> StoreResult<&Value> {
        self.first_column()
            .next()
            .ok_or_else(|| StoreError::UnexpectedResponse("expected one row, found none".into()))
    }
}

/// An error reported by the store for a statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Response body for one round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<RemoteError>,
    /// Commit endpoint of an open transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl BatchResponse {
    /// Convert a response carrying errors into a `StoreError::Remote`.
    pub fn into_results(self) -> StoreResult<Vec<StatementResult>> {
        if self.errors.is_empty() {
            Ok(self.results)
        } else {
            Err(StoreError::Remote(self.errors))
        }
    }
}
