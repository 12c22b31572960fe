use crate::protocol::RemoteError;

/// Errors from talking to the graph store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the request failed in flight.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success HTTP status.
    #[error("store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The store reported statement errors; the transaction is aborted.
    #[error("store rejected statements: {}", format_remote(.0))]
    Remote(Vec<RemoteError>),

    /// Request or response could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A response row did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A nested scope failed and rolled the transaction back.
    #[error("transaction was rolled back by a nested scope")]
    Aborted,

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lock guarding in-memory state was poisoned.
    #[error("store state lock poisoned")]
    LockPoisoned,
}

fn format_remote(errors: &[RemoteError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
