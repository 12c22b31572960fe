use origins_store::StoreError;
use origins_types::TypeError;

/// Errors produced by graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The request is malformed or would break a graph invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// No entity matches the given uuid or id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The entity exists but cannot take this operation, typically because
    /// it is no longer the latest revision.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
