use thiserror::Error;

use origins_graph::GraphError;
use origins_store::StoreError;

use crate::validate::FormatErrors;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid snapshot: {0}")]
    Format(#[from] FormatErrors),

    #[error("sync conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("malformed snapshot document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
