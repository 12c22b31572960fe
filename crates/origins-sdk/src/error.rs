use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriginsError {
    #[error("graph error: {0}")]
    Graph(#[from] origins_graph::GraphError),

    #[error("sync error: {0}")]
    Sync(#[from] origins_sync::SyncError),

    #[error("store error: {0}")]
    Store(#[from] origins_store::StoreError),
}

pub type OriginsResult<T> = Result<T, OriginsError>;
