use crate::error::StoreResult;
use crate::protocol::{BatchRequest, BatchResponse};

/// A response together with the transaction endpoint the store redirected
/// us to, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransportResponse {
    /// New transaction endpoint that subsequent batches must target.
    pub location: Option<String>,
    pub body: BatchResponse,
}

/// Moves statement batches to a graph store.
///
/// Implementations own timeouts and connection handling. Statement errors
/// are reported inside the response body, not as `Err`; an `Err` means the
/// request itself failed.
pub trait Transport: Send + Sync {
    /// Post a batch to `url`.
    fn post(&self, url: &str, request: &BatchRequest) -> StoreResult<TransportResponse>;

    /// Discard the open transaction at `url`.
    fn delete(&self, url: &str) -> StoreResult<()>;
}
