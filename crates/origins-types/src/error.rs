/// Errors arising from constructing or decoding core Origins types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),

    #[error("invalid dependence: {0:?}")]
    InvalidDependence(String),

    #[error("invalid model: {0:?}")]
    InvalidModel(String),

    #[error("invalid uuid {value:?}: {reason}")]
    InvalidUuid { value: String, reason: String },

    #[error("missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("invalid attribute {key}: {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;
