use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("data layer not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("record '{0}' not found")]
    NotFound(String),

    #[error("store failure: {0}")]
    Store(#[from] StoreFailure),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// A failure reported by the backing store. Clone so it can be fanned
/// out to subscribers; it is reported once per occurrence, never
/// silently swallowed, and never retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFailure {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("backing store rejected the operation: {0}")]
    Rejected(String),
}
