//! Storage error type.

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Storage is not configured: {0}")]
    Config(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote backend failure (transport, auth, service error).
    #[error("Storage backend error: {0}")]
    Backend(String),
}
