//! Object storage for uploaded originals.
//!
//! [`ObjectStore`] is the seam the API and the extraction runner depend on.
//! Production uses Backblaze B2 through its S3-compatible API ([`B2Store`]);
//! development and tests use a directory on disk ([`LocalStore`]).

pub mod config;
pub mod error;
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::StorageConfig;
pub use error::StorageError;
pub use local::LocalStore;
pub use s3::B2Store;

/// Byte-oriented key/value object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] for a missing key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Build the store selected by `config`.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config {
        StorageConfig::B2(b2) => Ok(Arc::new(B2Store::new(b2))),
        StorageConfig::Local { root } => Ok(Arc::new(LocalStore::create(root).await?)),
    }
}

/// Reject keys that are empty, absolute, or climb out of the namespace.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}
