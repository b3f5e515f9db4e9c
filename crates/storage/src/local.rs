//! Filesystem-backed store for development and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::{validate_key, ObjectStore};

/// Stores each object as a file under `root`, mirroring the key path.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create the root directory if needed.
    pub async fn create(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "Local object store ready");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never see a partial file.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(dir.path()).await.unwrap();
        let key = "extractions/job-1/grades.pdf";

        store.put(key, b"%PDF-1.7".to_vec(), "application/pdf").await.unwrap();
        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), b"%PDF-1.7");

        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(dir.path()).await.unwrap();
        assert_matches!(store.get("nope.pdf").await, Err(StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(dir.path()).await.unwrap();
        store.put("a.txt", b"one".to_vec(), "text/plain").await.unwrap();
        store.put("a.txt", b"two".to_vec(), "text/plain").await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(dir.path().join("root")).await.unwrap();
        assert_matches!(
            store.put("../escape.txt", vec![1], "text/plain").await,
            Err(StorageError::InvalidKey(_))
        );
    }
}
