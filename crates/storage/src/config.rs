//! Storage configuration loaded from the environment.

use std::path::PathBuf;

use crate::error::StorageError;

const DEFAULT_B2_REGION: &str = "us-west-004";

/// Backblaze B2 S3-compatible endpoint settings.
#[derive(Debug, Clone)]
pub struct B2Config {
    /// e.g. `https://s3.us-west-004.backblazeb2.com`
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub key_id: String,
    pub application_key: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    B2(B2Config),
    Local { root: PathBuf },
}

impl StorageConfig {
    /// Load from the environment.
    ///
    /// `B2_BUCKET` selects B2 and then requires `B2_ENDPOINT`, `B2_KEY_ID`,
    /// and `B2_APPLICATION_KEY` (`B2_REGION` defaults to `us-west-004`).
    /// Otherwise files go under `STORAGE_LOCAL_DIR` (default `./storage`).
    pub fn from_env() -> Result<Self, StorageError> {
        let Some(bucket) = std::env::var("B2_BUCKET").ok().filter(|b| !b.is_empty()) else {
            let root = std::env::var("STORAGE_LOCAL_DIR").unwrap_or_else(|_| "./storage".into());
            return Ok(Self::Local { root: root.into() });
        };
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::Config(format!("{name} must be set when B2_BUCKET is")))
        };
        Ok(Self::B2(B2Config {
            endpoint: required("B2_ENDPOINT")?,
            region: std::env::var("B2_REGION").unwrap_or_else(|_| DEFAULT_B2_REGION.into()),
            bucket,
            key_id: required("B2_KEY_ID")?,
            application_key: required("B2_APPLICATION_KEY")?,
        }))
    }
}
