//! # Object Storage
//!
//! Screenshot blobs live in two buckets, one for originals and one for blurred
//! copies. Production uses an S3-compatible endpoint (Cloudflare R2); local
//! runs and tests use the in-memory backend.

pub mod memory;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

/// Cache header stored with every uploaded image
pub const CACHE_CONTROL: &str = "public, max-age=31536000";
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    NotConfigured(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] opendal::Error),
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Which of the two buckets an object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Original,
    Blurred,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Deleting a missing object is not an error
    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError>;
}

/// Build the backend selected by `STORAGE_BACKEND`
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        "s3" => Ok(Arc::new(S3Storage::from_config(config)?)),
        other => Err(StorageError::NotConfigured(format!(
            "unknown storage backend '{other}'"
        ))),
    }
}

/// `users/{user}/{YYYY-MM-DD}/{ms}-{rand}.jpg`
pub fn screenshot_key(user_id: Uuid, at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!(
        "users/{}/{}/{}-{}.jpg",
        user_id,
        at.format("%Y-%m-%d"),
        at.timestamp_millis(),
        suffix
    )
}

/// Key of the blurred copy of `key`
pub fn blurred_key(key: &str) -> String {
    match key.strip_suffix(".jpg") {
        Some(stem) => format!("{stem}_blurred.jpg"),
        None => format!("{key}_blurred.jpg"),
    }
}

/// Public URL of an object when a CDN base is configured
pub fn public_url(config: &StorageConfig, key: &str) -> Option<String> {
    config
        .public_url
        .as_deref()
        .map(|base| format!("{}/{}", base.trim_end_matches('/'), key))
}
