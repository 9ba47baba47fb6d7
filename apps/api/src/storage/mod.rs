//! Blob storage for per-user files, plus the error type shared by every backing store.
//!
//! `AppState` carries an `Arc<dyn BlobStore>`: S3 (or MinIO) in production,
//! `MemoryBlobStore` in tests.

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure of a backing service (Postgres, Redis, S3).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(format!("postgres: {e}"))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(format!("redis: {e}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Returns `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// All objects whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, StoreError>;

    /// Removes one object. Returns `false` when it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Deletes every object under `prefix` and returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;
}
