use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Blob storage backend trait
///
/// Blobs are addressed by opaque names chosen by the caller; the backend
/// never interprets them.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Write a blob durably
    async fn put(&self, name: &str, data: Bytes) -> Result<()>;

    /// Read a blob
    async fn get(&self, name: &str) -> Result<Bytes>;

    /// Delete a blob. Deleting an absent blob is a no-op.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Check if a blob exists
    async fn exists(&self, name: &str) -> Result<bool>;
}
