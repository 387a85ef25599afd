use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Local file system storage backend
///
/// The base directory sits under the data directory, outside any served
/// static root.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        let full_path = self.full_path(name);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved blob to {:?}", full_path);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        let full_path = self.full_path(name);

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", name))
            } else {
                AppError::Storage(format!("Failed to read blob: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let full_path = self.full_path(name);

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete blob: {}", e))),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.full_path(name).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.put("blob-a", Bytes::from_static(b"hello")).await.unwrap();
        assert!(storage.exists("blob-a").await.unwrap());
        assert_eq!(storage.get("blob-a").await.unwrap(), Bytes::from_static(b"hello"));

        storage.delete("blob-a").await.unwrap();
        assert!(!storage.exists("blob-a").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_blob_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.get("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
