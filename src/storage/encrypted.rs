use aes_gcm::{
    aead::{Aead, OsRng},
    Aes256Gcm, KeyInit, Nonce,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::crypto::{FileKey, NONCE_SIZE};
use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Encrypting wrapper over a blob storage backend.
///
/// Every blob is sealed with AES-256-GCM under a caller-supplied per-file
/// key. Layout on the backend: random 96-bit nonce followed by ciphertext
/// (tag included). Blob names are freshly generated and carry nothing of
/// the user-supplied file name.
pub struct EncryptedStore {
    backend: Box<dyn StorageProvider>,
}

impl EncryptedStore {
    pub fn new(backend: Box<dyn StorageProvider>) -> Self {
        Self { backend }
    }

    /// Encrypt plaintext under `key` and persist it; returns the blob name
    pub async fn put(&self, plaintext: &[u8], key: &FileKey) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::Internal(format!("cipher init failed: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::Internal(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        let name = Uuid::new_v4().simple().to_string();
        self.backend.put(&name, Bytes::from(blob)).await?;

        Ok(name)
    }

    /// Read a blob and decrypt it under `key`
    ///
    /// Fails with a decryption error if the ciphertext was tampered with
    /// or the key does not match; altered plaintext is never returned.
    pub async fn get(&self, name: &str, key: &FileKey) -> Result<Bytes> {
        let blob = self.backend.get(name).await?;

        if blob.len() < NONCE_SIZE {
            return Err(AppError::Decryption(format!(
                "blob {} is truncated ({} bytes)",
                name,
                blob.len()
            )));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::Internal(format!("cipher init failed: {}", e)))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                AppError::Decryption(format!("integrity check failed for blob {}", name))
            })?;

        Ok(Bytes::from(plaintext))
    }

    /// Delete a blob. Idempotent; an absent blob is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.backend.delete(name).await
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &dyn StorageProvider {
        self.backend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;

    fn store(dir: &tempfile::TempDir) -> EncryptedStore {
        EncryptedStore::new(Box::new(LocalStorage::new(dir.path())))
    }

    #[tokio::test]
    async fn encrypt_decrypt_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = FileKey::generate();

        let name = store.put(b"attack at dawn", &key).await.unwrap();
        let plaintext = store.get(&name, &key).await.unwrap();
        assert_eq!(plaintext.as_ref(), b"attack at dawn");
    }

    #[tokio::test]
    async fn ciphertext_differs_from_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = FileKey::generate();

        let name = store.put(b"attack at dawn", &key).await.unwrap();
        let raw = store.backend().get(&name).await.unwrap();
        assert!(!raw
            .windows(b"attack at dawn".len())
            .any(|w| w == b"attack at dawn"));
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let name = store.put(b"secret", &FileKey::generate()).await.unwrap();
        let result = store.get(&name, &FileKey::generate()).await;
        assert!(matches!(result, Err(AppError::Decryption(_))));
    }

    #[tokio::test]
    async fn tampered_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = FileKey::generate();

        let name = store.put(b"untouched content", &key).await.unwrap();

        // Flip one byte anywhere in the stored blob; the tag must catch it
        let raw = store.backend().get(&name).await.unwrap();
        for pos in [0, NONCE_SIZE, raw.len() - 1] {
            let mut corrupted = raw.to_vec();
            corrupted[pos] ^= 0x01;
            store
                .backend()
                .put(&name, Bytes::from(corrupted))
                .await
                .unwrap();

            let result = store.get(&name, &key).await;
            assert!(matches!(result, Err(AppError::Decryption(_))), "byte {}", pos);
        }
    }

    #[tokio::test]
    async fn truncated_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = FileKey::generate();

        let name = store.put(b"short", &key).await.unwrap();
        store
            .backend()
            .put(&name, Bytes::from_static(b"tiny"))
            .await
            .unwrap();

        assert!(matches!(
            store.get(&name, &key).await,
            Err(AppError::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn blob_names_are_opaque_and_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = FileKey::generate();

        let a = store.put(b"same content", &key).await.unwrap();
        let b = store.put(b"same content", &key).await.unwrap();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
