use base64::Engine;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AppError, Result};

/// Size of a file encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Symmetric key encrypting exactly one file's content.
///
/// A fresh key is generated per upload and lives only in the file's
/// registry row, in encoded form. It is never logged and never leaves
/// the encrypt/decrypt path.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    key: [u8; KEY_SIZE],
}

impl FileKey {
    /// Generate a new random key from the OS entropy source
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(AppError::Decryption(format!(
                "key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Encode for storage in a file record
    pub fn encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.key)
    }

    /// Decode a key previously produced by [`FileKey::encoded`]
    pub fn from_encoded(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| AppError::Decryption(format!("malformed stored key: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material must never end up in logs
        write!(f, "FileKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_distinct() {
        let a = FileKey::generate();
        let b = FileKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.encoded(), b.encoded());
    }

    #[test]
    fn encoded_round_trip() {
        let key = FileKey::generate();
        let parsed = FileKey::from_encoded(&key.encoded()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(FileKey::from_bytes(&[0u8; 16]).is_err());
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(FileKey::from_encoded(&short).is_err());
    }

    #[test]
    fn rejects_garbage_encoding() {
        assert!(FileKey::from_encoded("not base64!!!").is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = FileKey::generate();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains(&key.encoded()));
    }
}
