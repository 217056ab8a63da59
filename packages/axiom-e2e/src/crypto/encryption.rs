//! # Metadata Encryption
//!
//! AES-256-GCM under a dedicated metadata key. Used for contact display
//! names, filenames and similar small fields, so metadata confidentiality
//! does not depend on the identity keys.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AES-256-GCM(                                                           │
//! │    key       = metadata key (32 bytes, persisted separately),          │
//! │    nonce     = random 12 bytes,                                        │
//! │    plaintext = metadata,                                               │
//! │    aad       = domain label                                            │
//! │  ) → ciphertext || 16-byte tag                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use super::{decode_key_32, to_base64};
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the metadata key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// Random nonces are safe for up to 2^32 messages per key
/// (birthday bound for 96-bit nonces).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from a slice that must be exactly `NONCE_SIZE` bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            Error::DecryptionFailed(format!("Nonce must be {} bytes", NONCE_SIZE))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// The dedicated AES-256-GCM key for metadata
///
/// Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct MetadataKey([u8; KEY_SIZE]);

impl MetadataKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Restore from the persisted base64 form
    pub fn from_base64(encoded: &str) -> Result<Self> {
        Ok(Self(decode_key_32(encoded)?))
    }

    /// Persisted base64 form
    pub fn to_base64(&self) -> zeroize::Zeroizing<String> {
        zeroize::Zeroizing::new(to_base64(&self.0))
    }
}

/// Encrypt with AES-256-GCM
///
/// Returns `(nonce, ciphertext_with_tag)`.
pub fn encrypt(key: &MetadataKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok((nonce, ciphertext))
}

/// Decrypt with AES-256-GCM
///
/// ## Errors
///
/// Returns `DecryptionFailed` if the ciphertext was tampered with, the AAD
/// doesn't match, or the key is wrong.
pub fn decrypt(key: &MetadataKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|_| Error::DecryptionFailed("authentication tag mismatch".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = MetadataKey::from_bytes([42u8; 32]);
        let (nonce, ciphertext) = encrypt(&key, b"Alice Liddell", b"meta").unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext, b"meta").unwrap();

        assert_eq!(decrypted, b"Alice Liddell");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = MetadataKey::from_bytes([42u8; 32]);
        let (nonce, mut ciphertext) = encrypt(&key, b"report.pdf", b"meta").unwrap();
        ciphertext[0] ^= 0xFF;

        assert!(decrypt(&key, &nonce, &ciphertext, b"meta").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = MetadataKey::from_bytes([42u8; 32]);
        let key2 = MetadataKey::from_bytes([99u8; 32]);
        let (nonce, ciphertext) = encrypt(&key1, b"report.pdf", b"meta").unwrap();

        assert!(decrypt(&key2, &nonce, &ciphertext, b"meta").is_err());
    }

    #[test]
    fn test_key_base64_round_trip() {
        let key = MetadataKey::generate();
        let restored = MetadataKey::from_base64(&key.to_base64()).unwrap();
        let (nonce, ct) = encrypt(&key, b"x", b"").unwrap();

        assert_eq!(decrypt(&restored, &nonce, &ct, b"").unwrap(), b"x");
    }

    #[test]
    fn test_nonce_from_slice_length() {
        assert!(Nonce::from_slice(&[0u8; 12]).is_ok());
        assert!(Nonce::from_slice(&[0u8; 11]).is_err());
    }
}
