//! # Cryptography Module
//!
//! Stateless primitives used by the E2E core. Nothing in here touches
//! storage or holds state between calls.
//!
//! ## Schemes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SEALED CHANNELS                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Sodium channel ("sodium-1")                      [preferred]   │   │
//! │  │  ─────────────────────────────                                   │   │
//! │  │                                                                 │   │
//! │  │  crypto_box: X25519 + XSalsa20-Poly1305                        │   │
//! │  │  • sender secret key + recipient public key                    │   │
//! │  │  • 24-byte random nonce per message                            │   │
//! │  │  • 16-byte Poly1305 tag, fails closed on tamper                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Legacy channel ("1.0")                          [deprecated]   │   │
//! │  │  ──────────────────────                                          │   │
//! │  │                                                                 │   │
//! │  │  random session key ──► AES-256-CBC/PKCS7(payload, iv)         │   │
//! │  │  PBKDF2(contact "public key") ──► AES-256-CBC(session key, iv) │   │
//! │  │                                                                 │   │
//! │  │  Anyone who knows the contact's public string can derive the   │   │
//! │  │  wrapping key. Kept for wire compatibility only.               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Metadata seal                                                  │   │
//! │  │  ─────────────                                                   │   │
//! │  │                                                                 │   │
//! │  │  AES-256-GCM under a dedicated metadata key                    │   │
//! │  │  (independent from identity keys)                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: secret keys and session keys are zeroized on drop
//! 2. **Secure Random**: `rand::rngs::OsRng` for every key, nonce and IV
//! 3. **No Nonce Reuse**: a fresh nonce/IV is drawn for every seal

mod encryption;
mod fingerprint;
mod kdf;
mod keys;
pub mod legacy;
pub mod sodium;

pub use encryption::{decrypt, encrypt, MetadataKey, Nonce, KEY_SIZE, NONCE_SIZE};
pub use fingerprint::{generate_fingerprint, key_fingerprint};
pub use kdf::{derive_legacy_keys, derive_wrapping_key, LEGACY_KDF_ITERATIONS, LEGACY_KDF_SALT};
pub use keys::{BoxKeyPair, LegacyIdentityKeyPair, BOX_KEY_SIZE};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Encode bytes as standard (padded) base64, the encoding used on the wire
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn from_base64(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded)?)
}

/// Decode a base64 string that must hold exactly 32 bytes of key material
pub fn decode_key_32(encoded: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::InvalidKey(format!("Invalid base64 key: {}", e)))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::InvalidKey(format!("Key must be 32 bytes, got {}", v.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_32() {
        let encoded = to_base64(&[7u8; 32]);
        assert_eq!(decode_key_32(&encoded).unwrap(), [7u8; 32]);
    }

    #[test]
    fn test_decode_key_wrong_length() {
        let encoded = to_base64(&[7u8; 31]);
        assert!(matches!(decode_key_32(&encoded), Err(Error::InvalidKey(_))));
        assert!(matches!(decode_key_32("not base64!"), Err(Error::InvalidKey(_))));
    }
}
