//! # Key Derivation Functions
//!
//! Derivations used only by the legacy scheme.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    LEGACY KEY DERIVATION                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Identity:                                                             │
//! │    master key (32 random bytes)                                        │
//! │        │                                                               │
//! │        ├──► SHA-256(domain::LEGACY_PRIVATE || master)  → private key   │
//! │        │                                                               │
//! │        └──► SHA-256(domain::LEGACY_PUBLIC || private)  → public key    │
//! │                                                                         │
//! │  Wrapping key for a session key:                                       │
//! │    PBKDF2-HMAC-SHA256(                                                 │
//! │      password   = legacy public key string,                            │
//! │      salt       = LEGACY_KDF_SALT (application-wide, fixed),           │
//! │      iterations = 10,000                                               │
//! │    ) → 32-byte AES-256 key                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The wrapping key depends only on a public string, so it offers no
//! confidentiality against anyone who has seen that string.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Fixed application-wide PBKDF2 salt for legacy wrapping keys
pub const LEGACY_KDF_SALT: &[u8] = b"axiom-e2e-legacy-salt-v1";

/// PBKDF2 iteration count for legacy wrapping keys
pub const LEGACY_KDF_ITERATIONS: u32 = 10_000;

/// Domain separation strings for legacy identity hashing
pub mod domain {
    /// Domain for the legacy private key
    pub const LEGACY_PRIVATE: &[u8] = b"axiom-legacy-private-v1";

    /// Domain for the legacy public key
    pub const LEGACY_PUBLIC: &[u8] = b"axiom-legacy-public-v1";
}

/// Derive the legacy `(private_key, public_key)` hex strings from a master key
pub fn derive_legacy_keys(master: &[u8; 32]) -> (Zeroizing<String>, String) {
    let mut hasher = Sha256::new();
    hasher.update(domain::LEGACY_PRIVATE);
    hasher.update(master);
    let private_key = Zeroizing::new(hex::encode(hasher.finalize()));

    let mut hasher = Sha256::new();
    hasher.update(domain::LEGACY_PUBLIC);
    hasher.update(private_key.as_bytes());
    let public_key = hex::encode(hasher.finalize());

    (private_key, public_key)
}

/// Derive the AES-256 key that wraps a legacy session key
///
/// Encryption derives it from the contact's public string, decryption from
/// the local public string.
pub fn derive_wrapping_key(public_key: &str) -> Result<Zeroizing<[u8; 32]>> {
    if public_key.is_empty() {
        return Err(Error::KeyDerivationFailed(
            "Legacy public key must not be empty".into(),
        ));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        public_key.as_bytes(),
        LEGACY_KDF_SALT,
        LEGACY_KDF_ITERATIONS,
        &mut key[..],
    );
    Ok(key)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys_deterministic() {
        let (priv1, pub1) = derive_legacy_keys(&[42u8; 32]);
        let (priv2, pub2) = derive_legacy_keys(&[42u8; 32]);

        assert_eq!(*priv1, *priv2);
        assert_eq!(pub1, pub2);
    }

    #[test]
    fn test_legacy_keys_different_masters() {
        let (_, pub1) = derive_legacy_keys(&[1u8; 32]);
        let (_, pub2) = derive_legacy_keys(&[2u8; 32]);

        assert_ne!(pub1, pub2);
    }

    #[test]
    fn test_wrapping_key_deterministic() {
        let k1 = derive_wrapping_key("contact-public").unwrap();
        let k2 = derive_wrapping_key("contact-public").unwrap();
        let k3 = derive_wrapping_key("other-public").unwrap();

        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
    }

    #[test]
    fn test_wrapping_key_rejects_empty() {
        assert!(derive_wrapping_key("").is_err());
    }
}
