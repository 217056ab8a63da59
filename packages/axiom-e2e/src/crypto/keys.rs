//! # Key Management
//!
//! Identity key generation for the two coexisting schemes.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  BoxKeyPair (X25519 / Curve25519)                               │   │
//! │  │  ────────────────────────────────                                │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Sealing messages and files with crypto_box                   │   │
//! │  │  • Opening boxes from contacts                                  │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Secret key: 32 bytes (zeroized on drop)                     │   │
//! │  │  • Public key: 32 bytes, shared as base64                      │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  LegacyIdentityKeyPair (hash-derived strings)                   │   │
//! │  │  ────────────────────────────────────────────                    │   │
//! │  │                                                                  │   │
//! │  │  master key (random) ──► private key ──► public key            │   │
//! │  │                                                                  │   │
//! │  │  Only the public string is ever used by the legacy channel.     │   │
//! │  │  Provides no public-key security. Compatibility only.           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{decode_key_32, kdf, to_base64};
use crate::error::{Error, Result};
use crate::logging::{Redacted, RedactedKey};

/// Size of box keys in bytes
pub const BOX_KEY_SIZE: usize = 32;

/// X25519 key pair used with `crypto_box`
#[derive(ZeroizeOnDrop)]
pub struct BoxKeyPair {
    /// Private key (secret)
    #[zeroize(skip)] // x25519_dalek handles its own zeroization
    secret: StaticSecret,
    /// Public key (derived from secret)
    #[zeroize(skip)]
    public: X25519PublicKey,
}

impl BoxKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Create from raw secret bytes
    pub fn from_secret_bytes(bytes: [u8; BOX_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Restore a persisted pair, checking the public half matches the secret
    pub fn from_base64(public_key: &str, secret_key: &str) -> Result<Self> {
        let mut secret = decode_key_32(secret_key)?;
        let pair = Self::from_secret_bytes(secret);
        secret.zeroize();

        if pair.public_base64() != public_key {
            return Err(Error::InvalidKey(
                "Stored public key does not match secret key".into(),
            ));
        }
        Ok(pair)
    }

    /// Get the secret key bytes (for sealing and storage)
    ///
    /// ## Security Warning
    ///
    /// Only use this for secure storage or crypto calls. Never log these bytes.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; BOX_KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; BOX_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Public key as base64, the form exchanged with contacts
    pub fn public_base64(&self) -> String {
        to_base64(self.public.as_bytes())
    }

    /// Secret key as base64, for persistence only
    pub fn secret_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(to_base64(&self.secret_bytes()[..]))
    }
}

impl fmt::Debug for BoxKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxKeyPair")
            .field("public", &RedactedKey(&self.public_base64()))
            .field("secret", &Redacted(()))
            .finish()
    }
}

/// Hash-derived key pair kept for peers still on the "1.0" envelope format
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyIdentityKeyPair {
    /// Hex string shared with contacts; input to the legacy wrapping KDF
    pub public_key: String,
    /// Hex string derived from the master key
    pub private_key: String,
    /// Hex-encoded random seed everything else derives from
    pub master_key: String,
}

impl LegacyIdentityKeyPair {
    /// Generate from a fresh random master key
    pub fn generate() -> Self {
        let mut master = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut master[..]);
        Self::from_master_key(&master)
    }

    /// Derive the full pair from a master key
    pub fn from_master_key(master: &[u8; 32]) -> Self {
        let (private_key, public_key) = kdf::derive_legacy_keys(master);
        Self {
            public_key,
            private_key: (*private_key).clone(),
            master_key: hex::encode(master),
        }
    }

    /// Check the stored strings are consistent with the master key
    pub fn validate(&self) -> Result<()> {
        let master = Zeroizing::new(
            hex::decode(&self.master_key)
                .map_err(|_| Error::InvalidKey("Legacy master key is not hex".into()))?,
        );
        let master: [u8; 32] = master
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidKey("Legacy master key must be 32 bytes".into()))?;
        let (private_key, public_key) = kdf::derive_legacy_keys(&master);
        if *private_key != self.private_key || public_key != self.public_key {
            return Err(Error::InvalidKey("Legacy key pair is inconsistent".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for LegacyIdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyIdentityKeyPair")
            .field("public_key", &RedactedKey(&self.public_key))
            .field("private_key", &Redacted(&self.private_key))
            .field("master_key", &Redacted(&self.master_key))
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
