//! # Identity Module
//!
//! The device's cryptographic identity: the single owner of private key
//! material.
//!
//! ## Identity Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        IDENTITY LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  initialize()                                                          │
//! │  ────────────                                                           │
//! │                                                                         │
//! │   StorageChain::load("axiom_e2e_keys")                                 │
//! │          │                                                              │
//! │          ├── found, parses ──────────► keys restored                   │
//! │          │                                                              │
//! │          └── absent / corrupt ──► generate BoxKeyPair                  │
//! │                                   generate LegacyIdentityKeyPair       │
//! │                                   persist both ──► keys ready          │
//! │                                                                         │
//! │  rotate_keys()                                                         │
//! │  ─────────────                                                          │
//! │                                                                         │
//! │   generate fresh pairs ──► persist ──► swap in memory                  │
//! │                                                                         │
//! │   Destructive. The old keys are discarded, not archived. Contacts      │
//! │   must re-run key exchange before they can talk to us again.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Shape
//!
//! ```text
//! {
//!   "publicKey": "base64...",     // X25519 public key
//!   "secretKey": "base64...",     // X25519 secret key
//!   "legacy": {
//!     "publicKey": "hex...",
//!     "privateKey": "hex...",
//!     "masterKey": "hex..."
//!   }
//! }
//! ```
//!
//! The same document is written to whichever storage hop accepts it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{BoxKeyPair, LegacyIdentityKeyPair};
use crate::error::{Error, Result};
use crate::logging::RedactedKey;
use crate::storage::StorageChain;

/// Both identity key pairs of this device
#[derive(Debug)]
pub struct IdentityKeys {
    /// Modern crypto_box key pair
    pub box_keys: BoxKeyPair,
    /// Hash-derived pair for "1.0" peers
    pub legacy: LegacyIdentityKeyPair,
}

impl IdentityKeys {
    /// Generate both pairs from fresh randomness
    pub fn generate() -> Self {
        Self {
            box_keys: BoxKeyPair::generate(),
            legacy: LegacyIdentityKeyPair::generate(),
        }
    }

    /// Serialize for persistence
    fn to_stored_json(&self) -> Result<Zeroizing<String>> {
        let stored = StoredIdentity {
            public_key: self.box_keys.public_base64(),
            secret_key: (*self.box_keys.secret_base64()).clone(),
            legacy: self.legacy.clone(),
        };
        Ok(Zeroizing::new(serde_json::to_string(&stored)?))
    }

    /// Parse a persisted document, validating both pairs
    fn from_stored_json(raw: &str) -> Result<Self> {
        let stored: StoredIdentity = serde_json::from_str(raw)?;
        let box_keys = BoxKeyPair::from_base64(&stored.public_key, &stored.secret_key)?;
        stored.legacy.validate()?;

        Ok(Self {
            box_keys,
            legacy: stored.legacy.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    public_key: String,
    secret_key: String,
    legacy: LegacyIdentityKeyPair,
}

// ============================================================================
// KEY PAIR PROVIDER
// ============================================================================

/// Loads, generates, rotates and persists the identity key pairs
pub struct KeyPairProvider {
    chain: Arc<StorageChain>,
    storage_key: String,
    keys: Option<Arc<IdentityKeys>>,
}

impl KeyPairProvider {
    /// Create a provider persisting under `storage_key`
    pub fn new(chain: Arc<StorageChain>, storage_key: impl Into<String>) -> Self {
        Self {
            chain,
            storage_key: storage_key.into(),
            keys: None,
        }
    }

    /// Load the persisted identity, or generate and persist a new one
    ///
    /// Idempotent: a second call keeps the keys already loaded.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.keys.is_some() {
            return Ok(());
        }

        let loaded = match self
            .chain
            .load_with(&self.storage_key, IdentityKeys::from_stored_json)
            .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                // Nothing could be read; a new identity may still be writable
                tracing::warn!(error = %e, "Identity storage unreadable");
                None
            }
        };

        let keys = match loaded {
            Some(keys) => {
                tracing::info!(
                    public_key = %RedactedKey(&keys.box_keys.public_base64()),
                    "Loaded identity keys"
                );
                keys
            }
            None => {
                let keys = IdentityKeys::generate();
                self.persist(&keys).await?;
                tracing::info!(
                    public_key = %RedactedKey(&keys.box_keys.public_base64()),
                    "Generated new identity keys"
                );
                keys
            }
        };

        self.keys = Some(Arc::new(keys));
        Ok(())
    }

    /// Whether keys are loaded
    pub fn is_initialized(&self) -> bool {
        self.keys.is_some()
    }

    /// Modern public key (base64), if initialized
    pub fn public_key(&self) -> Option<String> {
        self.keys.as_ref().map(|k| k.box_keys.public_base64())
    }

    /// Legacy public key (hex), if initialized
    pub fn legacy_public_key(&self) -> Option<String> {
        self.keys.as_ref().map(|k| k.legacy.public_key.clone())
    }

    /// Shared handle to the loaded keys
    pub fn keys(&self) -> Result<Arc<IdentityKeys>> {
        self.keys.clone().ok_or(Error::NotInitialized)
    }

    /// Replace both key pairs with fresh ones
    ///
    /// The new keys are persisted before they replace the old ones, so a
    /// storage failure leaves the current identity untouched.
    pub async fn rotate_keys(&mut self) -> Result<()> {
        if self.keys.is_none() {
            return Err(Error::NotInitialized);
        }

        let fresh = IdentityKeys::generate();
        self.persist(&fresh).await?;

        let old_public = self.public_key().unwrap_or_default();
        tracing::info!(
            security_event = true,
            old_public_key = %RedactedKey(&old_public),
            new_public_key = %RedactedKey(&fresh.box_keys.public_base64()),
            "Identity keys rotated; previous keys discarded"
        );

        self.keys = Some(Arc::new(fresh));
        Ok(())
    }

    /// Forget the identity, in memory and in every storage hop
    pub async fn reset(&mut self) -> Result<()> {
        self.chain.clear(&self.storage_key).await?;
        self.keys = None;
        tracing::info!(security_event = true, "Identity keys deleted");
        Ok(())
    }

    /// Drop the in-memory keys; storage is untouched
    pub fn unload(&mut self) {
        self.keys = None;
    }

    async fn persist(&self, keys: &IdentityKeys) -> Result<()> {
        let json = keys.to_stored_json()?;
        self.chain.save(&self.storage_key, &json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        KeyValueBackend, KeyValueStore, MemoryCredentialStore, MemoryKeyValueStore,
        SecureCredentialStore, SecureStoreBackend,
    };
    use std::time::Duration;

    struct Fixture {
        secure: Arc<MemoryCredentialStore>,
        kv: Arc<MemoryKeyValueStore>,
        chain: Arc<StorageChain>,
    }

    fn fixture() -> Fixture {
        let secure = Arc::new(MemoryCredentialStore::new());
        let kv = Arc::new(MemoryKeyValueStore::new());
        let chain = Arc::new(
            StorageChain::new(Duration::from_millis(200))
                .with_backend(Arc::new(SecureStoreBackend::new(secure.clone(), "axiom.e2e")))
                .with_backend(Arc::new(KeyValueBackend::new(kv.clone()))),
        );
        Fixture { secure, kv, chain }
    }

    #[tokio::test]
    async fn test_initialize_generates_and_persists() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        assert!(provider.public_key().is_none());

        provider.initialize().await.unwrap();
        assert!(provider.is_initialized());
        assert!(f.secure.get("axiom.e2e.keys").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        let first = provider.public_key();
        provider.initialize().await.unwrap();
        assert_eq!(provider.public_key(), first);

        // A new provider over the same storage restores the same identity
        let mut second = KeyPairProvider::new(f.chain.clone(), "keys");
        second.initialize().await.unwrap();
        assert_eq!(second.public_key(), first);
        assert_eq!(second.legacy_public_key(), provider.legacy_public_key());
    }

    #[tokio::test]
    async fn test_fallback_store_is_read_back() {
        let f = fixture();
        f.secure.set_available(false);

        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        assert!(f.kv.get_item("keys").await.unwrap().is_some());

        let mut again = KeyPairProvider::new(f.chain.clone(), "keys");
        again.initialize().await.unwrap();
        assert_eq!(again.public_key(), provider.public_key());
    }

    #[tokio::test]
    async fn test_corrupt_identity_regenerates() {
        let f = fixture();
        f.secure.set("axiom.e2e.keys", "{\"publicKey\":1}").await.unwrap();

        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        assert!(provider.is_initialized());

        assert!(f.secure.get("axiom.e2e.keys").await.unwrap().is_some());
        let stored = f
            .chain
            .load_with("keys", IdentityKeys::from_stored_json)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.box_keys.public_base64(), provider.public_key().unwrap());
    }

    #[tokio::test]
    async fn test_rotate_replaces_both_pairs() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        let old = provider.public_key();
        let old_legacy = provider.legacy_public_key();

        provider.rotate_keys().await.unwrap();
        assert_ne!(provider.public_key(), old);
        assert_ne!(provider.legacy_public_key(), old_legacy);

        let mut reloaded = KeyPairProvider::new(f.chain.clone(), "keys");
        reloaded.initialize().await.unwrap();
        assert_eq!(reloaded.public_key(), provider.public_key());
    }

    #[tokio::test]
    async fn test_rotate_failure_keeps_old_keys() {
        let secure = Arc::new(MemoryCredentialStore::new());
        let chain = Arc::new(
            StorageChain::new(Duration::from_millis(200))
                .with_backend(Arc::new(SecureStoreBackend::new(secure.clone(), "axiom.e2e"))),
        );
        let mut provider = KeyPairProvider::new(chain, "keys");
        provider.initialize().await.unwrap();
        let before = provider.public_key();

        secure.set_available(false);
        assert!(matches!(
            provider.rotate_keys().await,
            Err(Error::StorageUnavailable(_))
        ));
        assert_eq!(provider.public_key(), before);
    }

    #[tokio::test]
    async fn test_rotate_requires_initialize() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain, "keys");
        assert!(matches!(provider.rotate_keys().await, Err(Error::NotInitialized)));
        assert!(matches!(provider.keys(), Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn test_reset_forgets_identity() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        let old = provider.public_key();

        provider.reset().await.unwrap();
        assert!(!provider.is_initialized());
        assert!(f.secure.is_empty());

        provider.initialize().await.unwrap();
        assert_ne!(provider.public_key(), old);
    }

    #[tokio::test]
    async fn test_unload_keeps_stored_identity() {
        let f = fixture();
        let mut provider = KeyPairProvider::new(f.chain.clone(), "keys");
        provider.initialize().await.unwrap();
        let before = provider.public_key();

        provider.unload();
        assert!(provider.public_key().is_none());
        assert!(matches!(provider.keys(), Err(Error::NotInitialized)));

        provider.initialize().await.unwrap();
        assert_eq!(provider.public_key(), before);
    }

    #[test]
    fn test_stored_json_shape() {
        let keys = IdentityKeys::generate();
        let json = keys.to_stored_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["publicKey"], keys.box_keys.public_base64());
        assert!(value["secretKey"].is_string());
        assert_eq!(value["legacy"]["publicKey"], keys.legacy.public_key.as_str());
    }
}
