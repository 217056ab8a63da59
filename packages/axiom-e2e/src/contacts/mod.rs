//! # Contacts Module
//!
//! Other parties' public keys, in two independent namespaces.
//!
//! ## Registry Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CONTACT KEY REGISTRY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────────┐     │
//! │  │  Sodium namespace           │   │  Legacy namespace           │     │
//! │  │  ────────────────           │   │  ────────────────           │     │
//! │  │  contact_id ──► base64      │   │  contact_id ──► string      │     │
//! │  │  (32-byte X25519 key)       │   │  (hash-derived public key)  │     │
//! │  │                             │   │                             │     │
//! │  │  KV: axiom_e2e_contact_     │   │  KV: axiom_e2e_contact_keys │     │
//! │  │      keys_sodium            │   │                             │     │
//! │  └─────────────────────────────┘   └─────────────────────────────┘     │
//! │                                                                         │
//! │  • insert-or-replace, last write wins                                  │
//! │  • no expiry, no revocation list                                       │
//! │  • no authenticity checks beyond key shape                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each namespace is persisted as one JSON object in the key-value store and
//! rewritten on every change. The registry never holds private material.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::decode_key_32;
use crate::error::{Error, Result};
use crate::logging::RedactedKey;
use crate::storage::{with_timeout, KeyValueStore};

/// Which scheme a contact key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyNamespace {
    /// X25519 keys for the crypto_box channel
    Sodium,
    /// Hash-derived keys for the "1.0" channel
    Legacy,
}

impl KeyNamespace {
    /// Lowercase name, as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyNamespace::Sodium => "sodium",
            KeyNamespace::Legacy => "legacy",
        }
    }
}

impl fmt::Display for KeyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps contact identifiers to their public keys
pub struct ContactKeyRegistry {
    store: Arc<dyn KeyValueStore>,
    legacy_storage_key: String,
    sodium_storage_key: String,
    timeout: Duration,
    legacy: RwLock<HashMap<String, String>>,
    sodium: RwLock<HashMap<String, String>>,
}

impl ContactKeyRegistry {
    /// Create an empty registry persisting into `store`
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        legacy_storage_key: impl Into<String>,
        sodium_storage_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            legacy_storage_key: legacy_storage_key.into(),
            sodium_storage_key: sodium_storage_key.into(),
            timeout,
            legacy: RwLock::new(HashMap::new()),
            sodium: RwLock::new(HashMap::new()),
        }
    }

    /// Load both namespaces from the key-value store
    ///
    /// A corrupt snapshot is logged and treated as empty.
    pub async fn load(&self) -> Result<()> {
        for namespace in [KeyNamespace::Legacy, KeyNamespace::Sodium] {
            let raw = with_timeout(
                self.timeout,
                "contact key store",
                self.store.get_item(self.storage_key(namespace)),
            )
            .await?;

            let entries = match raw {
                Some(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(
                            %namespace,
                            error = %e,
                            "Stored contact keys are corrupt, starting empty"
                        );
                        HashMap::new()
                    }
                },
                None => HashMap::new(),
            };

            tracing::debug!(%namespace, count = entries.len(), "Loaded contact keys");
            *self.map(namespace).write() = entries;
        }
        Ok(())
    }

    /// Register a legacy public key for a contact
    pub async fn add_contact_key(&self, contact_id: &str, public_key: &str) -> Result<()> {
        if public_key.trim().is_empty() {
            return Err(Error::InvalidKey("Legacy public key is empty".into()));
        }
        self.insert(KeyNamespace::Legacy, contact_id, public_key).await
    }

    /// Register a sodium public key (base64 of 32 bytes) for a contact
    pub async fn add_contact_key_sodium(&self, contact_id: &str, public_key: &str) -> Result<()> {
        decode_key_32(public_key)?;
        self.insert(KeyNamespace::Sodium, contact_id, public_key).await
    }

    /// Whether a key is registered for the contact in `namespace`
    pub fn has_key_for(&self, contact_id: &str, namespace: KeyNamespace) -> bool {
        self.map(namespace).read().contains_key(contact_id)
    }

    /// The contact's key in `namespace`
    pub fn get_contact_key(&self, contact_id: &str, namespace: KeyNamespace) -> Option<String> {
        self.map(namespace).read().get(contact_id).cloned()
    }

    /// Remove the contact's key from `namespace`; returns whether it existed
    pub async fn remove_contact_key(&self, contact_id: &str, namespace: KeyNamespace) -> Result<bool> {
        let existed = self.map(namespace).write().remove(contact_id).is_some();
        if existed {
            tracing::info!(%namespace, contact_id, "Contact key removed");
            self.persist(namespace).await?;
        }
        Ok(existed)
    }

    /// Contacts with a key in `namespace`, sorted
    pub fn contacts(&self, namespace: KeyNamespace) -> Vec<String> {
        let mut ids: Vec<String> = self.map(namespace).read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every key in both namespaces
    pub async fn clear(&self) -> Result<()> {
        self.legacy.write().clear();
        self.sodium.write().clear();
        for namespace in [KeyNamespace::Legacy, KeyNamespace::Sodium] {
            with_timeout(
                self.timeout,
                "contact key store",
                self.store.remove_item(self.storage_key(namespace)),
            )
            .await?;
        }
        Ok(())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn map(&self, namespace: KeyNamespace) -> &RwLock<HashMap<String, String>> {
        match namespace {
            KeyNamespace::Sodium => &self.sodium,
            KeyNamespace::Legacy => &self.legacy,
        }
    }

    fn storage_key(&self, namespace: KeyNamespace) -> &str {
        match namespace {
            KeyNamespace::Sodium => &self.sodium_storage_key,
            KeyNamespace::Legacy => &self.legacy_storage_key,
        }
    }

    async fn insert(&self, namespace: KeyNamespace, contact_id: &str, public_key: &str) -> Result<()> {
        let previous = self
            .map(namespace)
            .write()
            .insert(contact_id.to_string(), public_key.to_string());

        match previous {
            Some(old) if old != public_key => tracing::info!(
                %namespace,
                contact_id,
                old_key = %RedactedKey(&old),
                new_key = %RedactedKey(public_key),
                "Contact key replaced"
            ),
            Some(_) => {}
            None => tracing::debug!(%namespace, contact_id, "Contact key added"),
        }

        // The in-memory entry stays even if persisting fails
        self.persist(namespace).await
    }

    async fn persist(&self, namespace: KeyNamespace) -> Result<()> {
        let snapshot = serde_json::to_string(&*self.map(namespace).read())?;
        with_timeout(
            self.timeout,
            "contact key store",
            self.store.set_item(self.storage_key(namespace), &snapshot),
        )
        .await
        .map_err(|e| {
            tracing::warn!(%namespace, error = %e, "Failed to persist contact keys");
            e
        })
    }
}
