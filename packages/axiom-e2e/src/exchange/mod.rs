//! # Key Exchange
//!
//! Glue between the E2E service and the external key directory (the
//! authentication backend). How the directory authenticates keys is its own
//! business; this module ends at "the contact's key is registered".
//!
//! ## Exchange Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY EXCHANGE                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Alice                        Directory                       Bob      │
//! │    │                              │                             │      │
//! │    │  KeyExchangeRequest          │                             │      │
//! │    │  { targetUserId: "bob",      │                             │      │
//! │    │    publicKey, keyFingerprint,│                             │      │
//! │    │    encryptionType }          │                             │      │
//! │    │─────────────────────────────►│                             │      │
//! │    │                              │  (authenticates, stores)    │      │
//! │    │  KeyExchangeResponse         │                             │      │
//! │    │  { publicKey: bob's,         │                             │      │
//! │    │    verified, encryptionType }│                             │      │
//! │    │◄─────────────────────────────│                             │      │
//! │    │                              │                             │      │
//! │    │  verified? ──► register in the sodium / legacy namespace          │
//! │    │  not verified ──► KeyExchangeFailed, nothing registered           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::contacts::KeyNamespace;
use crate::crypto::key_fingerprint;
use crate::error::{Error, Result};
use crate::service::E2eService;

// ============================================================================
// WIRE MODELS
// ============================================================================

/// Scheme a published key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionType {
    /// crypto_box ("sodium-1" envelopes)
    Sodium,
    /// Deprecated "1.0" envelopes
    Legacy,
}

impl From<EncryptionType> for KeyNamespace {
    fn from(value: EncryptionType) -> Self {
        match value {
            EncryptionType::Sodium => KeyNamespace::Sodium,
            EncryptionType::Legacy => KeyNamespace::Legacy,
        }
    }
}

/// Body of the directory's key-exchange call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeRequest {
    /// Contact we want a key for
    pub target_user_id: String,
    /// Our public key
    pub public_key: String,
    /// SHA-256 hex of `public_key`
    pub key_fingerprint: String,
    /// Scheme of `public_key`
    pub encryption_type: EncryptionType,
}

/// Directory reply to a key exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeResponse {
    /// The contact's public key
    pub public_key: String,
    /// Whether the directory vouches for the key
    pub verified: bool,
    /// Scheme of `public_key`
    pub encryption_type: EncryptionType,
}

/// Directory reply to a public-key lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyLookup {
    /// Whose key this is
    pub user_id: String,
    /// The published key
    pub public_key: String,
    /// Scheme of `public_key`
    pub encryption_type: EncryptionType,
}

// ============================================================================
// DIRECTORY
// ============================================================================

/// The external key directory
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish our key for a contact and receive theirs
    async fn exchange_keys(&self, request: KeyExchangeRequest) -> Result<KeyExchangeResponse>;

    /// Look up a user's published key
    async fn lookup_public_key(&self, user_id: &str) -> Result<Option<PublicKeyLookup>>;

    /// Withdraw trust in a user's key
    async fn revoke_key(&self, user_id: &str) -> Result<()>;
}

/// Runs key exchange against a directory and feeds the registry
pub struct KeyExchange {
    service: Arc<E2eService>,
    directory: Arc<dyn KeyDirectory>,
}

impl KeyExchange {
    /// Bind a service to a directory
    pub fn new(service: Arc<E2eService>, directory: Arc<dyn KeyDirectory>) -> Self {
        Self { service, directory }
    }

    /// The request we would send for `contact_id`
    ///
    /// Advertises the sodium key, or the legacy key when no sodium key exists.
    pub async fn build_request(&self, contact_id: &str) -> Result<KeyExchangeRequest> {
        let (public_key, encryption_type) = match self.service.public_key().await {
            Some(key) => (key, EncryptionType::Sodium),
            None => match self.service.legacy_public_key().await {
                Some(key) => (key, EncryptionType::Legacy),
                None => return Err(Error::NotInitialized),
            },
        };

        Ok(KeyExchangeRequest {
            target_user_id: contact_id.to_string(),
            key_fingerprint: key_fingerprint(&public_key),
            public_key,
            encryption_type,
        })
    }

    /// Exchange keys with a contact and register the key we get back
    pub async fn exchange_with(&self, contact_id: &str) -> Result<EncryptionType> {
        let request = self.build_request(contact_id).await?;
        let response = self.directory.exchange_keys(request).await?;

        if !response.verified {
            tracing::warn!(contact_id, "Directory returned an unverified key, ignoring it");
            return Err(Error::KeyExchangeFailed(format!(
                "Key for '{}' is not verified",
                contact_id
            )));
        }

        self.register(contact_id, &response.public_key, response.encryption_type)
            .await?;
        tracing::info!(
            contact_id,
            encryption_type = ?response.encryption_type,
            "Key exchange complete"
        );
        Ok(response.encryption_type)
    }

    /// Re-fetch a contact's published key; returns whether one was found
    pub async fn refresh_contact(&self, contact_id: &str) -> Result<bool> {
        match self.directory.lookup_public_key(contact_id).await? {
            Some(lookup) => {
                if lookup.user_id != contact_id {
                    return Err(Error::KeyExchangeFailed(format!(
                        "Lookup for '{}' answered for '{}'",
                        contact_id, lookup.user_id
                    )));
                }
                self.register(contact_id, &lookup.public_key, lookup.encryption_type)
                    .await?;
                Ok(true)
            }
            None => {
                tracing::debug!(contact_id, "No published key");
                Ok(false)
            }
        }
    }

    /// Revoke a contact's key at the directory and forget it locally
    pub async fn revoke(&self, contact_id: &str) -> Result<()> {
        self.directory.revoke_key(contact_id).await?;
        for namespace in [KeyNamespace::Sodium, KeyNamespace::Legacy] {
            self.service.remove_contact_key(contact_id, namespace).await?;
        }
        tracing::info!(contact_id, "Contact key revoked");
        Ok(())
    }

    /// Rotate our identity, then re-run exchange with every known contact
    ///
    /// Returns the contacts whose exchange failed.
    pub async fn rotate_and_reexchange(&self) -> Result<Vec<String>> {
        let mut contacts = self.service.contacts().contacts(KeyNamespace::Sodium);
        contacts.extend(self.service.contacts().contacts(KeyNamespace::Legacy));
        contacts.sort();
        contacts.dedup();

        self.service.rotate_keys().await?;

        let mut failed = Vec::new();
        for contact_id in contacts {
            if let Err(e) = self.exchange_with(&contact_id).await {
                tracing::warn!(contact_id = %contact_id, error = %e, "Re-exchange after rotation failed");
                failed.push(contact_id);
            }
        }
        Ok(failed)
    }

    async fn register(&self, contact_id: &str, public_key: &str, kind: EncryptionType) -> Result<()> {
        match kind {
            EncryptionType::Sodium => self.service.add_contact_key_sodium(contact_id, public_key).await,
            EncryptionType::Legacy => self.service.add_contact_key(contact_id, public_key).await,
        }
    }
}
