//! Per-contact channel selection.
//!
//! The sodium-or-legacy decision is made once, here, and carried as a value.

use crate::contacts::{ContactKeyRegistry, KeyNamespace};
use crate::crypto::{decode_key_32, BOX_KEY_SIZE};
use crate::envelope::{LegacyEnvelope, PayloadKind, SealedEnvelope, SodiumEnvelope};
use crate::error::{Error, Result};
use crate::identity::IdentityKeys;

/// How to talk to one contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// crypto_box with the contact's X25519 key
    Sodium {
        /// Contact's public key bytes
        contact_public: [u8; BOX_KEY_SIZE],
    },
    /// Deprecated "1.0" scheme with the contact's legacy key string
    Legacy {
        /// Contact's legacy public key
        contact_public: String,
    },
}

impl Channel {
    /// Pick the channel for sealing to `contact_id`
    ///
    /// Sodium wins whenever the contact has a sodium key.
    pub fn resolve(registry: &ContactKeyRegistry, contact_id: &str) -> Result<Self> {
        if let Some(key) = registry.get_contact_key(contact_id, KeyNamespace::Sodium) {
            return Ok(Channel::Sodium {
                contact_public: decode_key_32(&key)?,
            });
        }
        if let Some(key) = registry.get_contact_key(contact_id, KeyNamespace::Legacy) {
            return Ok(Channel::Legacy { contact_public: key });
        }
        Err(Error::KeyNotFound {
            contact_id: contact_id.to_string(),
            namespace: KeyNamespace::Sodium,
        })
    }

    /// The channel an incoming envelope must be opened with
    ///
    /// Decided by the envelope's version tag alone; the contact needs a key
    /// in the matching namespace.
    pub fn for_envelope(
        registry: &ContactKeyRegistry,
        contact_id: &str,
        envelope: &SealedEnvelope,
    ) -> Result<Self> {
        let namespace = match envelope {
            SealedEnvelope::Sodium(_) => KeyNamespace::Sodium,
            SealedEnvelope::Legacy(_) => KeyNamespace::Legacy,
        };
        let key = registry
            .get_contact_key(contact_id, namespace)
            .ok_or_else(|| Error::KeyNotFound {
                contact_id: contact_id.to_string(),
                namespace,
            })?;

        match namespace {
            KeyNamespace::Sodium => Ok(Channel::Sodium {
                contact_public: decode_key_32(&key)?,
            }),
            KeyNamespace::Legacy => Ok(Channel::Legacy { contact_public: key }),
        }
    }

    /// Namespace this channel draws its contact key from
    pub fn namespace(&self) -> KeyNamespace {
        match self {
            Channel::Sodium { .. } => KeyNamespace::Sodium,
            Channel::Legacy { .. } => KeyNamespace::Legacy,
        }
    }

    /// Seal a payload for the contact
    pub fn seal(&self, plaintext: &[u8], kind: PayloadKind, keys: &IdentityKeys) -> Result<SealedEnvelope> {
        match self {
            Channel::Sodium { contact_public } => Ok(SealedEnvelope::Sodium(SodiumEnvelope::seal(
                plaintext,
                contact_public,
                &keys.box_keys,
            )?)),
            Channel::Legacy { contact_public } => Ok(SealedEnvelope::Legacy(LegacyEnvelope::seal(
                plaintext,
                kind,
                contact_public,
            )?)),
        }
    }

    /// Open an envelope received from the contact
    pub fn open(&self, envelope: &SealedEnvelope, kind: PayloadKind, keys: &IdentityKeys) -> Result<Vec<u8>> {
        match (self, envelope) {
            (Channel::Sodium { contact_public }, SealedEnvelope::Sodium(env)) => {
                env.open(contact_public, &keys.box_keys)
            }
            // The legacy wrapping key comes from our own public key
            (Channel::Legacy { .. }, SealedEnvelope::Legacy(env)) => {
                env.open(kind, &keys.legacy.public_key)
            }
            _ => Err(Error::InvalidEnvelope(format!(
                "Envelope version {} does not match the {} channel",
                envelope.version(),
                self.namespace()
            ))),
        }
    }
}
