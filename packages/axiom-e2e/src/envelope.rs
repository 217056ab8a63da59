//! # Envelopes
//!
//! Self-describing wire formats produced by the E2E core. Everything outside
//! this crate treats them as opaque strings.
//!
//! ## Wire Formats
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ENVELOPE FORMATS                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sodium (version "sodium-1")                                           │
//! │  {                                                                      │
//! │    "cipher": "base64...",          // crypto_box output incl. tag      │
//! │    "nonce": "base64...",           // 24-byte nonce                    │
//! │    "version": "sodium-1"                                               │
//! │  }                                                                      │
//! │                                                                         │
//! │  Legacy (version "1.0")                                                │
//! │  {                                                                      │
//! │    "message" | "file": "base64...", // AES-CBC payload                 │
//! │    "sessionKey": "base64...",      // wrapped session key              │
//! │    "iv": "base64...",              // 16-byte IV                       │
//! │    "timestamp": 1234567890123,     // epoch milliseconds               │
//! │    "version": "1.0"                                                    │
//! │  }                                                                      │
//! │                                                                         │
//! │  Metadata (no version tag)                                             │
//! │  {                                                                      │
//! │    "ciphertext": "base64...",      // AES-256-GCM output incl. tag     │
//! │    "nonce": "base64..."            // 12-byte nonce                    │
//! │  }                                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `version` tag alone selects the decrypt path. Envelopes are never
//! sniffed by shape.

use serde::{Deserialize, Serialize};

use crate::crypto::{
    self, from_base64, legacy, sodium, to_base64, BoxKeyPair, MetadataKey, Nonce, BOX_KEY_SIZE,
};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Version tag of the modern crypto_box envelope
pub const SODIUM_VERSION: &str = "sodium-1";

/// Version tag of the deprecated AES-CBC envelope
pub const LEGACY_VERSION: &str = "1.0";

/// AAD bound into every metadata seal
const METADATA_AAD: &[u8] = b"axiom-e2e-metadata-v1";

/// What a legacy envelope carries; decides the payload field name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Text message, stored under `"message"`
    Message,
    /// Base64 file payload, stored under `"file"`
    File,
}

// ============================================================================
// SODIUM ENVELOPE
// ============================================================================

/// Envelope for the crypto_box channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SodiumEnvelope {
    /// Sealed box (base64)
    pub cipher: String,
    /// Box nonce (base64)
    pub nonce: String,
    /// Always [`SODIUM_VERSION`]
    pub version: String,
}

impl SodiumEnvelope {
    /// Seal `plaintext` for `their_public` with our box key pair
    pub fn seal(plaintext: &[u8], their_public: &[u8; BOX_KEY_SIZE], ours: &BoxKeyPair) -> Result<Self> {
        let sealed = sodium::seal(plaintext, their_public, ours)?;
        Ok(Self {
            cipher: to_base64(&sealed.cipher),
            nonce: to_base64(&sealed.nonce),
            version: SODIUM_VERSION.to_string(),
        })
    }

    /// Open the envelope sent by the holder of `their_public`
    pub fn open(&self, their_public: &[u8; BOX_KEY_SIZE], ours: &BoxKeyPair) -> Result<Vec<u8>> {
        if self.version != SODIUM_VERSION {
            return Err(Error::UnsupportedVersion(self.version.clone()));
        }

        let cipher = from_base64(&self.cipher)?;
        let nonce = from_base64(&self.nonce)?;
        sodium::open(&cipher, &nonce, their_public, ours)
    }
}

// ============================================================================
// LEGACY ENVELOPE
// ============================================================================

/// Envelope for the deprecated "1.0" channel
///
/// Exactly one of `message` / `file` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEnvelope {
    /// Encrypted text payload (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Encrypted file payload (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Wrapped session key (base64)
    #[serde(rename = "sessionKey")]
    pub session_key: String,
    /// CBC IV (base64)
    pub iv: String,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
    /// Always [`LEGACY_VERSION`]
    pub version: String,
}

impl LegacyEnvelope {
    /// Seal `plaintext` under a key derived from the contact's legacy public key
    pub fn seal(plaintext: &[u8], kind: PayloadKind, their_public: &str) -> Result<Self> {
        let sealed = legacy::seal(plaintext, their_public)?;
        let payload = Some(to_base64(&sealed.ciphertext));
        let (message, file) = match kind {
            PayloadKind::Message => (payload, None),
            PayloadKind::File => (None, payload),
        };

        Ok(Self {
            message,
            file,
            session_key: to_base64(&sealed.wrapped_session_key),
            iv: to_base64(&sealed.iv),
            timestamp: now_timestamp_millis(),
            version: LEGACY_VERSION.to_string(),
        })
    }

    /// Which payload this envelope carries
    pub fn kind(&self) -> Result<PayloadKind> {
        match (&self.message, &self.file) {
            (Some(_), None) => Ok(PayloadKind::Message),
            (None, Some(_)) => Ok(PayloadKind::File),
            _ => Err(Error::InvalidEnvelope(
                "Legacy envelope must carry exactly one of message/file".into(),
            )),
        }
    }

    /// Open the envelope with the local legacy public key
    ///
    /// `expected` must match the payload field the envelope carries.
    pub fn open(&self, expected: PayloadKind, local_public: &str) -> Result<Vec<u8>> {
        if self.version != LEGACY_VERSION {
            return Err(Error::UnsupportedVersion(self.version.clone()));
        }
        if self.kind()? != expected {
            return Err(Error::InvalidEnvelope(format!(
                "Expected a {:?} payload",
                expected
            )));
        }

        let payload = self
            .message
            .as_deref()
            .or(self.file.as_deref())
            .ok_or_else(|| Error::InvalidEnvelope("Missing payload".into()))?;

        let ciphertext = from_base64(payload)?;
        let wrapped = from_base64(&self.session_key)?;
        let iv = from_base64(&self.iv)?;
        legacy::open(&ciphertext, &wrapped, &iv, local_public)
    }
}

// ============================================================================
// SEALED ENVELOPE (DISPATCH)
// ============================================================================

/// Either envelope, selected by its `version` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealedEnvelope {
    /// Modern crypto_box envelope
    Sodium(SodiumEnvelope),
    /// Deprecated AES-CBC envelope
    Legacy(LegacyEnvelope),
}

impl SealedEnvelope {
    /// Serialize to the wire JSON
    pub fn to_json(&self) -> Result<String> {
        let json = match self {
            SealedEnvelope::Sodium(env) => serde_json::to_string(env)?,
            SealedEnvelope::Legacy(env) => serde_json::to_string(env)?,
        };
        Ok(json)
    }

    /// Parse wire JSON, dispatching on `version`
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidEnvelope(format!("Not JSON: {}", e)))?;

        let version = value
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidEnvelope("Missing version tag".into()))?;

        match version {
            SODIUM_VERSION => serde_json::from_value(value)
                .map(SealedEnvelope::Sodium)
                .map_err(|e| Error::InvalidEnvelope(e.to_string())),
            LEGACY_VERSION => serde_json::from_value(value)
                .map(SealedEnvelope::Legacy)
                .map_err(|e| Error::InvalidEnvelope(e.to_string())),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }

    /// The envelope's version tag
    pub fn version(&self) -> &str {
        match self {
            SealedEnvelope::Sodium(env) => &env.version,
            SealedEnvelope::Legacy(env) => &env.version,
        }
    }
}

// ============================================================================
// METADATA ENVELOPE
// ============================================================================

/// Envelope for metadata sealed under the dedicated metadata key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    /// AES-256-GCM output (base64)
    pub ciphertext: String,
    /// GCM nonce (base64)
    pub nonce: String,
}

impl MetadataEnvelope {
    /// Seal metadata
    pub fn seal(plaintext: &[u8], key: &MetadataKey) -> Result<Self> {
        let (nonce, ciphertext) = crypto::encrypt(key, plaintext, METADATA_AAD)?;
        Ok(Self {
            ciphertext: to_base64(&ciphertext),
            nonce: to_base64(nonce.as_bytes()),
        })
    }

    /// Open metadata
    pub fn open(&self, key: &MetadataKey) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(&from_base64(&self.nonce)?)?;
        let ciphertext = from_base64(&self.ciphertext)?;
        crypto::decrypt(key, &nonce, &ciphertext, METADATA_AAD)
    }

    /// Serialize to the wire JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse wire JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidEnvelope(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sodium_wire_field_order() {
        let ours = BoxKeyPair::generate();
        let env = SodiumEnvelope::seal(b"hi", &ours.public_bytes(), &ours).unwrap();
        let json = SealedEnvelope::Sodium(env).to_json().unwrap();

        let cipher = json.find("\"cipher\"").unwrap();
        let nonce = json.find("\"nonce\"").unwrap();
        let version = json.find("\"version\":\"sodium-1\"").unwrap();
        assert!(cipher < nonce && nonce < version);
    }

    #[test]
    fn test_legacy_wire_fields() {
        let env = LegacyEnvelope::seal(b"hi", PayloadKind::File, "contact-key").unwrap();
        let json = SealedEnvelope::Legacy(env).to_json().unwrap();

        assert!(json.starts_with("{\"file\":"));
        assert!(json.contains("\"sessionKey\""));
        assert!(json.contains("\"version\":\"1.0\""));
        assert!(!json.contains("\"message\""));
    }

    #[test]
    fn test_dispatch_on_version() {
        let ours = BoxKeyPair::generate();
        let sodium_json = SealedEnvelope::Sodium(
            SodiumEnvelope::seal(b"x", &ours.public_bytes(), &ours).unwrap(),
        )
        .to_json()
        .unwrap();
        let legacy_json = SealedEnvelope::Legacy(
            LegacyEnvelope::seal(b"x", PayloadKind::Message, "k").unwrap(),
        )
        .to_json()
        .unwrap();

        assert!(matches!(
            SealedEnvelope::from_json(&sodium_json).unwrap(),
            SealedEnvelope::Sodium(_)
        ));
        assert!(matches!(
            SealedEnvelope::from_json(&legacy_json).unwrap(),
            SealedEnvelope::Legacy(_)
        ));
    }

    #[test]
    fn test_unknown_or_missing_version() {
        let unknown = r#"{"cipher":"AA==","nonce":"AA==","version":"sodium-2"}"#;
        assert!(matches!(
            SealedEnvelope::from_json(unknown),
            Err(Error::UnsupportedVersion(v)) if v == "sodium-2"
        ));

        let missing = r#"{"cipher":"AA==","nonce":"AA=="}"#;
        assert!(matches!(
            SealedEnvelope::from_json(missing),
            Err(Error::InvalidEnvelope(_))
        ));

        assert!(matches!(
            SealedEnvelope::from_json("not json"),
            Err(Error::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn test_legacy_payload_kind_must_match() {
        let env = LegacyEnvelope::seal(b"x", PayloadKind::Message, "k").unwrap();
        assert!(matches!(
            env.open(PayloadKind::File, "k"),
            Err(Error::InvalidEnvelope(_))
        ));
        assert_eq!(env.open(PayloadKind::Message, "k").unwrap(), b"x");
    }

    #[test]
    fn test_legacy_envelope_with_both_payloads_rejected() {
        let mut env = LegacyEnvelope::seal(b"x", PayloadKind::Message, "k").unwrap();
        env.file = env.message.clone();
        assert!(env.kind().is_err());
    }

    #[test]
    fn test_metadata_envelope() {
        let key = MetadataKey::generate();
        let env = MetadataEnvelope::seal(b"Alice.jpg", &key).unwrap();
        let json = env.to_json().unwrap();
        assert!(json.contains("\"ciphertext\"") && json.contains("\"nonce\""));

        let parsed = MetadataEnvelope::from_json(&json).unwrap();
        assert_eq!(parsed.open(&key).unwrap(), b"Alice.jpg");
        assert!(parsed.open(&MetadataKey::generate()).is_err());
    }
}
