//! Service configuration.
//!
//! Every field has a default, so `E2eConfig::default()` is a working setup
//! and a JSON document only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for an [`E2eService`](crate::service::E2eService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// Logical service name used with the secure credential store
    pub keychain_service: String,
    /// Blob name for the persisted identity key pairs
    pub identity_storage_key: String,
    /// Blob name for the persisted metadata key
    pub metadata_key_storage_key: String,
    /// Key-value entry holding the legacy contact key map
    pub contact_keys_storage_key: String,
    /// Key-value entry holding the sodium contact key map
    pub sodium_contact_keys_storage_key: String,
    /// Upper bound for a single storage hop, in milliseconds
    pub storage_timeout_ms: u64,
    /// Number of hex digest characters kept in a security fingerprint
    ///
    /// A positive multiple of 4, at most 64.
    pub fingerprint_hex_len: usize,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            keychain_service: "axiom.e2e".to_string(),
            identity_storage_key: "axiom_e2e_keys".to_string(),
            metadata_key_storage_key: "axiom_e2e_metadata_key".to_string(),
            contact_keys_storage_key: "axiom_e2e_contact_keys".to_string(),
            sodium_contact_keys_storage_key: "axiom_e2e_contact_keys_sodium".to_string(),
            storage_timeout_ms: 5_000,
            fingerprint_hex_len: 32,
        }
    }
}

impl E2eConfig {
    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot work with
    pub fn validate(&self) -> Result<()> {
        let len = self.fingerprint_hex_len;
        if len == 0 || len % 4 != 0 || len > 64 {
            return Err(Error::InvalidConfig(format!(
                "fingerprint_hex_len must be a multiple of 4 between 4 and 64, got {}",
                len
            )));
        }
        if self.storage_timeout_ms == 0 {
            return Err(Error::InvalidConfig("storage_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// The storage timeout as a `Duration`
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = E2eConfig::default();
        assert_eq!(config.storage_timeout(), Duration::from_secs(5));
        assert_eq!(config.fingerprint_hex_len, 32);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            E2eConfig::from_json(r#"{"keychain_service":"test.svc","storage_timeout_ms":250}"#)
                .unwrap();
        assert_eq!(config.keychain_service, "test.svc");
        assert_eq!(config.storage_timeout_ms, 250);
        assert_eq!(config.identity_storage_key, "axiom_e2e_keys");
    }

    #[test]
    fn test_fingerprint_len_must_fill_whole_blocks() {
        for bad in [0, 30, 65, 68] {
            let json = format!(r#"{{"fingerprint_hex_len":{}}}"#, bad);
            assert!(
                matches!(E2eConfig::from_json(&json), Err(Error::InvalidConfig(_))),
                "{} should be rejected",
                bad
            );
        }
        for good in [4, 32, 64] {
            let json = format!(r#"{{"fingerprint_hex_len":{}}}"#, good);
            assert_eq!(E2eConfig::from_json(&json).unwrap().fingerprint_hex_len, good);
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = E2eConfig {
            storage_timeout_ms: 0,
            ..E2eConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(E2eConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(E2eConfig::from_json("{not json").is_err());
    }
}
