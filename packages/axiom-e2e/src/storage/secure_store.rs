//! # Secure Credential Store
//!
//! Opaque credential blobs keyed by a logical service name.
//!
//! ```text
//! ┌───────────────────┐  ┌───────────────────┐
//! │  iOS / macOS      │  │  Everything else  │
//! │  Keychain         │  │  caller-provided  │
//! │  (generic         │  │  implementation,  │
//! │   password item)  │  │  memory in tests  │
//! └───────────────────┘  └───────────────────┘
//! ```
//!
//! A store may be unavailable (locked keychain, missing entitlement). That
//! surfaces as `StorageUnavailable` and the storage chain moves on.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Hardware-backed (where possible) credential storage
#[async_trait]
pub trait SecureCredentialStore: Send + Sync {
    /// Read the credential stored under `service`
    async fn get(&self, service: &str) -> Result<Option<String>>;

    /// Store `value` under `service`, replacing any previous value
    async fn set(&self, service: &str, value: &str) -> Result<()>;

    /// Delete the credential; returns whether one existed
    async fn reset(&self, service: &str) -> Result<bool>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory credential store for tests and desktop development
///
/// `set_available(false)` makes every call fail with `StorageUnavailable`,
/// which exercises the fallback path.
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
}

impl MemoryCredentialStore {
    /// Create an empty, available store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored credentials
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no credentials
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StorageUnavailable("Secure credential store is locked".into()))
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureCredentialStore for MemoryCredentialStore {
    async fn get(&self, service: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.entries.read().get(service).cloned())
    }

    async fn set(&self, service: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.entries
            .write()
            .insert(service.to_string(), value.to_string());
        Ok(())
    }

    async fn reset(&self, service: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.entries.write().remove(service).is_some())
    }
}

// ============================================================================
// APPLE KEYCHAIN
// ============================================================================

/// Keychain-backed store (generic password items)
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub struct KeychainCredentialStore {
    account: String,
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
impl KeychainCredentialStore {
    /// Store items under the given keychain account name
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
fn is_item_not_found(err: &security_framework::base::Error) -> bool {
    // errSecItemNotFound
    err.code() == -25300
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
#[async_trait]
impl SecureCredentialStore for KeychainCredentialStore {
    async fn get(&self, service: &str) -> Result<Option<String>> {
        use security_framework::passwords::get_generic_password;

        match get_generic_password(service, &self.account) {
            Ok(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| Error::StorageReadError("Keychain item is not UTF-8".into())),
            Err(e) if is_item_not_found(&e) => Ok(None),
            Err(e) => Err(Error::StorageUnavailable(format!("Keychain read failed: {}", e))),
        }
    }

    async fn set(&self, service: &str, value: &str) -> Result<()> {
        use security_framework::passwords::{delete_generic_password, set_generic_password};

        // Update pattern: drop any existing item first
        let _ = delete_generic_password(service, &self.account);

        set_generic_password(service, &self.account, value.as_bytes())
            .map_err(|e| Error::StorageUnavailable(format!("Keychain write failed: {}", e)))
    }

    async fn reset(&self, service: &str) -> Result<bool> {
        use security_framework::passwords::delete_generic_password;

        match delete_generic_password(service, &self.account) {
            Ok(()) => Ok(true),
            Err(e) if is_item_not_found(&e) => Ok(false),
            Err(e) => Err(Error::StorageWriteError(format!("Keychain delete failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_reset() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get("svc").await.unwrap(), None);

        store.set("svc", "secret").await.unwrap();
        assert_eq!(store.get("svc").await.unwrap().as_deref(), Some("secret"));

        store.set("svc", "newer").await.unwrap();
        assert_eq!(store.get("svc").await.unwrap().as_deref(), Some("newer"));
        assert_eq!(store.len(), 1);

        assert!(store.reset("svc").await.unwrap());
        assert!(!store.reset("svc").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_unavailable() {
        let store = MemoryCredentialStore::new();
        store.set("svc", "secret").await.unwrap();
        store.set_available(false);

        assert!(matches!(store.get("svc").await, Err(Error::StorageUnavailable(_))));
        assert!(matches!(store.set("svc", "x").await, Err(Error::StorageUnavailable(_))));

        store.set_available(true);
        assert_eq!(store.get("svc").await.unwrap().as_deref(), Some("secret"));
    }
}
