//! # E2E Encryption Service
//!
//! The facade the UI and transport layers talk to. One instance is built at
//! process start and shared (usually behind an `Arc`).
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       E2E SERVICE LIFECYCLE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌───────────────┐ initialize() ┌──────────────┐  ok   ┌──────────┐   │
//! │   │ Uninitialized │ ───────────► │ Initializing │ ────► │  Ready   │   │
//! │   └───────────────┘              └──────┬───────┘       └────┬─────┘   │
//! │           ▲                             │ error              │         │
//! │           └─────────────────────────────┘                    │         │
//! │           ▲                                                  │         │
//! │           └──────────────────── reset() ─────────────────────┘         │
//! │                                                                         │
//! │   rotate_keys() keeps the service Ready. While it runs, crypto calls   │
//! │   fail with RotationInProgress.                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dispatch
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  encrypt_message(text, contact)                                        │
//! │    │                                                                    │
//! │    ├── contact has sodium key ──► Channel::Sodium ──► "sodium-1"       │
//! │    ├── contact has legacy key ──► Channel::Legacy ──► "1.0"            │
//! │    └── neither ─────────────────► Err(KeyNotFound)                     │
//! │                                                                         │
//! │  decrypt_message(envelope, contact)                                    │
//! │    │                                                                    │
//! │    └── envelope "version" picks the channel, never its shape           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod channel;

pub use channel::Channel;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::E2eConfig;
use crate::contacts::{ContactKeyRegistry, KeyNamespace};
use crate::crypto::{generate_fingerprint, MetadataKey};
use crate::envelope::{MetadataEnvelope, PayloadKind, SealedEnvelope};
use crate::error::{Error, Result};
use crate::identity::{IdentityKeys, KeyPairProvider};
use crate::logging::RedactedBytes;
use crate::storage::{
    KeyValueBackend, KeyValueStore, SecureCredentialStore, SecureStoreBackend, StorageChain,
};

/// Lifecycle state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// `initialize()` has not completed
    Uninitialized,
    /// `initialize()` is running
    Initializing,
    /// Keys are loaded; crypto calls are allowed
    Ready,
}

/// Clears the rotation flag when rotation ends, however it ends
struct RotationGuard<'a>(&'a AtomicBool);

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// End-to-end encryption facade
pub struct E2eService {
    config: E2eConfig,
    state: RwLock<ServiceState>,
    rotating: AtomicBool,
    identity: tokio::sync::RwLock<KeyPairProvider>,
    metadata_key: RwLock<Option<Arc<MetadataKey>>>,
    contacts: ContactKeyRegistry,
    chain: Arc<StorageChain>,
}

impl E2eService {
    /// Build a service over a secure credential store with a key-value fallback
    ///
    /// The key-value store also holds the contact key registry.
    pub fn new(
        config: E2eConfig,
        secure_store: Arc<dyn SecureCredentialStore>,
        kv_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let chain = StorageChain::new(config.storage_timeout())
            .with_backend(Arc::new(SecureStoreBackend::new(
                secure_store,
                config.keychain_service.clone(),
            )))
            .with_backend(Arc::new(KeyValueBackend::new(kv_store.clone())));
        Self::with_chain(config, chain, kv_store)
    }

    /// Build a service over a custom storage chain
    pub fn with_chain(config: E2eConfig, chain: StorageChain, kv_store: Arc<dyn KeyValueStore>) -> Self {
        let chain = Arc::new(chain);
        let contacts = ContactKeyRegistry::new(
            kv_store,
            config.contact_keys_storage_key.clone(),
            config.sodium_contact_keys_storage_key.clone(),
            config.storage_timeout(),
        );
        let identity = KeyPairProvider::new(chain.clone(), config.identity_storage_key.clone());

        Self {
            config,
            state: RwLock::new(ServiceState::Uninitialized),
            rotating: AtomicBool::new(false),
            identity: tokio::sync::RwLock::new(identity),
            metadata_key: RwLock::new(None),
            contacts,
            chain,
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Load or generate the identity, metadata key and contact keys
    ///
    /// Calling this on a ready service is a no-op. On failure the service
    /// goes back to `Uninitialized` holding no keys.
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate()?;
        {
            let mut state = self.state.write();
            match *state {
                ServiceState::Ready => return Ok(()),
                ServiceState::Initializing => return Err(Error::Initializing),
                ServiceState::Uninitialized => *state = ServiceState::Initializing,
            }
        }

        tracing::info!("Initializing Axiom E2E v{}", crate::version());

        match self.bootstrap().await {
            Ok(()) => {
                *self.state.write() = ServiceState::Ready;
                tracing::info!("Axiom E2E ready");
                Ok(())
            }
            Err(e) => {
                self.identity.write().await.unload();
                *self.metadata_key.write() = None;
                *self.state.write() = ServiceState::Uninitialized;
                tracing::error!(error = %e, "E2E initialization failed");
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<()> {
        self.identity.write().await.initialize().await?;

        let key_name = &self.config.metadata_key_storage_key;
        let metadata_key = match self.chain.load_with(key_name, MetadataKey::from_base64).await? {
            Some(key) => key,
            None => {
                let key = MetadataKey::generate();
                self.chain.save(key_name, &key.to_base64()).await?;
                tracing::info!("Generated metadata key");
                key
            }
        };
        *self.metadata_key.write() = Some(Arc::new(metadata_key));

        self.contacts.load().await
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// The configuration this service was built with
    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    /// Delete identity, metadata key and contact keys; back to `Uninitialized`
    pub async fn reset(&self) -> Result<()> {
        let mut identity = self.identity.write().await;
        identity.reset().await?;
        self.chain.clear(&self.config.metadata_key_storage_key).await?;
        self.contacts.clear().await?;

        *self.metadata_key.write() = None;
        *self.state.write() = ServiceState::Uninitialized;
        tracing::info!(security_event = true, "E2E state reset");
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.rotating.load(Ordering::SeqCst) {
            return Err(Error::RotationInProgress);
        }
        match self.state() {
            ServiceState::Ready => Ok(()),
            ServiceState::Initializing => Err(Error::Initializing),
            ServiceState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Our sodium public key (base64), if initialized
    pub async fn public_key(&self) -> Option<String> {
        self.identity.read().await.public_key()
    }

    /// Our legacy public key, if initialized
    pub async fn legacy_public_key(&self) -> Option<String> {
        self.identity.read().await.legacy_public_key()
    }

    /// Replace the identity with fresh keys
    ///
    /// Destructive: every contact must re-run key exchange afterwards.
    pub async fn rotate_keys(&self) -> Result<()> {
        if self.state() != ServiceState::Ready {
            return Err(Error::NotInitialized);
        }
        if self
            .rotating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::RotationInProgress);
        }
        let _guard = RotationGuard(&self.rotating);

        // Waits for in-flight crypto calls holding the read lock
        let mut identity = self.identity.write().await;
        identity.rotate_keys().await?;

        tracing::warn!(
            security_event = true,
            contacts = self.contacts.contacts(KeyNamespace::Sodium).len()
                + self.contacts.contacts(KeyNamespace::Legacy).len(),
            "Identity rotated; contacts must re-exchange keys"
        );
        Ok(())
    }

    /// Whether rotation is running
    pub fn is_rotating(&self) -> bool {
        self.rotating.load(Ordering::SeqCst)
    }

    // ========================================================================
    // CONTACT KEYS
    // ========================================================================

    /// Register a contact's legacy public key
    pub async fn add_contact_key(&self, contact_id: &str, public_key: &str) -> Result<()> {
        self.contacts.add_contact_key(contact_id, public_key).await
    }

    /// Register a contact's sodium public key (base64)
    pub async fn add_contact_key_sodium(&self, contact_id: &str, public_key: &str) -> Result<()> {
        self.contacts.add_contact_key_sodium(contact_id, public_key).await
    }

    /// Remove a contact's key from one namespace
    pub async fn remove_contact_key(&self, contact_id: &str, namespace: KeyNamespace) -> Result<bool> {
        self.contacts.remove_contact_key(contact_id, namespace).await
    }

    /// Whether the contact has a key in `namespace`
    pub fn has_key_for(&self, contact_id: &str, namespace: KeyNamespace) -> bool {
        self.contacts.has_key_for(contact_id, namespace)
    }

    /// The contact key registry
    pub fn contacts(&self) -> &ContactKeyRegistry {
        &self.contacts
    }

    /// The channel messages to `contact_id` would be sealed with
    pub fn resolve_channel(&self, contact_id: &str) -> Result<Channel> {
        self.ensure_ready()?;
        Channel::resolve(&self.contacts, contact_id)
    }

    /// True when we have an identity and a usable key for the contact
    pub fn is_e2e_ready(&self, contact_id: &str) -> bool {
        self.ensure_ready().is_ok()
            && (self.contacts.has_key_for(contact_id, KeyNamespace::Sodium)
                || self.contacts.has_key_for(contact_id, KeyNamespace::Legacy))
    }

    /// Fingerprint of our key and the contact's, for out-of-band comparison
    ///
    /// Uses sodium keys when the contact has one, legacy keys otherwise.
    /// `None` when the service is not ready or either key is unknown. The
    /// two sides of a conversation see different strings since the local key
    /// always comes first.
    pub async fn generate_security_fingerprint(&self, contact_id: &str) -> Option<String> {
        self.ensure_ready().ok()?;
        let identity = self.identity.read().await;
        let keys = identity.keys().ok()?;

        let (local, contact) =
            if let Some(contact) = self.contacts.get_contact_key(contact_id, KeyNamespace::Sodium) {
                (keys.box_keys.public_base64(), contact)
            } else {
                let contact = self.contacts.get_contact_key(contact_id, KeyNamespace::Legacy)?;
                (keys.legacy.public_key.clone(), contact)
            };

        Some(generate_fingerprint(&local, &contact, self.config.fingerprint_hex_len))
    }

    // ========================================================================
    // MESSAGES & FILES
    // ========================================================================

    /// Encrypt a text message for a contact; returns the envelope JSON
    pub async fn encrypt_message(&self, plaintext: &str, contact_id: &str) -> Result<String> {
        self.seal(plaintext.as_bytes(), contact_id, PayloadKind::Message).await
    }

    /// Decrypt an envelope received from a contact
    pub async fn decrypt_message(&self, envelope: &str, contact_id: &str) -> Result<String> {
        let bytes = self.open(envelope, contact_id, PayloadKind::Message).await?;
        String::from_utf8(bytes)
            .map_err(|_| Error::DecryptionFailed("Plaintext is not valid UTF-8".into()))
    }

    /// Encrypt a base64 file payload for a contact
    pub async fn encrypt_file(&self, file_base64: &str, contact_id: &str) -> Result<String> {
        self.seal(file_base64.as_bytes(), contact_id, PayloadKind::File).await
    }

    /// Decrypt a file envelope; returns the base64 payload
    pub async fn decrypt_file(&self, envelope: &str, contact_id: &str) -> Result<String> {
        let bytes = self.open(envelope, contact_id, PayloadKind::File).await?;
        String::from_utf8(bytes)
            .map_err(|_| Error::DecryptionFailed("File payload is not valid UTF-8".into()))
    }

    async fn seal(&self, plaintext: &[u8], contact_id: &str, kind: PayloadKind) -> Result<String> {
        self.ensure_ready()?;
        let identity = self.identity.read().await;
        let keys = self.current_keys(&identity)?;

        let channel = Channel::resolve(&self.contacts, contact_id)?;
        let envelope = channel.seal(plaintext, kind, &keys).map_err(|e| {
            tracing::warn!(contact_id, channel = %channel.namespace(), error = %e, "Encryption failed");
            e
        })?;

        tracing::debug!(
            contact_id,
            version = envelope.version(),
            size = %RedactedBytes(plaintext),
            "Sealed {:?}",
            kind
        );
        envelope.to_json()
    }

    async fn open(&self, envelope: &str, contact_id: &str, kind: PayloadKind) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let identity = self.identity.read().await;
        let keys = self.current_keys(&identity)?;

        let envelope = SealedEnvelope::from_json(envelope)?;
        let channel = Channel::for_envelope(&self.contacts, contact_id, &envelope)?;
        channel.open(&envelope, kind, &keys).map_err(|e| {
            tracing::debug!(contact_id, version = envelope.version(), error = %e, "Could not open envelope");
            e
        })
    }

    fn current_keys(&self, identity: &KeyPairProvider) -> Result<Arc<IdentityKeys>> {
        // Rotation may have started while we waited for the lock
        if self.rotating.load(Ordering::SeqCst) {
            return Err(Error::RotationInProgress);
        }
        identity.keys()
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    /// Seal metadata (display names, file names) under the metadata key
    pub fn encrypt_metadata(&self, plaintext: &str) -> Result<String> {
        let key = self.metadata_key()?;
        MetadataEnvelope::seal(plaintext.as_bytes(), &key)?.to_json()
    }

    /// Open metadata sealed by [`encrypt_metadata`](Self::encrypt_metadata)
    pub fn decrypt_metadata(&self, envelope: &str) -> Result<String> {
        let key = self.metadata_key()?;
        let bytes = MetadataEnvelope::from_json(envelope)?.open(&key)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::DecryptionFailed("Metadata is not valid UTF-8".into()))
    }

    fn metadata_key(&self) -> Result<Arc<MetadataKey>> {
        self.ensure_ready()?;
        self.metadata_key.read().clone().ok_or(Error::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobBackend, MemoryCredentialStore, MemoryKeyValueStore};
    use async_trait::async_trait;

    fn service() -> E2eService {
        E2eService::new(
            E2eConfig::default(),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        )
    }

    #[tokio::test]
    async fn test_state_machine() {
        let svc = service();
        assert_eq!(svc.state(), ServiceState::Uninitialized);

        svc.initialize().await.unwrap();
        assert_eq!(svc.state(), ServiceState::Ready);

        // Second call is a no-op
        let key = svc.public_key().await;
        svc.initialize().await.unwrap();
        assert_eq!(svc.public_key().await, key);
    }

    #[tokio::test]
    async fn test_calls_before_initialize_fail_loudly() {
        let svc = service();
        assert!(matches!(
            svc.encrypt_message("hi", "bob").await,
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            svc.decrypt_message("{}", "bob").await,
            Err(Error::NotInitialized)
        ));
        assert!(matches!(svc.encrypt_metadata("x"), Err(Error::NotInitialized)));
        assert!(matches!(svc.rotate_keys().await, Err(Error::NotInitialized)));
        assert!(svc.generate_security_fingerprint("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_rotation_flag_blocks_crypto() {
        let svc = service();
        svc.initialize().await.unwrap();
        let me = svc.public_key().await.unwrap();
        svc.add_contact_key_sodium("self", &me).await.unwrap();

        svc.rotating.store(true, Ordering::SeqCst);
        assert!(matches!(
            svc.encrypt_message("hi", "self").await,
            Err(Error::RotationInProgress)
        ));
        assert!(matches!(svc.rotate_keys().await, Err(Error::RotationInProgress)));
        assert!(!svc.is_e2e_ready("self"));

        svc.rotating.store(false, Ordering::SeqCst);
        assert!(svc.encrypt_message("hi", "self").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rotation_serialized_against_inflight_encryption() {
        let svc = Arc::new(service());
        svc.initialize().await.unwrap();
        let me = svc.public_key().await.unwrap();
        svc.add_contact_key_sodium("self", &me).await.unwrap();
        let channel = svc.resolve_channel("self").unwrap();
        let old_keys = svc.identity.read().await.keys().unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.encrypt_message(&format!("msg {}", i), "self").await })
            })
            .collect();
        svc.rotate_keys().await.unwrap();
        let new_keys = svc.identity.read().await.keys().unwrap();

        for task in tasks {
            // A panicking task surfaces here as a JoinError
            match task.await.unwrap() {
                Ok(json) => {
                    let envelope = SealedEnvelope::from_json(&json).unwrap();
                    let under_old = channel.open(&envelope, PayloadKind::Message, &old_keys).is_ok();
                    let under_new = channel.open(&envelope, PayloadKind::Message, &new_keys).is_ok();
                    assert!(under_old ^ under_new, "sealed under a mix of identities");
                }
                Err(Error::RotationInProgress) => {}
                Err(e) => panic!("unexpected error while rotating: {}", e),
            }
        }
        assert!(!svc.is_rotating());
    }

    /// Backend that refuses one blob name and stores the rest in memory
    struct RefusingBackend {
        refused: String,
        inner: MemoryKeyValueStore,
    }

    #[async_trait]
    impl BlobBackend for RefusingBackend {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn load(&self, key: &str) -> Result<Option<String>> {
            if key == self.refused {
                return Err(Error::StorageUnavailable("refused".into()));
            }
            self.inner.get_item(key).await
        }

        async fn save(&self, key: &str, value: &str) -> Result<()> {
            if key == self.refused {
                return Err(Error::StorageUnavailable("refused".into()));
            }
            self.inner.set_item(key, value).await
        }

        async fn clear(&self, key: &str) -> Result<bool> {
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_initialize_holds_no_keys() {
        let config = E2eConfig::default();
        let chain = StorageChain::new(config.storage_timeout()).with_backend(Arc::new(RefusingBackend {
            refused: config.metadata_key_storage_key.clone(),
            inner: MemoryKeyValueStore::new(),
        }));
        let svc = E2eService::with_chain(config, chain, Arc::new(MemoryKeyValueStore::new()));
        svc.add_contact_key("bob", "bob-legacy-key").await.unwrap();

        assert!(matches!(svc.initialize().await, Err(Error::StorageUnavailable(_))));
        assert_eq!(svc.state(), ServiceState::Uninitialized);
        assert!(svc.public_key().await.is_none());
        assert!(svc.legacy_public_key().await.is_none());
        assert!(svc.generate_security_fingerprint("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_rejects_invalid_config() {
        let config = E2eConfig {
            fingerprint_hex_len: 30,
            ..E2eConfig::default()
        };
        let svc = E2eService::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        );
        assert!(matches!(svc.initialize().await, Err(Error::InvalidConfig(_))));
        assert_eq!(svc.state(), ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_rotation_clears_flag() {
        let svc = service();
        svc.initialize().await.unwrap();
        svc.rotate_keys().await.unwrap();
        assert!(!svc.is_rotating());
        assert_eq!(svc.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn test_is_e2e_ready() {
        let svc = service();
        assert!(!svc.is_e2e_ready("bob"));
        svc.initialize().await.unwrap();
        assert!(!svc.is_e2e_ready("bob"));

        svc.add_contact_key("bob", "bob-legacy-key").await.unwrap();
        assert!(svc.is_e2e_ready("bob"));
    }

    #[tokio::test]
    async fn test_resolve_channel() {
        let svc = service();
        svc.initialize().await.unwrap();
        svc.add_contact_key("bob", "bob-legacy-key").await.unwrap();

        assert_eq!(
            svc.resolve_channel("bob").unwrap(),
            Channel::Legacy {
                contact_public: "bob-legacy-key".into()
            }
        );
        assert!(matches!(
            svc.resolve_channel("carol"),
            Err(Error::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset() {
        let svc = service();
        svc.initialize().await.unwrap();
        let before = svc.public_key().await;
        svc.add_contact_key("bob", "k").await.unwrap();

        svc.reset().await.unwrap();
        assert_eq!(svc.state(), ServiceState::Uninitialized);
        assert!(svc.public_key().await.is_none());
        assert!(!svc.has_key_for("bob", KeyNamespace::Legacy));

        svc.initialize().await.unwrap();
        assert_ne!(svc.public_key().await, before);
    }

    #[tokio::test]
    async fn test_metadata_key_survives_rotation() {
        let svc = service();
        svc.initialize().await.unwrap();
        let sealed = svc.encrypt_metadata("Alice").unwrap();

        svc.rotate_keys().await.unwrap();
        assert_eq!(svc.decrypt_metadata(&sealed).unwrap(), "Alice");
    }
}
