//! # Axiom E2E
//!
//! End-to-end encryption and key-exchange core of the Axiom messenger.
//! Messages, files and metadata are sealed here; everything outside this
//! crate only ever sees opaque envelope strings.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          AXIOM E2E CORE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │        UI / transport                       Key directory (backend)    │
//! │              │                                      ▲                   │
//! │              ▼                                      │                   │
//! │  ┌──────────────────────────────┐      ┌────────────┴─────────────┐    │
//! │  │        E2eService            │◄─────│       KeyExchange        │    │
//! │  │  initialize / rotate_keys    │      │  exchange / refresh /    │    │
//! │  │  encrypt_* / decrypt_*       │      │  revoke                  │    │
//! │  │  fingerprint                 │      └──────────────────────────┘    │
//! │  └──────┬──────────┬────────────┘                                      │
//! │         │          │                                                    │
//! │         ▼          ▼                                                    │
//! │  ┌────────────┐ ┌─────────────────┐  ┌──────────────────────────────┐  │
//! │  │ KeyPair    │ │ ContactKey      │  │  crypto + envelope           │  │
//! │  │ Provider   │ │ Registry        │  │  sodium-1 / 1.0 / metadata   │  │
//! │  └─────┬──────┘ └───────┬─────────┘  │  fingerprint                 │  │
//! │        │                │            └──────────────────────────────┘  │
//! │        ▼                ▼                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ storage: secure credential store ──► key-value store (fallback)  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Service configuration
//! - [`crypto`] - Stateless primitives (box, legacy AES-CBC, metadata seal, fingerprint)
//! - [`envelope`] - Wire formats
//! - [`storage`] - Credential and key-value stores, fallback chain
//! - [`identity`] - Identity key pairs
//! - [`contacts`] - Contact public keys
//! - [`service`] - The `E2eService` facade
//! - [`exchange`] - Key directory glue
//!
//! ## Security Notes
//!
//! The legacy "1.0" scheme derives its wrapping key from a *public* string.
//! Anyone who has seen the contact's legacy key can open those envelopes.
//! It is kept for wire compatibility only; new contacts should always be
//! given a sodium key.
//!
//! ## Example
//!
//! ```ignore
//! use axiom_e2e::{E2eConfig, E2eService, MemoryCredentialStore, MemoryKeyValueStore};
//! use std::sync::Arc;
//!
//! let service = E2eService::new(
//!     E2eConfig::default(),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(MemoryKeyValueStore::new()),
//! );
//! service.initialize().await?;
//!
//! let me = service.public_key().await.unwrap();
//! service.add_contact_key_sodium("self", &me).await?;
//! let envelope = service.encrypt_message("Bonjour Axiom", "self").await?;
//! assert_eq!(service.decrypt_message(&envelope, "self").await?, "Bonjour Axiom");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod contacts;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod logging;
pub mod service;
pub mod storage;
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::E2eConfig;
pub use contacts::{ContactKeyRegistry, KeyNamespace};
pub use envelope::{LegacyEnvelope, MetadataEnvelope, SealedEnvelope, SodiumEnvelope};
pub use error::{Error, Result};
pub use exchange::{EncryptionType, KeyDirectory, KeyExchange};
pub use identity::{IdentityKeys, KeyPairProvider};
pub use service::{Channel, E2eService, ServiceState};
pub use storage::{
    KeyValueStore, MemoryCredentialStore, MemoryKeyValueStore, SecureCredentialStore,
    StorageChain,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Axiom E2E
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
