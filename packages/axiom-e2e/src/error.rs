//! # Error Handling
//!
//! Error types for the Axiom E2E core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Lifecycle Errors                                                  │
//! │  │   ├── NotInitialized        - Identity not loaded yet               │
//! │  │   ├── Initializing          - initialize() still running            │
//! │  │   └── RotationInProgress    - Keys are being rotated                │
//! │  │                                                                      │
//! │  ├── Identity / Key Errors                                             │
//! │  │   ├── KeyNotFound           - Contact has no key in namespace       │
//! │  │   ├── InvalidKey            - Malformed key material                │
//! │  │   └── KeyDerivationFailed   - KDF failure                           │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - Seal operation failed                 │
//! │  │   ├── DecryptionFailed      - Open/unwrap rejected the envelope     │
//! │  │   ├── InvalidEnvelope       - Envelope JSON malformed               │
//! │  │   └── UnsupportedVersion    - Unknown envelope version tag          │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageUnavailable    - Every storage hop failed              │
//! │  │   ├── StorageReadError      - A single read failed                  │
//! │  │   ├── StorageWriteError     - A single write failed                 │
//! │  │   └── Timeout               - A storage hop did not answer in time  │
//! │  │                                                                      │
//! │  ├── Key Exchange Errors                                               │
//! │  │   └── KeyExchangeFailed     - Directory refused or did not verify   │
//! │  │                                                                      │
//! │  ├── Configuration Errors                                              │
//! │  │   └── InvalidConfig         - A setting is out of range             │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      └── SerializationError                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cryptographic failures are plain `Err` values. Callers (UI, transport)
//! branch on them to show "message could not be decrypted" without crashing.
//! Error messages never carry plaintext or key material.

use thiserror::Error;

use crate::contacts::KeyNamespace;

/// Result type alias for Axiom E2E operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the E2E core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors (100-199)
    // ========================================================================
    /// Identity keys have not been loaded or generated yet
    #[error("E2E service has not been initialized. Call initialize() first.")]
    NotInitialized,

    /// Initialization is still running on another task
    #[error("E2E service is still initializing.")]
    Initializing,

    /// Identity keys are being rotated
    #[error("Key rotation in progress; retry once it completes.")]
    RotationInProgress,

    // ========================================================================
    // Identity / Key Errors (200-299)
    // ========================================================================
    /// The contact has no public key in the required namespace
    #[error("No {namespace} public key registered for contact '{contact_id}'")]
    KeyNotFound {
        /// Contact the lookup was made for
        contact_id: String,
        /// Namespace that was searched
        namespace: KeyNamespace,
    },

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key derivation failed
    #[error("Failed to derive keys: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// The envelope structure could not be parsed
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The envelope carries a version tag this build does not know
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================
    /// Every storage backend failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Failed to read from a storage backend
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to a storage backend
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ========================================================================
    // Key Exchange Errors (500-599)
    // ========================================================================
    /// Key exchange with the directory failed
    #[error("Key exchange failed: {0}")]
    KeyExchangeFailed(String),

    // ========================================================================
    // Configuration Errors (600-699)
    // ========================================================================
    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Lifecycle
    /// - 200-299: Identity / keys
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 500-599: Key exchange
    /// - 600-699: Configuration
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::NotInitialized => 100,
            Error::Initializing => 102,
            Error::RotationInProgress => 103,

            Error::KeyNotFound { .. } => 200,
            Error::InvalidKey(_) => 201,
            Error::KeyDerivationFailed(_) => 202,

            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,
            Error::InvalidEnvelope(_) => 302,
            Error::UnsupportedVersion(_) => 303,

            Error::StorageUnavailable(_) => 400,
            Error::StorageReadError(_) => 401,
            Error::StorageWriteError(_) => 402,
            Error::Timeout(_) => 403,

            Error::KeyExchangeFailed(_) => 500,

            Error::InvalidConfig(_) => 600,

            Error::SerializationError(_) => 900,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::StorageUnavailable(_)
                | Error::RotationInProgress
                | Error::Initializing
        )
    }

    /// True for failures of the cryptographic transform itself
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            Error::DecryptionFailed(_)
                | Error::EncryptionFailed(_)
                | Error::InvalidEnvelope(_)
                | Error::UnsupportedVersion(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidEnvelope(format!("invalid base64: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
