//! # Storage Module
//!
//! Persistence collaborators of the E2E core.
//!
//! ## Storage Chain
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE CHAIN                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  load(name)                                                            │
//! │  ──────────                                                             │
//! │                                                                         │
//! │   ┌──────────────────┐                          ┌──────────────────┐   │
//! │   │ Secure credential│                          │  Key-value store │   │
//! │   │ store (keychain) │                          │  (fallback)      │   │
//! │   └────────┬─────────┘                          └────────┬─────────┘   │
//! │            │ {generation, payload}                       │             │
//! │            └──────────────► newest valid copy ◄──────────┘             │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                          re-homed to the first hop                     │
//! │                          that accepts the write                        │
//! │                                                                         │
//! │  save(name, value)                                                     │
//! │  ─────────────────                                                      │
//! │  stamped with a fresh generation; the first hop that accepts the       │
//! │  write wins and the blob is cleared from every other hop.              │
//! │                                                                         │
//! │  Every hop is bounded by `storage_timeout_ms`.                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A hop that was down during a save may still hold an older copy when it
//! comes back. The generation stamp decides which copy is current, so an
//! identity written during an outage is not replaced by the stale one.

mod chain;
mod kv_store;
mod secure_store;

pub use chain::{BlobBackend, KeyValueBackend, SecureStoreBackend, StorageChain};
#[cfg(not(target_arch = "wasm32"))]
pub use kv_store::FileKeyValueStore;
pub use kv_store::{KeyValueStore, MemoryKeyValueStore};
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub use secure_store::KeychainCredentialStore;
pub use secure_store::{MemoryCredentialStore, SecureCredentialStore};

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Run a storage future with an upper bound on its latency
#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn with_timeout<T, F>(duration: Duration, label: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(crate::error::Error::Timeout(format!(
            "{} did not answer within {}ms",
            label,
            duration.as_millis()
        ))),
    }
}

/// The browser has no tokio timer; storage calls run unbounded there
#[cfg(target_arch = "wasm32")]
pub(crate) async fn with_timeout<T, F>(_duration: Duration, _label: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    fut.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_millis(50), "fast", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(Error::Timeout(msg)) => assert!(msg.contains("slow")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
