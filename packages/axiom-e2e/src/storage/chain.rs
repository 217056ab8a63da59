//! Ordered fallback over named-blob backends.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{with_timeout, KeyValueStore, SecureCredentialStore};
use crate::error::{Error, Result};
use crate::time::now_timestamp_micros;

/// A backend able to hold named string blobs
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the blob called `key`
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write the blob called `key`
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the blob called `key`; returns whether it existed
    async fn clear(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// ADAPTERS
// ============================================================================

/// Blob backend over a [`SecureCredentialStore`]
///
/// Each blob becomes its own credential, under the service name
/// `"{service}.{key}"`.
pub struct SecureStoreBackend {
    store: Arc<dyn SecureCredentialStore>,
    service: String,
}

impl SecureStoreBackend {
    /// Wrap a credential store under a logical service name
    pub fn new(store: Arc<dyn SecureCredentialStore>, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
        }
    }

    fn service_for(&self, key: &str) -> String {
        format!("{}.{}", self.service, key)
    }
}

#[async_trait]
impl BlobBackend for SecureStoreBackend {
    fn name(&self) -> &'static str {
        "secure-store"
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        self.store.get(&self.service_for(key)).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.store.set(&self.service_for(key), value).await
    }

    async fn clear(&self, key: &str) -> Result<bool> {
        self.store.reset(&self.service_for(key)).await
    }
}

/// Blob backend over a [`KeyValueStore`]
pub struct KeyValueBackend {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueBackend {
    /// Wrap a key-value store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BlobBackend for KeyValueBackend {
    fn name(&self) -> &'static str {
        "key-value"
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        self.store.get_item(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.store.set_item(key, value).await
    }

    async fn clear(&self, key: &str) -> Result<bool> {
        self.store.remove_item(key).await
    }
}

// ============================================================================
// STORAGE CHAIN
// ============================================================================

/// On-disk wrapper stamping a blob with the generation that wrote it
///
/// Blobs written without the wrapper read as generation 0.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredBlob {
    generation: u64,
    payload: String,
}

#[derive(Serialize)]
struct StoredBlobRef<'a> {
    generation: u64,
    payload: &'a str,
}

impl StoredBlob {
    fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            generation: 0,
            payload: raw.to_string(),
        })
    }
}

/// The newest valid copy found during a load
struct Winner<T> {
    hop: usize,
    generation: u64,
    raw: Zeroizing<String>,
    value: T,
}

/// Backends tried in order, each bounded by the same timeout
///
/// Every save stamps the blob with a generation strictly greater than any
/// generation this chain has seen for that key. A load reads every hop and
/// keeps the newest copy, so a copy written to a fallback hop while the
/// primary was down is not shadowed by the primary's older copy once it
/// comes back.
pub struct StorageChain {
    hops: Vec<Arc<dyn BlobBackend>>,
    timeout: Duration,
    generations: Mutex<HashMap<String, u64>>,
}

impl StorageChain {
    /// An empty chain
    pub fn new(timeout: Duration) -> Self {
        Self {
            hops: Vec::new(),
            timeout,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Append a backend at the lowest priority
    pub fn with_backend(mut self, backend: Arc<dyn BlobBackend>) -> Self {
        self.hops.push(backend);
        self
    }

    /// Names of the hops, highest priority first
    pub fn hop_names(&self) -> Vec<&'static str> {
        self.hops.iter().map(|hop| hop.name()).collect()
    }

    /// Load a blob and parse it
    ///
    /// Every hop is read and the valid copy with the highest generation wins;
    /// on a tie the higher-priority hop wins. A hop that errors, times out or
    /// holds an unparseable blob is logged and skipped. When the winner does
    /// not sit alone in the first hop, it is written back through the chain
    /// so the other copies are replaced.
    ///
    /// Returns `Ok(None)` when no hop holds a usable blob, and
    /// `StorageUnavailable` when no hop could be read at all.
    pub async fn load_with<T, F>(&self, key: &str, parse: F) -> Result<Option<T>>
    where
        F: Fn(&str) -> Result<T>,
    {
        let mut failures = Vec::new();
        let mut copies = 0usize;
        let mut newest_seen = 0u64;
        let mut winner: Option<Winner<T>> = None;

        for (index, hop) in self.hops.iter().enumerate() {
            match with_timeout(self.timeout, hop.name(), hop.load(key)).await {
                Ok(Some(raw)) => {
                    let raw = Zeroizing::new(raw);
                    copies += 1;
                    let blob = StoredBlob::decode(&raw);
                    newest_seen = newest_seen.max(blob.generation);

                    match parse(&blob.payload) {
                        Ok(value) => {
                            if winner.as_ref().map_or(true, |w| blob.generation > w.generation) {
                                winner = Some(Winner {
                                    hop: index,
                                    generation: blob.generation,
                                    raw,
                                    value,
                                });
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                hop = hop.name(),
                                key,
                                error = %e,
                                "Stored blob is corrupt, treating as absent"
                            );
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        hop = hop.name(),
                        key,
                        error = %e,
                        "Storage hop failed on load, falling back"
                    );
                    failures.push(format!("{}: {}", hop.name(), e));
                }
            }
        }

        self.observe_generation(key, newest_seen);

        if !self.hops.is_empty() && failures.len() == self.hops.len() {
            return Err(Error::StorageUnavailable(failures.join("; ")));
        }

        let Some(winner) = winner else {
            return Ok(None);
        };

        tracing::debug!(
            hop = self.hops[winner.hop].name(),
            key,
            generation = winner.generation,
            "Loaded blob"
        );

        if winner.hop > 0 || copies > 1 {
            // Re-home the newest copy; the load already succeeded
            if let Err(e) = self.write_raw(key, &winner.raw).await {
                tracing::warn!(key, error = %e, "Could not re-home newest blob");
            }
        }

        Ok(Some(winner.value))
    }

    /// Persist a blob to the first hop that accepts it
    ///
    /// The blob is stamped with a fresh generation and lower-priority copies
    /// are cleared best-effort afterwards. Returns the name of the hop that
    /// took the write.
    pub async fn save(&self, key: &str, value: &str) -> Result<&'static str> {
        let generation = self.next_generation(key);
        let raw = Zeroizing::new(serde_json::to_string(&StoredBlobRef {
            generation,
            payload: value,
        })?);
        self.write_raw(key, &raw).await
    }

    /// Delete a blob from every hop
    ///
    /// Returns whether any hop held it. Fails only if every hop failed.
    pub async fn clear(&self, key: &str) -> Result<bool> {
        let mut removed = false;
        let mut failures = Vec::new();

        for hop in &self.hops {
            match with_timeout(self.timeout, hop.name(), hop.clear(key)).await {
                Ok(existed) => removed |= existed,
                Err(e) => {
                    tracing::warn!(hop = hop.name(), key, error = %e, "Failed to clear blob");
                    failures.push(format!("{}: {}", hop.name(), e));
                }
            }
        }

        if !self.hops.is_empty() && failures.len() == self.hops.len() {
            return Err(Error::StorageUnavailable(failures.join("; ")));
        }
        Ok(removed)
    }

    async fn write_raw(&self, key: &str, raw: &str) -> Result<&'static str> {
        let mut failures = Vec::new();

        for (index, hop) in self.hops.iter().enumerate() {
            match with_timeout(self.timeout, hop.name(), hop.save(key, raw)).await {
                Ok(()) => {
                    if index > 0 {
                        tracing::warn!(hop = hop.name(), key, "Persisted to fallback storage");
                    }
                    self.clear_except(key, index).await;
                    return Ok(hop.name());
                }
                Err(e) => {
                    tracing::warn!(
                        hop = hop.name(),
                        key,
                        error = %e,
                        "Storage hop failed on save, falling back"
                    );
                    failures.push(format!("{}: {}", hop.name(), e));
                }
            }
        }

        Err(Error::StorageUnavailable(if failures.is_empty() {
            "no storage backends configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    async fn clear_except(&self, key: &str, keep: usize) {
        for (index, hop) in self.hops.iter().enumerate() {
            if index == keep {
                continue;
            }
            if let Err(e) = with_timeout(self.timeout, hop.name(), hop.clear(key)).await {
                tracing::debug!(hop = hop.name(), key, error = %e, "Could not clear stale copy");
            }
        }
    }

    fn observe_generation(&self, key: &str, generation: u64) {
        let mut generations = self.generations.lock();
        let known = generations.entry(key.to_string()).or_insert(0);
        *known = (*known).max(generation);
    }

    /// Wall-clock stamp, bumped past anything already seen for `key`
    fn next_generation(&self, key: &str) -> u64 {
        let now = u64::try_from(now_timestamp_micros()).unwrap_or(0);
        let mut generations = self.generations.lock();
        let known = generations.entry(key.to_string()).or_insert(0);
        *known = now.max(known.saturating_add(1));
        *known
    }
}
