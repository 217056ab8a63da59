//! General persistent key-value store.
//!
//! String keys to string values, the shape of `AsyncStorage`-like stores
//! on mobile. Used as the fallback storage hop and for contact keys.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;

/// String-valued persistent store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; returns whether it existed
    async fn remove_item(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Key-value store held in memory
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored keys
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileKeyValueStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::*;
    use std::path::{Path, PathBuf};
    use tokio::sync::Mutex;

    use crate::error::Error;

    /// Key-value store persisted as a single JSON object on disk
    ///
    /// Writes go to a sibling temp file which is then renamed over the
    /// original, so a crash never leaves a half-written document.
    pub struct FileKeyValueStore {
        path: PathBuf,
        // Serializes read-modify-write cycles
        lock: Mutex<()>,
    }

    impl FileKeyValueStore {
        /// Open (or lazily create) the store at `path`
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                lock: Mutex::new(()),
            }
        }

        /// Location of the backing file
        pub fn path(&self) -> &Path {
            &self.path
        }

        async fn read_all(&self) -> Result<HashMap<String, String>> {
            match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
                Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                    Error::StorageReadError(format!(
                        "{} is not a valid store: {}",
                        self.path.display(),
                        e
                    ))
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
                Err(e) => Err(e.into()),
            }
        }

        async fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
            let json = serde_json::to_string(entries)?;
            let tmp = self.path.with_extension("tmp");

            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| Error::StorageWriteError(e.to_string()))?;
                }
            }
            tokio::fs::write(&tmp, json)
                .await
                .map_err(|e| Error::StorageWriteError(e.to_string()))?;
            tokio::fs::rename(&tmp, &self.path)
                .await
                .map_err(|e| Error::StorageWriteError(e.to_string()))?;
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStore for FileKeyValueStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>> {
            let _guard = self.lock.lock().await;
            Ok(self.read_all().await?.remove(key))
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<()> {
            let _guard = self.lock.lock().await;
            let mut entries = self.read_all().await?;
            entries.insert(key.to_string(), value.to_string());
            self.write_all(&entries).await
        }

        async fn remove_item(&self, key: &str) -> Result<bool> {
            let _guard = self.lock.lock().await;
            let mut entries = self.read_all().await?;
            let existed = entries.remove(key).is_some();
            if existed {
                self.write_all(&entries).await?;
            }
            Ok(existed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_kv() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get_item("a").await.unwrap(), None);

        store.set_item("a", "1").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys(), vec!["a".to_string()]);

        assert!(store.remove_item("a").await.unwrap());
        assert!(!store.remove_item("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_kv_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileKeyValueStore::new(&path);
        store.set_item("contacts", "{\"bob\":\"k\"}").await.unwrap();
        store.set_item("other", "x").await.unwrap();
        drop(store);

        let reopened = FileKeyValueStore::new(&path);
        assert_eq!(
            reopened.get_item("contacts").await.unwrap().as_deref(),
            Some("{\"bob\":\"k\"}")
        );
        assert!(reopened.remove_item("other").await.unwrap());
        assert_eq!(reopened.get_item("other").await.unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_kv_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileKeyValueStore::new(&path);
        assert!(matches!(
            store.get_item("a").await,
            Err(crate::error::Error::StorageReadError(_))
        ));
    }
}
