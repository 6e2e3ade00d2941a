//! Persistent key-value stores backing the tile cache.
//!
//! A store maps string keys to string values, like a browser's local
//! storage: it knows nothing about tiles, timestamps or eviction. Stores may
//! refuse writes with [`StoreError::QuotaExceeded`]; the tile cache reacts
//! by evicting and retrying.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// String-valued persistent store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store with an optional byte quota.
///
/// The quota counts key and value bytes. A write that would exceed it is
/// rejected without modifying the store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryCacheStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Total bytes used by keys and values.
    pub async fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

// =============================================================================
// Filesystem Store
// =============================================================================

/// Store persisting one file per key under a directory, so cached tiles
/// survive across sessions.
///
/// File names are the hex encoding of the key, which keeps arbitrary asset
/// names (slashes included) flat and reversible.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
    quota: Option<u64>,
}

const ENTRY_EXTENSION: &str = "json";

impl FsCacheStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir, quota: None })
    }

    /// Reject writes once stored values exceed `quota` bytes.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(key.as_bytes()), ENTRY_EXTENSION))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != ENTRY_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        String::from_utf8(hex::decode(stem).ok()?).ok()
    }

    async fn used_bytes_excluding(&self, skip: &Path) -> Result<u64, StoreError> {
        let mut total = 0;
        let mut dir = tokio::fs::read_dir(&self.dir).await.map_err(backend)?;
        while let Some(entry) = dir.next_entry().await.map_err(backend)? {
            let path = entry.path();
            if path == skip || Self::key_for(&path).is_none() {
                continue;
            }
            total += entry.metadata().await.map_err(backend)?.len();
        }
        Ok(total)
    }
}

fn backend(e: std::io::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path_for(key);

        if let Some(quota) = self.quota {
            let used = self.used_bytes_excluding(&path).await?;
            if used + value.len() as u64 > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }

        tokio::fs::write(&path, value).await.map_err(backend)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await.map_err(backend)?;
        while let Some(entry) = dir.next_entry().await.map_err(backend)? {
            if let Some(key) = Self::key_for(&entry.path()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
