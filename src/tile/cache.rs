//! Tile cache for decoded tiles and sheets.
//!
//! Decoded bitmaps are persisted across sessions in a [`CacheStore`] as
//! JSON records `{ "data": <payload>, "timestamp": <ms> }`, keyed by
//! [`CACHE_KEY_PREFIX`] plus the resolved file name. A small in-memory LRU
//! keeps recently decoded bitmaps so instances sharing a file do not decode
//! it twice.
//!
//! # Eviction
//!
//! The store holds at most `max_entries` records. When a new record would
//! exceed that, or the store rejects a write for capacity, the oldest
//! records by `timestamp` are removed in bulk: enough to get back under the
//! ceiling plus a fixed margin, so eviction passes stay rare.
//!
//! Caching is an optimization only. Every failure here is logged and
//! swallowed; a miss falls back to a network fetch.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbaImage;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::encoder::TileCodec;
use super::store::CacheStore;
use crate::error::{CacheError, StoreError};

/// Maximum number of persisted entries.
pub const MAX_CACHE_SIZE: usize = 500;

/// Extra entries removed beyond the minimum on each eviction pass.
pub const EVICTION_MARGIN: usize = 50;

/// Prefix of every store key owned by the tile cache.
pub const CACHE_KEY_PREFIX: &str = "mosaic_tile_";

/// Default number of decoded bitmaps kept in memory.
const DEFAULT_DECODED_CAPACITY: usize = 256;

// =============================================================================
// Cache Record
// =============================================================================

/// Persisted cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Self-contained image payload
    pub data: String,

    /// Last access time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

/// Build the store key for a resolved file name.
pub fn store_key(key: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, key)
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Shared, size-bounded cache of decoded tiles keyed by resolved file name.
///
/// Keys are global: two mosaic instances requesting the same file share
/// one entry. Share the cache across instances via `Arc`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use image::RgbaImage;
/// use mosaic_streamer::tile::{MemoryCacheStore, TileCache};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::new(Arc::new(MemoryCacheStore::new()));
///
///     assert!(cache.get("tile_0_0.png").await.is_none());
///     cache.put("tile_0_0.png", &RgbaImage::new(2, 2)).await;
///     assert!(cache.get("tile_0_0.png").await.is_some());
/// }
/// ```
pub struct TileCache {
    store: Arc<dyn CacheStore>,
    decoded: Mutex<LruCache<String, Arc<RgbaImage>>>,
    codec: TileCodec,
    max_entries: usize,
    margin: usize,
    last_timestamp: AtomicU64,
    // Serializes count, evict and set so concurrent writers cannot
    // overshoot the ceiling. Reads never take it.
    write_lock: Mutex<()>,
}

impl TileCache {
    /// Create a cache over `store` with the default limits.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_limits(store, MAX_CACHE_SIZE, EVICTION_MARGIN)
    }

    /// Create a cache with a custom entry ceiling and eviction margin.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of persisted records (at least 1)
    /// * `margin` - Extra records evicted per pass (at least 1)
    pub fn with_limits(store: Arc<dyn CacheStore>, max_entries: usize, margin: usize) -> Self {
        let decoded_capacity = NonZeroUsize::new(DEFAULT_DECODED_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            decoded: Mutex::new(LruCache::new(decoded_capacity)),
            codec: TileCodec::new(),
            max_entries: max_entries.max(1),
            margin: margin.max(1),
            last_timestamp: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Strictly increasing wall-clock timestamp in milliseconds.
    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut last = self.last_timestamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_timestamp.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Get a decoded tile from the cache.
    ///
    /// Returns `None` on a miss. A hit refreshes the entry's access time.
    /// Corrupt entries are removed as they are encountered.
    pub async fn get(&self, key: &str) -> Option<Arc<RgbaImage>> {
        let skey = store_key(key);
        let raw = match self.store.get(&skey).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.decoded.lock().await.pop(key);
                return None;
            }
            Err(e) => {
                debug!(key = %key, "Cache read failed: {}", e);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(_) => {
                self.discard_corrupt(key).await;
                return None;
            }
        };

        let memo = self.decoded.lock().await.get(key).cloned();
        let image = match memo {
            Some(image) => image,
            None => match self.codec.decode_payload(key, &record.data) {
                Ok(image) => {
                    let image = Arc::new(image);
                    self.decoded
                        .lock()
                        .await
                        .put(key.to_string(), Arc::clone(&image));
                    image
                }
                Err(_) => {
                    self.discard_corrupt(key).await;
                    return None;
                }
            },
        };

        let touched = CacheRecord {
            data: record.data,
            timestamp: self.next_timestamp(),
        };
        if let Ok(raw) = serde_json::to_string(&touched) {
            // Only refresh a record that is still present, so a concurrent
            // eviction is not undone.
            let _guard = self.write_lock.lock().await;
            if matches!(self.store.get(&skey).await, Ok(Some(_))) {
                if let Err(e) = self.store.set(&skey, raw).await {
                    debug!(key = %key, "Failed to refresh cache entry timestamp: {}", e);
                }
            }
        }

        Some(image)
    }

    /// Check whether a record exists for `key` without touching it.
    pub async fn contains(&self, key: &str) -> bool {
        matches!(self.store.get(&store_key(key)).await, Ok(Some(_)))
    }

    /// Store a decoded tile. Best-effort: failures are logged and swallowed.
    pub async fn put(&self, key: &str, image: &RgbaImage) {
        if let Err(e) = self.try_put(key, image).await {
            debug!(key = %key, "Tile not cached: {}", e);
        }
    }

    /// Store a decoded tile, reporting why it could not be cached.
    pub async fn try_put(&self, key: &str, image: &RgbaImage) -> Result<(), CacheError> {
        let payload = self
            .codec
            .encode_payload(image)
            .map_err(|e| CacheError::WriteFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        self.put_payload(key, payload).await?;
        self.decoded
            .lock()
            .await
            .put(key.to_string(), Arc::new(image.clone()));
        Ok(())
    }

    /// Store an already encoded payload.
    ///
    /// If the store rejects the write for capacity, an eviction pass runs
    /// and the write is retried exactly once.
    pub async fn put_payload(&self, key: &str, payload: String) -> Result<(), CacheError> {
        let skey = store_key(key);
        let _guard = self.write_lock.lock().await;
        let keys = self.entry_keys().await;
        let count = keys.len();
        if count >= self.max_entries && !keys.iter().any(|k| k == &skey) {
            self.evict_oldest(count - self.max_entries + self.margin).await;
        }

        let record = CacheRecord {
            data: payload,
            timestamp: self.next_timestamp(),
        };
        let raw = serde_json::to_string(&record).map_err(|e| CacheError::WriteFailed {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        match self.store.set(&skey, raw.clone()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_quota() => {
                let count = self.entry_keys().await.len();
                let evicted = self
                    .evict_oldest(count.saturating_sub(self.max_entries) + self.margin)
                    .await;
                debug!(key = %key, evicted, "Store full, evicted entries before retry");

                self.store.set(&skey, raw).await.map_err(|e| {
                    warn!(key = %key, "Failed to cache tile after cleanup: {}", e);
                    write_failed(key, e)
                })
            }
            Err(e) => Err(write_failed(key, e)),
        }
    }

    /// Remove the `count` oldest records. Returns how many were removed.
    ///
    /// Records that fail to parse are removed as well and do not count.
    pub async fn evict_oldest(&self, count: usize) -> usize {
        let mut dated = Vec::new();
        for skey in self.entry_keys().await {
            match self.store.get(&skey).await {
                Ok(Some(raw)) => match serde_json::from_str::<CacheRecord>(&raw) {
                    Ok(record) => dated.push((record.timestamp, skey)),
                    Err(_) => {
                        let _ = self.store.remove(&skey).await;
                    }
                },
                Ok(None) => {}
                Err(e) => debug!(key = %skey, "Cache read failed during eviction: {}", e),
            }
        }

        dated.sort();
        let mut removed = 0;
        let mut decoded = self.decoded.lock().await;
        for (_, skey) in dated.into_iter().take(count) {
            if self.store.remove(&skey).await.is_ok() {
                decoded.pop(&skey[CACHE_KEY_PREFIX.len()..]);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Cleared old cache entries");
        }
        removed
    }

    /// Remove one entry.
    pub async fn remove(&self, key: &str) {
        self.decoded.lock().await.pop(key);
        if let Err(e) = self.store.remove(&store_key(key)).await {
            debug!(key = %key, "Failed to remove cache entry: {}", e);
        }
    }

    /// Number of persisted records.
    pub async fn len(&self) -> usize {
        self.entry_keys().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every record owned by the cache.
    pub async fn clear(&self) {
        for skey in self.entry_keys().await {
            let _ = self.store.remove(&skey).await;
        }
        self.decoded.lock().await.clear();
    }

    async fn discard_corrupt(&self, key: &str) {
        warn!(key = %key, "{}", CacheError::Corrupt { key: key.to_string() });
        self.remove(key).await;
    }

    async fn entry_keys(&self) -> Vec<String> {
        match self.store.keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(CACHE_KEY_PREFIX))
                .collect(),
            Err(e) => {
                debug!("Failed to list cache entries: {}", e);
                Vec::new()
            }
        }
    }
}

fn write_failed(key: &str, e: StoreError) -> CacheError {
    CacheError::WriteFailed {
        key: key.to_string(),
        message: e.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
