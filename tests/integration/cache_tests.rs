//! Tile cache tests.
//!
//! These tests verify:
//! - The entry ceiling holds and the most recent entries survive eviction
//! - Reads refresh access time so hot entries outlive cold ones
//! - Filesystem-backed caches persist across cache instances
//! - Corrupt records are dropped on read
//! - Quota rejections trigger one eviction pass and a retry
//! - Concurrent writers never push the store past the ceiling

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use mosaic_streamer::tile::{store_key, CacheStore, FsCacheStore, MemoryCacheStore, TileCache};
use tokio::task::JoinSet;

use super::test_utils::solid;

fn tile(shade: u8) -> RgbaImage {
    solid(4, Rgba([shade, shade, shade, 255]))
}

fn key(i: usize) -> String {
    format!("tile_{:03}.png", i)
}

// =============================================================================
// Eviction
// =============================================================================

#[tokio::test]
async fn test_ceiling_keeps_most_recent() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = TileCache::with_limits(store.clone(), 10, 3);

    for i in 0..15 {
        cache.put(&key(i), &tile(i as u8)).await;
        assert!(cache.len().await <= 10, "ceiling exceeded after {} puts", i + 1);
    }

    for i in 10..15 {
        assert!(cache.contains(&key(i)).await, "recent entry {} evicted", i);
    }
    assert!(!cache.contains(&key(0)).await);
    assert_eq!(store.len().await, cache.len().await);
}

#[tokio::test]
async fn test_read_refreshes_entry() {
    let cache = TileCache::with_limits(Arc::new(MemoryCacheStore::new()), 3, 1);

    cache.put(&key(0), &tile(0)).await;
    cache.put(&key(1), &tile(1)).await;
    cache.put(&key(2), &tile(2)).await;

    // Touch the oldest entry so the next eviction takes key 1 instead
    assert!(cache.get(&key(0)).await.is_some());
    cache.put(&key(3), &tile(3)).await;

    assert!(cache.contains(&key(0)).await);
    assert!(!cache.contains(&key(1)).await);
    assert!(cache.contains(&key(3)).await);
}

#[tokio::test]
async fn test_overwrite_does_not_evict() {
    let cache = TileCache::with_limits(Arc::new(MemoryCacheStore::new()), 2, 1);

    cache.put(&key(0), &tile(0)).await;
    cache.put(&key(1), &tile(1)).await;
    cache.put(&key(1), &tile(9)).await;

    assert_eq!(cache.len().await, 2);
    assert!(cache.contains(&key(0)).await);
    assert_eq!(*cache.get(&key(1)).await.unwrap().get_pixel(0, 0), Rgba([9, 9, 9, 255]));
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_fs_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FsCacheStore::open(dir.path()).await.unwrap());
        let cache = TileCache::new(store);
        cache.put("sprites/sheet_00.png", &tile(42)).await;
    }

    let store = Arc::new(FsCacheStore::open(dir.path()).await.unwrap());
    let cache = TileCache::new(store.clone());
    let image = cache.get("sprites/sheet_00.png").await.unwrap();
    assert_eq!(image.dimensions(), (4, 4));
    assert_eq!(*image.get_pixel(3, 3), Rgba([42, 42, 42, 255]));

    let keys = store.keys().await.unwrap();
    assert_eq!(keys, vec![store_key("sprites/sheet_00.png")]);
}

#[tokio::test]
async fn test_clear_leaves_foreign_keys() {
    let store = Arc::new(MemoryCacheStore::new());
    store.set("user_settings", "{}".to_string()).await.unwrap();

    let cache = TileCache::new(store.clone());
    cache.put(&key(0), &tile(0)).await;
    cache.put(&key(1), &tile(1)).await;
    assert_eq!(cache.len().await, 2);

    cache.clear().await;
    assert!(cache.is_empty().await);
    assert_eq!(store.get("user_settings").await.unwrap(), Some("{}".to_string()));
}

// =============================================================================
// Corruption
// =============================================================================

#[tokio::test]
async fn test_corrupt_records_removed() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = TileCache::new(store.clone());

    store
        .set(&store_key("garbage.png"), "not json".to_string())
        .await
        .unwrap();
    store
        .set(
            &store_key("bad_payload.png"),
            r#"{"data":"zz-not-hex","timestamp":1}"#.to_string(),
        )
        .await
        .unwrap();

    assert!(cache.get("garbage.png").await.is_none());
    assert!(cache.get("bad_payload.png").await.is_none());
    assert!(store.is_empty().await);
}

// =============================================================================
// Quota
// =============================================================================

#[tokio::test]
async fn test_quota_rejection_evicts_and_retries() {
    // Measure one record to size the quota for exactly two
    let sizing = Arc::new(MemoryCacheStore::new());
    TileCache::new(sizing.clone()).put(&key(0), &tile(0)).await;
    let record = sizing.used_bytes().await;

    let store = Arc::new(MemoryCacheStore::with_quota(record * 2 + record / 2));
    let cache = TileCache::with_limits(store.clone(), 100, 1);

    cache.put(&key(0), &tile(0)).await;
    cache.put(&key(1), &tile(0)).await;
    cache.try_put(&key(2), &tile(0)).await.unwrap();

    assert_eq!(cache.len().await, 2);
    assert!(!cache.contains(&key(0)).await);
    assert!(cache.contains(&key(2)).await);
}

#[tokio::test]
async fn test_oversized_entry_fails_after_retry() {
    let cache = TileCache::with_limits(Arc::new(MemoryCacheStore::with_quota(16)), 100, 1);
    assert!(cache.try_put(&key(0), &tile(0)).await.is_err());
    assert!(cache.is_empty().await);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_respect_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsCacheStore::open(dir.path()).await.unwrap());
    let cache = Arc::new(TileCache::with_limits(store.clone(), 5, 1));

    let mut writes = JoinSet::new();
    for i in 0..20 {
        let cache = Arc::clone(&cache);
        writes.spawn(async move {
            cache.put(&key(i), &tile(i as u8)).await;
        });
    }
    while writes.join_next().await.is_some() {}

    let stored = store.keys().await.unwrap().len();
    assert!(stored <= 5, "{} entries stored with a ceiling of 5", stored);
    assert!(stored > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_and_puts_respect_ceiling() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = Arc::new(TileCache::with_limits(store.clone(), 4, 1));
    for i in 0..4 {
        cache.put(&key(i), &tile(i as u8)).await;
    }

    let mut tasks = JoinSet::new();
    for i in 4..24 {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            cache.get(&key(i % 4)).await;
            cache.put(&key(i), &tile(i as u8)).await;
        });
    }
    while tasks.join_next().await.is_some() {}

    assert!(store.len().await <= 4);
}
