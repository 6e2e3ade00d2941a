//! Tile cache layer.
//!
//! This module provides the persistent cache of decoded tiles and sheets
//! consulted by the load scheduler before every fetch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Load Scheduler              │
//! └────────────────────┬────────────────────┘
//!                      │ get / put (resolved file name)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileCache                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ decoded LRU  │  │   TileCodec     │  │
//! │  │ (in memory)  │  │ (PNG payloads)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ JSON records
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   CacheStore (memory / filesystem)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCache`]: entry-bounded cache with bulk eviction of the oldest records
//! - [`CacheStore`]: string key-value store trait, with [`MemoryCacheStore`]
//!   and [`FsCacheStore`] implementations
//! - [`TileCodec`]: decodes fetched files and encodes/decodes cache payloads

mod cache;
mod encoder;
mod store;

pub use cache::{
    store_key, CacheRecord, TileCache, CACHE_KEY_PREFIX, EVICTION_MARGIN, MAX_CACHE_SIZE,
};
pub use encoder::TileCodec;
pub use store::{CacheStore, FsCacheStore, MemoryCacheStore};
