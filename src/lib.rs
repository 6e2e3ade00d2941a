//! # Mosaic Streamer
//!
//! A progressive tiled-image mosaic renderer.
//!
//! This library assembles a large composite image out of many small source
//! tiles. Tiles are streamed from a directory or HTTP base path in priority
//! order, cached across sessions in a size-bounded persistent store, drawn
//! incrementally into a framebuffer, and magnified around the pointer by an
//! interactive zoom overlay.
//!
//! ## Features
//!
//! - **Three manifest shapes**: standalone tiles, sprite sheets and a single packed image, detected automatically
//! - **Format negotiation**: compact (WebP) files when supported, with one fallback to PNG
//! - **Persistent cache**: bounded entry count with bulk eviction of the oldest records
//! - **Prioritized loading**: center-out distance or spiral order, critical tiles first, then batches
//! - **Device-aware budgets**: resolution ceilings and batch sizes per device class
//! - **Cancellation**: generation tokens discard stale work after a reload or resize
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Asset sources (filesystem and HTTP)
//! - [`manifest`] - Manifest loading, shape detection and validation
//! - [`mod@format`] - Compact-format negotiation
//! - [`tile`] - Tile cache, cache stores and payload codec
//! - [`schedule`] - Load ordering, device policy and the load scheduler
//! - [`render`] - Compositor, zoom overlay and pixelation fallback
//! - [`mosaic`] - One mosaic instance wiring it all together
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mosaic_streamer::{FsAssetSource, MemoryCacheStore, Mosaic, MosaicOptions, TileCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(FsAssetSource::new("public/mosaic"));
//!     let cache = Arc::new(TileCache::new(Arc::new(MemoryCacheStore::new())));
//!
//!     let mut mosaic = Mosaic::new(source, cache, MosaicOptions::new(400, 600));
//!     match mosaic.load().await {
//!         Ok(report) => println!("drew {}/{} cells", report.drawn, report.cells),
//!         Err(e) => eprintln!("showing the plain image instead: {}", e),
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod manifest;
pub mod mosaic;
pub mod render;
pub mod schedule;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{CacheError, IoError, ManifestError, StoreError, TileError};
pub use format::{FormatNegotiator, ResolvedAsset};
pub use io::{AssetSource, FsAssetSource, HttpAssetSource};
pub use manifest::{
    detect_layout, GridPos, ManifestLayout, ManifestLoader, SourceLocator, TileDescriptor,
    TileManifest,
};
pub use mosaic::{CancelHandle, LoadReport, Mosaic, MosaicOptions, MosaicState};
pub use render::{pixelate, Bounds, Compositor, PointerEvent, ZoomOverlay, ZoomRect};
pub use schedule::{
    distance_order, spiral_order, DeviceClass, DeviceProfile, GenerationCounter, GenerationToken,
    LoadPolicy, LoadScheduler, LoadTask, LoadedSource, RenderBudget, ScheduleReport, TaskState,
    TileSourceStrategy,
};
pub use tile::{CacheStore, FsCacheStore, MemoryCacheStore, TileCache, TileCodec};
