//! Test utilities for integration tests.
//!
//! This module provides a mock asset source with request tracking, failure
//! injection and per-file delays, plus helpers for building tile images and
//! manifests in each supported shape.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageFormat, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use mosaic_streamer::error::IoError;
use mosaic_streamer::io::AssetSource;

// =============================================================================
// Mock Asset Source with Request Tracking
// =============================================================================

/// An in-memory asset source that records every fetch.
///
/// Files can be made to fail with a server error and to resolve after a
/// delay, which is how tests shuffle completion order.
pub struct MockAssetSource {
    files: HashMap<String, Bytes>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockAssetSource {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            failing: HashSet::new(),
            delays: HashMap::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.insert(name.into(), data.into());
        self
    }

    /// Make `name` answer with HTTP 500.
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn with_delay(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(name.into(), delay);
        self
    }

    /// Assign every file a pseudo-random delay below `max_ms` derived from `seed`.
    pub fn with_seeded_delays(mut self, seed: u64, max_ms: u64) -> Self {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        let mut rng = XorShift::new(seed);
        for name in names {
            let delay = Duration::from_millis(rng.next() % max_ms.max(1));
            self.delays.insert(name, delay);
        }
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    pub async fn requests_for(&self, name: &str) -> usize {
        self.requests.read().await.iter().filter(|r| *r == name).count()
    }

    pub async fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl AssetSource for MockAssetSource {
    async fn fetch(&self, name: &str) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(name.to_string());

        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(name) {
            return Err(IoError::Status {
                name: name.to_string(),
                status: 500,
            });
        }
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| IoError::NotFound(name.to_string()))
    }

    fn identifier(&self) -> &str {
        "mock://mosaic"
    }
}

/// Minimal deterministic generator for reproducible delay shuffles.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Distinct opaque colour for grid cell `(x, y)`.
pub fn cell_color(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(40 + x * 50) as u8, (40 + y * 50) as u8, ((x + y) * 20) as u8, 255])
}

pub fn solid(size: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(size, size, color)
}

pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn webp_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .unwrap();
    buf
}

// =============================================================================
// Manifest Builders
// =============================================================================

/// Standalone-tile manifest and files for a `w` × `h` grid of solid tiles.
///
/// With `compact`, each tile also lists a WebP name; only the PNG files are
/// added to the source unless `publish_compact` is set.
pub fn standalone_source(
    w: u32,
    h: u32,
    tile_size: u32,
    compact: bool,
    publish_compact: bool,
) -> MockAssetSource {
    let mut tiles = Vec::new();
    let mut source = MockAssetSource::new();
    for y in 0..h {
        for x in 0..w {
            let png = format!("tile_{}_{}.png", y, x);
            let webp = format!("tile_{}_{}.webp", y, x);
            let image = solid(tile_size, cell_color(x, y));

            let mut entry = serde_json::json!({ "x": x, "y": y, "filename": png });
            if compact {
                entry["filename_webp"] = serde_json::json!(webp);
                if publish_compact {
                    source = source.with_file(webp.clone(), webp_bytes(&image));
                }
            }
            tiles.push(entry);
            source = source.with_file(png, png_bytes(&image));
        }
    }

    let manifest = serde_json::json!({
        "width": w,
        "height": h,
        "tile_size": tile_size,
        "tiles": tiles,
    });
    source.with_file("metadata.json", serde_json::to_vec(&manifest).unwrap())
}

/// Sprite-sheet manifest: an `n` × `n` grid of sheets, each packing a
/// `per` × `per` block of 1-pixel tiles.
pub fn sprite_source(n: u32, per: u32) -> MockAssetSource {
    let mut source = MockAssetSource::new();
    let mut sheets = Vec::new();
    for sy in 0..n {
        for sx in 0..n {
            let index = sy * n + sx;
            let mut sheet = RgbaImage::new(per, per);
            let mut positions = Vec::new();
            for ty in 0..per {
                for tx in 0..per {
                    let (gx, gy) = (sx * per + tx, sy * per + ty);
                    sheet.put_pixel(tx, ty, cell_color(gx, gy));
                    positions.push(serde_json::json!({
                        "x": gx, "y": gy, "sprite_x": tx, "sprite_y": ty
                    }));
                }
            }
            let png = format!("sprite_{}.png", index);
            source = source.with_file(png.clone(), png_bytes(&sheet));
            sheets.push(serde_json::json!({
                "index": index,
                "grid_x": sx,
                "grid_y": sy,
                "filename_png": png,
                "filename_webp": format!("sprite_{}.webp", index),
                "tile_positions": positions,
            }));
        }
    }

    let manifest = serde_json::json!({
        "original_metadata": { "width": n * per, "height": n * per, "tile_size": 1 },
        "sprite_config": { "tile_size": 1, "grid_size": n },
        "sheets": sheets,
    });
    source.with_file("metadata.json", serde_json::to_vec(&manifest).unwrap())
}

/// Single-image manifest: one `w` × `h` PNG holding every 1-pixel tile.
pub fn single_image_source(w: u32, h: u32) -> MockAssetSource {
    let image = RgbaImage::from_fn(w, h, cell_color);
    let manifest = serde_json::json!({
        "single_png": {
            "filename_png": "mosaic.png",
            "filename_webp": "mosaic.webp",
            "has_webp": false,
            "width": w,
            "height": h,
            "tile_size": 1,
        },
        "original_metadata": { "width": w, "height": h, "tile_size": 1 },
    });
    MockAssetSource::new()
        .with_file("mosaic.png", png_bytes(&image))
        .with_file("metadata.json", serde_json::to_vec(&manifest).unwrap())
}

/// Check that every pixel of `framebuffer` carries its cell's colour.
pub fn assert_reference_composite(framebuffer: &RgbaImage, grid_w: u32, grid_h: u32) {
    let (fw, fh) = framebuffer.dimensions();
    for (px, py, pixel) in framebuffer.enumerate_pixels() {
        let x = (px as u64 * grid_w as u64 / fw as u64) as u32;
        let y = (py as u64 * grid_h as u64 / fh as u64) as u32;
        assert_eq!(*pixel, cell_color(x, y), "pixel ({}, {})", px, py);
    }
}
