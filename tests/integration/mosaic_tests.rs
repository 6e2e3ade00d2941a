//! End-to-end mosaic tests.
//!
//! These tests drive a [`Mosaic`] through a mock source and verify:
//! - Each manifest shape composites to the reference image
//! - The zoom overlay samples the loaded tiles under the pointer
//! - Missing or invalid manifests switch to the pixelated fallback
//! - Instances sharing a cache skip the network on the second load
//! - Resize, reload and cancellation discard stale generations

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::Rgba;
use mosaic_streamer::{
    DeviceProfile, FormatNegotiator, ManifestError, ManifestLayout, MemoryCacheStore, Mosaic,
    MosaicOptions, MosaicState, PointerEvent, TileCache,
};

use super::test_utils::{
    assert_reference_composite, cell_color, png_bytes, single_image_source, solid,
    sprite_source, standalone_source, MockAssetSource,
};

// =============================================================================
// Helpers
// =============================================================================

fn memory_cache() -> Arc<TileCache> {
    Arc::new(TileCache::new(Arc::new(MemoryCacheStore::new())))
}

fn constrained(width: u32, height: u32) -> MosaicOptions {
    MosaicOptions::new(width, height).with_device(DeviceProfile::constrained())
}

fn mosaic(source: &Arc<MockAssetSource>, cache: Arc<TileCache>, options: MosaicOptions) -> Mosaic {
    Mosaic::new(source.clone(), cache, options)
        .with_negotiator(FormatNegotiator::with_support(false))
}

fn assert_close(actual: Rgba<u8>, expected: Rgba<u8>) {
    for c in 0..4 {
        let diff = (actual.0[c] as i16 - expected.0[c] as i16).abs();
        assert!(diff <= 1, "{:?} != {:?}", actual, expected);
    }
}

// =============================================================================
// Manifest Shapes
// =============================================================================

#[tokio::test]
async fn test_two_by_two_reference_composite() {
    let source = Arc::new(standalone_source(2, 2, 8, false, false));
    let mut m = mosaic(&source, memory_cache(), MosaicOptions::new(2, 2));

    let report = m.load().await.unwrap();
    assert_eq!(report.layout, Some(ManifestLayout::Tiles));
    assert_eq!((report.width, report.height), (2400, 2400));
    assert_eq!(report.drawn, 4);
    assert_eq!(report.cells, 4);
    assert_eq!(m.state(), &MosaicState::Ready);

    let framebuffer = m.framebuffer().unwrap();
    assert_reference_composite(framebuffer, 2, 2);
    assert_eq!(*framebuffer.get_pixel(0, 0), cell_color(0, 0));
    assert_eq!(*framebuffer.get_pixel(2399, 0), cell_color(1, 0));
    assert_eq!(*framebuffer.get_pixel(0, 2399), cell_color(0, 1));
    assert_eq!(*framebuffer.get_pixel(1200, 1200), cell_color(1, 1));
}

#[tokio::test]
async fn test_sprite_sheet_mosaic() {
    let source = Arc::new(sprite_source(2, 2));
    let mut m = mosaic(&source, memory_cache(), constrained(4, 4));

    let report = m.load().await.unwrap();
    assert_eq!(report.layout, Some(ManifestLayout::SpriteSheets));
    assert_eq!((report.width, report.height), (1200, 1200));
    assert_eq!(report.drawn, 16);
    assert_eq!(report.schedule.delivered, 4);
    assert_reference_composite(m.framebuffer().unwrap(), 4, 4);

    // One fetch per sheet plus the manifest
    assert_eq!(source.request_count(), 5);
}

#[tokio::test]
async fn test_single_image_mosaic() {
    let source = Arc::new(single_image_source(3, 2));
    let mut m = mosaic(&source, memory_cache(), constrained(3, 2));

    let report = m.load().await.unwrap();
    assert_eq!(report.layout, Some(ManifestLayout::SingleImage));
    assert_eq!((report.width, report.height), (1200, 800));
    assert_eq!(report.drawn, 6);
    assert_eq!(source.requests_for("mosaic.png").await, 1);
    assert_reference_composite(m.framebuffer().unwrap(), 3, 2);
}

#[tokio::test]
async fn test_progress_reports_each_draw() {
    let source = Arc::new(standalone_source(3, 3, 4, false, false));
    let mut m = mosaic(&source, memory_cache(), constrained(3, 3));

    let mut seen = Vec::new();
    m.load_with_progress(|compositor| seen.push(compositor.drawn_count()))
        .await
        .unwrap();

    assert_eq!(seen, (1..=9).collect::<Vec<_>>());
}

// =============================================================================
// Zoom Overlay
// =============================================================================

#[tokio::test]
async fn test_zoom_overlay_follows_pointer() {
    let source = Arc::new(standalone_source(2, 2, 8, false, false));
    let mut m = mosaic(&source, memory_cache(), constrained(20, 20));
    m.load().await.unwrap();

    let now = Instant::now();
    assert!(m.overlay_image().is_none());

    assert!(m.handle_pointer(PointerEvent::Enter, now));
    assert!(m.compositor().unwrap().smoothing());

    m.handle_pointer(PointerEvent::Move { x: 0.0, y: 0.0 }, now);
    let overlay = m.overlay_image().unwrap();
    assert_eq!(overlay.dimensions(), (20, 20));
    for pixel in overlay.pixels() {
        assert_close(*pixel, cell_color(0, 0));
    }

    m.handle_pointer(PointerEvent::Move { x: 20.0, y: 20.0 }, now);
    let rect = m.overlay().source_rect();
    assert!((rect.right() - 1.0).abs() < 1e-12);
    let overlay = m.overlay_image().unwrap();
    for pixel in overlay.pixels() {
        assert_close(*pixel, cell_color(1, 1));
    }

    m.handle_pointer(PointerEvent::Leave, now);
    assert!(m.overlay_image().is_none());
    assert!(!m.compositor().unwrap().smoothing());
    assert_eq!(m.interaction().pointer, (0.5, 0.5));
}

#[tokio::test]
async fn test_touch_dwell_ends_overlay() {
    let source = Arc::new(standalone_source(2, 2, 8, false, false));
    let mut m = mosaic(&source, memory_cache(), constrained(20, 20));
    m.load().await.unwrap();

    let start = Instant::now();
    m.handle_pointer(PointerEvent::TouchStart { x: 5.0, y: 5.0 }, start);
    assert!(m.interaction().hovering);
    assert_eq!(m.interaction().pointer, (0.25, 0.25));

    m.handle_pointer(PointerEvent::TouchEnd, start);
    assert!(!m.tick(start + Duration::from_millis(500)));
    assert!(m.interaction().hovering);

    assert!(m.tick(start + Duration::from_millis(1000)));
    assert!(!m.interaction().hovering);
    assert!(m.overlay_image().is_none());
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_missing_manifest_uses_pixelated_image() {
    let color = Rgba([200, 100, 50, 255]);
    let source = Arc::new(MockAssetSource::new().with_file("plain.png", png_bytes(&solid(32, color))));
    let mut m = mosaic(&source, memory_cache(), constrained(24, 16));

    let err = m.load().await.unwrap_err();
    assert!(matches!(err, ManifestError::ManifestUnavailable { .. }));
    assert!(matches!(m.state(), MosaicState::Fallback { .. }));
    assert!(m.framebuffer().is_none());

    let image = m.fallback_image("plain.png").await.unwrap();
    assert_eq!(image.dimensions(), (24, 16));
    for pixel in image.pixels() {
        assert_close(*pixel, color);
    }
}

#[tokio::test]
async fn test_duplicate_cells_are_invalid() {
    let manifest = serde_json::json!({
        "width": 2, "height": 1, "tile_size": 4,
        "tiles": [
            { "x": 0, "y": 0, "filename": "a.png" },
            { "x": 0, "y": 0, "filename": "b.png" }
        ]
    });
    let source = Arc::new(
        MockAssetSource::new().with_file("metadata.json", serde_json::to_vec(&manifest).unwrap()),
    );
    let mut m = mosaic(&source, memory_cache(), constrained(2, 1));

    let err = m.load().await.unwrap_err();
    assert!(matches!(err, ManifestError::Invalid { .. }));
    assert!(matches!(m.state(), MosaicState::Fallback { .. }));
    // No tile is requested for an invalid layout
    assert_eq!(source.request_count(), 1);
}

#[tokio::test]
async fn test_overflowing_sheet_offset_is_invalid() {
    let manifest = serde_json::json!({
        "original_metadata": { "width": 1, "height": 1, "tile_size": 1 },
        "sprite_config": { "tile_size": 1 },
        "sheets": [{
            "index": 0,
            "filename_png": "sprite_0.png",
            "tile_positions": [{ "x": 0, "y": 0, "sprite_x": 4294967295u32, "sprite_y": 0 }]
        }]
    });
    let source = Arc::new(
        MockAssetSource::new()
            .with_file("metadata.json", serde_json::to_vec(&manifest).unwrap())
            .with_file("sprite_0.png", png_bytes(&solid(1, cell_color(0, 0)))),
    );
    let mut m = mosaic(&source, memory_cache(), constrained(1, 1));

    let err = m.load().await.unwrap_err();
    assert!(matches!(err, ManifestError::Invalid { .. }));
    assert!(matches!(m.state(), MosaicState::Fallback { .. }));
    assert_eq!(source.requests_for("sprite_0.png").await, 0);
}

#[tokio::test]
async fn test_zero_sheet_tile_size_is_invalid() {
    let manifest = serde_json::json!({
        "original_metadata": { "width": 1, "height": 1, "tile_size": 1 },
        "sprite_config": { "tile_size": 0 },
        "sheets": [{
            "filename_png": "sprite_0.png",
            "tile_positions": [{ "x": 0, "y": 0, "sprite_x": 0, "sprite_y": 0 }]
        }]
    });
    let source = Arc::new(
        MockAssetSource::new().with_file("metadata.json", serde_json::to_vec(&manifest).unwrap()),
    );
    let mut m = mosaic(&source, memory_cache(), constrained(1, 1));

    let err = m.load().await.unwrap_err();
    assert!(matches!(err, ManifestError::Invalid { .. }));
}

#[tokio::test]
async fn test_missing_fallback_image_errors() {
    let source = Arc::new(MockAssetSource::new());
    let m = mosaic(&source, memory_cache(), constrained(24, 16));
    assert!(m.fallback_image("plain.png").await.is_err());
}

// =============================================================================
// Shared Cache
// =============================================================================

#[tokio::test]
async fn test_instances_share_cache() {
    let source = Arc::new(standalone_source(3, 3, 4, false, false));
    let cache = memory_cache();

    let mut first = mosaic(&source, Arc::clone(&cache), constrained(3, 3));
    let report = first.load().await.unwrap();
    assert_eq!(report.schedule.cache_hits, 0);
    assert_eq!(source.request_count(), 10);

    source.reset_tracking().await;
    let mut second = mosaic(&source, Arc::clone(&cache), constrained(3, 3));
    let report = second.load().await.unwrap();
    assert_eq!(report.schedule.cache_hits, 9);
    assert_eq!(source.requests().await, vec!["metadata.json".to_string()]);

    assert_eq!(
        first.framebuffer().unwrap().as_raw(),
        second.framebuffer().unwrap().as_raw()
    );
}

// =============================================================================
// Generations
// =============================================================================

#[tokio::test]
async fn test_resize_then_reload() {
    let source = Arc::new(standalone_source(2, 2, 4, false, false));
    let mut m = mosaic(&source, memory_cache(), constrained(2, 2));

    let first = m.load().await.unwrap();
    assert_eq!((first.width, first.height), (1200, 1200));

    m.resize(100, 50);
    assert!(m.framebuffer().is_none());
    assert_eq!(m.state(), &MosaicState::Idle);
    assert!(m.generation() > first.generation);

    let second = m.load().await.unwrap();
    assert!(second.generation > first.generation);
    assert_eq!((second.width, second.height), (2000, 1000));
    assert_reference_composite(m.framebuffer().unwrap(), 2, 2);
}

#[tokio::test]
async fn test_cancel_during_load_discards_result() {
    let source = Arc::new(
        standalone_source(3, 3, 4, false, false).with_delay("tile_0_0.png", Duration::from_millis(50)),
    );
    let mut m = mosaic(&source, memory_cache(), constrained(3, 3));
    let handle = m.cancel_handle();

    let report = m
        .load_with_progress(|_| handle.cancel())
        .await
        .unwrap();

    assert!(report.schedule.cancelled);
    assert_eq!(report.drawn, 1);
    assert!(m.framebuffer().is_none());
    assert_eq!(m.state(), &MosaicState::Idle);
}
