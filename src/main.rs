//! Mosaic Streamer - progressive tiled-image mosaic renderer.
//!
//! This binary loads a mosaic from a directory or URL and writes the
//! framebuffer (and optionally a zoom overlay) as PNG files.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mosaic_streamer::{
    config::Config, AssetSource, CacheStore, FormatNegotiator, FsAssetSource, FsCacheStore,
    HttpAssetSource, ManifestLoader, MemoryCacheStore, Mosaic, MosaicOptions, PointerEvent,
    TileCache,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Source: {}", config.source);
    info!("  Manifest: {}", config.manifest);
    info!(
        "  Display: {}x{} ({:?}, pixel ratio {})",
        config.width, config.height, config.device, config.pixel_ratio
    );
    match config.cache_dir {
        Some(ref dir) => info!("  Cache: {} ({} entries max)", dir.display(), config.cache_max_entries),
        None => info!("  Cache: in memory ({} entries max)", config.cache_max_entries),
    }

    let source = match build_source(&config) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open source {}: {}", config.source, e);
            return ExitCode::FAILURE;
        }
    };

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open cache: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let cache = Arc::new(TileCache::with_limits(
        store,
        config.cache_max_entries,
        mosaic_streamer::tile::EVICTION_MARGIN,
    ));

    let negotiator = if config.universal_only {
        FormatNegotiator::with_support(false)
    } else {
        FormatNegotiator::detect()
    };

    let mut options = MosaicOptions::new(config.width, config.height).with_device(config.device_profile());
    options.mosaic_mode = !config.no_mosaic;
    options.pixel_size = config.pixel_size;
    options.zoom_area = config.zoom_area;

    let mut mosaic = Mosaic::new(source, cache, options)
        .with_loader(ManifestLoader::with_name(&config.manifest))
        .with_negotiator(negotiator);

    let started = Instant::now();
    let result = mosaic.load().await;

    let report = match result {
        Ok(report) if report.layout.is_some() => report,
        Ok(_) => return render_fallback(&mosaic, &config).await,
        Err(e) => {
            warn!("Mosaic unavailable: {}", e);
            return render_fallback(&mosaic, &config).await;
        }
    };

    info!(
        "Drew {}/{} cells in {:.2?} ({} cache hits, {} failed)",
        report.drawn,
        report.cells,
        started.elapsed(),
        report.schedule.cache_hits,
        report.schedule.failed
    );

    let Some(framebuffer) = mosaic.framebuffer() else {
        error!("Load was cancelled before completion");
        return ExitCode::FAILURE;
    };
    if let Err(e) = save_png(framebuffer, &config.output) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    info!("Wrote {}x{} framebuffer to {}", report.width, report.height, config.output.display());

    if let Some((x, y)) = config.zoom_pointer() {
        let now = Instant::now();
        let (w, h) = (config.width as f64, config.height as f64);
        mosaic.handle_pointer(PointerEvent::Enter, now);
        mosaic.handle_pointer(PointerEvent::Move { x: x * w, y: y * h }, now);

        if let Some(overlay) = mosaic.overlay_image() {
            if let Err(e) = save_png(&overlay, &config.zoom_output) {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
            let rect = mosaic.overlay().source_rect();
            info!(
                "Wrote zoom overlay at ({:.3}, {:.3}) size {:.3} to {}",
                rect.left,
                rect.top,
                rect.size,
                config.zoom_output.display()
            );
        }
    }

    ExitCode::SUCCESS
}

/// Write the pixelated plain image when the mosaic is off or unavailable.
async fn render_fallback(mosaic: &Mosaic, config: &Config) -> ExitCode {
    let Some(ref image) = config.image else {
        error!("No mosaic and no --image to fall back to");
        return ExitCode::FAILURE;
    };

    match mosaic.fallback_image(image).await {
        Ok(pixelated) => {
            if let Err(e) = save_png(&pixelated, &config.output) {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
            info!("Wrote pixelated {} to {}", image, config.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fallback image unavailable: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_source(config: &Config) -> Result<Arc<dyn AssetSource>, String> {
    if config.is_remote() {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mosaic-streamer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string())?;
        let source = HttpAssetSource::new(client, &config.source).map_err(|e| e.to_string())?;
        Ok(Arc::new(source))
    } else {
        let root = Path::new(&config.source);
        if !root.is_dir() {
            return Err("not a directory".to_string());
        }
        Ok(Arc::new(FsAssetSource::new(root)))
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>, String> {
    match config.cache_dir {
        Some(ref dir) => {
            let mut store = FsCacheStore::open(dir).await.map_err(|e| e.to_string())?;
            if config.cache_quota > 0 {
                store = store.with_quota(config.cache_quota);
            }
            Ok(Arc::new(store))
        }
        None if config.cache_quota > 0 => Ok(Arc::new(MemoryCacheStore::with_quota(
            config.cache_quota as usize,
        ))),
        None => Ok(Arc::new(MemoryCacheStore::new())),
    }
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<(), String> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "mosaic_streamer=debug"
    } else {
        "mosaic_streamer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
