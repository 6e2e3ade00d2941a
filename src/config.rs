//! Configuration management for Mosaic Streamer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `MOSAIC_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use mosaic_streamer::config::Config;
//!
//! let config = Config::parse();
//! println!("Rendering {} at {}x{}", config.source, config.width, config.height);
//! ```
//!
//! # Environment Variables
//!
//! - `MOSAIC_SOURCE` - Base directory or http(s) URL holding the manifest and tiles (required)
//! - `MOSAIC_MANIFEST` - Manifest file name (default: metadata.json)
//! - `MOSAIC_WIDTH` / `MOSAIC_HEIGHT` - Display size (default: 400x600)
//! - `MOSAIC_DEVICE` - `desktop` or `constrained` (default: desktop)
//! - `MOSAIC_PIXEL_RATIO` - Device pixel ratio (default: 1.0)
//! - `MOSAIC_PIXEL_SIZE` - Block size of the pixelated fallback (default: 8)
//! - `MOSAIC_IMAGE` - Plain image used when the mosaic is unavailable
//! - `MOSAIC_CACHE_DIR` - Persistent tile cache directory (in memory when unset)
//! - `MOSAIC_CACHE_MAX_ENTRIES` - Maximum cached tiles (default: 500)
//! - `MOSAIC_CACHE_QUOTA` - Cache store quota in bytes, 0 for unlimited (default: 0)
//! - `MOSAIC_OUTPUT` - Output PNG for the base framebuffer (default: mosaic.png)

use std::path::PathBuf;

use clap::Parser;

use crate::manifest::DEFAULT_MANIFEST_NAME;
use crate::mosaic::DEFAULT_PIXEL_SIZE;
use crate::render::ZOOM_AREA_SIZE;
use crate::schedule::{DeviceClass, DeviceProfile};
use crate::tile::MAX_CACHE_SIZE;

// =============================================================================
// Default Values
// =============================================================================

/// Default display width.
pub const DEFAULT_WIDTH: u32 = 400;

/// Default display height.
pub const DEFAULT_HEIGHT: u32 = 600;

/// Default device pixel ratio.
pub const DEFAULT_PIXEL_RATIO: f64 = 1.0;

/// Default output file for the base framebuffer.
pub const DEFAULT_OUTPUT: &str = "mosaic.png";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Mosaic Streamer - progressive tiled-image mosaic renderer.
///
/// Loads a tile manifest and its tiles from a directory or URL, composites
/// them into a framebuffer and writes it (and optionally a zoom overlay) as PNG.
#[derive(Parser, Debug, Clone)]
#[command(name = "mosaic-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Base directory or http(s) URL holding the manifest and tile files.
    #[arg(long, env = "MOSAIC_SOURCE")]
    pub source: String,

    /// Manifest file name under the source.
    #[arg(long, default_value = DEFAULT_MANIFEST_NAME, env = "MOSAIC_MANIFEST")]
    pub manifest: String,

    /// Always request universal-format files, skipping the compact-format support check.
    #[arg(long, default_value_t = false, env = "MOSAIC_UNIVERSAL_ONLY")]
    pub universal_only: bool,

    // =========================================================================
    // Display Configuration
    // =========================================================================
    /// Display width in display pixels.
    #[arg(long, default_value_t = DEFAULT_WIDTH, env = "MOSAIC_WIDTH")]
    pub width: u32,

    /// Display height in display pixels.
    #[arg(long, default_value_t = DEFAULT_HEIGHT, env = "MOSAIC_HEIGHT")]
    pub height: u32,

    /// Device class, which selects batch sizes and resolution ceilings.
    #[arg(long, value_enum, default_value_t = DeviceClass::Desktop, env = "MOSAIC_DEVICE")]
    pub device: DeviceClass,

    /// Device pixel ratio (ignored on constrained devices).
    #[arg(long, default_value_t = DEFAULT_PIXEL_RATIO, env = "MOSAIC_PIXEL_RATIO")]
    pub pixel_ratio: f64,

    // =========================================================================
    // Fallback Configuration
    // =========================================================================
    /// Render the pixelated plain image instead of the mosaic.
    #[arg(long, default_value_t = false)]
    pub no_mosaic: bool,

    /// Plain image under the source, shown when the mosaic is unavailable.
    #[arg(long, env = "MOSAIC_IMAGE")]
    pub image: Option<String>,

    /// Block size of the pixelated fallback.
    #[arg(long, default_value_t = DEFAULT_PIXEL_SIZE, env = "MOSAIC_PIXEL_SIZE")]
    pub pixel_size: u32,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Directory of the persistent tile cache. In memory when unset.
    #[arg(long, env = "MOSAIC_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached tiles and sheets.
    #[arg(long, default_value_t = MAX_CACHE_SIZE, env = "MOSAIC_CACHE_MAX_ENTRIES")]
    pub cache_max_entries: usize,

    /// Cache store quota in bytes (0 = unlimited).
    #[arg(long, default_value_t = 0, env = "MOSAIC_CACHE_QUOTA")]
    pub cache_quota: u64,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Output PNG for the base framebuffer (or the fallback image).
    #[arg(short, long, default_value = DEFAULT_OUTPUT, env = "MOSAIC_OUTPUT")]
    pub output: PathBuf,

    /// Pointer position `x,y` in [0,1] to render a zoom overlay for.
    #[arg(long, value_delimiter = ',')]
    pub zoom: Option<Vec<f64>>,

    /// Output PNG for the zoom overlay.
    #[arg(long, default_value = "zoom.png")]
    pub zoom_output: PathBuf,

    /// Fraction of the mosaic shown by the zoom overlay.
    #[arg(long, default_value_t = ZOOM_AREA_SIZE)]
    pub zoom_area: f64,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("Source is required. Set --source or MOSAIC_SOURCE".to_string());
        }
        if self.manifest.trim().is_empty() {
            return Err("manifest name must not be empty".to_string());
        }

        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err("pixel_ratio must be a positive number".to_string());
        }
        if self.pixel_size == 0 {
            return Err("pixel_size must be greater than 0".to_string());
        }

        if self.cache_max_entries == 0 {
            return Err("cache_max_entries must be greater than 0".to_string());
        }

        if !(self.zoom_area > 0.0 && self.zoom_area <= 1.0) {
            return Err("zoom_area must be in (0, 1]".to_string());
        }
        if let Some(pointer) = self.zoom_pointer() {
            if !(0.0..=1.0).contains(&pointer.0) || !(0.0..=1.0).contains(&pointer.1) {
                return Err("zoom pointer must lie in [0,1]x[0,1]".to_string());
            }
        } else if self.zoom.is_some() {
            return Err("zoom expects two values: x,y".to_string());
        }

        if let Some(ref image) = self.image {
            if image.trim().is_empty() {
                return Err("image must not be empty when set".to_string());
            }
        }
        if self.no_mosaic && self.image.is_none() {
            return Err("--no-mosaic requires --image".to_string());
        }

        Ok(())
    }

    /// Whether the source is an http(s) URL rather than a directory.
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    /// Requested zoom pointer, if given as exactly two values.
    pub fn zoom_pointer(&self) -> Option<(f64, f64)> {
        match self.zoom.as_deref() {
            Some([x, y]) => Some((*x, *y)),
            _ => None,
        }
    }

    pub fn device_profile(&self) -> DeviceProfile {
        DeviceProfile::new(self.device, self.pixel_ratio)
    }
}

// =============================================================================
// Tests
// =============================================================================
