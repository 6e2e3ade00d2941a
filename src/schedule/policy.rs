//! Device-dependent loading and resolution policy.

use std::time::Duration;

use clap::ValueEnum;

use super::task::TileSourceStrategy;

/// Lower bound on the display-to-framebuffer upscale.
pub const MIN_UPSCALE: f64 = 20.0;

/// Pause between non-critical batches.
pub const BATCH_YIELD: Duration = Duration::from_millis(1);

/// Capability class of the rendering device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeviceClass {
    #[default]
    Desktop,

    /// Memory- or bandwidth-limited device (phones, small tablets)
    Constrained,
}

impl DeviceClass {
    /// Target internal framebuffer width before upscale clamping.
    pub const fn base_internal_width(&self) -> u32 {
        match self {
            DeviceClass::Desktop => 2400,
            DeviceClass::Constrained => 1200,
        }
    }

    /// Maximum framebuffer side length in pixels.
    pub const fn max_dimension(&self) -> u32 {
        match self {
            DeviceClass::Desktop => 8192,
            DeviceClass::Constrained => 4096,
        }
    }

    /// Hard ceiling on total framebuffer pixels, if any.
    pub const fn max_pixels(&self) -> Option<u64> {
        match self {
            DeviceClass::Desktop => None,
            DeviceClass::Constrained => Some(2048 * 4096),
        }
    }

    /// Whether the device pixel ratio multiplies the framebuffer size.
    pub const fn applies_pixel_ratio(&self) -> bool {
        matches!(self, DeviceClass::Desktop)
    }
}

/// The rendering device a mosaic is drawn for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub pixel_ratio: f64,
}

impl DeviceProfile {
    pub fn new(class: DeviceClass, pixel_ratio: f64) -> Self {
        Self { class, pixel_ratio }
    }

    pub fn desktop() -> Self {
        Self::new(DeviceClass::Desktop, 1.0)
    }

    pub fn constrained() -> Self {
        Self::new(DeviceClass::Constrained, 1.0)
    }

    /// Pixel ratio actually applied to the framebuffer.
    pub fn effective_pixel_ratio(&self) -> f64 {
        if self.class.applies_pixel_ratio() && self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0
        {
            self.pixel_ratio
        } else {
            1.0
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

// =============================================================================
// Load Policy
// =============================================================================

/// How many tasks load up front and how the rest are batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Tasks loaded together first, with no delay
    pub critical_count: usize,

    /// Concurrent tasks per subsequent batch
    pub batch_size: usize,

    /// Pause between subsequent batches
    pub batch_yield: Duration,
}

impl LoadPolicy {
    /// Policy for a source strategy on a device class.
    pub fn for_strategy(strategy: TileSourceStrategy, class: DeviceClass) -> Self {
        let (critical_count, batch_size) = match (strategy, class) {
            (TileSourceStrategy::Standalone, DeviceClass::Desktop) => (100, 100),
            (TileSourceStrategy::Standalone, DeviceClass::Constrained) => (50, 25),
            (TileSourceStrategy::Packed, DeviceClass::Desktop) => (1, 4),
            (TileSourceStrategy::Packed, DeviceClass::Constrained) => (1, 2),
        };
        Self {
            critical_count,
            batch_size,
            batch_yield: BATCH_YIELD,
        }
    }
}

// =============================================================================
// Render Budget
// =============================================================================

/// Framebuffer size for a display box on a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderBudget {
    pub width: u32,
    pub height: u32,

    /// Framebuffer pixels per display pixel after clamping
    pub scale: f64,
}

impl RenderBudget {
    /// Compute the framebuffer size for a `display_w` × `display_h` box.
    ///
    /// The display is upscaled to the class's base internal width (at least
    /// [`MIN_UPSCALE`]×), multiplied by the pixel ratio where the class
    /// allows it, then shrunk uniformly until both sides fit the per-side
    /// ceiling and the total fits the pixel ceiling.
    pub fn compute(display_w: u32, display_h: u32, profile: &DeviceProfile) -> Self {
        let display_w = display_w.max(1) as f64;
        let display_h = display_h.max(1) as f64;
        let class = profile.class;

        let upscale = MIN_UPSCALE.max(class.base_internal_width() as f64 / display_w);
        let scale = upscale * profile.effective_pixel_ratio();
        let (w, h) = (display_w * scale, display_h * scale);

        let max_side = class.max_dimension() as f64;
        let mut shrink = (max_side / w).min(max_side / h).min(1.0);
        if let Some(max_pixels) = class.max_pixels() {
            let pixels = w * h * shrink * shrink;
            if pixels > max_pixels as f64 {
                shrink *= (max_pixels as f64 / pixels).sqrt();
            }
        }

        Self {
            width: snap(w * shrink),
            height: snap(h * shrink),
            scale: scale * shrink,
        }
    }

    /// Total framebuffer pixels.
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Floor to whole pixels, tolerating float error just below an integer.
fn snap(value: f64) -> u32 {
    ((value + 1e-6).floor() as u32).max(1)
}
