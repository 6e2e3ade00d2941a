//! Pointer-driven zoom overlay.
//!
//! The overlay is a separate buffer the size of the display box showing a
//! magnified window of the mosaic around the pointer. It is rebuilt in full
//! from the compositor's decoded cells on every render; the base
//! framebuffer is never modified.
//!
//! # States
//!
//! ```text
//!            enter / touch start
//!   Resting ─────────────────────▶ Hovering
//!      ▲                              │
//!      └──────────────────────────────┘
//!        leave, or touch end + dwell
//! ```

use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::manifest::GridPos;

use super::compositor::{placeholder_color, CellSource, Compositor};

/// Fraction of the mosaic visible in the overlay, per axis.
pub const ZOOM_AREA_SIZE: f64 = 0.05;

/// How long the overlay stays up after a touch ends.
pub const TOUCH_DWELL: Duration = Duration::from_millis(1000);

/// Pointer position after a reset.
const POINTER_HOME: (f64, f64) = (0.5, 0.5);

/// Host-UI pointer event, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Enter,
    Leave,
    Move { x: f64, y: f64 },
    TouchStart { x: f64, y: f64 },
    TouchMove { x: f64, y: f64 },
    TouchEnd,
}

/// Mosaic bounding box in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Box at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Normalize a client position into `[0, 1]²`.
    pub fn normalize(&self, x: f64, y: f64) -> (f64, f64) {
        let axis = |v: f64, origin: f64, extent: f64| {
            if extent > 0.0 && v.is_finite() {
                ((v - origin) / extent).clamp(0.0, 1.0)
            } else {
                0.5
            }
        };
        (
            axis(x, self.left, self.width),
            axis(y, self.top, self.height),
        )
    }
}

/// Overlay visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Resting,
    Hovering,
}

/// Snapshot of the pointer as seen by one mosaic instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportInteractionState {
    /// Last pointer position relative to the bounding box, in `[0, 1]²`
    pub pointer: (f64, f64),
    pub hovering: bool,
}

/// Visible window of the mosaic, normalized to `[0, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRect {
    pub left: f64,
    pub top: f64,
    pub size: f64,
}

impl ZoomRect {
    pub fn right(&self) -> f64 {
        self.left + self.size
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.size
    }
}

/// Window of side `size` centered on `center`, shifted to stay in `[0, 1]²`.
pub fn zoom_rect(center: (f64, f64), size: f64) -> ZoomRect {
    let size = size.clamp(f64::EPSILON, 1.0);
    let place = |c: f64| (c - size / 2.0).clamp(0.0, 1.0 - size);
    ZoomRect {
        left: place(center.0),
        top: place(center.1),
        size,
    }
}

// =============================================================================
// Zoom Overlay
// =============================================================================

/// Interaction state machine and overlay renderer for one mosaic.
#[derive(Debug, Clone)]
pub struct ZoomOverlay {
    bounds: Bounds,
    state: OverlayState,
    pointer: (f64, f64),
    zoom_area: f64,
    release_at: Option<Instant>,
}

impl ZoomOverlay {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            state: OverlayState::Resting,
            pointer: POINTER_HOME,
            zoom_area: ZOOM_AREA_SIZE,
            release_at: None,
        }
    }

    pub fn with_zoom_area(mut self, zoom_area: f64) -> Self {
        self.zoom_area = zoom_area;
        self
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn is_hovering(&self) -> bool {
        self.state == OverlayState::Hovering
    }

    pub fn pointer(&self) -> (f64, f64) {
        self.pointer
    }

    pub fn interaction(&self) -> ViewportInteractionState {
        ViewportInteractionState {
            pointer: self.pointer,
            hovering: self.is_hovering(),
        }
    }

    /// Apply a pointer event. Returns whether the overlay needs redrawing.
    pub fn handle(&mut self, event: PointerEvent, now: Instant) -> bool {
        self.tick(now);
        match event {
            PointerEvent::Enter => {
                self.release_at = None;
                self.set_state(OverlayState::Hovering)
            }
            PointerEvent::Leave => {
                self.rest();
                true
            }
            PointerEvent::Move { x, y } => {
                self.pointer = self.bounds.normalize(x, y);
                self.is_hovering()
            }
            PointerEvent::TouchStart { x, y } => {
                self.pointer = self.bounds.normalize(x, y);
                self.release_at = None;
                self.set_state(OverlayState::Hovering);
                true
            }
            PointerEvent::TouchMove { x, y } => {
                if !self.is_hovering() {
                    return false;
                }
                self.pointer = self.bounds.normalize(x, y);
                true
            }
            PointerEvent::TouchEnd => {
                if self.is_hovering() {
                    self.release_at = Some(now + TOUCH_DWELL);
                }
                false
            }
        }
    }

    /// Advance time. Ends a touch dwell that has expired; returns whether
    /// the state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.release_at {
            Some(at) if now >= at => {
                self.rest();
                true
            }
            _ => false,
        }
    }

    /// Visible window for the current pointer.
    pub fn source_rect(&self) -> ZoomRect {
        zoom_rect(self.pointer, self.zoom_area)
    }

    /// Render the overlay at `width` × `height`, or `None` while resting.
    ///
    /// Every output pixel is sampled from the decoded source of the cell
    /// under it; cells not drawn yet show the placeholder.
    pub fn render(&self, compositor: &Compositor, width: u32, height: u32) -> Option<RgbaImage> {
        if !self.is_hovering() {
            return None;
        }

        let rect = self.source_rect();
        let (grid_w, grid_h) = compositor.grid();
        let smoothing = compositor.smoothing();
        let (width, height) = (width.max(1), height.max(1));
        trace!(left = rect.left, top = rect.top, size = rect.size, "Rendering zoom overlay");

        let mut out = RgbaImage::new(width, height);
        for (ox, oy, pixel) in out.enumerate_pixels_mut() {
            let u = rect.left + (ox as f64 + 0.5) / width as f64 * rect.size;
            let v = rect.top + (oy as f64 + 0.5) / height as f64 * rect.size;
            let gx = u * grid_w as f64;
            let gy = v * grid_h as f64;
            let cell = GridPos::new(
                (gx.floor() as u32).min(grid_w - 1),
                (gy.floor() as u32).min(grid_h - 1),
            );

            *pixel = match compositor.cell_source(cell) {
                Some(source) => {
                    let fx = (gx - cell.x as f64).clamp(0.0, 1.0);
                    let fy = (gy - cell.y as f64).clamp(0.0, 1.0);
                    sample(source, fx, fy, smoothing)
                }
                None => placeholder_color((u + v) / 2.0),
            };
        }
        Some(out)
    }

    fn set_state(&mut self, state: OverlayState) -> bool {
        let changed = self.state != state;
        self.state = state;
        changed
    }

    fn rest(&mut self) {
        self.state = OverlayState::Resting;
        self.pointer = POINTER_HOME;
        self.release_at = None;
    }
}

/// Sample a cell's source at fractional position `(fx, fy)` in `[0, 1]²`.
fn sample(source: &CellSource, fx: f64, fy: f64, smoothing: bool) -> Rgba<u8> {
    let (x0, y0, w, h) = source.rect();
    let image: &RgbaImage = &source.image;
    let px = |x: u32, y: u32| *image.get_pixel(x0 + x.min(w - 1), y0 + y.min(h - 1));

    if !smoothing {
        let x = (fx * w as f64).floor() as u32;
        let y = (fy * h as f64).floor() as u32;
        return px(x, y);
    }

    // Bilinear over texel centers
    let sx = (fx * w as f64 - 0.5).max(0.0);
    let sy = (fy * h as f64 - 0.5).max(0.0);
    let (ix, iy) = (sx.floor() as u32, sy.floor() as u32);
    let (tx, ty) = (sx - ix as f64, sy - iy as f64);
    let (a, b, c, d) = (px(ix, iy), px(ix + 1, iy), px(ix, iy + 1), px(ix + 1, iy + 1));

    let mut out = [0u8; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        let top = a[i] as f64 * (1.0 - tx) + b[i] as f64 * tx;
        let bottom = c[i] as f64 * (1.0 - tx) + d[i] as f64 * tx;
        *channel = (top * (1.0 - ty) + bottom * ty).round() as u8;
    }
    Rgba(out)
}
