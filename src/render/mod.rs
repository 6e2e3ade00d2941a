//! Rendering: base framebuffer, zoom overlay and the plain-image fallback.

pub mod fallback;
mod compositor;
mod overlay;

pub use compositor::{
    fill_placeholder, placeholder_color, CellSource, Compositor, PLACEHOLDER_END,
    PLACEHOLDER_START,
};
pub use fallback::pixelate;
pub use overlay::{
    zoom_rect, Bounds, OverlayState, PointerEvent, ViewportInteractionState, ZoomOverlay,
    ZoomRect, TOUCH_DWELL, ZOOM_AREA_SIZE,
};
