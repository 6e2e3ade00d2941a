//! Base framebuffer compositor.
//!
//! Each grid cell maps to a fixed destination rectangle of the framebuffer:
//! cell `x` spans `floor(x * W / grid_w) .. floor((x + 1) * W / grid_w)`, so
//! cells tile the buffer exactly with no gaps. A cell is drawn at most once
//! per generation; later arrivals for it are skipped, which makes the final
//! framebuffer independent of arrival order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::manifest::GridPos;
use crate::schedule::{LoadedSource, SourceRegion};

/// Placeholder gradient start (top left).
pub const PLACEHOLDER_START: Rgba<u8> = Rgba([0xf8, 0xf9, 0xfa, 0xff]);

/// Placeholder gradient end (bottom right).
pub const PLACEHOLDER_END: Rgba<u8> = Rgba([0xe9, 0xec, 0xef, 0xff]);

/// Placeholder colour at normalized diagonal position `t` in `[0, 1]`.
pub fn placeholder_color(t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgba([
        mix(PLACEHOLDER_START[0], PLACEHOLDER_END[0]),
        mix(PLACEHOLDER_START[1], PLACEHOLDER_END[1]),
        mix(PLACEHOLDER_START[2], PLACEHOLDER_END[2]),
        0xff,
    ])
}

/// Fill `image` with the diagonal placeholder gradient.
pub fn fill_placeholder(image: &mut RgbaImage) {
    let span = (image.width() + image.height()).saturating_sub(2).max(1) as f64;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = placeholder_color((x + y) as f64 / span);
    }
}

/// Decoded pixels backing one drawn cell.
#[derive(Debug, Clone)]
pub struct CellSource {
    pub image: Arc<RgbaImage>,

    /// Region of `image` holding the cell, or `None` for all of it
    pub region: Option<SourceRegion>,
}

impl CellSource {
    /// Source rectangle `(x, y, width, height)` in image pixels.
    pub fn rect(&self) -> (u32, u32, u32, u32) {
        match self.region {
            Some(r) => (r.x, r.y, r.size, r.size),
            None => (0, 0, self.image.width(), self.image.height()),
        }
    }
}

/// Single-generation framebuffer with per-cell draw tracking.
#[derive(Debug)]
pub struct Compositor {
    framebuffer: RgbaImage,
    grid_width: u32,
    grid_height: u32,
    drawn: HashSet<GridPos>,
    sources: HashMap<GridPos, CellSource>,
    smoothing: bool,
}

impl Compositor {
    /// Create a `width` × `height` framebuffer for a `grid_width` ×
    /// `grid_height` tile grid, filled with the placeholder.
    pub fn new(width: u32, height: u32, grid_width: u32, grid_height: u32) -> Self {
        let mut framebuffer = RgbaImage::new(width.max(1), height.max(1));
        fill_placeholder(&mut framebuffer);
        Self {
            framebuffer,
            grid_width: grid_width.max(1),
            grid_height: grid_height.max(1),
            drawn: HashSet::new(),
            sources: HashMap::new(),
            smoothing: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.framebuffer.width()
    }

    pub fn height(&self) -> u32 {
        self.framebuffer.height()
    }

    /// Grid dimensions in tiles.
    pub fn grid(&self) -> (u32, u32) {
        (self.grid_width, self.grid_height)
    }

    pub fn framebuffer(&self) -> &RgbaImage {
        &self.framebuffer
    }

    /// Enable filtered scaling. Off while idle for a crisp mosaic.
    pub fn set_smoothing(&mut self, smoothing: bool) {
        self.smoothing = smoothing;
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    pub fn is_drawn(&self, pos: GridPos) -> bool {
        self.drawn.contains(&pos)
    }

    pub fn drawn_count(&self) -> usize {
        self.drawn.len()
    }

    /// Cells drawn so far, in no particular order.
    pub fn drawn_cells(&self) -> impl Iterator<Item = &GridPos> {
        self.drawn.iter()
    }

    /// Decoded source of a drawn cell.
    pub fn cell_source(&self, pos: GridPos) -> Option<&CellSource> {
        self.sources.get(&pos)
    }

    /// Destination rectangle `(x, y, width, height)` of a cell.
    pub fn cell_rect(&self, pos: GridPos) -> (u32, u32, u32, u32) {
        let span = |i: u32, total: u32, cells: u32| {
            (i as u64 * total as u64 / cells as u64) as u32
        };
        let (w, h) = self.framebuffer.dimensions();
        let x0 = span(pos.x, w, self.grid_width);
        let x1 = span(pos.x + 1, w, self.grid_width);
        let y0 = span(pos.y, h, self.grid_height);
        let y1 = span(pos.y + 1, h, self.grid_height);
        (x0, y0, x1 - x0, y1 - y0)
    }

    /// Draw every not-yet-drawn cell fed by `source`.
    ///
    /// Returns the number of cells newly drawn.
    pub fn draw(&mut self, source: &LoadedSource) -> usize {
        let filter = if self.smoothing {
            FilterType::Triangle
        } else {
            FilterType::Nearest
        };

        let mut count = 0;
        for placement in &source.placements {
            let pos = placement.pos;
            if pos.x >= self.grid_width || pos.y >= self.grid_height || self.is_drawn(pos) {
                continue;
            }

            let cell = CellSource {
                image: Arc::clone(&source.image),
                region: placement.region,
            };
            let (sx, sy, sw, sh) = cell.rect();
            let fits = |start: u32, len: u32, limit: u32| {
                start.checked_add(len).is_some_and(|end| end <= limit)
            };
            if sw == 0
                || sh == 0
                || !fits(sx, sw, source.image.width())
                || !fits(sy, sh, source.image.height())
            {
                debug!(key = %source.key, x = pos.x, y = pos.y, "Tile region outside source image");
                continue;
            }

            let (dx, dy, dw, dh) = self.cell_rect(pos);
            if dw > 0 && dh > 0 {
                let tile = match placement.region {
                    Some(_) => {
                        let cropped = imageops::crop_imm(&*source.image, sx, sy, sw, sh).to_image();
                        imageops::resize(&cropped, dw, dh, filter)
                    }
                    None => imageops::resize(&*source.image, dw, dh, filter),
                };
                imageops::replace(&mut self.framebuffer, &tile, dx as i64, dy as i64);
            }

            self.drawn.insert(pos);
            self.sources.insert(pos, cell);
            count += 1;
        }
        count
    }

    /// Start a new generation: placeholder fill, nothing drawn.
    pub fn reset(&mut self) {
        fill_placeholder(&mut self.framebuffer);
        self.drawn.clear();
        self.sources.clear();
    }
}
