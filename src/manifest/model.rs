//! In-memory manifest model shared by every mosaic instance.
//!
//! All three on-disk shapes (standalone tiles, sprite sheets, single image)
//! are normalised into one [`TileManifest`]. Order is not meaningful here;
//! the scheduler imposes it.

use std::collections::HashSet;

use crate::error::ManifestError;

// =============================================================================
// Grid Positions
// =============================================================================

/// Position of a cell in the canvas tile grid. The pair is the tile's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

impl GridPos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// Asset Names
// =============================================================================

/// File name variants for one asset (tile or sheet).
///
/// `compact` is the optional smaller encoding (WebP); `universal` (PNG) is
/// always present and decodable everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetName {
    pub compact: Option<String>,
    pub universal: String,
}

impl AssetName {
    /// Asset with only a universal-format file.
    pub fn universal(name: impl Into<String>) -> Self {
        Self {
            compact: None,
            universal: name.into(),
        }
    }

    /// Asset with both a compact and a universal file.
    pub fn with_compact(compact: impl Into<String>, universal: impl Into<String>) -> Self {
        Self {
            compact: Some(compact.into()),
            universal: universal.into(),
        }
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// Where a tile's pixels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// A standalone file holding exactly this tile.
    File(AssetName),

    /// A square region of a packed sheet, `offset` in sheet pixels.
    Sheet {
        sheet: usize,
        offset_x: u32,
        offset_y: u32,
    },
}

/// One addressable unit of the mosaic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    pub grid_x: u32,
    pub grid_y: u32,
    pub locator: SourceLocator,
}

impl TileDescriptor {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.grid_x, self.grid_y)
    }
}

/// A packed image holding many tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDescriptor {
    /// Index referenced by [`SourceLocator::Sheet`]
    pub index: usize,

    /// File names of the sheet image
    pub asset: AssetName,

    /// Position of the sheet in the sheet grid, when the manifest provides one
    pub grid: Option<GridPos>,

    /// Pixel footprint of one tile inside the sheet
    pub tile_size: u32,
}

// =============================================================================
// Layout
// =============================================================================

/// Which on-disk manifest shape a manifest was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLayout {
    /// `{ width, height, tile_size, tiles: [...] }`, one file per tile
    Tiles,

    /// `{ original_metadata, sprite_config, sheets: [...] }`
    SpriteSheets,

    /// `{ single_png, original_metadata }`, one image holding every tile
    SingleImage,
}

impl ManifestLayout {
    /// Get a human-readable name for the layout.
    pub const fn name(&self) -> &'static str {
        match self {
            ManifestLayout::Tiles => "standalone tiles",
            ManifestLayout::SpriteSheets => "sprite sheets",
            ManifestLayout::SingleImage => "single image",
        }
    }
}

// =============================================================================
// Tile Manifest
// =============================================================================

/// Immutable tile layout description, fetched once per mosaic instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileManifest {
    /// Grid width in tiles
    pub canvas_width: u32,

    /// Grid height in tiles
    pub canvas_height: u32,

    /// Pixel footprint of one source tile's native image
    pub tile_size: u32,

    /// Tile descriptors, unordered
    pub tiles: Vec<TileDescriptor>,

    /// Packed sheets referenced by [`SourceLocator::Sheet`] (empty for standalone tiles)
    pub sheets: Vec<SheetDescriptor>,

    /// Shape the manifest was parsed from
    pub layout: ManifestLayout,
}

impl TileManifest {
    /// Total number of grid cells.
    pub fn cell_count(&self) -> usize {
        self.canvas_width as usize * self.canvas_height as usize
    }

    /// Grid center in tile units.
    pub fn center(&self) -> (f64, f64) {
        (
            self.canvas_width as f64 / 2.0,
            self.canvas_height as f64 / 2.0,
        )
    }

    /// Look up a sheet by its index.
    pub fn sheet(&self, index: usize) -> Option<&SheetDescriptor> {
        self.sheets.iter().find(|s| s.index == index)
    }

    /// Check structural invariants.
    ///
    /// Every descriptor must sit inside the grid, positions must be unique
    /// and sheet references must resolve to a region addressable in `u32`.
    /// Missing cells are allowed.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ManifestError::Invalid {
                reason: format!(
                    "canvas must be non-empty, got {}x{}",
                    self.canvas_width, self.canvas_height
                ),
            });
        }
        if self.tile_size == 0 {
            return Err(ManifestError::Invalid {
                reason: "tile_size must be greater than 0".to_string(),
            });
        }

        if let Some(sheet) = self.sheets.iter().find(|s| s.tile_size == 0) {
            return Err(ManifestError::Invalid {
                reason: format!("sheet {} tile_size must be greater than 0", sheet.index),
            });
        }

        let mut seen = HashSet::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            if tile.grid_x >= self.canvas_width || tile.grid_y >= self.canvas_height {
                return Err(ManifestError::Invalid {
                    reason: format!(
                        "tile ({}, {}) outside {}x{} grid",
                        tile.grid_x, tile.grid_y, self.canvas_width, self.canvas_height
                    ),
                });
            }
            if !seen.insert(tile.pos()) {
                return Err(ManifestError::Invalid {
                    reason: format!("duplicate tile at ({}, {})", tile.grid_x, tile.grid_y),
                });
            }
            if let SourceLocator::Sheet {
                sheet,
                offset_x,
                offset_y,
            } = tile.locator
            {
                let Some(descriptor) = self.sheet(sheet) else {
                    return Err(ManifestError::Invalid {
                        reason: format!(
                            "tile ({}, {}) references unknown sheet {}",
                            tile.grid_x, tile.grid_y, sheet
                        ),
                    });
                };
                let size = descriptor.tile_size;
                if offset_x.checked_add(size).is_none() || offset_y.checked_add(size).is_none() {
                    return Err(ManifestError::Invalid {
                        reason: format!(
                            "tile ({}, {}) offset ({}, {}) out of range in sheet {}",
                            tile.grid_x, tile.grid_y, offset_x, offset_y, sheet
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}
