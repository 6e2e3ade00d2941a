//! Manifest shape detection and wire formats.
//!
//! Three JSON shapes exist in the wild:
//!
//! - **Standalone tiles**: `{ width, height, tile_size, tiles: [{ x, y, filename }] }`
//! - **Sprite sheets**: `{ original_metadata, sprite_config, sheets: [{ filename_png,
//!   filename_webp, tile_positions: [{ x, y, sprite_x, sprite_y }] }] }`
//! - **Single image**: `{ single_png: { filename_png, filename_webp, width, height,
//!   tile_size }, original_metadata }`
//!
//! Files produced by the generator scripts use snake_case; the camelCase
//! spellings (`canvasWidth`, `filenamePrimary`, ...) are accepted as aliases.

use serde::Deserialize;
use serde_json::Value;

use super::model::{
    AssetName, GridPos, ManifestLayout, SheetDescriptor, SourceLocator, TileDescriptor,
    TileManifest,
};

// =============================================================================
// Detection
// =============================================================================

/// Detect which manifest shape a parsed JSON document uses.
///
/// Returns `None` if the document matches no known shape.
pub fn detect_layout(value: &Value) -> Option<ManifestLayout> {
    let obj = value.as_object()?;
    let has = |names: &[&str]| names.iter().any(|n| obj.contains_key(*n));

    if has(&["single_png", "singleImage"]) {
        return Some(ManifestLayout::SingleImage);
    }
    if obj.get("sheets").is_some_and(Value::is_array) && has(&["sprite_config", "spriteConfig"]) {
        return Some(ManifestLayout::SpriteSheets);
    }
    if obj.get("tiles").is_some_and(Value::is_array) && has(&["width", "canvasWidth"]) {
        return Some(ManifestLayout::Tiles);
    }
    None
}

/// Convert a JSON document of a known layout into a [`TileManifest`].
///
/// The result is not validated; call [`TileManifest::validate`].
pub fn parse_layout(value: Value, layout: ManifestLayout) -> Result<TileManifest, serde_json::Error> {
    match layout {
        ManifestLayout::Tiles => serde_json::from_value::<TileGridWire>(value).map(Into::into),
        ManifestLayout::SpriteSheets => {
            serde_json::from_value::<SpriteSheetWire>(value).map(Into::into)
        }
        ManifestLayout::SingleImage => {
            serde_json::from_value::<SingleImageWire>(value).map(Into::into)
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GridWire {
    #[serde(alias = "canvasWidth")]
    width: u32,
    #[serde(alias = "canvasHeight")]
    height: u32,
    #[serde(alias = "tileSize")]
    tile_size: u32,
}

#[derive(Debug, Deserialize)]
struct TileGridWire {
    #[serde(flatten)]
    grid: GridWire,
    tiles: Vec<TileWire>,
}

#[derive(Debug, Deserialize)]
struct TileWire {
    #[serde(alias = "gridX")]
    x: u32,
    #[serde(alias = "gridY")]
    y: u32,
    #[serde(alias = "filename_png", alias = "filenameFallback")]
    filename: String,
    #[serde(default, alias = "filename_webp", alias = "filenamePrimary")]
    filename_compact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpriteSheetWire {
    #[serde(alias = "originalMetadata")]
    original_metadata: GridWire,
    #[serde(alias = "spriteConfig")]
    sprite_config: SpriteConfigWire,
    sheets: Vec<SheetWire>,
}

#[derive(Debug, Deserialize)]
struct SpriteConfigWire {
    #[serde(alias = "tileSize")]
    tile_size: u32,
}

#[derive(Debug, Deserialize)]
struct SheetWire {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default, alias = "gridX")]
    grid_x: Option<u32>,
    #[serde(default, alias = "gridY")]
    grid_y: Option<u32>,
    #[serde(default, alias = "filenamePrimary")]
    filename_webp: Option<String>,
    #[serde(alias = "filenameFallback")]
    filename_png: String,
    #[serde(alias = "tilePositions")]
    tile_positions: Vec<TilePositionWire>,
}

#[derive(Debug, Deserialize)]
struct TilePositionWire {
    #[serde(alias = "gridX")]
    x: u32,
    #[serde(alias = "gridY")]
    y: u32,
    #[serde(alias = "spriteX")]
    sprite_x: u32,
    #[serde(alias = "spriteY")]
    sprite_y: u32,
}

#[derive(Debug, Deserialize)]
struct SingleImageWire {
    #[serde(alias = "singleImage")]
    single_png: SingleImageFileWire,
    #[serde(alias = "originalMetadata")]
    original_metadata: GridWire,
}

#[derive(Debug, Deserialize)]
struct SingleImageFileWire {
    #[serde(alias = "filenameFallback")]
    filename_png: String,
    #[serde(default, alias = "filenamePrimary")]
    filename_webp: Option<String>,
    #[serde(default)]
    has_webp: Option<bool>,
    tile_size: u32,
}

// =============================================================================
// Conversions
// =============================================================================

fn asset_name(compact: Option<String>, universal: String) -> AssetName {
    AssetName {
        compact: compact.filter(|c| !c.is_empty()),
        universal,
    }
}

impl From<TileGridWire> for TileManifest {
    fn from(wire: TileGridWire) -> Self {
        let tiles = wire
            .tiles
            .into_iter()
            .map(|t| TileDescriptor {
                grid_x: t.x,
                grid_y: t.y,
                locator: SourceLocator::File(asset_name(t.filename_compact, t.filename)),
            })
            .collect();

        TileManifest {
            canvas_width: wire.grid.width,
            canvas_height: wire.grid.height,
            tile_size: wire.grid.tile_size,
            tiles,
            sheets: Vec::new(),
            layout: ManifestLayout::Tiles,
        }
    }
}

impl From<SpriteSheetWire> for TileManifest {
    fn from(wire: SpriteSheetWire) -> Self {
        let mut tiles = Vec::new();
        let mut sheets = Vec::with_capacity(wire.sheets.len());

        for (position, sheet) in wire.sheets.into_iter().enumerate() {
            let index = sheet.index.unwrap_or(position);
            let grid = match (sheet.grid_x, sheet.grid_y) {
                (Some(x), Some(y)) => Some(GridPos::new(x, y)),
                _ => None,
            };

            tiles.extend(sheet.tile_positions.iter().map(|p| TileDescriptor {
                grid_x: p.x,
                grid_y: p.y,
                locator: SourceLocator::Sheet {
                    sheet: index,
                    offset_x: p.sprite_x,
                    offset_y: p.sprite_y,
                },
            }));

            sheets.push(SheetDescriptor {
                index,
                asset: asset_name(sheet.filename_webp, sheet.filename_png),
                grid,
                tile_size: wire.sprite_config.tile_size,
            });
        }

        TileManifest {
            canvas_width: wire.original_metadata.width,
            canvas_height: wire.original_metadata.height,
            tile_size: wire.original_metadata.tile_size,
            tiles,
            sheets,
            layout: ManifestLayout::SpriteSheets,
        }
    }
}

impl From<SingleImageWire> for TileManifest {
    fn from(wire: SingleImageWire) -> Self {
        let grid = wire.original_metadata;
        let file = wire.single_png;
        let compact = if file.has_webp == Some(false) {
            None
        } else {
            file.filename_webp
        };

        // Every cell lives in the one image, laid out row-major.
        let tile_size = file.tile_size;
        let tiles = (0..grid.height)
            .flat_map(|y| (0..grid.width).map(move |x| (x, y)))
            .map(|(x, y)| TileDescriptor {
                grid_x: x,
                grid_y: y,
                locator: SourceLocator::Sheet {
                    sheet: 0,
                    offset_x: x.saturating_mul(tile_size),
                    offset_y: y.saturating_mul(tile_size),
                },
            })
            .collect();

        TileManifest {
            canvas_width: grid.width,
            canvas_height: grid.height,
            tile_size: grid.tile_size,
            tiles,
            sheets: vec![SheetDescriptor {
                index: 0,
                asset: asset_name(compact, file.filename_png),
                grid: Some(GridPos::new(0, 0)),
                tile_size,
            }],
            layout: ManifestLayout::SingleImage,
        }
    }
}
