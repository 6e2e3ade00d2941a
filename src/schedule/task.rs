//! Load tasks and the strategies that plan them.
//!
//! A [`TileSourceStrategy`] turns a manifest into an ordered list of
//! [`LoadTask`]s. Each task fetches one file (a tile or a whole sheet) and
//! carries the [`Placement`]s that say where its pixels go in the grid.

use std::collections::BTreeMap;

use crate::format::{FormatNegotiator, ResolvedAsset};
use crate::manifest::{GridPos, ManifestLayout, SourceLocator, TileManifest};

use super::order::{center_distance, distance_order, spiral_order};

/// Square region of a source image, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// One grid cell fed by a task's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub pos: GridPos,

    /// Region of the source image, or `None` for the whole image
    pub region: Option<SourceRegion>,
}

/// Lifecycle of a task. `Cached` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,

    /// Decoded and available (from the cache or the network)
    Cached,

    Failed,
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTask {
    /// Position in the planned order
    pub id: usize,

    pub asset: ResolvedAsset,

    /// Lower loads earlier
    pub priority: f64,

    pub placements: Vec<Placement>,

    pub state: TaskState,
}

// =============================================================================
// Strategies
// =============================================================================

/// How tile pixels are sourced, selected from the manifest shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSourceStrategy {
    /// One file per tile, loaded closest to the center first
    Standalone,

    /// Tiles packed into sheets, loaded in spiral order over the sheet grid
    Packed,
}

impl TileSourceStrategy {
    pub fn for_manifest(manifest: &TileManifest) -> Self {
        match manifest.layout {
            ManifestLayout::Tiles => TileSourceStrategy::Standalone,
            ManifestLayout::SpriteSheets | ManifestLayout::SingleImage => {
                TileSourceStrategy::Packed
            }
        }
    }

    /// Plan the tasks for `manifest`, highest priority first.
    pub fn plan(&self, manifest: &TileManifest, negotiator: &FormatNegotiator) -> Vec<LoadTask> {
        let mut tasks = match self {
            TileSourceStrategy::Standalone => plan_standalone(manifest, negotiator),
            TileSourceStrategy::Packed => plan_packed(manifest, negotiator),
        };
        for (id, task) in tasks.iter_mut().enumerate() {
            task.id = id;
        }
        tasks
    }
}

fn new_task(asset: ResolvedAsset, priority: f64, placements: Vec<Placement>) -> LoadTask {
    LoadTask {
        id: 0,
        asset,
        priority,
        placements,
        state: TaskState::Pending,
    }
}

fn plan_standalone(manifest: &TileManifest, negotiator: &FormatNegotiator) -> Vec<LoadTask> {
    distance_order(manifest)
        .into_iter()
        .filter_map(|i| {
            let tile = &manifest.tiles[i];
            match &tile.locator {
                SourceLocator::File(name) => Some(new_task(
                    negotiator.resolve(name),
                    center_distance(manifest, tile.grid_x, tile.grid_y),
                    vec![Placement {
                        pos: tile.pos(),
                        region: None,
                    }],
                )),
                SourceLocator::Sheet { .. } => None,
            }
        })
        .collect()
}

fn plan_packed(manifest: &TileManifest, negotiator: &FormatNegotiator) -> Vec<LoadTask> {
    let mut by_sheet: BTreeMap<usize, Vec<Placement>> = BTreeMap::new();
    for tile in &manifest.tiles {
        if let SourceLocator::Sheet {
            sheet,
            offset_x,
            offset_y,
        } = tile.locator
        {
            let size = manifest
                .sheet(sheet)
                .map(|s| s.tile_size)
                .unwrap_or(manifest.tile_size);
            by_sheet.entry(sheet).or_default().push(Placement {
                pos: tile.pos(),
                region: Some(SourceRegion {
                    x: offset_x,
                    y: offset_y,
                    size,
                }),
            });
        }
    }

    sheet_order(manifest)
        .into_iter()
        .filter_map(|index| {
            let sheet = manifest.sheet(index)?;
            let placements = by_sheet.remove(&index)?;
            Some((sheet, placements))
        })
        .enumerate()
        .map(|(rank, (sheet, placements))| {
            new_task(negotiator.resolve(&sheet.asset), rank as f64, placements)
        })
        .collect()
}

/// Sheet indices in load order: spiral over the sheet grid, then any
/// sheets without a grid position by index.
fn sheet_order(manifest: &TileManifest) -> Vec<usize> {
    let positioned: Vec<(GridPos, usize)> = manifest
        .sheets
        .iter()
        .filter_map(|s| s.grid.map(|g| (g, s.index)))
        .collect();

    let mut order = Vec::with_capacity(manifest.sheets.len());
    if !positioned.is_empty() {
        let cols = positioned.iter().map(|(g, _)| g.x).max().unwrap_or(0) as usize + 1;
        let rows = positioned.iter().map(|(g, _)| g.y).max().unwrap_or(0) as usize + 1;
        let mut cells: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (grid, index) in &positioned {
            cells
                .entry(grid.y as usize * cols + grid.x as usize)
                .or_default()
                .push(*index);
        }
        for cell in spiral_order(cols, rows) {
            if let Some(indices) = cells.remove(&cell) {
                order.extend(indices);
            }
        }
    }

    let mut loose: Vec<usize> = manifest
        .sheets
        .iter()
        .filter(|s| s.grid.is_none())
        .map(|s| s.index)
        .collect();
    loose.sort_unstable();
    order.extend(loose);
    order
}
