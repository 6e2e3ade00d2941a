//! Load ordering.
//!
//! Two orderings are supported:
//!
//! - **Distance**: standalone tiles sorted by Euclidean distance of their
//!   grid position to the grid center, closest first.
//! - **Spiral**: a grid of sheets visited from the center cell outward in
//!   anticlockwise rings (right, up, left, down), the arm length growing by
//!   one every two turns.

use crate::manifest::TileManifest;

/// Euclidean distance of grid position `(x, y)` to the manifest center.
pub fn center_distance(manifest: &TileManifest, x: u32, y: u32) -> f64 {
    let (cx, cy) = manifest.center();
    let dx = x as f64 - cx;
    let dy = y as f64 - cy;
    (dx * dx + dy * dy).sqrt()
}

/// Indices into `manifest.tiles`, closest to the center first.
///
/// The sort is stable, so equidistant tiles keep manifest order.
pub fn distance_order(manifest: &TileManifest) -> Vec<usize> {
    let mut order: Vec<(f64, usize)> = manifest
        .tiles
        .iter()
        .enumerate()
        .map(|(i, t)| (center_distance(manifest, t.grid_x, t.grid_y), i))
        .collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0));
    order.into_iter().map(|(_, i)| i).collect()
}

/// Directions as (row delta, column delta): right, up, left, down.
const SPIRAL_DIRECTIONS: [(i64, i64); 4] = [(0, 1), (-1, 0), (0, -1), (1, 0)];

/// Row-major cell indices of a `cols` × `rows` grid in spiral order.
///
/// Starts at the center cell `(rows / 2, cols / 2)`. Steps that leave the
/// grid are walked but not emitted, so non-square grids are covered too.
/// Every index appears exactly once.
pub fn spiral_order(cols: usize, rows: usize) -> Vec<usize> {
    let total = cols * rows;
    let mut order = Vec::with_capacity(total);
    if total == 0 {
        return order;
    }

    let mut visited = vec![false; total];
    let (mut row, mut col) = ((rows / 2) as i64, (cols / 2) as i64);
    let mut visit = |row: i64, col: i64, order: &mut Vec<usize>| {
        if row < 0 || col < 0 || row >= rows as i64 || col >= cols as i64 {
            return;
        }
        let index = row as usize * cols + col as usize;
        if !visited[index] {
            visited[index] = true;
            order.push(index);
        }
    };

    visit(row, col, &mut order);
    let mut direction = 0;
    let mut steps = 1;
    while order.len() < total {
        for _ in 0..2 {
            let (dr, dc) = SPIRAL_DIRECTIONS[direction];
            for _ in 0..steps {
                row += dr;
                col += dc;
                visit(row, col, &mut order);
            }
            direction = (direction + 1) % SPIRAL_DIRECTIONS.len();
        }
        steps += 1;
    }

    order
}
