//! Sketch → cell-lattice rasterization.
//!
//! Every sketch link becomes a chain of unit segments between adjacent cells
//! (8-connected line walk).  Rasterizing through the cell lattice keeps the
//! grid invariants identical for every topology: one node per road cell,
//! every segment registered at both endpoint cells, no degenerate edges.

use fleet_core::Point;
use fleet_grid::{Grid, SegmentSpec};

use crate::sketch::RoadSketch;

/// Snap a sketch point to the nearest in-bounds cell.
fn snap(grid: &Grid, p: Point) -> (i64, i64) {
    let x = (p.x / grid.cell_size_m).round() as i64;
    let y = (p.y / grid.cell_size_m).round() as i64;
    (x.clamp(0, grid.width - 1), y.clamp(0, grid.height - 1))
}

/// Rasterize a sketch onto the grid.  Returns the number of segments added
/// (existing connections are left untouched).
pub fn rasterize(grid: &mut Grid, sketch: &RoadSketch) -> usize {
    let mut added = 0;
    for link in &sketch.links {
        let from = snap(grid, sketch.points[link.a]);
        let to = snap(grid, sketch.points[link.b]);
        let spec = SegmentSpec {
            base_congestion: link.congestion,
            ..SegmentSpec::default()
        };
        added += walk_line(grid, from, to, spec);
    }
    added
}

/// Walk an 8-connected line from `from` to `to`, connecting each pair of
/// consecutive cells.  Bresenham stepping keeps walks deterministic and
/// never revisits a cell.
fn walk_line(grid: &mut Grid, from: (i64, i64), to: (i64, i64), spec: SegmentSpec) -> usize {
    let (mut x, mut y) = from;
    let (tx, ty) = to;
    let dx = (tx - x).abs();
    let dy = -(ty - y).abs();
    let sx = if x < tx { 1 } else { -1 };
    let sy = if y < ty { 1 } else { -1 };
    let mut err = dx + dy;
    let mut added = 0;

    while (x, y) != (tx, ty) {
        let prev = (x, y);
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        if grid.connect(prev, (x, y), spec).is_some() {
            added += 1;
        }
    }
    added
}
