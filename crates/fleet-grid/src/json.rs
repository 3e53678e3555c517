//! On-disk JSON grid format: import with validation, stable export.
//!
//! The wire schema is cell-oriented: each cell repeats the full record of
//! every segment touching it, so a file is readable without a separate
//! segment table.  Import deduplicates by segment id; export emits cells in
//! row-major order with segment lists sorted by id, so
//! export → import → re-export is byte-identical.

use serde::{Deserialize, Serialize};

use fleet_core::{NodeId, SegmentId};

use crate::cell::CellRole;
use crate::connectivity;
use crate::error::{GridError, GridResult};
use crate::grid::{Grid, DEFAULT_BASE_SPEED_KPH, DEFAULT_CELL_SIZE_M};
use crate::segment::{ConditionList, RoadSegment, TrafficLoad};

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct GridFile {
    #[serde(rename = "dimX")]
    dim_x: i64,
    #[serde(rename = "dimY")]
    dim_y: i64,
    cells: Vec<CellFile>,
}

#[derive(Serialize, Deserialize)]
struct CellFile {
    xpos: i64,
    ypos: i64,
    cell_type: CellRole,
    road_segments: Vec<CellRoadFile>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    refuel_amount: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct CellRoadFile {
    road_segment_id: i64,
    road_segment: SegmentFile,
}

#[derive(Serialize, Deserialize, Clone)]
struct SegmentFile {
    id: i64,
    start_x: i64,
    start_y: i64,
    end_x: i64,
    end_y: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    speed_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    capacity: Option<i64>,
    is_open: bool,
}

// ── Import ────────────────────────────────────────────────────────────────────

/// Parse and validate a JSON grid, using the default cell size for node
/// positions.
pub fn import(json: &str) -> GridResult<Grid> {
    import_with_cell_size(json, DEFAULT_CELL_SIZE_M)
}

/// Parse and validate a JSON grid.
///
/// Rejected inputs: non-positive dimensions, wrong cell count, out-of-bounds
/// or duplicate coordinates, refuel cells without an amount, non-positive
/// segment ids, segments listed by cells they do not touch, degenerate
/// zero-length segments, and road networks that are not a single connected
/// component.
pub fn import_with_cell_size(json: &str, cell_size_m: f64) -> GridResult<Grid> {
    let file: GridFile = serde_json::from_str(json)?;

    if file.dim_x <= 0 || file.dim_y <= 0 {
        return Err(GridError::Parse(format!(
            "invalid grid dimensions: {}x{} (must be positive)",
            file.dim_x, file.dim_y
        )));
    }
    let expected = (file.dim_x * file.dim_y) as usize;
    if file.cells.len() != expected {
        return Err(GridError::Parse(format!(
            "cell count mismatch: expected {expected} cells for {}x{} grid, got {}",
            file.dim_x,
            file.dim_y,
            file.cells.len()
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for cell in &file.cells {
        if cell.xpos < 0 || cell.xpos >= file.dim_x || cell.ypos < 0 || cell.ypos >= file.dim_y {
            return Err(GridError::Parse(format!(
                "cell ({},{}) outside grid bounds {}x{}",
                cell.xpos, cell.ypos, file.dim_x, file.dim_y
            )));
        }
        if !seen.insert((cell.xpos, cell.ypos)) {
            return Err(GridError::Parse(format!(
                "duplicate cell coordinates ({},{})",
                cell.xpos, cell.ypos
            )));
        }
        if cell.cell_type == CellRole::Refuel && cell.refuel_amount.is_none() {
            return Err(GridError::Parse(format!(
                "refuel station at ({},{}) missing refuel amount",
                cell.xpos, cell.ypos
            )));
        }
        for road in &cell.road_segments {
            if road.road_segment.id <= 0 {
                return Err(GridError::Parse(format!(
                    "cell ({},{}) road segment has invalid id {}",
                    cell.xpos, cell.ypos, road.road_segment.id
                )));
            }
            if !segment_touches_cell(&road.road_segment, cell.xpos, cell.ypos) {
                return Err(GridError::Parse(format!(
                    "cell ({},{}) lists segment {} which does not touch it",
                    cell.xpos, cell.ypos, road.road_segment.id
                )));
            }
        }
    }

    // ── Materialize ───────────────────────────────────────────────────────
    let mut grid = Grid::new(file.dim_x, file.dim_y, cell_size_m);

    let mut unique: std::collections::BTreeMap<i64, SegmentFile> = Default::default();
    for cell in &file.cells {
        let target = grid.cell_at_mut(cell.xpos, cell.ypos).unwrap();
        target.role = cell.cell_type;
        target.refuel_amount = cell.refuel_amount;
        for road in &cell.road_segments {
            let id = SegmentId(road.road_segment.id as u32);
            if !target.segments.contains(&id) {
                target.segments.push(id);
            }
            unique
                .entry(road.road_segment.id)
                .or_insert_with(|| road.road_segment.clone());
        }
    }

    for seg_file in unique.values() {
        let start = grid.ensure_node(seg_file.start_x, seg_file.start_y);
        let end = grid.ensure_node(seg_file.end_x, seg_file.end_y);
        let seg = materialize_segment(&grid, seg_file, start, end)?;
        grid.insert_segment_record(seg);
    }

    grid.rebuild_indexes();
    connectivity::require_single_component(&grid)?;
    grid.validate_invariants()?;

    log::info!(
        "imported {}x{} grid: {} cells, {} segments",
        grid.width,
        grid.height,
        grid.total_cells(),
        grid.segment_count()
    );
    Ok(grid)
}

/// A segment belongs to a cell when the cell is one of its endpoints or lies
/// on its axis-aligned span.
fn segment_touches_cell(seg: &SegmentFile, x: i64, y: i64) -> bool {
    if (seg.start_x, seg.start_y) == (x, y) || (seg.end_x, seg.end_y) == (x, y) {
        return true;
    }
    if seg.start_x == seg.end_x && x == seg.start_x {
        let (lo, hi) = minmax(seg.start_y, seg.end_y);
        return y >= lo && y <= hi;
    }
    if seg.start_y == seg.end_y && y == seg.start_y {
        let (lo, hi) = minmax(seg.start_x, seg.end_x);
        return x >= lo && x <= hi;
    }
    false
}

fn minmax(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn materialize_segment(
    grid: &Grid,
    file: &SegmentFile,
    start: NodeId,
    end: NodeId,
) -> GridResult<RoadSegment> {
    let start_pos = grid.node(start).unwrap().pos;
    let end_pos = grid.node(end).unwrap().pos;
    let length_km = start_pos.distance_km(end_pos);
    if length_km <= 0.0 {
        return Err(GridError::Parse(format!(
            "segment {} is degenerate (zero length)",
            file.id
        )));
    }
    let speed_limit = match file.speed_limit {
        Some(v) if v > 0 => Some(v as u32),
        Some(v) => {
            return Err(GridError::Parse(format!(
                "segment {} has non-positive speed limit {v}",
                file.id
            )))
        }
        None => None,
    };
    let capacity = match file.capacity {
        Some(v) if v > 0 => Some(v as u32),
        Some(v) => {
            return Err(GridError::Parse(format!(
                "segment {} has non-positive capacity {v}",
                file.id
            )))
        }
        None => None,
    };
    Ok(RoadSegment {
        id: SegmentId(file.id as u32),
        start,
        end,
        length_km,
        base_speed_kph: speed_limit
            .map(|v| v as f64)
            .unwrap_or(DEFAULT_BASE_SPEED_KPH),
        base_congestion: 1.0,
        speed_limit_kph: speed_limit,
        capacity,
        is_open: file.is_open,
        is_artery: false,
        base_conditions: ConditionList::new(),
        temporary_conditions: ConditionList::new(),
        load: TrafficLoad::default(),
    })
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Serialize a grid to the wire format: cells in row-major order, each cell's
/// segment list sorted by id.
pub fn export(grid: &Grid) -> GridResult<String> {
    let mut cells = Vec::with_capacity(grid.total_cells());
    for cell in grid.cells() {
        let mut ids: Vec<SegmentId> = cell.segments.clone();
        ids.sort_unstable();
        let road_segments = ids
            .into_iter()
            .filter_map(|id| grid.segment(id))
            .map(|seg| {
                let ((sx, sy), (ex, ey)) = grid.segment_cells(seg);
                CellRoadFile {
                    road_segment_id: seg.id.0 as i64,
                    road_segment: SegmentFile {
                        id: seg.id.0 as i64,
                        start_x: sx,
                        start_y: sy,
                        end_x: ex,
                        end_y: ey,
                        speed_limit: seg.speed_limit_kph.map(|v| v as i64),
                        capacity: seg.capacity.map(|v| v as i64),
                        is_open: seg.is_open,
                    },
                }
            })
            .collect();
        cells.push(CellFile {
            xpos: cell.x,
            ypos: cell.y,
            cell_type: cell.role,
            road_segments,
            refuel_amount: cell.refuel_amount,
        });
    }

    let file = GridFile {
        dim_x: grid.width,
        dim_y: grid.height,
        cells,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}
