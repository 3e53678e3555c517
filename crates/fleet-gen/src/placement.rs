//! Phase B — special-location placement.
//!
//! Fuel stations, depots, and blocked areas are placed into *eligible* cells
//! under spacing constraints; blocked areas additionally must not split the
//! road network, checked with a union-find pass before each block commits.

use fleet_core::{manhattan, SimRng};
use fleet_grid::{connectivity, CellRole, Grid};

use crate::error::{GenError, GenResult};

/// Minimum Manhattan spacing between fuel stations.
const FUEL_SPACING: i64 = 4;
/// Minimum Manhattan spacing between depots.
const DEPOT_SPACING: i64 = 6;
/// Minimum Manhattan distance from a blocked cell to any refuel/depot.
const BLOCKED_CLEARANCE: i64 = 2;

/// Desired placement quotas, as fractions of total cells.
#[derive(Clone, Copy, Debug)]
pub struct Quotas {
    pub refuel: f64,
    pub depot: f64,
    pub blocked: f64,
}

/// What one placement pass actually achieved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementCounts {
    pub fuel_stations: usize,
    pub depots: usize,
    pub blocked: usize,
}

/// Run the full Phase-B pass.  Shortfalls are logged, not fatal; the error
/// cases are an empty eligible set (with non-zero quotas) and a broken
/// network after placement.
pub fn place_special_locations(
    grid: &mut Grid,
    rng: &mut SimRng,
    quotas: &Quotas,
) -> GenResult<PlacementCounts> {
    let total = grid.total_cells() as f64;
    let fuel_needed = (total * quotas.refuel) as usize;
    let depots_needed = (total * quotas.depot) as usize;
    let blocked_needed = (total * quotas.blocked) as usize;

    let eligible = eligible_cells(grid);
    if eligible.is_empty() {
        if fuel_needed + depots_needed + blocked_needed > 0 {
            return Err(GenError::NoEligibleCells);
        }
        return Ok(PlacementCounts::default());
    }

    log::debug!(
        "placing special locations: {fuel_needed} fuel, {depots_needed} depots, \
         {blocked_needed} blocked from {} eligible cells",
        eligible.len()
    );

    let fuel_stations = place_fuel_stations(grid, rng, &eligible, fuel_needed);
    let depots = place_depots(grid, rng, &eligible, depots_needed);

    let blocked_cap = max_blocked_cells(grid);
    let blocked = place_blocked_areas(grid, rng, &eligible, blocked_needed.min(blocked_cap));

    connectivity::require_single_component(grid)?;

    Ok(PlacementCounts {
        fuel_stations,
        depots,
        blocked,
    })
}

/// A cell is eligible iff its role is normal, it carries at least one
/// segment, it keeps a margin of one cell from the border, and it has at
/// least two distinct cardinal connections.
pub fn eligible_cells(grid: &Grid) -> Vec<(i64, i64)> {
    let margin = 1;
    grid.cells()
        .iter()
        .filter(|c| c.role == CellRole::Normal && c.has_roads())
        .filter(|c| {
            c.x >= margin && c.x < grid.width - margin && c.y >= margin && c.y < grid.height - margin
        })
        .filter(|c| grid.cardinal_connections(c.x, c.y) >= 2)
        .map(|c| (c.x, c.y))
        .collect()
}

// ── Fuel stations ─────────────────────────────────────────────────────────────

fn place_fuel_stations(
    grid: &mut Grid,
    rng: &mut SimRng,
    eligible: &[(i64, i64)],
    count: usize,
) -> usize {
    let mut candidates = eligible.to_vec();
    let mut placed = 0;
    let mut attempts = 0;
    let max_attempts = count * 5;

    while placed < count && attempts < max_attempts && !candidates.is_empty() {
        attempts += 1;
        let idx = rng.gen_range(0..candidates.len());
        let (x, y) = candidates[idx];

        if spacing_ok(grid, x, y, CellRole::Refuel, FUEL_SPACING) {
            let amount = 1000.0 + rng.gen_range(0.0..1.0) * 2000.0;
            let cell = grid.cell_at_mut(x, y).unwrap();
            cell.role = CellRole::Refuel;
            cell.refuel_amount = Some(amount);
            placed += 1;
            prune_near(&mut candidates, x, y, 3);
        } else {
            candidates.swap_remove(idx);
        }
    }

    if placed < count {
        log::warn!("only placed {placed} of {count} requested fuel stations");
    }
    placed
}

// ── Depots ────────────────────────────────────────────────────────────────────

fn place_depots(grid: &mut Grid, rng: &mut SimRng, eligible: &[(i64, i64)], count: usize) -> usize {
    let mut candidates = eligible.to_vec();
    let mut placed = 0;
    let mut attempts = 0;
    let max_attempts = count * 5;

    while placed < count && attempts < max_attempts && !candidates.is_empty() {
        attempts += 1;
        let idx = rng.gen_range(0..candidates.len());
        let (x, y) = candidates[idx];

        let still_normal = grid
            .cell_at(x, y)
            .map(|c| c.role == CellRole::Normal)
            .unwrap_or(false);
        if still_normal
            && spacing_ok(grid, x, y, CellRole::Depot, DEPOT_SPACING)
            && grid.cardinal_connections(x, y) >= 2
        {
            grid.cell_at_mut(x, y).unwrap().role = CellRole::Depot;
            placed += 1;
            prune_near(&mut candidates, x, y, 5);
        } else {
            candidates.swap_remove(idx);
        }
    }

    if placed < count {
        log::warn!("only placed {placed} of {count} requested depots");
    }
    placed
}

// ── Blocked areas ─────────────────────────────────────────────────────────────

fn place_blocked_areas(
    grid: &mut Grid,
    rng: &mut SimRng,
    eligible: &[(i64, i64)],
    count: usize,
) -> usize {
    let mut candidates = eligible.to_vec();
    rng.shuffle(&mut candidates);

    let mut placed = 0;
    for (x, y) in candidates {
        if placed >= count {
            break;
        }
        if !can_block(grid, x, y) {
            continue;
        }

        // Apply, check, revert on breakage.
        let removed = grid.remove_cell_segments(x, y);
        grid.cell_at_mut(x, y).unwrap().role = CellRole::Blocked;

        if connectivity::connected_fast(grid) {
            placed += 1;
        } else {
            grid.cell_at_mut(x, y).unwrap().role = CellRole::Normal;
            grid.reinsert_segments(removed);
        }
    }

    if placed < count {
        log::warn!("only placed {placed} of {count} requested blocked areas (connectivity constraints)");
    }
    placed
}

/// A cell may be blocked iff it has at most two connections and keeps its
/// clearance from every refuel and depot cell.
fn can_block(grid: &Grid, x: i64, y: i64) -> bool {
    let Some(cell) = grid.cell_at(x, y) else {
        return false;
    };
    if cell.role != CellRole::Normal {
        return false;
    }
    if grid.cardinal_connections(x, y) > 2 {
        return false;
    }
    grid.cells()
        .iter()
        .filter(|c| matches!(c.role, CellRole::Refuel | CellRole::Depot))
        .all(|c| manhattan(x, y, c.x, c.y) >= BLOCKED_CLEARANCE)
}

/// Blocked-cell budget: a base share of road cells, penalized by critical
/// (articulation) segments and rewarded by network redundancy; never more
/// than a quarter of all cells.
pub fn max_blocked_cells(grid: &Grid) -> usize {
    let road_cells = grid.road_cell_count() as f64;
    let critical = critical_segment_count(grid) as f64;
    let redundancy = network_redundancy(grid);

    let base = road_cells * 0.15;
    let max_blocked = (base - critical * 0.02 + redundancy * 0.1).max(0.01);

    let total = grid.total_cells() as f64;
    let ratio = (max_blocked / total).min(0.25);
    (total * ratio) as usize
}

/// Number of segments whose removal would split the network.
fn critical_segment_count(grid: &Grid) -> usize {
    grid.segments()
        .map(|s| s.id)
        .collect::<Vec<_>>()
        .into_iter()
        .filter(|&id| connectivity::articulation_probe(grid, id))
        .count()
}

/// Ratio of actual to maximal segment adjacency — a cheap proxy for how many
/// alternative paths the network offers.
fn network_redundancy(grid: &Grid) -> f64 {
    let components = connectivity::find_components(grid);
    let n: usize = components.iter().map(|c| c.len()).sum();
    if n < 2 {
        return 0.0;
    }
    let mut endpoint_pairs = 0usize;
    for seg in grid.segments() {
        let (s, e) = grid.segment_cells(seg);
        for (cx, cy) in [s, e] {
            if let Some(cell) = grid.cell_at(cx, cy) {
                endpoint_pairs += cell.segments.len().saturating_sub(1);
            }
            if s == e {
                break;
            }
        }
    }
    let actual = endpoint_pairs as f64 / 2.0;
    let max_possible = (n * (n - 1)) as f64 / 2.0;
    (actual / max_possible).clamp(0.0, 1.0)
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// `true` when no cell of `role` lies within `min_spacing` of `(x, y)`.
fn spacing_ok(grid: &Grid, x: i64, y: i64, role: CellRole, min_spacing: i64) -> bool {
    grid.cells()
        .iter()
        .filter(|c| c.role == role)
        .all(|c| manhattan(x, y, c.x, c.y) >= min_spacing)
}

/// Drop candidates within `radius` of a placed location.
fn prune_near(candidates: &mut Vec<(i64, i64)>, x: i64, y: i64, radius: i64) {
    candidates.retain(|&(cx, cy)| manhattan(x, y, cx, cy) >= radius);
}
