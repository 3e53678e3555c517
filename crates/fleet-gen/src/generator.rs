//! The three-phase generation pipeline.

use std::time::Instant;

use fleet_core::SimRng;
use fleet_grid::grid::{ARTERY_BASE_SPEED_KPH, SegmentSpec};
use fleet_grid::{connectivity, Grid};

use crate::error::{GenError, GenResult};
use crate::params::GeneratorParams;
use crate::placement::{place_special_locations, PlacementCounts, Quotas};
use crate::raster::rasterize;
use crate::sketch::build_sketch;

/// Whole-generation retry budget (fresh topology per attempt).
const MAX_GENERATION_RETRIES: usize = 10;
/// Phase-C placement relaxation budget.
const MAX_PLACEMENT_ATTEMPTS: usize = 20;

/// Summary of one successful generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub total_cells: usize,
    pub road_cells: usize,
    pub special_cells: usize,
    pub total_segments: usize,
    pub main_arteries: usize,
    pub secondary_roads: usize,
    pub dead_ends: usize,
    pub connected_components: usize,
    pub generation_time_ms: u64,
}

/// Generate a grid satisfying all frozen-grid invariants.
///
/// The pipeline per attempt: topology sketch → rasterization → artery /
/// density / cul-de-sac passes → special placement with quota relaxation →
/// connectivity repair.  A failed attempt restarts with a fresh topology;
/// the RNG stream continues, so every attempt differs but the whole run is
/// reproducible from the seed.
pub fn generate(params: &GeneratorParams) -> GenResult<(Grid, GenerationStats)> {
    params.validate()?;
    let start = Instant::now();
    let mut rng = SimRng::new(params.seed);

    let mut last_err: Option<GenError> = None;
    for attempt in 0..MAX_GENERATION_RETRIES {
        log::debug!("generation attempt {}/{MAX_GENERATION_RETRIES}", attempt + 1);

        let mut grid = Grid::new(params.width, params.height, params.cell_size_m);
        let sketch = build_sketch(params, &mut rng);
        rasterize(&mut grid, &sketch);
        if grid.segment_count() == 0 {
            last_err = Some(GenError::GenerationFailed {
                attempts: attempt + 1,
            });
            continue;
        }

        let main_arteries = promote_arteries(&mut grid, &mut rng, params);
        let secondary_roads = fill_to_density(&mut grid, &mut rng, params);
        add_cul_de_sacs(&mut grid, &mut rng, params);

        let counts = match place_with_relaxation(&mut grid, &mut rng, params) {
            Ok(counts) => counts,
            Err(e) => {
                log::debug!("placement failed on attempt {}: {e}", attempt + 1);
                last_err = Some(e);
                continue;
            }
        };

        if let Err(e) = connectivity::validate_and_repair(&mut grid) {
            log::debug!("connectivity repair failed on attempt {}: {e}", attempt + 1);
            last_err = Some(e.into());
            continue;
        }

        grid.rebuild_indexes();
        grid.validate_invariants()?;

        let stats = GenerationStats {
            total_cells: grid.total_cells(),
            road_cells: grid.road_cell_count(),
            special_cells: grid.special_cell_count(),
            total_segments: grid.segment_count(),
            main_arteries,
            secondary_roads,
            dead_ends: count_dead_ends(&grid),
            connected_components: 1,
            generation_time_ms: start.elapsed().as_millis() as u64,
        };
        log::info!(
            "generated {}x{} grid: {} road cells, {} segments ({} fuel, {} depots, {} blocked)",
            grid.width,
            grid.height,
            stats.road_cells,
            stats.total_segments,
            counts.fuel_stations,
            counts.depots,
            counts.blocked
        );
        return Ok((grid, stats));
    }

    Err(last_err.unwrap_or(GenError::GenerationFailed {
        attempts: MAX_GENERATION_RETRIES,
    }))
}

// ── Phase C — placement with quota relaxation ─────────────────────────────────

fn place_with_relaxation(
    grid: &mut Grid,
    rng: &mut SimRng,
    params: &GeneratorParams,
) -> GenResult<PlacementCounts> {
    let mut quotas = Quotas {
        refuel: params.refuel_fraction,
        depot: params.depot_fraction,
        blocked: params.blocked_fraction,
    };

    let mut last_err = None;
    for attempt in 0..MAX_PLACEMENT_ATTEMPTS {
        log::debug!(
            "placement attempt {}/{MAX_PLACEMENT_ATTEMPTS} (blocked: {:.3}, refuel: {:.3}, depot: {:.3})",
            attempt + 1,
            quotas.blocked,
            quotas.refuel,
            quotas.depot
        );
        let backup = grid.backup();
        match place_special_locations(grid, rng, &quotas) {
            Ok(counts) => return Ok(counts),
            Err(e) => {
                log::debug!("placement attempt {} failed: {e}", attempt + 1);
                last_err = Some(e);
                grid.restore(&backup);

                quotas.blocked *= 0.7;
                quotas.refuel *= 0.95;
                quotas.depot *= 0.95;
                if quotas.blocked > 0.0 {
                    quotas.blocked = quotas.blocked.max(0.01);
                }
                if quotas.refuel > 0.0 {
                    quotas.refuel = quotas.refuel.max(0.02);
                }
                if quotas.depot > 0.0 {
                    quotas.depot = quotas.depot.max(0.01);
                }
            }
        }
    }

    Err(last_err.unwrap_or(GenError::PlacementExhausted {
        attempts: MAX_PLACEMENT_ATTEMPTS,
    }))
}

// ── Post-topology passes ──────────────────────────────────────────────────────

/// Promote evenly spaced full rows and columns to main arteries.  Artery
/// segments run faster; existing connections along the line are left alone.
fn promote_arteries(grid: &mut Grid, rng: &mut SimRng, params: &GeneratorParams) -> usize {
    let per_orientation = |dim: i64| ((params.main_road_bias * dim as f64) / 4.0).round() as usize;
    let horizontal = per_orientation(params.height);
    let vertical = per_orientation(params.width);
    if horizontal + vertical == 0 {
        return 0;
    }

    let spec = SegmentSpec {
        base_speed_kph: ARTERY_BASE_SPEED_KPH,
        base_congestion: 0.9,
        is_artery: true,
    };

    let mut arteries = 0;
    for y in artery_positions(params.height, horizontal, rng) {
        let mut added = 0;
        for x in 0..params.width - 1 {
            if grid.connect((x, y), (x + 1, y), spec).is_some() {
                added += 1;
            }
        }
        if added > 0 {
            arteries += 1;
        }
    }
    for x in artery_positions(params.width, vertical, rng) {
        let mut added = 0;
        for y in 0..params.height - 1 {
            if grid.connect((x, y), (x, y + 1), spec).is_some() {
                added += 1;
            }
        }
        if added > 0 {
            arteries += 1;
        }
    }
    arteries
}

/// Evenly spaced artery positions with a little jitter, clamped inside the
/// border.
fn artery_positions(dimension: i64, count: usize, rng: &mut SimRng) -> Vec<i64> {
    let mut positions = Vec::with_capacity(count);
    if count == 0 {
        return positions;
    }
    let step = dimension / (count as i64 + 1);
    for i in 0..count {
        let mut pos = (i as i64 + 1) * step;
        let variation = step / 5;
        if variation > 0 {
            pos += rng.gen_range(-variation..=variation);
        }
        positions.push(pos.clamp(1, (dimension - 2).max(1)));
    }
    positions
}

/// Add random adjacent connections until the road density target is met.
fn fill_to_density(grid: &mut Grid, rng: &mut SimRng, params: &GeneratorParams) -> usize {
    let target = ((params.width * params.height * 2) as f64 * params.road_density) as usize;
    let current = grid.segment_count();
    if current >= target {
        return 0;
    }
    let needed = target - current;

    let mut added = 0;
    let mut attempts = 0;
    let max_attempts = needed * 3;
    log::debug!("density fill: need {needed} more segments to reach target");

    while added < needed && attempts < max_attempts {
        attempts += 1;
        let x = rng.gen_range(0..params.width);
        let y = rng.gen_range(0..params.height);
        if add_random_connection(grid, rng, x, y) {
            added += 1;
        }
    }
    added
}

/// Connect a cell to one random cardinal neighbor that it is not already
/// joined to.  Returns `false` when every direction is taken.
fn add_random_connection(grid: &mut Grid, rng: &mut SimRng, x: i64, y: i64) -> bool {
    let mut directions = [(0i64, -1i64), (0, 1), (1, 0), (-1, 0)];
    rng.shuffle(&mut directions);
    for (dx, dy) in directions {
        if grid
            .connect((x, y), (x + dx, y + dy), SegmentSpec::default())
            .is_some()
        {
            return true;
        }
    }
    false
}

/// Sprinkle cul-de-sac stubs: short dead-end spurs off existing road cells.
fn add_cul_de_sacs(grid: &mut Grid, rng: &mut SimRng, params: &GeneratorParams) {
    if params.dead_end_bias <= 0.0 {
        return;
    }
    let prob = params.dead_end_bias * 0.1;
    let road_cells: Vec<(i64, i64)> = grid
        .cells()
        .iter()
        .filter(|c| c.has_roads())
        .map(|c| (c.x, c.y))
        .collect();

    for (x, y) in road_cells {
        if !rng.gen_bool(prob) {
            continue;
        }
        let mut directions = [(0i64, -1i64), (0, 1), (1, 0), (-1, 0)];
        rng.shuffle(&mut directions);
        for (dx, dy) in directions {
            let (tx, ty) = (x + dx, y + dy);
            let empty = grid.cell_at(tx, ty).map(|c| !c.has_roads()).unwrap_or(false);
            if empty {
                let spec = SegmentSpec {
                    base_congestion: 0.6,
                    ..SegmentSpec::default()
                };
                grid.connect((x, y), (tx, ty), spec);
                break;
            }
        }
    }
}

/// Road cells with exactly one incident segment.
fn count_dead_ends(grid: &Grid) -> usize {
    grid.cells()
        .iter()
        .filter(|c| c.segments.len() == 1)
        .count()
}
