//! Vehicle spawner: profiles, spawn placement, destination selection.

use fleet_core::{manhattan, SimRng, VehicleClass, VehicleId, VehicleProfile, VehicleType};
use fleet_grid::{CellRole, Grid};

use crate::engine::SimEngine;
use crate::vehicle::Vehicle;

/// Spawn-time randomization knobs.
#[derive(Clone, Debug)]
pub struct SpawnConfig {
    /// Initial fuel as a fraction of tank capacity, sampled uniformly.
    pub fuel_range: (f64, f64),
    /// Width of the per-vehicle speed multiplier band around 1.0.
    pub speed_variation: f64,
    /// Cumulative vehicle-type distribution: car, then van, then truck.
    pub car_share: f64,
    pub van_share: f64,
    /// Minimum Manhattan distance between origin and destination cells.
    pub min_target_distance: i64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            fuel_range: (0.3, 0.9),
            speed_variation: 0.1,
            car_share: 0.6,
            van_share: 0.3,
            min_target_distance: 5,
        }
    }
}

/// Spawns vehicles onto random valid cells with randomized profiles and
/// destinations.  Owns its own RNG stream so spawning does not perturb the
/// engine's per-vehicle streams.
pub struct VehicleSpawner {
    config: SpawnConfig,
    rng: SimRng,
}

impl VehicleSpawner {
    pub fn new(config: SpawnConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SimRng::new(seed),
        }
    }

    /// Spawn up to `count` vehicles into the engine.  Returns the ids
    /// actually spawned; a shortfall is logged.
    pub fn spawn_random(&mut self, engine: &mut SimEngine<'_>, count: usize) -> Vec<VehicleId> {
        let spawn_points = valid_spawn_cells(engine.grid());
        if spawn_points.is_empty() {
            log::warn!("no valid spawn locations found in grid");
            return Vec::new();
        }

        let mut spawned = Vec::with_capacity(count);
        let mut attempts = 0;
        let max_attempts = count * 3;

        while spawned.len() < count && attempts < max_attempts {
            attempts += 1;
            let origin = spawn_points[self.rng.gen_range(0..spawn_points.len())];
            let Some(vehicle) = self.build_vehicle(engine.grid(), origin) else {
                continue;
            };
            spawned.push(engine.add_vehicle(vehicle));
        }

        if spawned.len() < count {
            log::warn!(
                "only spawned {} of {count} requested vehicles after {attempts} attempts",
                spawned.len()
            );
        }
        spawned
    }

    fn build_vehicle(&mut self, grid: &Grid, origin: (i64, i64)) -> Option<Vehicle> {
        let destination = self.select_destination(grid, origin)?;
        let target_node = grid.node_at(destination.0, destination.1)?;

        let cell = grid.cell_at(origin.0, origin.1)?;
        let &segment_id = cell.segments.first()?;
        let segment = grid.segment(segment_id)?;

        // Depart from the spawn cell's end of the segment.
        let origin_node = grid.node_at(origin.0, origin.1)?;
        let (progress, direction) = if segment.start == origin_node {
            (0.0, 1)
        } else {
            (1.0, -1)
        };

        let profile = self.pick_profile();
        let (fuel_lo, fuel_hi) = self.config.fuel_range;
        let fuel_fraction = fuel_lo + self.rng.gen_range(0.0..1.0) * (fuel_hi - fuel_lo);
        let speed_multiplier =
            1.0 + (self.rng.gen_range(0.0..1.0) - 0.5) * self.config.speed_variation;

        let mut vehicle = Vehicle::spawned(
            VehicleClass::Fleet,
            profile.clone(),
            segment_id,
            progress,
            direction,
            target_node,
            profile.tank_liters * fuel_fraction,
            speed_multiplier,
            fleet_core::Tick::ZERO,
        );
        vehicle.origin_cell = Some(origin);
        vehicle.destination_cell = Some(destination);
        Some(vehicle)
    }

    fn pick_profile(&mut self) -> &'static VehicleProfile {
        let draw = self.rng.gen_range(0.0..1.0);
        let vehicle_type = if draw < self.config.car_share {
            VehicleType::Car
        } else if draw < self.config.car_share + self.config.van_share {
            VehicleType::Van
        } else {
            VehicleType::Truck
        };
        VehicleProfile::builtin(vehicle_type)
    }

    /// Pick a destination cell: depots are preferred (40 %), then fuel
    /// stations (30 %), then ordinary road cells; all at least
    /// `min_target_distance` away, with a uniform fallback.
    fn select_destination(&mut self, grid: &Grid, origin: (i64, i64)) -> Option<(i64, i64)> {
        let mut depots = Vec::new();
        let mut fuel_stations = Vec::new();
        let mut normal = Vec::new();

        for cell in grid.cells() {
            if !cell.has_roads() {
                continue;
            }
            if manhattan(origin.0, origin.1, cell.x, cell.y) < self.config.min_target_distance {
                continue;
            }
            match cell.role {
                CellRole::Depot => depots.push((cell.x, cell.y)),
                CellRole::Refuel => fuel_stations.push((cell.x, cell.y)),
                CellRole::Normal => normal.push((cell.x, cell.y)),
                CellRole::Blocked => {}
            }
        }

        let draw = self.rng.gen_range(0.0..1.0);
        if draw < 0.4 && !depots.is_empty() {
            return self.rng.choose(&depots).copied();
        }
        if draw < 0.7 && !fuel_stations.is_empty() {
            return self.rng.choose(&fuel_stations).copied();
        }
        if !normal.is_empty() {
            return self.rng.choose(&normal).copied();
        }

        let all: Vec<(i64, i64)> = depots
            .into_iter()
            .chain(fuel_stations)
            .chain(normal)
            .collect();
        self.rng.choose(&all).copied()
    }
}

/// Cells a vehicle may spawn on: any road cell that is not blocked.  Depots
/// and fuel stations always qualify; normal cells need a connection.
pub fn valid_spawn_cells(grid: &Grid) -> Vec<(i64, i64)> {
    grid.cells()
        .iter()
        .filter(|c| c.has_roads() && c.role != CellRole::Blocked)
        .filter(|c| match c.role {
            CellRole::Normal => grid.cardinal_connections(c.x, c.y) >= 1,
            _ => true,
        })
        .map(|c| (c.x, c.y))
        .collect()
}
