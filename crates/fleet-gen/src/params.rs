//! Generator input: dimensions, seed, quotas, and the topology selection.

use std::collections::HashMap;

use fleet_grid::grid::DEFAULT_CELL_SIZE_M;

use crate::error::{GenError, GenResult};

/// One record of generator input.  `width`/`height` are cell counts; all
/// fractions are relative to the total cell count.
#[derive(Clone, Debug)]
pub struct GeneratorParams {
    pub width: i64,
    pub height: i64,
    pub seed: u64,
    pub topology: Topology,

    /// Desired fraction of cells that become fuel stations, ∈ [0, 1].
    pub refuel_fraction: f64,
    /// Desired fraction of cells that become depots, ∈ [0, 1].
    pub depot_fraction: f64,
    /// Desired fraction of cells that become blocked, ∈ [0, 1].
    pub blocked_fraction: f64,

    /// Target road coverage for the density-fill pass, ∈ [0, 1].
    pub road_density: f64,
    /// Share of full-row/column arteries promoted after rasterization, ∈ [0, 1].
    pub main_road_bias: f64,
    /// Probability weight for cul-de-sac stubs, ∈ [0, 1].
    pub dead_end_bias: f64,

    /// Metres per cell.
    pub cell_size_m: f64,
}

impl GeneratorParams {
    /// Demo-flavoured defaults (the Go loader's demo configuration).
    pub fn new(width: i64, height: i64, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
            topology: Topology::Lattice(LatticeParams::default()),
            refuel_fraction: 0.05,
            depot_fraction: 0.02,
            blocked_fraction: 0.05,
            road_density: 0.7,
            main_road_bias: 0.0,
            dead_end_bias: 0.0,
            cell_size_m: DEFAULT_CELL_SIZE_M,
        }
    }

    pub fn validate(&self) -> GenResult<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(GenError::InvalidParams(format!(
                "dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        for (name, v) in [
            ("refuel_fraction", self.refuel_fraction),
            ("depot_fraction", self.depot_fraction),
            ("blocked_fraction", self.blocked_fraction),
            ("road_density", self.road_density),
            ("main_road_bias", self.main_road_bias),
            ("dead_end_bias", self.dead_end_bias),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GenError::InvalidParams(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        if self.cell_size_m <= 0.0 {
            return Err(GenError::InvalidParams(format!(
                "cell_size_m must be positive, got {}",
                self.cell_size_m
            )));
        }
        Ok(())
    }

    /// Box width in metres (sketch space).
    pub fn box_width_m(&self) -> f64 {
        self.width as f64 * self.cell_size_m
    }

    pub fn box_height_m(&self) -> f64 {
        self.height as f64 * self.cell_size_m
    }
}

// ── Topology selection ────────────────────────────────────────────────────────

/// Exactly one topology is selected per run.  A closed set with per-variant
/// parameter blocks.
#[derive(Clone, Debug)]
pub enum Topology {
    Lattice(LatticeParams),
    LatticeRadial(LatticeRadialParams),
    SpaceColonization(SpaceColonizationParams),
    KnnMesh(KnnMeshParams),
    LSystem(LSystemParams),
    Lorenz(LorenzParams),
    Random(RandomParams),
}

impl Topology {
    /// A k-NN mesh sized for the given dimensions.
    pub fn knn_mesh_for(width: i64, height: i64) -> Topology {
        Topology::KnnMesh(KnnMeshParams {
            sites: (4 * (width + height) / 2 + 12) as usize,
            k: 5,
        })
    }

    /// A space-colonization run sized for the given dimensions.
    pub fn space_colonization_for(width: i64, height: i64) -> Topology {
        Topology::SpaceColonization(SpaceColonizationParams {
            attractions: ((width * height) as f64 * 0.6) as usize,
            step_size_m: 25.0,
            capture_radius_m: 80.0,
        })
    }

    /// A random chain-plus-extras graph sized for the given dimensions.
    pub fn random_for(width: i64, height: i64) -> Topology {
        Topology::Random(RandomParams {
            node_count: (width * height / 2 + 8) as usize,
            extra_edges: (width + height) as usize,
        })
    }
}

#[derive(Clone, Debug)]
pub struct LatticeParams {
    /// Probability that a candidate lattice edge is skipped.
    pub delete_prob: f64,
    pub add_diagonals: bool,
    /// Position jitter applied to lattice nodes, metres.
    pub jitter_m: f64,
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            delete_prob: 0.1,
            add_diagonals: false,
            jitter_m: 12.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LatticeRadialParams {
    pub lattice: LatticeParams,
    pub num_rays: usize,
    pub num_rings: usize,
    pub ring_spacing_m: f64,
}

impl Default for LatticeRadialParams {
    fn default() -> Self {
        Self {
            lattice: LatticeParams::default(),
            num_rays: 8,
            num_rings: 2,
            ring_spacing_m: 120.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SpaceColonizationParams {
    pub attractions: usize,
    pub step_size_m: f64,
    pub capture_radius_m: f64,
}

#[derive(Clone, Debug)]
pub struct KnnMeshParams {
    pub sites: usize,
    pub k: usize,
}

#[derive(Clone, Debug)]
pub struct LSystemParams {
    pub axiom: String,
    pub rules: HashMap<char, String>,
    pub iterations: usize,
    pub angle_deg: f64,
    pub step_m: f64,
}

impl Default for LSystemParams {
    fn default() -> Self {
        Self {
            axiom: "F".into(),
            rules: HashMap::from([('F', "F[-F][+F]".into())]),
            iterations: 4,
            angle_deg: 25.0,
            step_m: 20.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LorenzParams {
    pub num_steps: usize,
    pub step_size: f64,
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            num_steps: 5000,
            step_size: 0.01,
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            scale_x: 10.0,
            scale_y: 10.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RandomParams {
    pub node_count: usize,
    pub extra_edges: usize,
}
