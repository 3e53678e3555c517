//! `fleet-gen` — procedural road-network generation.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`params`]    | `GeneratorParams`, `Topology` + per-topology blocks      |
//! | [`sketch`]    | continuous-space topology builders (`RoadSketch`)        |
//! | [`raster`]    | sketch → cell-lattice rasterization                      |
//! | [`placement`] | special-location placement (fuel / depot / blocked)      |
//! | [`generator`] | the three-phase pipeline with relaxation and retry       |
//! | [`error`]     | `GenError`, `GenResult<T>`                               |
//!
//! # Pipeline
//!
//! 1. **Phase A** — one topology builder produces a continuous sketch
//!    (points + links), which is rasterized onto the cell lattice as unit
//!    segments; artery promotion, density fill, and cul-de-sac passes follow.
//! 2. **Phase B** — fuel stations, depots, and blocked areas are placed
//!    under spacing and connectivity constraints.
//! 3. **Phase C** — on placement failure the Phase-B state is rolled back
//!    and rerun with attenuated quotas (up to 20 attempts); the connectivity
//!    analyzer then repairs any remaining splits, and the whole generation
//!    retries with a fresh topology (up to 10 times) if repair fails.

pub mod error;
pub mod generator;
pub mod params;
pub mod placement;
pub mod raster;
pub mod sketch;

#[cfg(test)]
mod tests;

pub use error::{GenError, GenResult};
pub use generator::{generate, GenerationStats};
pub use params::{
    GeneratorParams, KnnMeshParams, LSystemParams, LatticeParams, LatticeRadialParams,
    LorenzParams, RandomParams, SpaceColonizationParams, Topology,
};
pub use sketch::RoadSketch;
