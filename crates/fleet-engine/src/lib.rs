//! `fleet-engine` — vehicle movement, routing, and lifecycle.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                |
//! |----------------|---------------------------------------------------------|
//! | [`vehicle`]    | `Vehicle`, `VehicleStatus` — per-vehicle state machine  |
//! | [`kinematics`] | per-tick progress / fuel advancement                    |
//! | [`router`]     | `RouterConfig`, weighted-cost and A\* next-hop choice   |
//! | [`protocol`]   | segment-entry arbitration: capacity, denial, back-off   |
//! | [`engine`]     | `SimEngine` — the tick loop and out-of-band operations  |
//! | [`events`]     | event records + `EngineObserver`                        |
//! | [`spawner`]    | `VehicleSpawner` — profiles, placement, destinations    |
//! | [`error`]      | `EngineError`, `EngineResult<T>`                        |
//!
//! # Tick model
//!
//! The engine holds a mutable borrow of a frozen [`Grid`][fleet_grid::Grid]
//! and owns the vehicle collection.  Each [`SimEngine::tick`] runs the same
//! deterministic phases: prune expired conditions → apply removals → admit
//! spawns → advance refuelling → kinematics + routing (ascending vehicle
//! id) → entry arbitration (ascending vehicle id) → event emission.  Given
//! the same seed, grid, and tick inputs, the emitted event stream is
//! byte-identical.

pub mod engine;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod protocol;
pub mod router;
pub mod spawner;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use engine::{EngineConfig, SimEngine};
pub use error::{EngineError, EngineResult};
pub use events::{
    EngineObserver, LoadEvent, NoopObserver, PositionEvent, RecordingObserver,
    RoutingDecisionEvent, TerminalEvent,
};
pub use protocol::{DenialReason, ProtocolConfig};
pub use router::{DecisionReason, RouteMode, RouterConfig, RoutingDecision};
pub use spawner::{SpawnConfig, VehicleSpawner};
pub use vehicle::{Vehicle, VehicleStatus};
