//! `fleet-core` — foundational types for the `fleetsim` traffic simulator.
//!
//! This crate is a dependency of every other `fleet-*` crate.  It
//! intentionally has no `fleet-*` dependencies and minimal external ones
//! (only `rand`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`ids`]       | `NodeId`, `SegmentId`, `VehicleId`                      |
//! | [`geo`]       | `Point`, Euclidean/Manhattan distance                   |
//! | [`time`]      | `Tick`, `SimClock`                                      |
//! | [`rng`]       | `SimRng` (global), `VehicleRng` (per-vehicle)           |
//! | [`profile`]   | `VehicleProfile`, `VehicleType`, `VehicleClass`         |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.           |

pub mod geo;
pub mod ids;
pub mod profile;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use geo::{manhattan, Point};
pub use ids::{NodeId, SegmentId, VehicleId};
pub use profile::{VehicleClass, VehicleProfile, VehicleType};
pub use rng::{SimRng, VehicleRng};
pub use time::{SimClock, Tick};
