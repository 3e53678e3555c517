//! Engine-subsystem error type.

use thiserror::Error;

use fleet_core::{SegmentId, VehicleId};
use fleet_grid::GridError;

/// Errors produced by `fleet-engine`.
///
/// Per-vehicle failures (a vehicle referencing a vanished segment, running
/// out of fuel) are *not* errors — they terminate that vehicle and surface
/// as `TerminalEvent`s.  These variants cover caller mistakes and grid-wide
/// invariant violations, which abort the tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("vehicle {0} not found")]
    UnknownVehicle(VehicleId),

    #[error("segment {0} not found")]
    UnknownSegment(SegmentId),

    /// Occupancy accounting or another grid-wide invariant broke mid-tick.
    #[error("grid invariant violated: {0}")]
    GridInvariant(String),

    #[error(transparent)]
    Grid(#[from] GridError),
}

pub type EngineResult<T> = Result<T, EngineError>;
