//! Generator-subsystem error type.

use thiserror::Error;

use fleet_grid::GridError;

/// Errors produced by `fleet-gen`.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("invalid generator parameters: {0}")]
    InvalidParams(String),

    /// No cell satisfies the special-location eligibility rules.
    #[error("no eligible cells found for special location placement")]
    NoEligibleCells,

    /// Special-location placement failed on every relaxation attempt.
    #[error("special location placement failed after {attempts} attempts")]
    PlacementExhausted { attempts: usize },

    /// No grid satisfying connectivity + quota constraints was produced
    /// within the retry budget.
    #[error("failed to generate valid grid after {attempts} attempts")]
    GenerationFailed { attempts: usize },

    #[error(transparent)]
    Grid(#[from] GridError),
}

pub type GenResult<T> = Result<T, GenError>;
