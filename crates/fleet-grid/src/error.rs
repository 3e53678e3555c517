//! Grid-subsystem error type.

use thiserror::Error;

/// Errors produced by `fleet-grid`.
#[derive(Debug, Error)]
pub enum GridError {
    /// The input grid file is structurally malformed (duplicate coordinates,
    /// out-of-bounds cells, missing required fields).
    #[error("grid parse error: {0}")]
    Parse(String),

    /// Post-load or post-generation validation detected an invariant
    /// violation.
    #[error("grid invariant violated: {0}")]
    Invariant(String),

    /// The repair phase could not merge the road network into a single
    /// component.
    #[error("connectivity unreachable: {components} components remain after repair")]
    ConnectivityUnreachable { components: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GridResult<T> = Result<T, GridError>;
