//! Grid cells: unit squares carrying a role and segment references.

use std::fmt;

use fleet_core::SegmentId;

/// Role tag of a cell.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRole {
    #[default]
    Normal,
    Refuel,
    Depot,
    Blocked,
}

impl fmt::Display for CellRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellRole::Normal => "normal",
            CellRole::Refuel => "refuel",
            CellRole::Depot => "depot",
            CellRole::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// A unit square of the grid at integer coordinates.
///
/// Invariants (enforced by [`Grid::validate_invariants`][crate::Grid]):
/// - a refuel cell carries a strictly positive `refuel_amount`;
/// - a blocked cell carries zero segments.
#[derive(Clone, Debug)]
pub struct Cell {
    pub x: i64,
    pub y: i64,
    pub role: CellRole,
    /// Segments with an endpoint in this cell.
    pub segments: Vec<SegmentId>,
    /// Litres available per refuelling stop.  `Some` iff `role == Refuel`.
    pub refuel_amount: Option<f64>,
}

impl Cell {
    pub fn new(x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            role: CellRole::Normal,
            segments: Vec::new(),
            refuel_amount: None,
        }
    }

    /// A cell is a road cell iff at least one segment touches it.
    #[inline]
    pub fn has_roads(&self) -> bool {
        !self.segments.is_empty()
    }
}
