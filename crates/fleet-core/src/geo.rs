//! Planar geometry for the synthetic road grid.
//!
//! The simulator works on a generated plane, not on Earth: positions are
//! metres from the grid origin, stored as `f64` so kilometre-scale grids keep
//! sub-millimetre precision through repeated accumulation.

/// A point on the simulation plane, in metres.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`, in metres.
    #[inline]
    pub fn distance_m(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Euclidean distance to `other`, in kilometres.
    #[inline]
    pub fn distance_km(self, other: Point) -> f64 {
        self.distance_m(other) / 1000.0
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Manhattan distance between two cell coordinates.
///
/// Used throughout special-location placement: fuel-station spacing, depot
/// spacing, and the blocked-cell exclusion zone are all defined in grid
/// steps, not metres.
#[inline]
pub fn manhattan(x1: i64, y1: i64, x2: i64, y2: i64) -> i64 {
    (x1 - x2).abs() + (y1 - y2).abs()
}
