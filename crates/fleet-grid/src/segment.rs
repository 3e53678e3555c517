//! Road segments, nodes, conditions, and the live traffic-load record.

use smallvec::SmallVec;

use fleet_core::{NodeId, Point, SegmentId, Tick};

/// An intersection point with a stable id and a position on the plane.
///
/// One node exists per road cell; nodes are immutable once the grid is
/// frozen.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Cell coordinates.
    pub x: i64,
    pub y: i64,
    /// Position in metres (`cell * cell_size`).
    pub pos: Point,
}

/// A speed/fuel modifier attached to a segment.
///
/// Persistent conditions (road surface class) have no expiry; temporary ones
/// (weather, incidents) carry `expires_at` and are pruned by the engine at
/// tick boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadCondition {
    pub name: String,
    pub speed_multiplier: f64,
    pub fuel_multiplier: f64,
    pub expires_at: Option<Tick>,
}

impl RoadCondition {
    /// Standard city-street surface: slower, thirstier.
    pub fn urban_street() -> Self {
        Self {
            name: "urban_street".into(),
            speed_multiplier: 0.8,
            fuel_multiplier: 1.1,
            expires_at: None,
        }
    }

    /// High-speed arterial surface.
    pub fn highway() -> Self {
        Self {
            name: "highway".into(),
            speed_multiplier: 1.2,
            fuel_multiplier: 0.9,
            expires_at: None,
        }
    }

    #[inline]
    pub fn is_expired(&self, now: Tick) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }
}

/// Live per-segment traffic state.  Mutated by the engine; everything else on
/// a frozen segment is read-only apart from `is_open` and the condition lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrafficLoad {
    /// Vehicles currently on the segment.
    pub occupants: u32,
    /// `occupants / capacity`; 0 when the segment is uncapacitated.
    pub utilization: f64,
    /// EWMA of occupant speeds, km/h.  0 until first observed.
    pub avg_speed_kph: f64,
}

/// Condition lists are bounded and short in practice; four slots inline.
pub type ConditionList = SmallVec<[RoadCondition; 4]>;

/// An undirected road edge between two nodes.
///
/// Vehicles traverse a segment in either direction (per-vehicle direction
/// d ∈ {+1, −1}); `start`/`end` only fix the orientation of `progress`.
#[derive(Clone, Debug)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub start: NodeId,
    pub end: NodeId,
    pub length_km: f64,
    /// Free-flow speed assigned at generation, km/h.
    pub base_speed_kph: f64,
    /// Static cost multiplier assigned by the topology generator (≥ 0.6).
    pub base_congestion: f64,
    /// Posted limit, km/h.  `None` means unposted (base speed governs).
    pub speed_limit_kph: Option<u32>,
    /// Maximum concurrent occupants.  `None` means uncapacitated.
    pub capacity: Option<u32>,
    pub is_open: bool,
    /// Promoted main artery (higher base speed, counted in stats).
    pub is_artery: bool,
    pub base_conditions: ConditionList,
    pub temporary_conditions: ConditionList,
    pub load: TrafficLoad,
}

impl RoadSegment {
    /// The endpoint opposite `node`.  Falls back to `start` when `node` is
    /// neither endpoint (callers guard this; the router treats it as the
    /// default direction case).
    #[inline]
    pub fn other_endpoint(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }

    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.start == node || self.end == node
    }

    /// Free-flow ceiling: base speed capped by the posted limit.
    #[inline]
    pub fn speed_ceiling_kph(&self) -> f64 {
        match self.speed_limit_kph {
            Some(limit) => self.base_speed_kph.min(limit as f64),
            None => self.base_speed_kph,
        }
    }

    /// Product of all active condition speed multipliers.
    pub fn condition_speed_factor(&self) -> f64 {
        self.base_conditions
            .iter()
            .chain(self.temporary_conditions.iter())
            .map(|c| c.speed_multiplier)
            .product()
    }

    /// Product of all active condition fuel multipliers.
    pub fn condition_fuel_factor(&self) -> f64 {
        self.base_conditions
            .iter()
            .chain(self.temporary_conditions.iter())
            .map(|c| c.fuel_multiplier)
            .product()
    }

    /// Cost multiplier for routing: the static generation-time factor scaled
    /// by live occupancy, so congested edges price themselves out.
    #[inline]
    pub fn congestion_factor(&self) -> f64 {
        self.base_congestion * (1.0 + self.load.utilization)
    }

    /// Recompute `utilization` from `occupants` and `capacity`.
    pub fn refresh_utilization(&mut self) {
        self.load.utilization = match self.capacity {
            Some(cap) if cap > 0 => self.load.occupants as f64 / cap as f64,
            _ => 0.0,
        };
    }

    /// Drop expired temporary conditions.
    pub fn prune_expired_conditions(&mut self, now: Tick) {
        self.temporary_conditions.retain(|c| !c.is_expired(now));
    }
}
