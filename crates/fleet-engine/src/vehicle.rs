//! Per-vehicle state.

use std::collections::VecDeque;
use std::fmt;

use fleet_core::{NodeId, SegmentId, Tick, VehicleClass, VehicleProfile};
use fleet_grid::Grid;

use crate::error::EngineError;

/// EWMA smoothing factor for the reported average speed.
pub const SPEED_EWMA_ALPHA: f64 = 0.1;

/// Vehicle lifecycle states.
///
/// ```text
/// requested → queued → spawning → moving ⇄ waiting_for_permission
/// moving → refueling → moving
/// moving → reached_destination          (terminal)
/// waiting_for_permission → dead_end     (terminal) | stopped
/// any → error | removed                 (terminal)
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum VehicleStatus {
    Requested,
    Queued,
    Spawning,
    Moving,
    WaitingForPermission,
    Refueling,
    Stopped,
    ReachedDestination,
    DeadEnd,
    Error,
    Removed,
}

impl VehicleStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VehicleStatus::ReachedDestination
                | VehicleStatus::DeadEnd
                | VehicleStatus::Error
                | VehicleStatus::Removed
        )
    }

    /// States in which the vehicle counts toward its segment's occupancy.
    #[inline]
    pub fn occupies_segment(self) -> bool {
        matches!(
            self,
            VehicleStatus::Moving | VehicleStatus::WaitingForPermission | VehicleStatus::Refueling
        )
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleStatus::Requested => "requested",
            VehicleStatus::Queued => "queued",
            VehicleStatus::Spawning => "spawning",
            VehicleStatus::Moving => "moving",
            VehicleStatus::WaitingForPermission => "waiting_for_permission",
            VehicleStatus::Refueling => "refueling",
            VehicleStatus::Stopped => "stopped",
            VehicleStatus::ReachedDestination => "reached_destination",
            VehicleStatus::DeadEnd => "dead_end",
            VehicleStatus::Error => "error",
            VehicleStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// All mutable state of one vehicle.  Owned and mutated only by the engine's
/// tick logic.
#[derive(Debug)]
pub struct Vehicle {
    pub id: fleet_core::VehicleId,
    pub class: VehicleClass,
    pub profile: VehicleProfile,
    pub status: VehicleStatus,

    /// Segment currently occupied.
    pub segment: SegmentId,
    /// Progress along the segment, ∈ [0, 1], measured from `segment.start`.
    pub progress: f64,
    /// +1 travels start → end, −1 travels end → start.
    pub direction: i8,
    pub target_node: NodeId,

    /// Pending next segment while awaiting entry permission.
    pub next_segment: Option<SegmentId>,
    pub pending_request: Option<u64>,
    /// Node at which the last routing decision was made.
    pub previous_node: NodeId,

    // ── Speed state ───────────────────────────────────────────────────────
    /// Profile max scaled by the per-vehicle multiplier, km/h.
    pub base_speed_kph: f64,
    /// Desired speed this tick before the segment-average cap, km/h.
    pub target_speed_kph: f64,
    /// Actual speed this tick, km/h.
    pub current_speed_kph: f64,
    /// EWMA of `current_speed_kph` (α = 0.1), for reporting.
    pub avg_speed_kph: f64,
    pub speed_multiplier: f64,

    // ── Resources & counters ──────────────────────────────────────────────
    pub fuel_liters: f64,
    pub total_distance_km: f64,
    pub intersections_crossed: u32,
    pub route_changes: u32,
    pub denial_count: u32,
    /// Simulated seconds spent in `waiting_for_permission`.
    pub stuck_secs: f64,
    pub stuck_reported: bool,

    // ── Bookkeeping ───────────────────────────────────────────────────────
    pub spawn_tick: Tick,
    pub last_update_tick: Tick,
    /// Earliest tick at which a denied request may be retried.
    pub next_retry_tick: Tick,
    pub origin_cell: Option<(i64, i64)>,
    pub destination_cell: Option<(i64, i64)>,
    /// Ticks left at the pump; meaningful in `refueling`.
    pub refuel_ticks_left: u64,
    /// The refuel cell being used; meaningful in `refueling`.
    pub refuel_cell: Option<(i64, i64)>,
    /// Bounded trail of recent positions for visualization and tests.
    pub trail: VecDeque<(f64, f64)>,
    pub max_trail_len: usize,
}

impl Vehicle {
    /// Construct a freshly spawned vehicle on `segment`.
    #[allow(clippy::too_many_arguments)]
    pub fn spawned(
        class: VehicleClass,
        profile: VehicleProfile,
        segment: SegmentId,
        progress: f64,
        direction: i8,
        target_node: NodeId,
        fuel_liters: f64,
        speed_multiplier: f64,
        spawn_tick: Tick,
    ) -> Self {
        let base_speed_kph = profile.max_speed_kph * speed_multiplier;
        Self {
            id: fleet_core::VehicleId::INVALID,
            class,
            profile,
            status: VehicleStatus::Spawning,
            segment,
            progress,
            direction,
            target_node,
            next_segment: None,
            pending_request: None,
            previous_node: NodeId::INVALID,
            base_speed_kph,
            target_speed_kph: 0.0,
            current_speed_kph: 0.0,
            avg_speed_kph: 0.0,
            speed_multiplier,
            fuel_liters,
            total_distance_km: 0.0,
            intersections_crossed: 0,
            route_changes: 0,
            denial_count: 0,
            stuck_secs: 0.0,
            stuck_reported: false,
            spawn_tick,
            last_update_tick: spawn_tick,
            next_retry_tick: Tick::ZERO,
            origin_cell: None,
            destination_cell: None,
            refuel_ticks_left: 0,
            refuel_cell: None,
            trail: VecDeque::new(),
            max_trail_len: 20,
        }
    }

    #[inline]
    pub fn fuel_percent(&self) -> f64 {
        if self.profile.tank_liters <= 0.0 {
            return 0.0;
        }
        self.fuel_liters / self.profile.tank_liters
    }

    /// The node the vehicle is heading toward on its current segment.
    pub fn next_node(&self, grid: &Grid) -> Result<NodeId, EngineError> {
        let seg = grid
            .segment(self.segment)
            .ok_or(EngineError::UnknownSegment(self.segment))?;
        Ok(if self.direction >= 0 { seg.end } else { seg.start })
    }

    /// Interpolated position in metres.  Progress is measured from the
    /// segment's start node regardless of travel direction.
    pub fn position(&self, grid: &Grid) -> Result<(f64, f64), EngineError> {
        let seg = grid
            .segment(self.segment)
            .ok_or(EngineError::UnknownSegment(self.segment))?;
        let start = grid
            .node(seg.start)
            .ok_or(EngineError::GridInvariant(format!(
                "segment {} references missing node {}",
                seg.id, seg.start
            )))?
            .pos;
        let end = grid
            .node(seg.end)
            .ok_or(EngineError::GridInvariant(format!(
                "segment {} references missing node {}",
                seg.id, seg.end
            )))?
            .pos;
        let x = start.x + (end.x - start.x) * self.progress;
        let y = start.y + (end.y - start.y) * self.progress;
        Ok((x, y))
    }

    /// Append to the bounded recent-positions trail.
    pub fn record_position(&mut self, x: f64, y: f64) {
        self.trail.push_back((x, y));
        while self.trail.len() > self.max_trail_len {
            self.trail.pop_front();
        }
    }

    /// Fold the current speed into the reporting EWMA.
    pub fn update_avg_speed(&mut self) {
        if self.avg_speed_kph == 0.0 {
            self.avg_speed_kph = self.current_speed_kph;
        } else {
            self.avg_speed_kph = SPEED_EWMA_ALPHA * self.current_speed_kph
                + (1.0 - SPEED_EWMA_ALPHA) * self.avg_speed_kph;
        }
    }

    /// Record an entry request: the vehicle now waits for permission to
    /// enter `target_segment` from `from_node`.
    pub fn prepare_request(&mut self, target_segment: SegmentId, from_node: NodeId, request_id: u64) {
        self.next_segment = Some(target_segment);
        self.previous_node = from_node;
        self.pending_request = Some(request_id);
        self.status = VehicleStatus::WaitingForPermission;
    }

    /// Whether the vehicle qualifies as stuck (reported, not terminal).
    #[inline]
    pub fn is_stuck(&self, max_denials: u32, stuck_secs_threshold: f64) -> bool {
        self.denial_count >= max_denials || self.stuck_secs >= stuck_secs_threshold
    }
}
