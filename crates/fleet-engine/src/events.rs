//! Engine event records and the observer seam.

use fleet_core::{SegmentId, Tick, VehicleId};

use crate::router::DecisionReason;
use crate::vehicle::VehicleStatus;

/// One moving vehicle's state this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionEvent {
    pub vehicle_id: VehicleId,
    pub x: f64,
    pub y: f64,
    pub segment_id: SegmentId,
    pub progress: f64,
    pub speed_kph: f64,
    pub fuel_level: f64,
    pub status: VehicleStatus,
}

/// Emitted for every segment whose occupancy changed this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadEvent {
    pub segment_id: SegmentId,
    pub occupants: u32,
    pub capacity: Option<u32>,
    pub utilization: f64,
    pub avg_speed_kph: f64,
}

/// Emitted when the router picks (or fails to pick) a next segment.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingDecisionEvent {
    pub vehicle_id: VehicleId,
    pub from_segment: SegmentId,
    pub to_segment: Option<SegmentId>,
    pub reason: DecisionReason,
}

/// Emitted exactly once when a vehicle reaches a terminal state.
#[derive(Clone, Debug, PartialEq)]
pub struct TerminalEvent {
    pub vehicle_id: VehicleId,
    pub final_status: VehicleStatus,
    pub reason: Option<String>,
}

/// Callbacks invoked by [`SimEngine::tick`][crate::SimEngine::tick].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Events arrive in a deterministic
/// order: decisions, terminals, positions, loads — each ascending by id.
pub trait EngineObserver {
    fn on_tick_start(&mut self, _tick: Tick) {}
    fn on_decision(&mut self, _tick: Tick, _event: &RoutingDecisionEvent) {}
    fn on_terminal(&mut self, _tick: Tick, _event: &TerminalEvent) {}
    fn on_position(&mut self, _tick: Tick, _event: &PositionEvent) {}
    fn on_load(&mut self, _tick: Tick, _event: &LoadEvent) {}
    /// A vehicle crossed the stuck threshold (still live, needs attention).
    fn on_vehicle_stuck(&mut self, _tick: Tick, _vehicle: VehicleId) {}
    fn on_tick_end(&mut self, _tick: Tick, _moving: usize) {}
}

/// An [`EngineObserver`] that does nothing.
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}

/// Collects every event with its tick — the test observer, and the easiest
/// way to assert stream determinism.
#[derive(Default)]
pub struct RecordingObserver {
    pub decisions: Vec<(Tick, RoutingDecisionEvent)>,
    pub terminals: Vec<(Tick, TerminalEvent)>,
    pub positions: Vec<(Tick, PositionEvent)>,
    pub loads: Vec<(Tick, LoadEvent)>,
    pub stuck: Vec<(Tick, VehicleId)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineObserver for RecordingObserver {
    fn on_decision(&mut self, tick: Tick, event: &RoutingDecisionEvent) {
        self.decisions.push((tick, event.clone()));
    }
    fn on_terminal(&mut self, tick: Tick, event: &TerminalEvent) {
        self.terminals.push((tick, event.clone()));
    }
    fn on_position(&mut self, tick: Tick, event: &PositionEvent) {
        self.positions.push((tick, event.clone()));
    }
    fn on_load(&mut self, tick: Tick, event: &LoadEvent) {
        self.loads.push((tick, event.clone()));
    }
    fn on_vehicle_stuck(&mut self, tick: Tick, vehicle: VehicleId) {
        self.stuck.push((tick, vehicle));
    }
}
