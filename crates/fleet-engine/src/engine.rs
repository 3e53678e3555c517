//! `SimEngine` — the per-tick lifecycle manager.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fleet_core::{SegmentId, SimClock, Tick, VehicleId, VehicleRng};
use fleet_grid::{CellRole, Grid, RoadCondition};

use crate::error::{EngineError, EngineResult};
use crate::events::{
    EngineObserver, LoadEvent, PositionEvent, RoutingDecisionEvent, TerminalEvent,
};
use crate::kinematics;
use crate::protocol::{self, ProtocolConfig};
use crate::router::{self, RouterConfig};
use crate::vehicle::{Vehicle, VehicleStatus};

/// Engine-wide configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Master seed; per-vehicle RNG streams derive from it.
    pub seed: u64,
    pub router: RouterConfig,
    pub protocol: ProtocolConfig,

    /// Allow vehicles to pause at refuel cells when low on fuel.
    pub refuel_enabled: bool,
    /// Fuel fraction below which a vehicle refuels when passing a pump.
    pub refuel_threshold: f64,
    /// Simulated seconds one refuelling stop takes.
    pub refuel_duration_secs: f64,

    /// Burn fuel while waiting for permission (idle consumption).  The
    /// source system is ambiguous here, so it is a flag; off by default.
    pub idle_fuel_burn: bool,
}

impl EngineConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            router: RouterConfig::default(),
            protocol: ProtocolConfig::default(),
            refuel_enabled: true,
            refuel_threshold: 0.25,
            refuel_duration_secs: 10.0,
            idle_fuel_burn: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

/// Per-tick scratch state: what changed, and which events to emit.
#[derive(Default)]
struct TickContext {
    load_changed: BTreeSet<SegmentId>,
    decisions: Vec<RoutingDecisionEvent>,
    terminals: Vec<TerminalEvent>,
    stuck: Vec<VehicleId>,
}

/// What the kinematics/classification pass decided for one vehicle.
enum StepAction {
    Continue,
    MissingSegment,
    OutOfFuel,
    Reached,
    Refuel((i64, i64)),
    Route(fleet_core::NodeId),
}

/// The vehicle movement and lifecycle engine.
///
/// Holds a non-owning (mutable) borrow of a frozen grid and owns the vehicle
/// collection.  Within a tick the arbitration order is ascending vehicle id,
/// which makes capacity tie-breaks deterministic for a given seed.
pub struct SimEngine<'a> {
    grid: &'a mut Grid,
    config: EngineConfig,
    clock: SimClock,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    rngs: HashMap<VehicleId, VehicleRng>,
    next_vehicle_id: u32,
    next_request_id: u64,
    pending_removals: Vec<VehicleId>,
}

impl<'a> SimEngine<'a> {
    /// Create an engine over a frozen grid (indexes must be rebuilt).
    pub fn new(grid: &'a mut Grid, config: EngineConfig) -> Self {
        Self {
            grid,
            config,
            clock: SimClock::new(),
            vehicles: BTreeMap::new(),
            rngs: HashMap::new(),
            next_vehicle_id: 1,
            next_request_id: 1,
            pending_removals: Vec::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// All vehicles in ascending id order.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    // ── Out-of-band operations ────────────────────────────────────────────

    /// Register a vehicle.  It is admitted (→ `moving`) at the start of the
    /// next tick.
    pub fn add_vehicle(&mut self, mut vehicle: Vehicle) -> VehicleId {
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        vehicle.id = id;
        vehicle.spawn_tick = self.clock.current_tick;
        self.rngs.insert(id, VehicleRng::new(self.config.seed, id));
        self.vehicles.insert(id, vehicle);
        id
    }

    /// Request removal; takes effect at the next tick boundary.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> EngineResult<()> {
        if !self.vehicles.contains_key(&id) {
            return Err(EngineError::UnknownVehicle(id));
        }
        self.pending_removals.push(id);
        Ok(())
    }

    /// Park a vehicle: it leaves its segment's occupancy and stops acting.
    pub fn stop_vehicle(&mut self, id: VehicleId) -> EngineResult<()> {
        let vehicle = self
            .vehicles
            .get_mut(&id)
            .ok_or(EngineError::UnknownVehicle(id))?;
        if vehicle.status.is_terminal() || vehicle.status == VehicleStatus::Stopped {
            return Ok(());
        }
        let segment = vehicle.segment;
        let was_occupying = vehicle.status.occupies_segment();
        vehicle.status = VehicleStatus::Stopped;
        if was_occupying {
            if let Some(seg) = self.grid.segment_mut(segment) {
                seg.load.occupants = seg.load.occupants.saturating_sub(1);
                seg.refresh_utilization();
            }
        }
        Ok(())
    }

    /// Attach a temporary or persistent condition to a segment.
    pub fn apply_condition(
        &mut self,
        segment: SegmentId,
        condition: RoadCondition,
    ) -> EngineResult<()> {
        let seg = self
            .grid
            .segment_mut(segment)
            .ok_or(EngineError::UnknownSegment(segment))?;
        if condition.expires_at.is_some() {
            seg.temporary_conditions.push(condition);
        } else {
            seg.base_conditions.push(condition);
        }
        Ok(())
    }

    /// Remove all conditions with the given name from a segment.
    pub fn clear_condition(&mut self, segment: SegmentId, name: &str) -> EngineResult<()> {
        let seg = self
            .grid
            .segment_mut(segment)
            .ok_or(EngineError::UnknownSegment(segment))?;
        seg.base_conditions.retain(|c| c.name != name);
        seg.temporary_conditions.retain(|c| c.name != name);
        Ok(())
    }

    pub fn set_segment_open(&mut self, segment: SegmentId, open: bool) -> EngineResult<()> {
        let seg = self
            .grid
            .segment_mut(segment)
            .ok_or(EngineError::UnknownSegment(segment))?;
        seg.is_open = open;
        Ok(())
    }

    // ── Tick loop ─────────────────────────────────────────────────────────

    /// Advance the simulation by one tick of `dt_secs` simulated seconds.
    ///
    /// Returns the number of vehicles that were in `moving` at the start of
    /// the kinematics phase.  Per-vehicle failures surface as
    /// `TerminalEvent`s; an `Err` means a grid-wide invariant broke and the
    /// tick was aborted.
    pub fn tick<O: EngineObserver>(&mut self, dt_secs: f64, observer: &mut O) -> EngineResult<usize> {
        let now = self.clock.current_tick;
        observer.on_tick_start(now);

        let mut ctx = TickContext::default();

        for seg in self.grid.segments_mut() {
            seg.prune_expired_conditions(now);
        }

        self.apply_removals(&mut ctx)?;
        self.admit_spawned(&mut ctx);
        self.advance_refueling();
        let moving = self.step_moving(now, dt_secs, &mut ctx)?;
        self.arbitrate(now, dt_secs, &mut ctx)?;
        self.idle_fuel_burn(dt_secs, &mut ctx)?;
        self.update_speed_reporting();

        // ── Emission: decisions, terminals, positions, loads ──────────────
        for event in &ctx.decisions {
            observer.on_decision(now, event);
        }
        for event in &ctx.terminals {
            observer.on_terminal(now, event);
        }
        for event in self.collect_positions() {
            observer.on_position(now, &event);
        }
        for &segment_id in &ctx.load_changed {
            if let Some(seg) = self.grid.segment(segment_id) {
                observer.on_load(
                    now,
                    &LoadEvent {
                        segment_id,
                        occupants: seg.load.occupants,
                        capacity: seg.capacity,
                        utilization: seg.load.utilization,
                        avg_speed_kph: seg.load.avg_speed_kph,
                    },
                );
            }
        }
        for &id in &ctx.stuck {
            observer.on_vehicle_stuck(now, id);
        }

        observer.on_tick_end(now, moving);
        self.clock.advance(dt_secs);
        Ok(moving)
    }

    // ── Tick phases ───────────────────────────────────────────────────────

    fn apply_removals(&mut self, ctx: &mut TickContext) -> EngineResult<()> {
        let mut removals = std::mem::take(&mut self.pending_removals);
        removals.sort_unstable();
        removals.dedup();

        for id in removals {
            let Some(vehicle) = self.vehicles.get_mut(&id) else {
                continue;
            };
            if vehicle.status.is_terminal() {
                continue;
            }
            let segment = vehicle.segment;
            let was_occupying = vehicle.status.occupies_segment();
            vehicle.status = VehicleStatus::Removed;
            if was_occupying {
                release_occupancy(self.grid, segment, &mut ctx.load_changed)?;
            }
            ctx.terminals.push(TerminalEvent {
                vehicle_id: id,
                final_status: VehicleStatus::Removed,
                reason: None,
            });
        }
        Ok(())
    }

    fn admit_spawned(&mut self, ctx: &mut TickContext) {
        for (&id, vehicle) in self.vehicles.iter_mut() {
            if vehicle.status != VehicleStatus::Spawning {
                continue;
            }
            match self.grid.segment_mut(vehicle.segment) {
                Some(seg) => {
                    seg.load.occupants += 1;
                    seg.refresh_utilization();
                    ctx.load_changed.insert(vehicle.segment);
                    vehicle.status = VehicleStatus::Moving;
                }
                None => {
                    vehicle.status = VehicleStatus::Error;
                    ctx.terminals.push(TerminalEvent {
                        vehicle_id: id,
                        final_status: VehicleStatus::Error,
                        reason: Some("missing_segment".into()),
                    });
                }
            }
        }
    }

    fn advance_refueling(&mut self) {
        for (_, vehicle) in self.vehicles.iter_mut() {
            if vehicle.status != VehicleStatus::Refueling {
                continue;
            }
            vehicle.refuel_ticks_left = vehicle.refuel_ticks_left.saturating_sub(1);
            if vehicle.refuel_ticks_left > 0 {
                continue;
            }
            let amount = vehicle
                .refuel_cell
                .take()
                .and_then(|(x, y)| self.grid.cell_at(x, y))
                .and_then(|c| c.refuel_amount)
                .unwrap_or(0.0);
            vehicle.fuel_liters =
                (vehicle.fuel_liters + amount).min(vehicle.profile.tank_liters);
            vehicle.status = VehicleStatus::Moving;
        }
    }

    fn step_moving(
        &mut self,
        now: Tick,
        dt_secs: f64,
        ctx: &mut TickContext,
    ) -> EngineResult<usize> {
        let ids: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.status == VehicleStatus::Moving)
            .map(|(id, _)| *id)
            .collect();
        let moving = ids.len();

        for id in ids {
            // Advance and classify with the grid borrowed shared; mutate the
            // grid afterwards.
            let action = {
                let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                let grid: &Grid = self.grid;
                match grid.segment(vehicle.segment) {
                    None => StepAction::MissingSegment,
                    Some(seg) => {
                        let outcome = kinematics::advance(vehicle, seg, dt_secs);
                        vehicle.last_update_tick = now;
                        if outcome.out_of_fuel {
                            StepAction::OutOfFuel
                        } else if !outcome.crossed_boundary {
                            StepAction::Continue
                        } else {
                            let node = if vehicle.direction >= 0 { seg.end } else { seg.start };
                            if node == vehicle.target_node {
                                StepAction::Reached
                            } else {
                                let at_refuel = grid
                                    .node(node)
                                    .and_then(|n| grid.cell_at(n.x, n.y))
                                    .map(|c| c.role == CellRole::Refuel)
                                    .unwrap_or(false);
                                if self.config.refuel_enabled
                                    && at_refuel
                                    && vehicle.fuel_percent() < self.config.refuel_threshold
                                {
                                    let n = grid.node(node).expect("node exists");
                                    StepAction::Refuel((n.x, n.y))
                                } else {
                                    StepAction::Route(node)
                                }
                            }
                        }
                    }
                }
            };

            match action {
                StepAction::Continue => {}
                StepAction::MissingSegment => {
                    let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                    vehicle.status = VehicleStatus::Error;
                    ctx.terminals.push(TerminalEvent {
                        vehicle_id: id,
                        final_status: VehicleStatus::Error,
                        reason: Some("missing_segment".into()),
                    });
                }
                StepAction::OutOfFuel => {
                    let segment = {
                        let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                        vehicle.status = VehicleStatus::Error;
                        vehicle.fuel_liters = 0.0;
                        vehicle.segment
                    };
                    release_occupancy(self.grid, segment, &mut ctx.load_changed)?;
                    ctx.terminals.push(TerminalEvent {
                        vehicle_id: id,
                        final_status: VehicleStatus::Error,
                        reason: Some("out_of_fuel".into()),
                    });
                }
                StepAction::Reached => {
                    let segment = {
                        let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                        vehicle.status = VehicleStatus::ReachedDestination;
                        vehicle.segment
                    };
                    release_occupancy(self.grid, segment, &mut ctx.load_changed)?;
                    ctx.terminals.push(TerminalEvent {
                        vehicle_id: id,
                        final_status: VehicleStatus::ReachedDestination,
                        reason: None,
                    });
                }
                StepAction::Refuel(cell) => {
                    let ticks = SimClock::ticks_for_secs(self.config.refuel_duration_secs, dt_secs);
                    let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                    vehicle.status = VehicleStatus::Refueling;
                    vehicle.refuel_cell = Some(cell);
                    vehicle.refuel_ticks_left = ticks;
                }
                StepAction::Route(node) => {
                    let decision = {
                        let vehicle = self.vehicles.get(&id).expect("snapshotted id");
                        let rng = self.rngs.get_mut(&id).expect("rng per vehicle");
                        router::next_segment(&self.config.router, self.grid, vehicle, node, rng)
                    };
                    let current_segment =
                        self.vehicles.get(&id).expect("snapshotted id").segment;
                    ctx.decisions.push(RoutingDecisionEvent {
                        vehicle_id: id,
                        from_segment: current_segment,
                        to_segment: decision.to_segment,
                        reason: decision.reason,
                    });
                    match decision.to_segment {
                        None => {
                            let segment = {
                                let vehicle =
                                    self.vehicles.get_mut(&id).expect("snapshotted id");
                                vehicle.status = VehicleStatus::DeadEnd;
                                vehicle.segment
                            };
                            release_occupancy(self.grid, segment, &mut ctx.load_changed)?;
                            ctx.terminals.push(TerminalEvent {
                                vehicle_id: id,
                                final_status: VehicleStatus::DeadEnd,
                                reason: Some(decision.reason.to_string()),
                            });
                        }
                        Some(target) => {
                            let request_id = self.next_request_id;
                            self.next_request_id += 1;
                            let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                            vehicle.prepare_request(target, node, request_id);
                            vehicle.next_retry_tick = now;
                        }
                    }
                }
            }
        }
        Ok(moving)
    }

    fn arbitrate(&mut self, now: Tick, dt_secs: f64, ctx: &mut TickContext) -> EngineResult<()> {
        let ids: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.status == VehicleStatus::WaitingForPermission)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let (target, eligible, old_segment, previous_node) = {
                let vehicle = self.vehicles.get(&id).expect("snapshotted id");
                (
                    vehicle.next_segment,
                    now >= vehicle.next_retry_tick,
                    vehicle.segment,
                    vehicle.previous_node,
                )
            };
            let Some(target) = target else {
                // A waiting vehicle with no pending segment is an engine bug.
                return Err(EngineError::GridInvariant(format!(
                    "vehicle {id} waiting without a pending segment"
                )));
            };
            if !eligible {
                continue;
            }

            if self.grid.segment(target).is_none() {
                let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                vehicle.status = VehicleStatus::Error;
                release_occupancy(self.grid, old_segment, &mut ctx.load_changed)?;
                ctx.terminals.push(TerminalEvent {
                    vehicle_id: id,
                    final_status: VehicleStatus::Error,
                    reason: Some("missing_segment".into()),
                });
                continue;
            }

            match protocol::evaluate_entry(self.grid, target, &self.config.protocol) {
                Ok(()) => {
                    release_occupancy(self.grid, old_segment, &mut ctx.load_changed)?;
                    occupy_segment(self.grid, target, &mut ctx.load_changed)?;

                    let (start, end) = {
                        let seg = self.grid.segment(target).expect("checked above");
                        (seg.start, seg.end)
                    };
                    let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                    if start == previous_node {
                        vehicle.progress = 0.0;
                        vehicle.direction = 1;
                    } else if end == previous_node {
                        vehicle.progress = 1.0;
                        vehicle.direction = -1;
                    } else {
                        vehicle.progress = 0.0;
                        vehicle.direction = 1;
                    }
                    vehicle.segment = target;
                    vehicle.status = VehicleStatus::Moving;
                    vehicle.denial_count = 0;
                    vehicle.intersections_crossed += 1;
                    vehicle.next_segment = None;
                    vehicle.pending_request = None;
                }
                Err(_reason) => {
                    let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                    vehicle.denial_count += 1;
                    vehicle.next_retry_tick =
                        protocol::retry_tick(now, vehicle.denial_count, dt_secs);
                }
            }
        }

        // Stuck accounting for everyone still waiting at tick end.
        let stuck_denials = self.config.protocol.stuck_denials;
        let stuck_secs = self.config.protocol.stuck_secs;
        for (&id, vehicle) in self.vehicles.iter_mut() {
            if vehicle.status != VehicleStatus::WaitingForPermission {
                continue;
            }
            vehicle.stuck_secs += dt_secs;
            if !vehicle.stuck_reported && vehicle.is_stuck(stuck_denials, stuck_secs) {
                vehicle.stuck_reported = true;
                log::warn!(
                    "vehicle {id} is stuck ({} denials, {:.1}s waiting)",
                    vehicle.denial_count,
                    vehicle.stuck_secs
                );
                ctx.stuck.push(id);
            }
        }
        Ok(())
    }

    fn idle_fuel_burn(&mut self, dt_secs: f64, ctx: &mut TickContext) -> EngineResult<()> {
        if !self.config.idle_fuel_burn {
            return Ok(());
        }
        let ids: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.status == VehicleStatus::WaitingForPermission)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let (out, segment) = {
                let vehicle = self.vehicles.get_mut(&id).expect("snapshotted id");
                // Idle burn approximates one tenth of the rated consumption
                // per hour at the pump price of zero distance.
                let burn = vehicle.profile.consumption_l_per_100km / 10.0 * dt_secs / 3600.0;
                if burn > vehicle.fuel_liters {
                    vehicle.fuel_liters = 0.0;
                    vehicle.status = VehicleStatus::Error;
                    (true, vehicle.segment)
                } else {
                    vehicle.fuel_liters -= burn;
                    (false, vehicle.segment)
                }
            };
            if out {
                release_occupancy(self.grid, segment, &mut ctx.load_changed)?;
                ctx.terminals.push(TerminalEvent {
                    vehicle_id: id,
                    final_status: VehicleStatus::Error,
                    reason: Some("out_of_fuel".into()),
                });
            }
        }
        Ok(())
    }

    /// Fold vehicle speeds into per-vehicle EWMAs and per-segment averages.
    fn update_speed_reporting(&mut self) {
        let mut sums: BTreeMap<SegmentId, (f64, u32)> = BTreeMap::new();
        for (_, vehicle) in self.vehicles.iter_mut() {
            match vehicle.status {
                VehicleStatus::Moving => {
                    let entry = sums.entry(vehicle.segment).or_insert((0.0, 0));
                    entry.0 += vehicle.target_speed_kph;
                    entry.1 += 1;
                }
                VehicleStatus::WaitingForPermission | VehicleStatus::Refueling => {
                    vehicle.target_speed_kph = 0.0;
                    vehicle.current_speed_kph = 0.0;
                }
                _ => continue,
            }
            vehicle.update_avg_speed();
        }

        for (segment_id, (sum, count)) in sums {
            if let Some(seg) = self.grid.segment_mut(segment_id) {
                let mean = sum / count as f64;
                seg.load.avg_speed_kph = if seg.load.avg_speed_kph == 0.0 {
                    mean
                } else {
                    0.1 * mean + 0.9 * seg.load.avg_speed_kph
                };
            }
        }
    }

    fn collect_positions(&mut self) -> Vec<PositionEvent> {
        let mut events = Vec::new();
        for (&id, vehicle) in self.vehicles.iter_mut() {
            if vehicle.status != VehicleStatus::Moving {
                continue;
            }
            let grid: &Grid = self.grid;
            let Ok((x, y)) = vehicle.position(grid) else {
                continue;
            };
            vehicle.record_position(x, y);
            events.push(PositionEvent {
                vehicle_id: id,
                x,
                y,
                segment_id: vehicle.segment,
                progress: vehicle.progress,
                speed_kph: vehicle.current_speed_kph,
                fuel_level: vehicle.fuel_liters,
                status: vehicle.status,
            });
        }
        events
    }
}

// ── Occupancy accounting ──────────────────────────────────────────────────────

fn occupy_segment(
    grid: &mut Grid,
    segment: SegmentId,
    changed: &mut BTreeSet<SegmentId>,
) -> EngineResult<()> {
    let seg = grid
        .segment_mut(segment)
        .ok_or(EngineError::UnknownSegment(segment))?;
    seg.load.occupants += 1;
    seg.refresh_utilization();
    changed.insert(segment);
    Ok(())
}

fn release_occupancy(
    grid: &mut Grid,
    segment: SegmentId,
    changed: &mut BTreeSet<SegmentId>,
) -> EngineResult<()> {
    let Some(seg) = grid.segment_mut(segment) else {
        // The segment vanished with the vehicle on it; the vehicle has
        // already been terminated, so there is no count to give back.
        return Ok(());
    };
    if seg.load.occupants == 0 {
        return Err(EngineError::GridInvariant(format!(
            "occupancy underflow on segment {segment}"
        )));
    }
    seg.load.occupants -= 1;
    seg.refresh_utilization();
    changed.insert(segment);
    Ok(())
}
