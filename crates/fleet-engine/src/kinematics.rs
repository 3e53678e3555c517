//! Per-tick movement: effective speed, progress advancement, fuel burn.

use fleet_grid::RoadSegment;

use crate::vehicle::Vehicle;

/// What one kinematics step did to a vehicle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcome {
    /// Progress reached 0 or 1 this tick (intersection protocol follows).
    pub crossed_boundary: bool,
    /// Distance actually covered after boundary clamping, km.
    pub distance_km: f64,
    /// The fuel balance would have gone negative.
    pub out_of_fuel: bool,
}

/// Congestion slowdown: quadratic up to capacity, floor of 0.3 beyond.
#[inline]
pub fn traffic_speed_factor(utilization: f64) -> f64 {
    if utilization < 1.0 {
        1.0 - 0.6 * utilization * utilization
    } else {
        0.3
    }
}

/// Congestion fuel penalty, with a surcharge when traffic has collapsed
/// below half the segment's free-flow speed.
#[inline]
pub fn traffic_fuel_factor(utilization: f64, avg_speed_kph: f64, ceiling_kph: f64) -> f64 {
    let mut factor = 1.0 + 0.5 * utilization.powf(1.5);
    let half = ceiling_kph * 0.5;
    if avg_speed_kph > 0.0 && avg_speed_kph < half {
        factor += 0.2 * (1.0 - avg_speed_kph / half);
    }
    factor
}

/// The speed the vehicle wants this tick: free-flow ceiling scaled by
/// conditions and congestion, before the observed-average cap.
pub fn target_speed_kph(vehicle: &Vehicle, seg: &RoadSegment) -> f64 {
    let free_flow = vehicle.base_speed_kph.min(seg.speed_ceiling_kph());
    free_flow * seg.condition_speed_factor() * traffic_speed_factor(seg.load.utilization)
}

/// Advance a moving vehicle by `dt_secs` along its current segment.
///
/// Updates progress (clamped into [0, 1]), speed state, odometer, and fuel.
/// Fuel is charged for the distance actually covered, so clamping at a
/// segment end never overbills.  On underflow the tank is left untouched
/// and `out_of_fuel` is set; the engine terminates the vehicle.
pub fn advance(vehicle: &mut Vehicle, seg: &RoadSegment, dt_secs: f64) -> StepOutcome {
    let target = target_speed_kph(vehicle, seg);
    // Observed segment average acts as a cap on actual speed; the target is
    // what feeds back into that average, so a cleared road can recover.
    let current = if seg.load.avg_speed_kph > 0.0 {
        target.min(seg.load.avg_speed_kph)
    } else {
        target
    };
    vehicle.target_speed_kph = target;
    vehicle.current_speed_kph = current;

    let attempted_km = current * dt_secs / 3600.0;
    if seg.length_km <= 0.0 {
        return StepOutcome {
            crossed_boundary: true,
            ..StepOutcome::default()
        };
    }

    let old_progress = vehicle.progress;
    let delta = attempted_km / seg.length_km * vehicle.direction as f64;
    let unclamped = old_progress + delta;
    let crossed = unclamped >= 1.0 || unclamped <= 0.0;
    let new_progress = unclamped.clamp(0.0, 1.0);
    vehicle.progress = new_progress;

    let distance_km = (new_progress - old_progress).abs() * seg.length_km;
    vehicle.total_distance_km += distance_km;

    // ── Fuel ──────────────────────────────────────────────────────────────
    let fuel_factor = traffic_fuel_factor(
        seg.load.utilization,
        seg.load.avg_speed_kph,
        seg.speed_ceiling_kph(),
    );
    let fuel_used = vehicle.profile.consumption_l_per_100km
        * seg.condition_fuel_factor()
        * fuel_factor
        * distance_km
        / 100.0;

    if fuel_used > vehicle.fuel_liters {
        return StepOutcome {
            crossed_boundary: false,
            distance_km,
            out_of_fuel: true,
        };
    }
    vehicle.fuel_liters -= fuel_used;

    StepOutcome {
        crossed_boundary: crossed,
        distance_km,
        out_of_fuel: false,
    }
}
