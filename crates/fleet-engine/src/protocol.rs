//! Segment-entry arbitration: the request/response protocol's decision rule
//! and denial back-off arithmetic.

use std::fmt;

use fleet_core::{SegmentId, SimClock, Tick};
use fleet_grid::Grid;

/// Why an entry request was denied.  `DeadEnd` comes from the router, the
/// rest from capacity arbitration; none of these ever surface as errors.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DenialReason {
    DeadEnd,
    CapacityFull,
    HeavyCongestion,
    SegmentBlocked,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenialReason::DeadEnd => "dead_end",
            DenialReason::CapacityFull => "capacity_full",
            DenialReason::HeavyCongestion => "heavy_congestion",
            DenialReason::SegmentBlocked => "segment_blocked",
        };
        f.write_str(s)
    }
}

/// Arbitration thresholds.
#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    /// Deny entry when the segment's observed average speed has collapsed
    /// below this share of its free-flow ceiling while occupied.
    pub heavy_congestion_speed_ratio: f64,
    /// Denials at which the vehicle is reported stuck.
    pub stuck_denials: u32,
    /// Cumulative waiting seconds at which the vehicle is reported stuck.
    pub stuck_secs: f64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            heavy_congestion_speed_ratio: 0.15,
            stuck_denials: 5,
            stuck_secs: 30.0,
        }
    }
}

/// Evaluate an entry request against the target segment's current state.
///
/// Acceptance requires the segment to be open and to have spare capacity;
/// a collapsed average speed on an occupied segment is also refused.
pub fn evaluate_entry(
    grid: &Grid,
    target: SegmentId,
    config: &ProtocolConfig,
) -> Result<(), DenialReason> {
    let Some(seg) = grid.segment(target) else {
        // A vanished segment reads as permanently blocked; the engine turns
        // the vehicle's dangling reference into a terminal error separately.
        return Err(DenialReason::SegmentBlocked);
    };
    if !seg.is_open {
        return Err(DenialReason::SegmentBlocked);
    }
    if let Some(capacity) = seg.capacity {
        if seg.load.occupants >= capacity {
            return Err(DenialReason::CapacityFull);
        }
    }
    if seg.load.occupants > 0
        && seg.load.avg_speed_kph > 0.0
        && seg.load.avg_speed_kph < seg.speed_ceiling_kph() * config.heavy_congestion_speed_ratio
    {
        return Err(DenialReason::HeavyCongestion);
    }
    Ok(())
}

/// The earliest tick a denied vehicle may retry: `denials × 100 ms`, at
/// least 50 ms, expressed in simulated ticks (rounded up).
pub fn retry_tick(now: Tick, denial_count: u32, dt_secs: f64) -> Tick {
    let backoff_ms = (denial_count as f64 * 100.0).max(50.0);
    let ticks = SimClock::ticks_for_secs(backoff_ms / 1000.0, dt_secs);
    now + ticks
}
