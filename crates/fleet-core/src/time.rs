//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter.  The engine receives a
//! Δt (seconds of simulated time) per tick; `SimClock` accumulates elapsed
//! simulated seconds.  Using an integer tick as the canonical unit keeps
//! back-off arithmetic exact and ordering comparisons O(1).

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Tracks the current tick and accumulated simulated seconds.
///
/// Cheap to copy; holds no heap data.  Δt may vary between ticks (the engine
/// takes it as a per-tick input), so elapsed time is accumulated rather than
/// derived.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// The current tick — advanced by [`advance`](Self::advance).
    pub current_tick: Tick,
    /// Simulated seconds elapsed since tick 0.
    pub elapsed_secs: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by one tick of `dt_secs` simulated seconds.
    #[inline]
    pub fn advance(&mut self, dt_secs: f64) {
        self.current_tick = Tick(self.current_tick.0 + 1);
        self.elapsed_secs += dt_secs;
    }

    /// How many ticks span `secs` seconds at the given Δt? (rounds up, so a
    /// back-off never ends early)
    #[inline]
    pub fn ticks_for_secs(secs: f64, dt_secs: f64) -> u64 {
        if dt_secs <= 0.0 {
            return 1;
        }
        (secs / dt_secs).ceil().max(1.0) as u64
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}s)", self.current_tick, self.elapsed_secs)
    }
}
