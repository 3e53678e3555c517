//! The output backend trait.

use fleet_core::Tick;
use fleet_engine::{LoadEvent, PositionEvent, RoutingDecisionEvent, TerminalEvent};

use crate::OutputResult;

/// A sink for the engine's event stream.
///
/// Implementations must be tolerant of `finish` being called more than once.
pub trait EventWriter {
    fn write_position(&mut self, tick: Tick, event: &PositionEvent) -> OutputResult<()>;
    fn write_load(&mut self, tick: Tick, event: &LoadEvent) -> OutputResult<()>;
    fn write_decision(&mut self, tick: Tick, event: &RoutingDecisionEvent) -> OutputResult<()>;
    fn write_terminal(&mut self, tick: Tick, event: &TerminalEvent) -> OutputResult<()>;

    /// Flush buffers and close the sink.
    fn finish(&mut self) -> OutputResult<()>;
}
