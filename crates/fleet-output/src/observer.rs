//! `EngineOutputObserver<W>` — bridges `EngineObserver` to an `EventWriter`.

use fleet_core::Tick;
use fleet_engine::{
    EngineObserver, LoadEvent, PositionEvent, RoutingDecisionEvent, TerminalEvent,
};

use crate::writer::EventWriter;
use crate::{OutputError, OutputResult};

/// An [`EngineObserver`] that forwards every event to an [`EventWriter`]
/// backend.
///
/// Errors from the writer are stored internally because observer methods
/// have no return value.  After the run, check with
/// [`take_error`](Self::take_error).
pub struct EngineOutputObserver<W: EventWriter> {
    writer: W,
    last_error: Option<OutputError>,
}

impl<W: EventWriter> EngineOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_error: None,
        }
    }

    /// Take the stored write error (if any) after the run.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Flush and unwrap the inner writer (e.g. to inspect files afterwards).
    pub fn finish(mut self) -> OutputResult<W> {
        self.writer.finish()?;
        if let Some(e) = self.last_error {
            return Err(e);
        }
        Ok(self.writer)
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: EventWriter> EngineObserver for EngineOutputObserver<W> {
    fn on_position(&mut self, tick: Tick, event: &PositionEvent) {
        let result = self.writer.write_position(tick, event);
        self.store_err(result);
    }

    fn on_load(&mut self, tick: Tick, event: &LoadEvent) {
        let result = self.writer.write_load(tick, event);
        self.store_err(result);
    }

    fn on_decision(&mut self, tick: Tick, event: &RoutingDecisionEvent) {
        let result = self.writer.write_decision(tick, event);
        self.store_err(result);
    }

    fn on_terminal(&mut self, tick: Tick, event: &TerminalEvent) {
        let result = self.writer.write_terminal(tick, event);
        self.store_err(result);
    }
}
