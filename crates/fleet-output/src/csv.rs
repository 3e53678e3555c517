//! CSV output backend.
//!
//! Creates four files in the configured output directory:
//! - `positions.csv`
//! - `loads.csv`
//! - `decisions.csv`
//! - `terminals.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use fleet_core::Tick;
use fleet_engine::{LoadEvent, PositionEvent, RoutingDecisionEvent, TerminalEvent};

use crate::writer::EventWriter;
use crate::OutputResult;

/// Writes the engine's event stream to four CSV files.
pub struct CsvEventWriter {
    positions: Writer<File>,
    loads: Writer<File>,
    decisions: Writer<File>,
    terminals: Writer<File>,
    finished: bool,
}

impl CsvEventWriter {
    /// Open (or create) the four CSV files in `dir` and write header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut positions = Writer::from_path(dir.join("positions.csv"))?;
        positions.write_record([
            "tick",
            "vehicle_id",
            "x",
            "y",
            "segment_id",
            "progress",
            "speed_kph",
            "fuel_level",
            "status",
        ])?;

        let mut loads = Writer::from_path(dir.join("loads.csv"))?;
        loads.write_record([
            "tick",
            "segment_id",
            "occupants",
            "capacity",
            "utilization",
            "avg_speed_kph",
        ])?;

        let mut decisions = Writer::from_path(dir.join("decisions.csv"))?;
        decisions.write_record(["tick", "vehicle_id", "from_segment", "to_segment", "reason"])?;

        let mut terminals = Writer::from_path(dir.join("terminals.csv"))?;
        terminals.write_record(["tick", "vehicle_id", "final_status", "reason"])?;

        Ok(Self {
            positions,
            loads,
            decisions,
            terminals,
            finished: false,
        })
    }
}

impl EventWriter for CsvEventWriter {
    fn write_position(&mut self, tick: Tick, event: &PositionEvent) -> OutputResult<()> {
        self.positions.write_record(&[
            tick.0.to_string(),
            event.vehicle_id.0.to_string(),
            format!("{:.3}", event.x),
            format!("{:.3}", event.y),
            event.segment_id.0.to_string(),
            format!("{:.6}", event.progress),
            format!("{:.3}", event.speed_kph),
            format!("{:.3}", event.fuel_level),
            event.status.to_string(),
        ])?;
        Ok(())
    }

    fn write_load(&mut self, tick: Tick, event: &LoadEvent) -> OutputResult<()> {
        self.loads.write_record(&[
            tick.0.to_string(),
            event.segment_id.0.to_string(),
            event.occupants.to_string(),
            event
                .capacity
                .map(|c| c.to_string())
                .unwrap_or_default(),
            format!("{:.4}", event.utilization),
            format!("{:.3}", event.avg_speed_kph),
        ])?;
        Ok(())
    }

    fn write_decision(&mut self, tick: Tick, event: &RoutingDecisionEvent) -> OutputResult<()> {
        self.decisions.write_record(&[
            tick.0.to_string(),
            event.vehicle_id.0.to_string(),
            event.from_segment.0.to_string(),
            event
                .to_segment
                .map(|s| s.0.to_string())
                .unwrap_or_default(),
            event.reason.to_string(),
        ])?;
        Ok(())
    }

    fn write_terminal(&mut self, tick: Tick, event: &TerminalEvent) -> OutputResult<()> {
        self.terminals.write_record(&[
            tick.0.to_string(),
            event.vehicle_id.0.to_string(),
            event.final_status.to_string(),
            event.reason.clone().unwrap_or_default(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.positions.flush()?;
        self.loads.flush()?;
        self.decisions.flush()?;
        self.terminals.flush()?;
        Ok(())
    }
}
