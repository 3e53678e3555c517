//! `fleet-grid` — road grid model, spatial indexes, and connectivity.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                  |
//! |------------------|-----------------------------------------------------------|
//! | [`cell`]         | `Cell`, `CellRole`                                        |
//! | [`segment`]      | `RoadSegment`, `RoadCondition`, `TrafficLoad`, `Node`     |
//! | [`grid`]         | `Grid` — arena storage + derived indexes                  |
//! | [`connectivity`] | component discovery, bridge repair, articulation probe    |
//! | [`json`]         | on-disk JSON format: import, validation, export           |
//! | [`error`]        | `GridError`, `GridResult<T>`                              |
//!
//! # Data layout
//!
//! Cells, nodes, and segments live in their own arenas; every cross-reference
//! is an integer id (`NodeId`, `SegmentId`).  The dense row-major cell array
//! *is* the coordinate index; the remaining indexes (endpoint → segments,
//! segment → cell, segment adjacency) are rebuilt atomically by
//! [`Grid::rebuild_indexes`] once generation or import completes.

pub mod cell;
pub mod connectivity;
pub mod error;
pub mod grid;
pub mod json;
pub mod segment;


pub use cell::{Cell, CellRole};
pub use connectivity::{articulation_probe, find_components, validate_and_repair, Dsu};
pub use error::{GridError, GridResult};
pub use grid::Grid;
pub use grid::SegmentSpec;
pub use segment::{ConditionList, Node, RoadCondition, RoadSegment, TrafficLoad};
