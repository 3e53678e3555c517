//! `fleet-output` — event-stream output backends.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`writer`]   | `EventWriter` — backend trait                             |
//! | [`csv`]      | `CsvEventWriter` — four CSV files, one per event kind     |
//! | [`observer`] | `EngineOutputObserver<W>` — bridges `EngineObserver`      |
//! | [`error`]    | `OutputError`, `OutputResult<T>`                          |
//!
//! The engine streams events through its observer; this crate turns that
//! stream into files.  `EngineObserver` methods cannot return errors, so the
//! observer stores the first write failure for retrieval after the run.

pub mod csv;
pub mod error;
pub mod observer;
pub mod writer;


pub use crate::csv::CsvEventWriter;
pub use error::{OutputError, OutputResult};
pub use observer::EngineOutputObserver;
pub use writer::EventWriter;
