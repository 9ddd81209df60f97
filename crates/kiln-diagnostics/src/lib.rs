//! # Kiln Diagnostics
//!
//! The error/warning reporting layer every other Kiln crate writes into
//! instead of printing directly: a source table of interned file contents,
//! a `Diagnostic` record keyed by `(source, location, level, message)`,
//! and a store that accumulates diagnostics during an interpreter run and
//! replays them sorted by `(source, offset)` once the run finishes.
//!
//! ## Architecture
//!
//! 1. [`source`] — interned source files, byte-offset to line/column
//!    conversion.
//! 2. [`diagnostic`] — the `Diagnostic` record and rustc-style source
//!    snippet renderer.
//! 3. [`store`] — the accumulating, replayable `DiagnosticStore`.

pub mod diagnostic;
pub mod source;
pub mod store;

pub use diagnostic::{Diagnostic, Level, Snippet};
pub use source::{SourceId, SourceTable};
pub use store::{DiagnosticStore, ReplayOptions};
