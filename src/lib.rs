//! blocktrace: control-flow tracing instrumentation for a small
//! SSA-style IR.
//!
//! A `Module` is parsed from text, the `TracerPass` inserts calls to a
//! printf-like sink at the start of `main`, at every block entry,
//! around calls and returns and wherever the program can end, and the
//! interpreter runs the result to show the trace it would print.

pub mod entity;
mod errors;
mod frontend;
mod interp;
mod ir;
pub mod passes;

pub use errors::*;
pub use interp::*;
pub use ir::*;
pub use passes::trace::{TraceStats, TracerOptions, TracerPass};

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
