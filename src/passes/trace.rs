//! Trace-insertion pass.
//!
//! Instruments a module so that, when run, it prints the path
//! execution takes: `trace_start` when `main` begins, the name of
//! every block it enters, a marker for every call into and return
//! from a function with a body, and `trace_end` where the program can
//! finish. Every message is printed by a call to a sink function
//! (`printf` unless configured otherwise).
//!
//! The pass is not idempotent. Running it twice nests a second layer
//! of trace calls around the first.

mod emit;
mod locate;

pub use emit::message;
pub use locate::{locate, Category, InstRef, TracePoint, TracePoints, ENTRY_FUNC, EXIT_FUNC};

use super::{rename_blocks, ModulePass, PassInfo};
use crate::ir::Module;
use anyhow::Result;

/// Options for the tracing pass.
#[derive(Clone, Debug)]
pub struct TracerOptions {
    /// Name of the printf-like function the trace calls go to. It is
    /// declared if the module does not have it yet.
    pub sink: String,
}

impl Default for TracerOptions {
    fn default() -> Self {
        TracerOptions {
            sink: "printf".to_owned(),
        }
    }
}

/// Trace calls inserted by one run, per category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub block_entries: usize,
    pub returns: usize,
    pub calls: usize,
    pub ends: usize,
}

impl TraceStats {
    fn of(points: &TracePoints) -> TraceStats {
        TraceStats {
            block_entries: points.block_entries.len(),
            returns: points.returns.len(),
            calls: points.calls.len(),
            ends: points.ends.len(),
        }
    }

    /// Total trace calls, counting the single start marker.
    pub fn total(&self) -> usize {
        1 + self.block_entries + self.returns + self.calls + self.ends
    }
}

impl std::fmt::Display for TraceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "1 start, {} block entries, {} returns, {} calls, {} ends",
            self.block_entries, self.returns, self.calls, self.ends
        )
    }
}

/// Rename blocks, locate trace points and insert trace calls.
///
/// On error the module is left as it was: block names are restored,
/// and no constant, declaration or instruction is added.
pub fn run(module: &mut Module, options: &TracerOptions) -> Result<TraceStats> {
    log::debug!("trace: running with sink `{}`", options.sink);
    let previous_names = rename_blocks::run(module);

    let points = match locate(module) {
        Ok(points) => points,
        Err(e) => {
            log::debug!("trace: aborting: {}", e);
            previous_names.restore(module);
            return Err(e.into());
        }
    };

    let funcs_before = module.funcs.len();
    let sink = module.get_or_insert_import(&options.sink);
    if let Err(e) = emit::run(module, &points, sink) {
        log::debug!("trace: aborting: {}", e);
        module.funcs.truncate(funcs_before);
        previous_names.restore(module);
        return Err(e);
    }

    let stats = TraceStats::of(&points);
    log::info!("trace: inserted {} ({} calls total)", stats, stats.total());
    Ok(stats)
}

/// The tracing pass, as registered in the pass catalog.
pub struct TracerPass {
    options: TracerOptions,
}

impl TracerPass {
    pub const INFO: PassInfo = PassInfo {
        name: "TracerPass",
        description: "Hello World Pass",
    };

    pub fn new(options: TracerOptions) -> TracerPass {
        TracerPass { options }
    }
}

impl ModulePass for TracerPass {
    fn info(&self) -> PassInfo {
        TracerPass::INFO
    }

    /// Always reports that no analyses were invalidated, even though
    /// instructions were inserted.
    fn run_on_module(&mut self, module: &mut Module) -> Result<bool> {
        run(module, &self.options)?;
        Ok(false)
    }
}
