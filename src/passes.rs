//! Passes, and the catalog a tool looks them up in.

use crate::ir::Module;
use anyhow::Result;

pub mod rename_blocks;
pub mod trace;

use trace::{TracerOptions, TracerPass};

/// How a pass is identified in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// A transformation run once over a whole module.
pub trait ModulePass {
    fn info(&self) -> PassInfo;

    /// Run over `module`. Returns whether analyses computed on the
    /// module before the pass ran are invalidated.
    fn run_on_module(&mut self, module: &mut Module) -> Result<bool>;
}

/// Every pass a tool can ask for by name.
pub fn registered_passes() -> Vec<PassInfo> {
    vec![TracerPass::INFO]
}

/// Instantiate the registered pass called `name`.
pub fn create_pass(name: &str, options: &TracerOptions) -> Option<Box<dyn ModulePass>> {
    match name {
        n if n == TracerPass::INFO.name => Some(Box::new(TracerPass::new(options.clone()))),
        _ => None,
    }
}
