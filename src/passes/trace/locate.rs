//! Finding trace points: one scan over the whole module, recording
//! where each kind of trace message has to go.

use crate::errors::TraceError;
use crate::ir::{Block, Func, Inst, InstData, Module};
use log::trace;

/// The function whose first non-phi instruction starts the trace and
/// whose returns end it.
pub const ENTRY_FUNC: &str = "main";
/// Calls to this function end the trace.
pub const EXIT_FUNC: &str = "exit";

/// An instruction, with enough context to find it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstRef {
    pub func: Func,
    pub block: Block,
    pub inst: Inst,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Start,
    BlockEntry(String),
    FunctionReturn,
    FunctionCall,
    End,
}

/// A trace message to be emitted just before `at` executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracePoint {
    pub at: InstRef,
    pub category: Category,
}

/// Everything `locate` found, grouped by category. Within a group,
/// points are in scan order.
#[derive(Clone, Debug)]
pub struct TracePoints {
    pub start: InstRef,
    /// First non-phi instruction of each block, with the block's name.
    pub block_entries: Vec<(InstRef, String)>,
    /// Returns outside the entry function.
    pub returns: Vec<InstRef>,
    /// Direct calls to functions with bodies.
    pub calls: Vec<InstRef>,
    /// Returns from the entry function, and calls to `exit`.
    pub ends: Vec<InstRef>,
}

impl TracePoints {
    /// All points: start, block entries, returns, calls, ends.
    pub fn iter(&self) -> impl Iterator<Item = TracePoint> + '_ {
        let point = |at: &InstRef, category: Category| TracePoint { at: *at, category };
        std::iter::once(point(&self.start, Category::Start))
            .chain(
                self.block_entries
                    .iter()
                    .map(move |(at, name)| point(at, Category::BlockEntry(name.clone()))),
            )
            .chain(self.returns.iter().map(move |at| point(at, Category::FunctionReturn)))
            .chain(self.calls.iter().map(move |at| point(at, Category::FunctionCall)))
            .chain(self.ends.iter().map(move |at| point(at, Category::End)))
    }

    pub fn len(&self) -> usize {
        1 + self.block_entries.len() + self.returns.len() + self.calls.len() + self.ends.len()
    }
}

/// Scan `module` in program order. The start of the trace goes on the
/// first non-phi instruction of the entry function; fails if there is
/// none.
pub fn locate(module: &Module) -> Result<TracePoints, TraceError> {
    let mut start = None;
    let mut block_entries = vec![];
    let mut returns = vec![];
    let mut calls = vec![];
    let mut ends = vec![];

    for (func, decl) in module.funcs.entries() {
        let body = match decl.body() {
            Some(body) => body,
            None => continue,
        };
        let in_entry_func = decl.name() == ENTRY_FUNC;

        for (block, def) in body.blocks.entries() {
            let mut first_non_phi_seen = false;

            for &inst in &def.insts {
                let at = InstRef { func, block, inst };
                let data = &body.insts[inst];
                // Nothing may be inserted before a phi.
                if data.is_phi() {
                    continue;
                }

                if start.is_none() && in_entry_func {
                    trace!("locate: start at {:?}", at);
                    start = Some(at);
                }

                if !first_non_phi_seen {
                    trace!("locate: entry of `{}` at {:?}", def.name, at);
                    block_entries.push((at, def.name.clone()));
                    first_non_phi_seen = true;
                }

                match data {
                    InstData::Return if in_entry_func => ends.push(at),
                    InstData::Return => returns.push(at),
                    InstData::Call { callee, .. } => match module.callee_decl(callee) {
                        Some(target) if target.name() == EXIT_FUNC => ends.push(at),
                        Some(target) if !target.is_declaration() => calls.push(at),
                        // Library function, or an indirect call we
                        // cannot resolve.
                        _ => {}
                    },
                    InstData::Phi(..) | InstData::Other(..) => {}
                }
            }
        }
    }

    let start = start.ok_or(TraceError::MissingEntryPoint)?;
    log::debug!(
        "locate: {} block entries, {} returns, {} calls, {} ends",
        block_entries.len(),
        returns.len(),
        calls.len(),
        ends.len()
    );
    Ok(TracePoints {
        start,
        block_entries,
        returns,
        calls,
        ends,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::EntityRef;
    use crate::passes::rename_blocks;

    fn located(text: &str) -> (Module, TracePoints) {
        let mut module = Module::from_text(text).unwrap();
        rename_blocks::run(&mut module);
        let points = locate(&module).unwrap();
        (module, points)
    }

    fn inst_at(module: &Module, func: &str, block: usize, index: usize) -> InstRef {
        let func = module.func_by_name(func).unwrap();
        let block = Block::new(block);
        let inst = module.funcs[func].body().unwrap().blocks[block].insts[index];
        InstRef { func, block, inst }
    }

    #[test]
    fn call_then_return() {
        let (module, points) = located(
            "define @main {\n  call @foo()\n  ret\n}\n\
             define @foo {\n  ret\n}\n",
        );
        let call = inst_at(&module, "main", 0, 0);
        let main_ret = inst_at(&module, "main", 0, 1);
        let foo_ret = inst_at(&module, "foo", 0, 0);

        assert_eq!(points.start, call);
        assert_eq!(
            points.block_entries,
            vec![(call, "main_entry".to_owned()), (foo_ret, "foo_entry".to_owned())]
        );
        assert_eq!(points.calls, vec![call]);
        assert_eq!(points.returns, vec![foo_ret]);
        assert_eq!(points.ends, vec![main_ret]);
        assert_eq!(points.len(), 6);
    }

    #[test]
    fn lone_return_in_main() {
        let (module, points) = located("define @main {\n  ret\n}\n");
        let ret = inst_at(&module, "main", 0, 0);
        assert_eq!(points.start, ret);
        assert_eq!(points.block_entries, vec![(ret, "main_entry".to_owned())]);
        assert_eq!(points.ends, vec![ret]);
        assert!(points.calls.is_empty());
        assert!(points.returns.is_empty());
    }

    #[test]
    fn block_entry_skips_phis() {
        let (module, points) = located("define @main {\n  phi\n  phi\n  ret\n}\n");
        let ret = inst_at(&module, "main", 0, 2);
        assert_eq!(points.start, ret);
        assert_eq!(points.block_entries, vec![(ret, "main_entry".to_owned())]);
        assert_eq!(points.ends, vec![ret]);
    }

    #[test]
    fn phi_only_and_empty_blocks_have_no_entry() {
        let (_, points) = located(
            "define @main {\na:\n  br block1\nb:\n  phi block0\nc:\nd:\n  ret\n}\n",
        );
        let names = points
            .block_entries
            .iter()
            .map(|(at, _)| at.block.index())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![0, 3]);
    }

    #[test]
    fn phi_only_main_is_an_error() {
        let module = Module::from_text("define @main {\n  phi\n}\n").unwrap();
        assert_eq!(locate(&module).unwrap_err(), TraceError::MissingEntryPoint);
    }

    #[test]
    fn start_skips_empty_leading_blocks() {
        let (module, points) = located("define @main {\na:\nb:\n  ret\n}\n");
        assert_eq!(points.start, inst_at(&module, "main", 1, 0));
    }

    #[test]
    fn calls_are_classified_by_callee() {
        let (module, points) = located(
            "declare @exit\ndeclare @puts\n\
             define @main {\n  call @puts()\n  call_indirect()\n  call @helper()\n  call @exit(1)\n  ret\n}\n\
             define @helper {\n  ret\n}\n",
        );
        assert_eq!(points.calls, vec![inst_at(&module, "main", 0, 2)]);
        assert_eq!(
            points.ends,
            vec![inst_at(&module, "main", 0, 3), inst_at(&module, "main", 0, 4)]
        );
    }

    #[test]
    fn user_defined_exit_still_ends_trace() {
        let (module, points) = located(
            "define @main {\n  call @exit()\n  ret\n}\ndefine @exit {\n  ret\n}\n",
        );
        let call = inst_at(&module, "main", 0, 0);
        assert!(points.ends.contains(&call));
        assert!(!points.calls.contains(&call));
        // Returning from a non-entry function is still a plain return.
        assert_eq!(points.returns, vec![inst_at(&module, "exit", 0, 0)]);
    }

    #[test]
    fn missing_main_is_an_error() {
        let module = Module::from_text("define @f {\n  ret\n}\n").unwrap();
        assert_eq!(locate(&module).unwrap_err(), TraceError::MissingEntryPoint);
    }

    #[test]
    fn empty_or_declared_main_is_an_error() {
        let module = Module::from_text("define @main {\na:\n}\n").unwrap();
        assert_eq!(locate(&module).unwrap_err(), TraceError::MissingEntryPoint);
        let module = Module::from_text("declare @main\n").unwrap();
        assert_eq!(locate(&module).unwrap_err(), TraceError::MissingEntryPoint);
    }
}
