//! Fuzzing-specific utilities.

use crate::entity::EntityRef;
use crate::ir::*;
use crate::passes::trace::{TraceStats, ENTRY_FUNC, EXIT_FUNC};
use libfuzzer_sys::arbitrary::{self, Arbitrary, Unstructured};
use smallvec::SmallVec;

/// Names given to generated declarations, in order.
const IMPORT_NAMES: &[&str] = &[EXIT_FUNC, "puts"];

/// A wrapper around `Module` that uses `arbitrary` to generate random
/// programs: a few declarations, and a few bodies (usually including
/// `main`) made of phis, calls, branches and returns.
#[derive(Debug)]
pub struct ArbitraryModule(pub Module);

impl<'a> Arbitrary<'a> for ArbitraryModule {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut module = Module::empty();
        let n_imports = u.int_in_range(0..=IMPORT_NAMES.len())?;
        for name in &IMPORT_NAMES[..n_imports] {
            module.add_func(FuncDecl::Import((*name).to_owned()));
        }

        let has_main = u.int_in_range(0..=7u8)? != 0;
        let n_bodies = u.int_in_range(1..=4usize)?;
        let mut bodies = vec![];
        for i in 0..n_bodies {
            let name = if i == 0 && has_main {
                ENTRY_FUNC.to_owned()
            } else {
                format!("f{}", i)
            };
            bodies.push(module.add_func(FuncDecl::Body(name, FunctionBody::default())));
        }

        let n_funcs = module.funcs.len();
        for func in bodies {
            let mut body = FunctionBody::default();
            let n_blocks = u.int_in_range(0..=4usize)?;
            for i in 0..n_blocks {
                body.add_block(format!("b{}", i));
            }
            for block in body.blocks.iter().collect::<Vec<_>>() {
                for _ in 0..u.int_in_range(0..=2u8)? {
                    body.append_inst(block, InstData::Phi(SmallVec::new()));
                }
                for _ in 0..u.int_in_range(0..=4u8)? {
                    let data = match u.int_in_range(0..=4u8)? {
                        0 => InstData::Return,
                        1 => InstData::call(Func::new(u.int_in_range(0..=n_funcs - 1)?), vec![]),
                        2 => InstData::Call {
                            callee: Callee::Indirect,
                            args: vec![],
                        },
                        3 => InstData::Other(Op::Br(Block::new(u.int_in_range(0..=n_blocks - 1)?))),
                        _ => InstData::Other(Op::Opaque("nop".to_owned())),
                    };
                    body.append_inst(block, data);
                }
            }
            if let Some(slot) = module.funcs[func].body_mut() {
                *slot = body;
            }
        }

        Ok(ArbitraryModule(module))
    }
}

/// What the tracing pass should report for `module`, counted
/// directly from its instructions. `None` if the pass must refuse to
/// run because `main` has no non-phi instruction.
pub fn expected_stats(module: &Module) -> Option<TraceStats> {
    let main = module.func_by_name(ENTRY_FUNC)?;
    let main_body = module.funcs[main].body()?;
    let has_start = main_body
        .blocks
        .values()
        .flat_map(|def| def.insts.iter())
        .any(|&inst| !main_body.insts[inst].is_phi());
    if !has_start {
        return None;
    }

    let mut stats = TraceStats::default();
    for decl in module.funcs.values() {
        let body = match decl.body() {
            Some(body) => body,
            None => continue,
        };
        for def in body.blocks.values() {
            if def.insts.iter().any(|&inst| !body.insts[inst].is_phi()) {
                stats.block_entries += 1;
            }
            for &inst in &def.insts {
                match &body.insts[inst] {
                    InstData::Return if decl.name() == ENTRY_FUNC => stats.ends += 1,
                    InstData::Return => stats.returns += 1,
                    InstData::Call { callee, .. } => match module.callee_decl(callee) {
                        Some(target) if target.name() == EXIT_FUNC => stats.ends += 1,
                        Some(target) if !target.is_declaration() => stats.calls += 1,
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }
    Some(stats)
}
