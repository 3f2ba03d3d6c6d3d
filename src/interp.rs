//! IR interpreter.
//!
//! Runs a module from `main` far enough to reproduce what an
//! instrumented program prints: calls to the sink function append to
//! `InterpContext::output`, `exit` stops execution, and every other
//! declared function does nothing.

use crate::entity::EntityRef;
use crate::ir::*;
use crate::passes::trace::{ENTRY_FUNC, EXIT_FUNC};
use anyhow::{bail, Result};

/// How deep calls may nest before we treat the program as runaway.
pub const MAX_CALL_DEPTH: usize = 512;

/// Context for the IR interpreter.
pub struct InterpContext {
    /// Name of the function whose calls print.
    pub sink: String,
    /// Everything printed through the sink so far.
    pub output: String,
    /// Fuel remaining: allows deterministic stopping of execution.
    /// Each executed instruction uses one unit.
    pub fuel: u64,
    depth: usize,
}

/// The result of an interpreter session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterpResult {
    /// The function returned.
    Returned,
    /// `exit` was called with the given code.
    Exited(i64),
    /// Execution hit `unreachable`, fell off the end of a block, or
    /// nested calls too deeply.
    Trap(Func, Block),
    /// The program ran out of fuel.
    OutOfFuel,
}

impl InterpContext {
    pub fn new<S: Into<String>>(sink: S) -> Self {
        InterpContext {
            sink: sink.into(),
            output: String::new(),
            fuel: u64::MAX,
            depth: 0,
        }
    }

    /// Run the module's `main`.
    pub fn run_main(&mut self, module: &Module) -> Result<InterpResult> {
        let main = match module.func_by_name(ENTRY_FUNC) {
            Some(main) => main,
            None => bail!("module has no `{}` function", ENTRY_FUNC),
        };
        if module.funcs[main].is_declaration() {
            bail!("`{}` is only declared", ENTRY_FUNC);
        }
        Ok(self.call(module, main, &[]))
    }

    /// Call the given function, running the interpreter until fuel is
    /// exhausted or the function returns.
    pub fn call(&mut self, module: &Module, func: Func, args: &[Operand]) -> InterpResult {
        let body = match &module.funcs[func] {
            FuncDecl::Import(name) => return self.call_import(module, name, args),
            FuncDecl::Body(_, body) => body,
        };

        let mut cur_block = match body.blocks.iter().next() {
            Some(entry) => entry,
            None => return InterpResult::Trap(func, Block::invalid()),
        };
        if self.depth >= MAX_CALL_DEPTH {
            return InterpResult::Trap(func, cur_block);
        }
        log::trace!("Interp: entering {} ({})", func, module.funcs[func].name());

        self.depth += 1;
        let result = loop {
            log::trace!("Interpreting block {}", cur_block);
            match self.run_block(module, body, func, cur_block) {
                Ok(next) => cur_block = next,
                Err(result) => break result,
            }
        };
        self.depth -= 1;
        result
    }

    /// Run one block. Returns the next block to run, or how the
    /// function finished.
    fn run_block(
        &mut self,
        module: &Module,
        body: &FunctionBody,
        func: Func,
        block: Block,
    ) -> std::result::Result<Block, InterpResult> {
        for &inst in &body.blocks[block].insts {
            if self.fuel == 0 {
                return Err(InterpResult::OutOfFuel);
            }
            self.fuel -= 1;

            match &body.insts[inst] {
                InstData::Phi(..) | InstData::Other(Op::Opaque(..)) => {}
                InstData::Call {
                    callee: Callee::Direct(callee),
                    args,
                } => match self.call(module, *callee, args) {
                    InterpResult::Returned => {}
                    other => return Err(other),
                },
                InstData::Call {
                    callee: Callee::Indirect,
                    ..
                } => {
                    log::trace!("Interp: skipping indirect call {}", inst);
                }
                InstData::Return => return Err(InterpResult::Returned),
                InstData::Other(Op::Br(target)) => return Ok(*target),
                InstData::Other(Op::Unreachable) => return Err(InterpResult::Trap(func, block)),
            }
        }
        Err(InterpResult::Trap(func, block))
    }

    fn call_import(&mut self, module: &Module, name: &str, args: &[Operand]) -> InterpResult {
        if name == self.sink {
            let text = expand_format(module, args);
            log::trace!("Interp: {} prints {:?}", name, text);
            self.output.push_str(&text);
        } else if name == EXIT_FUNC {
            let code = match args.first() {
                Some(&Operand::Int(code)) => code,
                _ => 0,
            };
            return InterpResult::Exited(code);
        } else {
            log::trace!("Interp: ignoring call to {}", name);
        }
        InterpResult::Returned
    }
}

/// Expand a printf-style argument list: `%s` takes the next argument
/// as a string, `%d` as an integer, `%%` is a literal `%`. Missing
/// arguments print nothing.
fn expand_format(module: &Module, args: &[Operand]) -> String {
    let fmt = match args.first() {
        Some(&Operand::Str(s)) => &module.strings[s].value[..],
        Some(&Operand::Int(i)) => return i.to_string(),
        None => return String::new(),
    };
    let render = |arg: Option<&Operand>| match arg {
        Some(&Operand::Str(s)) => module.strings[s].value.clone(),
        Some(&Operand::Int(i)) => i.to_string(),
        None => String::new(),
    };

    let mut out = String::with_capacity(fmt.len());
    let mut rest = args[1..].iter();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') | Some('d') => {
                chars.next();
                out.push_str(&render(rest.next()));
            }
            _ => out.push('%'),
        }
    }
    out
}
