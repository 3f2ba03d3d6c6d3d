//! Displaying IR in the textual form the frontend parses.

use super::{Callee, FuncDecl, FunctionBody, InstData, Module, Op, Operand};

use std::fmt::{Display, Formatter, Result as FmtResult};

pub struct FunctionBodyDisplay<'a>(
    pub(crate) &'a FunctionBody,
    pub(crate) &'a str,
    pub(crate) &'a Module,
);

impl<'a> Display for FunctionBodyDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let FunctionBodyDisplay(body, indent, module) = *self;
        for (block, def) in body.blocks.entries() {
            writeln!(f, "{}{}:  # {}", indent, def.name, block)?;
            for &inst in &def.insts {
                write!(f, "{}  ", indent)?;
                match &body.insts[inst] {
                    InstData::Phi(preds) => {
                        let preds = preds
                            .iter()
                            .map(|pred| format!("{}", pred))
                            .collect::<Vec<_>>();
                        if preds.is_empty() {
                            writeln!(f, "phi")?;
                        } else {
                            writeln!(f, "phi {}", preds.join(", "))?;
                        }
                    }
                    InstData::Call { callee, args } => {
                        let args = args
                            .iter()
                            .map(|arg| OperandDisplay(*arg, module).to_string())
                            .collect::<Vec<_>>();
                        match callee {
                            &Callee::Direct(func) => {
                                writeln!(f, "call @{}({})", module.funcs[func].name(), args.join(", "))?
                            }
                            Callee::Indirect => writeln!(f, "call_indirect({})", args.join(", "))?,
                        }
                    }
                    InstData::Return => writeln!(f, "ret")?,
                    InstData::Other(Op::Br(target)) => writeln!(f, "br {}", target)?,
                    InstData::Other(Op::Unreachable) => writeln!(f, "unreachable")?,
                    InstData::Other(Op::Opaque(text)) => writeln!(f, "{}", text)?,
                }
            }
        }
        Ok(())
    }
}

struct OperandDisplay<'a>(Operand, &'a Module);

impl<'a> Display for OperandDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self.0 {
            Operand::Str(s) => write!(f, "${}", self.1.strings[s].symbol),
            Operand::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Quote a string literal, escaping anything the frontend would not
/// read back verbatim.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub struct ModuleDisplay<'a>(pub(crate) &'a Module);

impl<'a> Display for ModuleDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let module = self.0;
        for data in module.strings.values() {
            writeln!(f, "const ${} = {}", data.symbol, escape_literal(&data.value))?;
        }
        if !module.strings.is_empty() {
            writeln!(f)?;
        }
        for decl in module.funcs.values() {
            match decl {
                FuncDecl::Import(name) => writeln!(f, "declare @{}", name)?,
                FuncDecl::Body(name, body) => {
                    writeln!(f, "define @{} {{", name)?;
                    write!(f, "{}", body.display("", module))?;
                    writeln!(f, "}}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_literal("\ntrace:a\n"), "\"\\ntrace:a\\n\"");
        assert_eq!(escape_literal("q\"\\"), "\"q\\\"\\\\\"");
        assert_eq!(escape_literal("\x01"), "\"\\x01\"");
    }
}
