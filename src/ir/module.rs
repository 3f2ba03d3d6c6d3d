use super::{Callee, Func, FuncDecl, ModuleDisplay, Operand, StrConst};
use crate::entity::EntityVec;
use crate::errors::TraceError;
use crate::frontend;
use anyhow::Result;
use fxhash::FxHashMap;

/// A program: an ordered list of functions plus the string constants
/// their instructions refer to.
///
/// The ordinary flow for a tool built on this crate is:
///
/// - Parse textual IR with `Module::from_text()`, or build one up
///   from `Module::empty()`.
/// - Run passes over it (see `crate::passes`).
/// - Print it with `Module::display()`, or execute it with
///   `crate::InterpContext`.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Functions, in program order: declarations and bodies.
    pub funcs: EntityVec<Func, FuncDecl>,
    /// Constant strings, referred to by `Operand::Str`.
    pub strings: EntityVec<StrConst, StrConstData>,
    /// Symbol name to constant, for uniquing symbols.
    symbols: FxHashMap<String, StrConst>,
}

/// A constant string with module-internal linkage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrConstData {
    /// Unique symbol name within the module.
    pub symbol: String,
    pub value: String,
}

impl Module {
    pub fn empty() -> Module {
        Module::default()
    }

    /// Parse a module from its textual form.
    pub fn from_text(text: &str) -> Result<Module> {
        frontend::text_to_ir(text)
    }

    pub fn add_func(&mut self, decl: FuncDecl) -> Func {
        let func = self.funcs.push(decl);
        log::trace!("add_func: {} = {}", func, self.funcs[func].name());
        func
    }

    /// The first function in program order with the given name.
    pub fn func_by_name(&self, name: &str) -> Option<Func> {
        self.funcs
            .entries()
            .find(|(_, decl)| decl.name() == name)
            .map(|(func, _)| func)
    }

    /// Find the function named `name`, declaring it as an import if
    /// there is none.
    pub fn get_or_insert_import(&mut self, name: &str) -> Func {
        match self.func_by_name(name) {
            Some(func) => func,
            None => self.add_func(FuncDecl::Import(name.to_owned())),
        }
    }

    /// The declaration a call resolves to, if it can be resolved.
    pub fn callee_decl(&self, callee: &Callee) -> Option<&FuncDecl> {
        callee.as_direct().and_then(|func| self.funcs.get(func))
    }

    /// Turn a literal into a constant operand, naming the constant
    /// after `symbol` (suffixed with `.N` if the name is taken).
    pub fn materialize(&mut self, literal: &str, symbol: &str) -> Result<Operand, TraceError> {
        let fail = |reason: &str| TraceError::Materialization {
            symbol: symbol.to_owned(),
            reason: reason.to_owned(),
        };
        if symbol.is_empty() || !symbol.chars().all(is_symbol_char) {
            return Err(fail("symbol must be non-empty and made of [A-Za-z0-9_.]"));
        }
        if literal.contains('\0') {
            return Err(fail("literal contains a NUL byte"));
        }

        let mut unique = symbol.to_owned();
        let mut suffix = 0;
        while self.symbols.contains_key(&unique) {
            suffix += 1;
            unique = format!("{}.{}", symbol, suffix);
        }
        let id = self.strings.push(StrConstData {
            symbol: unique.clone(),
            value: literal.to_owned(),
        });
        log::trace!("materialize: {} = ${} {:?}", id, unique, literal);
        self.symbols.insert(unique, id);
        Ok(Operand::Str(id))
    }

    /// Look up a constant by its symbol.
    pub fn string_by_symbol(&self, symbol: &str) -> Option<StrConst> {
        self.symbols.get(symbol).copied()
    }

    /// Drop every constant created after the table had `len` entries.
    pub(crate) fn rollback_strings(&mut self, len: usize) {
        for data in self.strings.values().skip(len) {
            self.symbols.remove(&data.symbol);
        }
        self.strings.truncate(len);
    }

    /// Number of instructions across all function bodies.
    pub fn inst_count(&self) -> usize {
        self.funcs
            .values()
            .filter_map(|decl| decl.body())
            .map(|body| body.inst_count())
            .sum()
    }

    /// Check structural invariants of every function body.
    pub fn validate(&self) -> Result<()> {
        for (func, decl) in self.funcs.entries() {
            if let Some(body) = decl.body() {
                body.validate(self)
                    .map_err(|e| e.context(format!("in {} ({})", func, decl.name())))?;
            }
        }
        Ok(())
    }

    /// Return a wrapper that implements Display on this module,
    /// pretty-printing it as textual IR.
    pub fn display(&self) -> ModuleDisplay<'_> {
        ModuleDisplay(self)
    }
}

pub(crate) fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::FunctionBody;

    #[test]
    fn materialize_uniquifies_symbols() {
        let mut module = Module::empty();
        let a = module.materialize("a", "test").unwrap();
        let b = module.materialize("b", "test").unwrap();
        let c = module.materialize("c", "test").unwrap();
        let symbols = [a, b, c]
            .iter()
            .map(|op| match op {
                Operand::Str(s) => module.strings[*s].symbol.clone(),
                _ => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(symbols, vec!["test", "test.1", "test.2"]);
    }

    #[test]
    fn materialize_rejects_nul() {
        let mut module = Module::empty();
        let err = module.materialize("a\0b", "test").unwrap_err();
        assert!(matches!(err, TraceError::Materialization { .. }));
        assert_eq!(module.strings.len(), 0);
    }

    #[test]
    fn rollback_frees_symbols() {
        let mut module = Module::empty();
        module.materialize("keep", "s").unwrap();
        let len = module.strings.len();
        module.materialize("drop", "s").unwrap();
        module.materialize("drop", "t").unwrap();
        module.rollback_strings(len);
        assert_eq!(module.strings.len(), 1);
        assert!(module.string_by_symbol("s").is_some());
        assert!(module.string_by_symbol("s.1").is_none());
        assert!(module.string_by_symbol("t").is_none());
    }

    #[test]
    fn get_or_insert_import_reuses_existing() {
        let mut module = Module::empty();
        let main = module.add_func(FuncDecl::Body("main".into(), FunctionBody::default()));
        let printf = module.get_or_insert_import("printf");
        assert_ne!(main, printf);
        assert_eq!(module.get_or_insert_import("printf"), printf);
        assert_eq!(module.get_or_insert_import("main"), main);
        assert!(module.funcs[printf].is_declaration());
        assert_eq!(module.funcs.len(), 2);
    }
}
