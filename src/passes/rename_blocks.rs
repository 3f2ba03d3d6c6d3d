//! Block renaming: every block of a defined function is named after
//! that function, `<func>_entry` for the first block and `<func>_bb`
//! for the rest.
//!
//! Non-entry blocks of one function all share the same name. Trace
//! consumers can tell the entry block apart from the others, but not
//! the others apart from each other.

use crate::ir::{Func, FuncDecl, Module};

/// Names blocks had before `run` renamed them.
#[derive(Clone, Debug, Default)]
pub struct PreviousNames(Vec<(Func, Vec<String>)>);

impl PreviousNames {
    /// Put the recorded names back.
    pub fn restore(self, module: &mut Module) {
        for (func, names) in self.0 {
            if let Some(body) = module.funcs[func].body_mut() {
                for (def, name) in body.blocks.values_mut().zip(names) {
                    def.name = name;
                }
            }
        }
    }
}

pub fn run(module: &mut Module) -> PreviousNames {
    let mut previous = PreviousNames::default();
    for (func, decl) in module.funcs.entries_mut() {
        let (name, body) = match decl {
            FuncDecl::Body(name, body) => (name, body),
            FuncDecl::Import(_) => continue,
        };
        let mut old_names = Vec::with_capacity(body.blocks.len());
        for (i, def) in body.blocks.values_mut().enumerate() {
            let new_name = if i == 0 {
                format!("{}_entry", name)
            } else {
                format!("{}_bb", name)
            };
            log::trace!("rename_blocks: {} `{}` -> `{}`", func, def.name, new_name);
            old_names.push(std::mem::replace(&mut def.name, new_name));
        }
        previous.0.push((func, old_names));
    }
    previous
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::Block;

    fn block_names(module: &Module, name: &str) -> Vec<String> {
        let func = module.func_by_name(name).unwrap();
        module.funcs[func]
            .body()
            .unwrap()
            .blocks
            .values()
            .map(|def| def.name.clone())
            .collect()
    }

    #[test]
    fn names_follow_function() {
        let mut module = Module::from_text(
            "declare @ext\n\
             define @main {\n\
             a:\n  br block1\n\
             b:\n  br block2\n\
             c:\n  ret\n\
             }\n\
             define @f {\n  ret\n}\n",
        )
        .unwrap();
        run(&mut module);
        assert_eq!(block_names(&module, "main"), vec!["main_entry", "main_bb", "main_bb"]);
        assert_eq!(block_names(&module, "f"), vec!["f_entry"]);
    }

    #[test]
    fn restore_undoes_renaming() {
        let mut module = Module::from_text("define @main {\nfirst:\n  br block1\nsecond:\n  ret\n}\n").unwrap();
        let previous = run(&mut module);
        previous.restore(&mut module);
        assert_eq!(block_names(&module, "main"), vec!["first", "second"]);
        let main = module.func_by_name("main").unwrap();
        assert_eq!(module.funcs[main].body().unwrap().blocks[Block::new(1)].name, "second");
    }
}
