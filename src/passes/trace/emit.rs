//! Emitting trace calls at located trace points.

use super::locate::{Category, InstRef, TracePoints};
use crate::ir::{Func, InstData, Module, Operand};
use anyhow::{anyhow, bail, Result};

/// The message printed when execution reaches a trace point.
pub fn message(category: &Category) -> String {
    match category {
        Category::Start => "trace_start\n".to_owned(),
        Category::BlockEntry(name) => format!("\ntrace:{}\n", name),
        Category::FunctionReturn => "\ntrace:return\n".to_owned(),
        Category::FunctionCall => "\ntrace:call\n".to_owned(),
        Category::End => "\ntrace_end\n".to_owned(),
    }
}

/// Symbol the message constant is named after.
fn symbol(category: &Category) -> &'static str {
    match category {
        Category::FunctionReturn => "return",
        Category::FunctionCall => "call",
        Category::Start | Category::BlockEntry(_) | Category::End => "test",
    }
}

/// Materialize every message and check every target, without
/// touching any function body.
fn plan(module: &mut Module, points: &TracePoints) -> Result<Vec<(InstRef, Operand)>> {
    let mut planned = Vec::with_capacity(points.len());
    for point in points.iter() {
        let body = module.funcs.get(point.at.func).and_then(|decl| decl.body());
        if !body.map_or(false, |body| body.can_insert_before(point.at.block, point.at.inst)) {
            bail!("cannot insert a trace call before {:?}", point.at);
        }
        let operand = module.materialize(&message(&point.category), symbol(&point.category))?;
        planned.push((point.at, operand));
    }
    Ok(planned)
}

/// Insert a call to `sink` before every trace point. Either every
/// call is inserted, or the module is left as it was.
pub(crate) fn run(module: &mut Module, points: &TracePoints, sink: Func) -> Result<()> {
    let checkpoint = module.strings.len();
    let planned = match plan(module, points) {
        Ok(planned) => planned,
        Err(e) => {
            module.rollback_strings(checkpoint);
            return Err(e);
        }
    };

    for (at, operand) in planned {
        let body = module.funcs[at.func]
            .body_mut()
            .ok_or_else(|| anyhow!("{} has no body", at.func))?;
        let inst = body.insert_before(at.block, at.inst, InstData::call(sink, vec![operand]))?;
        log::trace!("emit: {} before {:?}", inst, at);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(message(&Category::Start), "trace_start\n");
        assert_eq!(
            message(&Category::BlockEntry("main_entry".into())),
            "\ntrace:main_entry\n"
        );
        assert_eq!(message(&Category::FunctionReturn), "\ntrace:return\n");
        assert_eq!(message(&Category::FunctionCall), "\ntrace:call\n");
        assert_eq!(message(&Category::End), "\ntrace_end\n");
    }

    #[test]
    fn symbols() {
        assert_eq!(symbol(&Category::Start), "test");
        assert_eq!(symbol(&Category::BlockEntry("x".into())), "test");
        assert_eq!(symbol(&Category::FunctionReturn), "return");
        assert_eq!(symbol(&Category::FunctionCall), "call");
        assert_eq!(symbol(&Category::End), "test");
    }
}
