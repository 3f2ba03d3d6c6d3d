//! Integration tests: instrument the programs under `tests/programs`
//! and check what they print when run, plus properties that must hold
//! for any module.

use blocktrace::passes::trace;
use blocktrace::{
    Callee, Func, InstData, InterpContext, Module, TraceError, TraceStats, TracerOptions,
};
use std::path::PathBuf;

fn get_programs() -> Vec<PathBuf> {
    let test_dir = std::env::current_dir()
        .unwrap()
        .join("tests")
        .join("programs");
    let mut ret = vec![];
    for item in std::fs::read_dir(test_dir).unwrap() {
        let path = item.unwrap().path();
        if path.extension().and_then(|s| s.to_str()) == Some("bt") {
            ret.push(path);
        }
    }
    ret.sort(); // Deterministic test order.
    ret
}

fn instrument(text: &str) -> (Module, TraceStats) {
    let mut module = Module::from_text(text).unwrap();
    let stats = trace::run(&mut module, &TracerOptions::default()).unwrap();
    (module, stats)
}

/// Every call to `sink`, as (function name, block index, position).
fn sink_calls(module: &Module, sink: Func) -> Vec<(String, usize, usize)> {
    let mut ret = vec![];
    for decl in module.funcs.values() {
        let body = match decl.body() {
            Some(body) => body,
            None => continue,
        };
        for (i, def) in body.blocks.values().enumerate() {
            for (pos, &inst) in def.insts.iter().enumerate() {
                if let InstData::Call {
                    callee: Callee::Direct(callee),
                    ..
                } = &body.insts[inst]
                {
                    if *callee == sink {
                        ret.push((decl.name().to_owned(), i, pos));
                    }
                }
            }
        }
    }
    ret
}

fn printf(module: &Module) -> Func {
    module.func_by_name("printf").unwrap()
}

#[test]
fn programs_print_expected_traces() {
    let programs = get_programs();
    assert!(!programs.is_empty());
    for path in programs {
        let text = std::fs::read_to_string(&path).unwrap();
        let expected = std::fs::read_to_string(path.with_extension("trace")).unwrap();

        let (module, _) = instrument(&text);
        let mut ctx = InterpContext::new("printf");
        ctx.run_main(&module).unwrap();
        assert_eq!(ctx.output, expected, "trace of {}", path.display());
    }
}

#[test]
fn scenario_a_inserts_six_calls() {
    let (module, stats) = instrument(
        "define @main {\n  call @foo()\n  ret\n}\ndefine @foo {\n  ret\n}\n",
    );
    assert_eq!(stats.total(), 6);

    let calls = sink_calls(&module, printf(&module));
    assert_eq!(calls.len(), 6);
    let before_foo_call = calls
        .iter()
        .filter(|(func, block, pos)| func == "main" && *block == 0 && *pos < 3)
        .count();
    assert_eq!(before_foo_call, 3);

    let main = module.func_by_name("main").unwrap();
    let body = module.funcs[main].body().unwrap();
    let insts = &body.blocks[body.blocks.iter().next().unwrap()].insts;
    assert_eq!(insts.len(), 6);
    assert!(matches!(
        body.insts[insts[3]],
        InstData::Call { callee: Callee::Direct(f), .. } if module.funcs[f].name() == "foo"
    ));
}

#[test]
fn block_entries_follow_non_empty_blocks() {
    let text = "define @main {\na:\n  phi\nb:\nc:\n  phi block0\n  br block3\nd:\n  ret\n}\n\
                define @g {\n  phi\n  unreachable\nx:\n}\n";
    let module = Module::from_text(text).unwrap();
    let non_empty = module
        .funcs
        .values()
        .filter_map(|decl| decl.body())
        .flat_map(|body| {
            body.blocks
                .values()
                .filter(move |def| def.insts.iter().any(|&i| !body.insts[i].is_phi()))
        })
        .count();

    let (module, stats) = instrument(text);
    assert_eq!(non_empty, 3);
    assert_eq!(stats.block_entries, non_empty);
    module.validate().unwrap();
}

#[test]
fn returns_and_calls_are_classified() {
    let (_, stats) = instrument(
        "declare @exit\ndeclare @puts\n\
         define @main {\n  call @a()\n  call @puts()\n  call_indirect()\n  call @exit(2)\n  ret\n  ret\n}\n\
         define @a {\n  call @b()\n  ret\n}\n\
         define @b {\n  ret\nlater:\n  ret\n}\n",
    );
    assert_eq!(stats.calls, 2);
    assert_eq!(stats.returns, 3);
    // Two returns from main, and the call to exit.
    assert_eq!(stats.ends, 3);
    assert_eq!(stats.block_entries, 4);
}

#[test]
fn second_run_adds_more_calls() {
    let (mut module, first) = instrument("define @main {\n  call @f()\n  ret\n}\ndefine @f {\n  ret\n}\n");
    let sink = printf(&module);
    let after_first = sink_calls(&module, sink).len();
    assert_eq!(after_first, first.total());

    let second = trace::run(&mut module, &TracerOptions::default()).unwrap();
    let after_second = sink_calls(&module, sink).len();
    assert!(after_second > after_first);
    assert_eq!(after_second, after_first + second.total());
    assert_eq!(module.funcs.values().filter(|d| d.name() == "printf").count(), 1);
}

#[test]
fn missing_main_leaves_module_untouched() {
    for text in &[
        "define @f {\n  call @g()\n  ret\n}\ndefine @g {\n  ret\n}\n",
        "declare @main\n",
        "define @main {\n  phi\n  phi\n}\n",
    ] {
        let mut module = Module::from_text(text).unwrap();
        let printed = module.display().to_string();
        let insts = module.inst_count();
        let funcs = module.funcs.len();

        let err = trace::run(&mut module, &TracerOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TraceError>(),
            Some(&TraceError::MissingEntryPoint)
        );
        assert_eq!(module.inst_count(), insts);
        assert_eq!(module.funcs.len(), funcs);
        assert!(module.func_by_name("printf").is_none());
        assert_eq!(module.display().to_string(), printed);
    }
}

#[test]
fn custom_sink_is_traced_into() {
    let mut module = Module::from_text("define @main {\n  ret\n}\n").unwrap();
    let options = TracerOptions {
        sink: "log_line".to_owned(),
    };
    trace::run(&mut module, &options).unwrap();
    assert!(module.func_by_name("printf").is_none());

    let mut ctx = InterpContext::new("log_line");
    ctx.run_main(&module).unwrap();
    assert_eq!(ctx.output, "trace_start\n\ntrace:main_entry\n\ntrace_end\n");
}

#[test]
fn instrumented_ir_roundtrips() {
    for path in get_programs() {
        let text = std::fs::read_to_string(&path).unwrap();
        let (module, _) = instrument(&text);
        module.validate().unwrap();

        let printed = module.display().to_string();
        let reparsed = Module::from_text(&printed).unwrap();
        assert_eq!(reparsed.display().to_string(), printed, "{}", path.display());
        assert_eq!(reparsed.inst_count(), module.inst_count());
    }
}
