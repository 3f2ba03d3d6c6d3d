#![no_main]
use libfuzzer_sys::fuzz_target;

use blocktrace::fuzzing::ArbitraryModule;
use blocktrace::{Module, TracerOptions};

fuzz_target!(|module: ArbitraryModule| {
    let _ = env_logger::try_init();
    let mut module = module.0;
    let _ = blocktrace::passes::trace::run(&mut module, &TracerOptions::default());
    let text = module.display().to_string();
    let reparsed = Module::from_text(&text).unwrap();
    assert_eq!(text, reparsed.display().to_string());
});
