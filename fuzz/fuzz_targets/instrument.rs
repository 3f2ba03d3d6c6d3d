#![no_main]
use libfuzzer_sys::fuzz_target;

use blocktrace::fuzzing::{expected_stats, ArbitraryModule};
use blocktrace::passes::trace;
use blocktrace::{TraceError, TracerOptions};

fuzz_target!(|module: ArbitraryModule| {
    let _ = env_logger::try_init();
    let mut module = module.0;
    let insts_before = module.inst_count();
    let expected = expected_stats(&module);
    log::debug!("expected: {:?}", expected);

    match trace::run(&mut module, &TracerOptions::default()) {
        Ok(stats) => {
            assert_eq!(Some(stats), expected);
            assert_eq!(module.inst_count(), insts_before + stats.total());
            module.validate().unwrap();
        }
        Err(e) => {
            assert_eq!(
                e.downcast_ref::<TraceError>(),
                Some(&TraceError::MissingEntryPoint)
            );
            assert!(expected.is_none());
            assert_eq!(module.inst_count(), insts_before);
        }
    }
});
