//! blocktrace command-line tool.

use anyhow::{bail, Result};
use blocktrace::passes::{self, trace};
use blocktrace::{InterpContext, InterpResult, Module, TracerOptions};
use log::debug;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "blocktrace-util", about = "blocktrace utility.")]
struct Options {
    #[structopt(short, long)]
    debug: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(name = "print-ir", about = "Parse IR and print it back")]
    PrintIR {
        #[structopt(help = "IR file to parse")]
        input: PathBuf,
    },
    #[structopt(name = "instrument", about = "Insert trace calls and print the result")]
    Instrument {
        #[structopt(help = "IR file to instrument")]
        input: PathBuf,
        #[structopt(short, long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
        #[structopt(long, default_value = "printf", help = "Function the trace calls go to")]
        sink: String,
    },
    #[structopt(name = "run", about = "Interpret `main` and print what it prints")]
    Run {
        #[structopt(help = "IR file to run")]
        input: PathBuf,
        #[structopt(long, help = "Instrument before running")]
        instrument: bool,
        #[structopt(long, default_value = "printf", help = "Function the trace calls go to")]
        sink: String,
        #[structopt(long, help = "Stop after this many instructions")]
        fuel: Option<u64>,
    },
    #[structopt(name = "list-passes", about = "List the passes in the catalog")]
    ListPasses,
}

fn load(path: &PathBuf) -> Result<Module> {
    let text = std::fs::read_to_string(path)?;
    debug!("Loaded {} bytes of IR from {}", text.len(), path.display());
    Module::from_text(&text)
}

fn main() -> Result<()> {
    let opts = Options::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if opts.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    match opts.command {
        Command::PrintIR { input } => {
            let module = load(&input)?;
            print!("{}", module.display());
        }
        Command::Instrument {
            input,
            output,
            sink,
        } => {
            let mut module = load(&input)?;
            let stats = trace::run(&mut module, &TracerOptions { sink })?;
            debug!("Instrumented {}: {}", input.display(), stats);
            let text = module.display().to_string();
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => print!("{}", text),
            }
        }
        Command::Run {
            input,
            instrument,
            sink,
            fuel,
        } => {
            let mut module = load(&input)?;
            if instrument {
                let options = TracerOptions { sink: sink.clone() };
                let mut pass = match passes::create_pass(trace::TracerPass::INFO.name, &options) {
                    Some(pass) => pass,
                    None => bail!("tracing pass is not registered"),
                };
                pass.run_on_module(&mut module)?;
            }
            let mut ctx = InterpContext::new(sink);
            if let Some(fuel) = fuel {
                ctx.fuel = fuel;
            }
            let result = ctx.run_main(&module)?;
            print!("{}", ctx.output);
            match result {
                InterpResult::Returned => {}
                InterpResult::Exited(code) => debug!("Program exited with code {}", code),
                InterpResult::Trap(func, block) => bail!("Program trapped in {} at {}", func, block),
                InterpResult::OutOfFuel => bail!("Program ran out of fuel"),
            }
        }
        Command::ListPasses => {
            for info in passes::registered_passes() {
                println!("{}: {}", info.name, info.description);
            }
        }
    }

    Ok(())
}
