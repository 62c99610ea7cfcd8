use std::io::stdout;
use std::process::ExitCode;

use loxwalk::error::{Diagnostics, InterpretationError};

/// Exit code for a usage error, per the external-interface contract.
const EX_USAGE: u8 = 64;
/// Exit code for a lexical, syntax, or static-resolution error in file mode.
const EX_DATAERR: u8 = 65;
/// Exit code for a runtime error in file mode.
const EX_SOFTWARE: u8 = 70;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            loxwalk::repl::run();
            ExitCode::SUCCESS
        }
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: loxwalk [script]");
            ExitCode::from(EX_USAGE)
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{path}': {err}");
            return ExitCode::from(EX_DATAERR);
        }
    };

    let mut diagnostics = Diagnostics::new();
    match loxwalk::run_source(&source, &mut diagnostics, stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretationError::CompileError) => ExitCode::from(EX_DATAERR),
        Err(InterpretationError::RuntimeError) => ExitCode::from(EX_SOFTWARE),
    }
}
