//! The interactive prompt: reads one line at a time, feeds it through [crate::run_source],
//! and persists history across sessions.
//!
//! Grounded in `original_source/lox/repl.py`'s `run_prompt`: a `.lox_history` file in the
//! current directory, a `"> "` prompt, and the error flag cleared between lines so one bad
//! line doesn't poison the rest of the session. `rustyline` stands in for `readline`.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::Diagnostics;

const HISTORY_FILE: &str = ".lox_history";
const PROMPT: &str = "> ";

/// Runs the REPL until EOF (Ctrl-D) or interrupt (Ctrl-C).
///
/// A runtime or compile error on one line is reported and the prompt continues; it does
/// not affect the process exit code, since there is no "file" for such an error to fail.
pub fn run() {
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");
    if editor.load_history(HISTORY_FILE).is_err() {
        log::debug!("no existing {HISTORY_FILE}, starting fresh");
    }

    let mut diagnostics = Diagnostics::new();
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                diagnostics.reset();
                let stdout = std::io::stdout();
                if let Err(err) = crate::run_source(&line, &mut diagnostics, stdout.lock()) {
                    log::debug!("line produced {err}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }

    if let Err(err) = editor.save_history(HISTORY_FILE) {
        log::warn!("could not write {HISTORY_FILE}: {err}");
    }
}
