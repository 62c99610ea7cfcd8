//! A tree-walking interpreter for [Lox][lox].
//!
//! See [part II][tree-walk] of [Crafting Interpreters][book].
//!
//! [book]: https://craftinginterpreters.com/
//! [tree-walk]: https://craftinginterpreters.com/a-tree-walk-interpreter.html
//! [lox]: https://craftinginterpreters.com/the-lox-language.html

pub mod ast;
pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod repl;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use std::io::Write;

use error::{Diagnostics, InterpretationError};
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// The type returned by [run_source] and the functions that build on it. This is the
/// standard [std::result::Result], but the error is always
/// [error::InterpretationError]. This type alias is generic for the return type, however.
///
/// ```
/// fn compile() -> loxwalk::Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, InterpretationError>;

/// Runs the pipeline — lex, parse, resolve, evaluate — used identically by the REPL and
/// by file-mode execution, so the two entry points cannot drift. Diagnostics from every
/// stage are reported through `diagnostics`; output from `print` statements is written
/// to `out`.
///
/// Errors discovered in an earlier stage suppress execution of later stages.
pub fn run_source(source: &str, diagnostics: &mut Diagnostics, out: impl Write) -> Result<()> {
    let tokens = Scanner::new(source).scan_tokens(diagnostics);
    log::trace!("scanned {} tokens", tokens.len());

    let statements = Parser::new(tokens).parse(diagnostics);
    log::debug!("parsed {} top-level statements", statements.len());

    let locals = Resolver::new(diagnostics).resolve(&statements);
    log::trace!("resolver produced {} side-table entries", locals.len());

    if diagnostics.had_error() {
        return Err(InterpretationError::CompileError);
    }

    let mut interpreter = Interpreter::new(locals, out);
    match interpreter.interpret(&statements) {
        Ok(()) => Ok(()),
        Err(runtime_error) => {
            eprintln!("{runtime_error}");
            Err(InterpretationError::RuntimeError)
        }
    }
}

/// Re-exports common items.
pub mod prelude {
    pub use crate::ast::{Expr, Stmt};
    pub use crate::error::InterpretationError;
    pub use crate::scanner::Scanner;
    pub use crate::token::{Token, TokenKind};
    pub use crate::value::Value;
}
