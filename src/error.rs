//! Provides [InterpretationError], the error that [crate::run_source] returns, plus the
//! finer-grained error and diagnostics types the pipeline stages use internally.
use std::fmt;

use thiserror::Error;

use crate::token::{Token, TokenKind};

/// Any error that can occur during interpretation.
///
/// This is deliberately coarse: by the time a caller sees one of these, the underlying
/// lexical, static, or runtime errors have already been reported through a
/// [Diagnostics] sink (to stderr, or to a REPL's error stream). The variant only tells
/// the driver which exit code to use.
#[derive(Debug, Error)]
pub enum InterpretationError {
    /// A lexical or static error: bad character, syntax error, or a resolver violation
    /// such as an invalid `return` or self-inheriting class.
    #[error("compile-time error")]
    CompileError,
    /// A runtime error, such as a type error or calling a non-callable value.
    #[error("runtime error")]
    RuntimeError,
}

/// A runtime error raised during evaluation, tied to the token whose evaluation failed.
///
/// Printed as the message followed by `[line: N]` on the next line, per the
/// external-interface error-reporting contract.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn undefined_variable(token: &Token) -> Self {
        RuntimeError::new(token, format!("Undefined variable '{}'.", token.lexeme))
    }

    pub fn not_a_number(operator: &Token) -> Self {
        RuntimeError::new(operator, "Operand must be a number.")
    }

    pub fn not_numbers(operator: &Token) -> Self {
        RuntimeError::new(operator, "Operands must be numbers.")
    }

    pub fn not_numbers_or_strings(operator: &Token) -> Self {
        RuntimeError::new(operator, "Expected either only number or string operands.")
    }

    pub fn not_callable(paren: &Token) -> Self {
        RuntimeError::new(paren, "Can only call functions and classes.")
    }

    pub fn wrong_arity(paren: &Token, expected: usize, got: usize) -> Self {
        RuntimeError::new(
            paren,
            format!("Expected {expected} arguments but got {got}."),
        )
    }

    pub fn not_an_instance(name: &Token) -> Self {
        RuntimeError::new(name, "Only instances have properties.")
    }

    pub fn undefined_property(name: &Token) -> Self {
        RuntimeError::new(name, format!("Undefined property '{}'.", name.lexeme))
    }

    pub fn superclass_not_a_class(keyword: &Token) -> Self {
        RuntimeError::new(keyword, "Superclass must be a class.")
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n[line: {}]", self.message, self.token.line)
    }
}

impl std::error::Error for RuntimeError {}

/// Accumulates lexical/parse and static-resolution diagnostics and reports them in the
/// `[line: N] Error<where>: <message>` format from the external-interface contract.
///
/// Grounded in the teacher's `Parser::error_at`/`had_error` bookkeeping, generalized past
/// the parser so the resolver shares the same sink and the same error flag.
#[derive(Default)]
pub struct Diagnostics {
    had_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn reset(&mut self) {
        self.had_error = false;
    }

    /// Reports an error at a line with no further location context.
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Reports an error at a specific token, rendering `where` as `" at end"` or
    /// `" at '<lexeme>'"` to match the teacher-idiom error reporter.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        let location = if token.kind == TokenKind::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.report(token.line, &location, message);
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        eprintln!("[line: {line}] Error{location}: {message}");
        self.had_error = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_clears_error_flag() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(1, "oops");
        assert!(diagnostics.had_error());
        diagnostics.reset();
        assert!(!diagnostics.had_error());
    }
}
