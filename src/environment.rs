//! The scope chain that realises lexical scoping and closure capture.
//!
//! Environments are reference-counted and interiorly mutable (`Rc<RefCell<_>>`) rather
//! than owned outright by their enclosing scope: a closure can keep an environment alive
//! long after the block that created it has exited, and a class's methods capture an
//! environment that may, transitively, point back at an instance holding those very
//! methods. Neither shape is expressible with exclusive ownership.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// A handle to one scope in the chain. Cloning an [Environment] clones the handle, not
/// the scope: both clones observe the same `define`/`assign` mutations.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl std::fmt::Debug for Environment {
    // Values can hold instances whose fields can hold closures over this very
    // environment, so a derived, recursive Debug would risk looping forever.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Environment(..)")
    }
}

impl Environment {
    /// The root of the chain: the global environment, with no enclosing scope.
    pub fn global() -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: None,
        })))
    }

    /// A fresh scope enclosing `self`, as created on block entry, function call, or
    /// method binding.
    pub fn child(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: Some(self.clone()),
        })))
    }

    /// Unconditional insert in this scope; redefining a name silently replaces it.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    /// Search this scope, then walk the enclosing chain; a miss is a runtime error at
    /// `token` ("Undefined variable '<name>'.").
    pub fn get(&self, token: &Token) -> Result<Value, RuntimeError> {
        let scope = self.0.borrow();
        if let Some(value) = scope.values.get(&token.lexeme) {
            return Ok(value.clone());
        }
        match &scope.enclosing {
            Some(enclosing) => enclosing.get(token),
            None => Err(RuntimeError::undefined_variable(token)),
        }
    }

    /// Find the nearest enclosing scope containing `name` and overwrite it; a miss is a
    /// runtime error.
    pub fn assign(&self, token: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut scope = self.0.borrow_mut();
        if scope.values.contains_key(&token.lexeme) {
            scope.values.insert(token.lexeme.clone(), value);
            return Ok(());
        }
        match &scope.enclosing {
            Some(enclosing) => enclosing.assign(token, value),
            None => Err(RuntimeError::undefined_variable(token)),
        }
    }

    /// Walk exactly `depth` enclosing links; at depth 0, returns `self`.
    pub fn ancestor(&self, depth: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..depth {
            let next = env
                .0
                .borrow()
                .enclosing
                .clone()
                .expect("resolver produced a depth deeper than the environment chain");
            env = next;
        }
        env
    }

    /// Read directly from the scope `depth` links up, by name. Used when the resolver
    /// has already produced a depth, so the name is known to be bound there.
    pub fn get_at(&self, depth: usize, name: &str) -> Value {
        self.ancestor(depth)
            .0
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Overwrite directly in the scope `depth` links up.
    pub fn assign_at(&self, depth: usize, token: &Token, value: Value) {
        self.ancestor(depth)
            .0
            .borrow_mut()
            .values
            .insert(token.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::TokenKind;

    fn ident(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name, None, 1)
    }

    #[test]
    fn define_then_get_in_same_scope() {
        let env = Environment::global();
        env.define("x", Value::Number(1.0));
        assert_eq!(Value::Number(1.0), env.get(&ident("x")).unwrap());
    }

    #[test]
    fn get_walks_enclosing_chain() {
        let global = Environment::global();
        global.define("x", Value::Number(1.0));
        let inner = global.child();
        assert_eq!(Value::Number(1.0), inner.get(&ident("x")).unwrap());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let env = Environment::global();
        assert!(env.get(&ident("missing")).is_err());
    }

    #[test]
    fn get_at_reads_exact_ancestor() {
        let global = Environment::global();
        global.define("x", Value::Number(1.0));
        let shadow = global.child();
        shadow.define("x", Value::Number(2.0));
        assert_eq!(Value::Number(2.0), shadow.get_at(0, "x"));
        assert_eq!(Value::Number(1.0), shadow.get_at(1, "x"));
    }

    #[test]
    fn closure_keeps_environment_alive_after_block_exit() {
        let global = Environment::global();
        let captured = {
            let block = global.child();
            block.define("x", Value::Number(42.0));
            block
        };
        assert_eq!(Value::Number(42.0), captured.get(&ident("x")).unwrap());
    }
}
