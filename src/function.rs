//! User-defined callables: the closure-capturing value created by a `fun` statement or
//! a class method.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::value::{Callable, Value};

/// A user-defined function or method: its declaration, the environment captured at
/// creation time (giving it closure semantics), and whether it is a class initializer
/// (which always returns the bound `this`, regardless of its own `return` statements).
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Environment, is_initializer: bool) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn declaration(&self) -> &Rc<FunctionDecl> {
        &self.declaration
    }

    pub fn closure(&self) -> &Environment {
        &self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// Produces a new callable specialized to `instance`: a fresh environment enclosing
    /// this function's closure, with `this` defined in it. The initializer flag
    /// propagates to the bound method.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let env = self.closure.child();
        env.define("this", Value::Callable(Callable::Instance(instance)));
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}
