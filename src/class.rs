//! Classes and instances: single inheritance, method lookup, and field storage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::function::LoxFunction;
use crate::token::Token;
use crate::value::{Callable, Value};

/// A class value. Its method map never changes after construction; methods are shared
/// by every instance, while instance fields are independent per instance.
#[derive(Debug)]
pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a method on this class, then walks the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods
            .get(name)
            .cloned()
            .or_else(|| self.superclass.as_ref().and_then(|sc| sc.find_method(name)))
    }

    /// A class is called like a function to construct an instance; its arity is its
    /// initializer's arity, or zero if it has none.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

/// An instance of a [LoxClass]: a class reference plus a mutable field map. Field maps
/// are independent per instance; aliasing two instance values observes the same fields
/// (identity equality, per the value model).
#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Looks up a field first, falling back to a method bound to `self_handle`. A miss
    /// on both is a runtime error ("Undefined property '<name>'.").
    pub fn get(
        &self,
        name: &Token,
        self_handle: &Rc<RefCell<LoxInstance>>,
    ) -> Result<Value, RuntimeError> {
        if let Some(value) = self.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(method) = self.class.find_method(&name.lexeme) {
            let bound = method.bind(Rc::clone(self_handle));
            return Ok(Value::Callable(Callable::Function(Rc::new(bound))));
        }
        Err(RuntimeError::undefined_property(name))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn class(name: &str) -> Rc<LoxClass> {
        Rc::new(LoxClass::new(name.to_string(), None, HashMap::new()))
    }

    #[test]
    fn fields_are_independent_per_instance() {
        let c = class("Point");
        let a = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&c))));
        let b = Rc::new(RefCell::new(LoxInstance::new(c)));
        a.borrow_mut()
            .set(&Token::new(crate::token::TokenKind::Identifier, "x", None, 1), Value::Number(1.0));
        assert!(b
            .borrow()
            .fields
            .get("x")
            .is_none());
    }

    #[test]
    fn find_method_walks_superclass_chain() {
        let mut base_methods = HashMap::new();
        let base_fn = Rc::new(LoxFunction::new(
            Rc::new(crate::ast::FunctionDecl {
                name: Token::new(crate::token::TokenKind::Identifier, "greet", None, 1),
                params: vec![],
                body: Rc::new(vec![]),
            }),
            crate::environment::Environment::global(),
            false,
        ));
        base_methods.insert("greet".to_string(), base_fn);
        let base = Rc::new(LoxClass::new("Base".to_string(), None, base_methods));
        let derived = LoxClass::new("Derived".to_string(), Some(base), HashMap::new());
        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }
}
