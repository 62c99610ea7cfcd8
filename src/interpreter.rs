//! The tree-walking evaluator: AST + side-table + environment chain → effects (`print`)
//! and internal values.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Expr, Stmt};
use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::function::LoxFunction;
use crate::resolver::Locals;
use crate::token::{Token, TokenKind};
use crate::value::{Callable, NativeFunction, Value};

/// The internal control-flow signal used in place of a language-level exception: a
/// `return` unwinds statement execution up to the call frame that caught it, carrying
/// its value along the way.
enum Unwind {
    Next,
    Return(Value),
}

/// Traverses the AST, consuming the resolver's side table ([Locals]). Globals and the
/// side table are owned by the top-level driver and passed in explicitly rather than
/// threaded implicitly through the resolver, per the global-state design.
pub struct Interpreter<W: Write> {
    globals: Environment,
    environment: Environment,
    locals: Locals,
    out: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(locals: Locals, out: W) -> Self {
        let globals = Environment::global();
        globals.define("clock", Value::Callable(Callable::Native(NativeFunction::Clock)));
        Interpreter {
            environment: globals.clone(),
            globals,
            locals,
            out,
        }
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Unwind, RuntimeError> {
        match stmt {
            Stmt::ExpressionStmt(expr) => {
                self.evaluate(expr)?;
                Ok(Unwind::Next)
            }
            Stmt::PrintStmt(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{value}").expect("write to output sink failed");
                Ok(Unwind::Next)
            }
            Stmt::VarStmt { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(Unwind::Next)
            }
            Stmt::Block(statements) => self.execute_block(statements, self.environment.child()),
            Stmt::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Unwind::Next)
                }
            }
            Stmt::WhileLoop { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Unwind::Next => {}
                        returning @ Unwind::Return(_) => return Ok(returning),
                    }
                }
                Ok(Unwind::Next)
            }
            Stmt::ReturnStmt { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Unwind::Return(value))
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), self.environment.clone(), false);
                self.environment.define(
                    decl.name.lexeme.clone(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Unwind::Next)
            }
            Stmt::ClassDecl {
                name,
                superclass,
                methods,
            } => self.execute_class_decl(name, superclass.as_ref(), methods),
        }
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<crate::ast::FunctionDecl>],
    ) -> Result<Unwind, RuntimeError> {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                let Value::Callable(Callable::Class(class)) = value else {
                    let keyword = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => unreachable!("the resolver only allows a Variable as a superclass"),
                    };
                    return Err(RuntimeError::superclass_not_a_class(keyword));
                };
                Some(class)
            }
            None => None,
        };

        self.environment.define(name.lexeme.clone(), Value::Nil);

        let previous_environment = self.environment.clone();
        if let Some(superclass) = &superclass_value {
            self.environment = self.environment.child();
            self.environment
                .define("super", Value::Callable(Callable::Class(Rc::clone(superclass))));
        }

        let mut method_map = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function = LoxFunction::new(Rc::clone(method), self.environment.clone(), is_initializer);
            method_map.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        self.environment = previous_environment;

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_map);
        self.environment
            .assign(name, Value::Callable(Callable::Class(Rc::new(class))))?;
        Ok(Unwind::Next)
    }

    /// Runs `statements` in `env`, restoring the previous environment on every exit path
    /// (normal completion, a `return`, or a propagating error).
    fn execute_block(&mut self, statements: &[Stmt], env: Environment) -> Result<Unwind, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in statements {
                match self.execute(stmt)? {
                    Unwind::Next => {}
                    returning @ Unwind::Return(_) => return Ok(returning),
                }
            }
            Ok(Unwind::Next)
        })();
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Grouping { inner, .. } => self.evaluate(inner),
            Expr::Unary { operator, inner, .. } => self.evaluate_unary(operator, inner),
            Expr::Binary {
                operator,
                left,
                right,
                ..
            } => self.evaluate_binary(operator, left, right),
            Expr::Logical {
                operator,
                left,
                right,
                ..
            } => self.evaluate_logical(operator, left, right),
            Expr::Variable { id, name } => self.look_up_variable(name, *id),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&depth) => self.environment.assign_at(depth, name, value.clone()),
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                args,
                ..
            } => self.evaluate_call(callee, paren, args),
            Expr::Get { object, name, .. } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Callable(Callable::Instance(instance)) => {
                        let value = instance.borrow().get(name, &instance)?;
                        Ok(value)
                    }
                    _ => Err(RuntimeError::not_an_instance(name)),
                }
            }
            Expr::SetProp {
                object,
                name,
                value,
                ..
            } => {
                let object = self.evaluate(object)?;
                let Value::Callable(Callable::Instance(instance)) = object else {
                    return Err(RuntimeError::not_an_instance(name));
                };
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }
            Expr::ThisExpr { id, keyword } => self.look_up_variable(keyword, *id),
            Expr::SuperExpr { id, method, .. } => self.evaluate_super(*id, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, inner: &Expr) -> Result<Value, RuntimeError> {
        let right = self.evaluate(inner)?;
        match operator.kind {
            TokenKind::Bang => Ok(Value::Boolean(!right.is_truthy())),
            TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::not_a_number(operator)),
            },
            _ => unreachable!("parser only produces Unary with '!' or '-'"),
        }
    }

    fn evaluate_binary(&mut self, operator: &Token, left: &Expr, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        use TokenKind::*;
        match (operator.kind, &left, &right) {
            (Minus, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),
            (Slash, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l / r)),
            (Star, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),
            (Plus, Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Plus, Value::String(l), Value::String(r)) => {
                Ok(Value::string(format!("{l}{r}")))
            }
            (Greater, Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l > r)),
            (GreaterEqual, Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l >= r)),
            (Less, Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l < r)),
            (LessEqual, Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l <= r)),
            (BangEqual, l, r) => Ok(Value::Boolean(l != r)),
            (EqualEqual, l, r) => Ok(Value::Boolean(l == r)),
            (Plus, _, _) => Err(RuntimeError::not_numbers_or_strings(operator)),
            (Greater | GreaterEqual | Less | LessEqual | Minus | Slash | Star, _, _) => {
                Err(RuntimeError::not_numbers(operator))
            }
            _ => unreachable!("parser only produces Binary with an arithmetic/comparison/equality operator"),
        }
    }

    fn evaluate_logical(&mut self, operator: &Token, left: &Expr, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        match (operator.kind, left.is_truthy()) {
            (TokenKind::Or, true) => Ok(left),
            (TokenKind::Or, false) => self.evaluate(right),
            (TokenKind::And, false) => Ok(left),
            (TokenKind::And, true) => self.evaluate(right),
            _ => unreachable!("parser only produces Logical with 'and' or 'or'"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;
        let args = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::not_callable(paren));
        };
        if matches!(callable, Callable::Instance(_)) {
            return Err(RuntimeError::not_callable(paren));
        }
        if args.len() != callable.arity() {
            return Err(RuntimeError::wrong_arity(paren, callable.arity(), args.len()));
        }
        self.call(callable, args)
    }

    fn call(&mut self, callable: Callable, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callable {
            Callable::Native(NativeFunction::Clock) => {
                let seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("system clock is before the epoch")
                    .as_secs();
                Ok(Value::Number(seconds as f64))
            }
            Callable::Function(function) => self.call_function(&function, args),
            Callable::Class(class) => self.construct(&class, args),
            Callable::Instance(_) => unreachable!("filtered out in evaluate_call"),
        }
    }

    fn call_function(&mut self, function: &Rc<LoxFunction>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = function.closure().child();
        for (param, arg) in function.declaration().params.iter().zip(args) {
            env.define(param.lexeme.clone(), arg);
        }
        let signal = self.execute_block(&function.declaration().body, env)?;
        if function.is_initializer() {
            return Ok(function.closure().get_at(0, "this"));
        }
        match signal {
            Unwind::Return(value) => Ok(value),
            Unwind::Next => Ok(Value::Nil),
        }
    }

    fn construct(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(std::cell::RefCell::new(crate::class::LoxInstance::new(Rc::clone(class))));
        if let Some(initializer) = class.find_method("init") {
            let bound = Rc::new(initializer.bind(Rc::clone(&instance)));
            self.call_function(&bound, args)?;
        }
        Ok(Value::Callable(Callable::Instance(instance)))
    }

    fn evaluate_super(&mut self, id: crate::ast::NodeId, method: &Token) -> Result<Value, RuntimeError> {
        let depth = *self
            .locals
            .get(&id)
            .expect("resolver always resolves a valid 'super' expression");
        let superclass = self.environment.get_at(depth, "super");
        let Value::Callable(Callable::Class(superclass)) = superclass else {
            unreachable!("'super' always resolves to a class value");
        };
        let instance = self.environment.get_at(depth - 1, "this");
        let Value::Callable(Callable::Instance(instance)) = instance else {
            unreachable!("'this' always resolves to an instance value one scope inside 'super'");
        };

        let found = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| RuntimeError::undefined_property(method))?;
        let bound = found.bind(instance);
        Ok(Value::Callable(Callable::Function(Rc::new(bound))))
    }

    /// Resolves `name` per the side table: a depth means "read at `(depth, name)`";
    /// absence means "this is a global reference".
    fn look_up_variable(&self, name: &Token, id: crate::ast::NodeId) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&depth) => Ok(self.environment.get_at(depth, &name.lexeme)),
            None => self.globals.get(name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> String {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error(), "unexpected static error");
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(locals, &mut out);
        interpreter.interpret(&statements).expect("unexpected runtime error");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert_eq!("3\n", run("print 1 + 2;"));
    }

    #[test]
    fn string_concatenation_and_redeclaration() {
        assert_eq!("hi!\n", run(r#"var a = "hi"; var a = a + "!"; print a;"#));
    }

    #[test]
    fn closures_capture_mutable_state() {
        let source = "fun make() { var x = 0; fun inc() { x = x + 1; return x; } return inc; } \
                       var c = make(); print c(); print c(); print c();";
        assert_eq!("1\n2\n3\n", run(source));
    }

    #[test]
    fn method_call_on_instance() {
        let source = r#"class Greet { hi(name) { print "Hello " + name; } } Greet().hi("world");"#;
        assert_eq!("Hello world\n", run(source));
    }

    #[test]
    fn initializer_runs_and_inherited_field_is_visible() {
        let source = "class A { init(v) { this.v = v; } } class B < A { show() { print this.v; } } B(42).show();";
        assert_eq!("42\n", run(source));
    }

    #[test]
    fn for_loop_desugaring_prints_expected_range() {
        assert_eq!("0\n1\n2\n", run("var i = 0; for (; i < 3; i = i + 1) print i;"));
    }

    #[test]
    fn short_circuit_or_returns_left_operand_untouched() {
        assert_eq!("1\n", run("print 1 or (1/0);"));
    }

    #[test]
    fn short_circuit_and_returns_left_operand_untouched() {
        assert_eq!("false\n", run("print false and (1/0);"));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("fun f(a) { return a; } f(1, 2);").scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(locals, &mut out);
        assert!(interpreter.interpret(&statements).is_err());
    }

    #[test]
    fn calling_a_number_is_a_runtime_error() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("var x = 1; x();").scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(locals, &mut out);
        assert!(interpreter.interpret(&statements).is_err());
    }

    #[test]
    fn mismatched_operand_types_are_a_runtime_error() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(r#""1" + 2;"#).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(locals, &mut out);
        assert!(interpreter.interpret(&statements).is_err());
    }
}
