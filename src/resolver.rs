//! The static lexical-resolution pass: walks the AST once, pre-computing a scope depth
//! for every variable-carrying expression, and enforcing the static rules that don't
//! need runtime values to check (bad `return`, bad `this`/`super`, self-inheritance,
//! redeclaration in the same local scope).
//!
//! This walks `Expr`/`Stmt` with ordinary `match` rather than a separate
//! visitor-operation trait per node type: the AST is already a pair of sum types, so a
//! match arm per variant is the whole dispatch mechanism.

use std::collections::HashMap;

use crate::ast::{Expr, FunctionDecl, NodeId, Stmt};
use crate::error::Diagnostics;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Produces the `NodeId -> depth` side table the evaluator reads from. Owned by the
/// top-level driver, not by the resolver or the evaluator, per the global-state design.
pub type Locals = HashMap<NodeId, usize>;

pub struct Resolver<'d> {
    scopes: Vec<HashMap<String, bool>>,
    locals: Locals,
    current_function: FunctionType,
    current_class: ClassType,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            diagnostics,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Locals {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::ExpressionStmt(expr) | Stmt::PrintStmt(expr) => self.resolve_expr(expr),
            Stmt::VarStmt { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::WhileLoop { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::ReturnStmt { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics
                        .error_at(keyword, "Cannot return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.diagnostics
                            .error_at(keyword, "Cannot return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::ClassDecl {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: Option<&Expr>, methods: &[std::rc::Rc<FunctionDecl>]) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                self.diagnostics
                    .error_at(super_name, "A class cannot inherit from itself.");
            }
            self.current_class = ClassType::Subclass;
        }
        if let Some(superclass_expr) = superclass {
            self.resolve_expr(superclass_expr);
        }

        if superclass.is_some() {
            self.begin_scope();
            self.scopes.last_mut().unwrap().insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().insert("this".to_string(), true);

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Grouping { inner, .. } => self.resolve_expr(inner),
            Expr::Unary { inner, .. } => self.resolve_expr(inner),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics
                            .error_at(name, "Cannot read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::SetProp { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::ThisExpr { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.diagnostics
                        .error_at(keyword, "Cannot use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, "this");
            }
            Expr::SuperExpr { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => self
                        .diagnostics
                        .error_at(keyword, "Cannot use 'super' outside of a class."),
                    ClassType::Class => self
                        .diagnostics
                        .error_at(keyword, "Cannot use 'super' in a class with no superclass."),
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, "super");
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.locals.insert(id, depth);
                return;
            }
        }
        // No scope defines it: leave unresolved, meaning "look it up in globals".
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics.error_at(
                    name,
                    "Variable with this name has already been declared in this scope.",
                );
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (Locals, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        (locals, diagnostics.had_error())
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        let (_, had_error) = resolve("{ var x = x; }");
        assert!(had_error);
    }

    #[test]
    fn redeclaration_in_same_local_scope_is_an_error() {
        let (_, had_error) = resolve("{ var x = 1; var x = 2; }");
        assert!(had_error);
    }

    #[test]
    fn shadowing_across_scopes_is_fine() {
        let (_, had_error) = resolve("var x = 1; { var x = 2; }");
        assert!(!had_error);
    }

    #[test]
    fn top_level_return_is_an_error() {
        let (_, had_error) = resolve("return 1;");
        assert!(had_error);
    }

    #[test]
    fn return_value_from_initializer_is_an_error() {
        let (_, had_error) = resolve("class A { init() { return 1; } }");
        assert!(had_error);
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let (_, had_error) = resolve("print this;");
        assert!(had_error);
    }

    #[test]
    fn self_inheritance_is_an_error() {
        let (_, had_error) = resolve("class A < A {}");
        assert!(had_error);
    }

    #[test]
    fn resolved_depth_matches_lexical_distance() {
        let (locals, had_error) = resolve("{ var x = 1; { print x; } }");
        assert!(!had_error);
        assert_eq!(1, locals.values().copied().next().unwrap());
    }
}
