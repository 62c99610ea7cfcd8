//! Recursive-descent parser: a flat token list in, a statement list (the program's AST)
//! out. One token of lookahead throughout.

use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, NodeId, Stmt};
use crate::error::Diagnostics;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// The maximum number of parameters or arguments a function/call may have. Exceeding it
/// is reported but parsing continues (it is not a syntax error in the sense that needs
/// panic-mode recovery).
const MAX_ARGS: usize = 255;

/// Marks that an error was already reported through [Diagnostics]; callers propagate it
/// with `?` purely to unwind to the nearest recovery point (`synchronize`).
struct ParseError;

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_node_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            next_node_id: 0,
        }
    }

    /// Parses the whole token stream into a statement list. A parse error inside a
    /// declaration enters panic-mode recovery (`synchronize`) and parsing continues, so
    /// a single run can report more than one error.
    pub fn parse(mut self, diagnostics: &mut Diagnostics) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration(diagnostics) {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        statements
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    // declaration := classDecl | funDecl | varDecl | statement
    fn declaration(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        if self.match_kind(&[TokenKind::Class]) {
            return self.class_declaration(diagnostics);
        }
        if self.match_kind(&[TokenKind::Fun]) {
            return Ok(Stmt::Function(Rc::new(self.function("function", diagnostics)?)));
        }
        if self.match_kind(&[TokenKind::Var]) {
            return self.var_declaration(diagnostics);
        }
        self.statement(diagnostics)
    }

    // classDecl := "class" IDENT ( "<" IDENT )? "{" function* "}"
    fn class_declaration(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.", diagnostics)?;

        let superclass = if self.match_kind(&[TokenKind::Less]) {
            self.consume(TokenKind::Identifier, "Expect superclass name.", diagnostics)?;
            let name = self.previous().clone();
            Some(Expr::Variable { id: self.id(), name })
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.", diagnostics)?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method", diagnostics)?));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.", diagnostics)?;

        Ok(Stmt::ClassDecl {
            name,
            superclass,
            methods,
        })
    }

    // function := IDENT "(" params? ")" block
    fn function(&mut self, kind: &str, diagnostics: &mut Diagnostics) -> PResult<FunctionDecl> {
        let name = self.consume(
            TokenKind::Identifier,
            &format!("Expect {kind} name."),
            diagnostics,
        )?;
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {kind} name."),
            diagnostics,
        )?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error(self.peek().clone(), "Can't have more than 255 parameters.", diagnostics);
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.", diagnostics)?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.", diagnostics)?;
        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
            diagnostics,
        )?;
        let body = self.block(diagnostics)?;
        Ok(FunctionDecl {
            name,
            params,
            body: Rc::new(body),
        })
    }

    // varDecl := "var" IDENT ( "=" expression )? ";"
    fn var_declaration(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.", diagnostics)?;
        let initializer = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.expression(diagnostics)?)
        } else {
            None
        };
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
            diagnostics,
        )?;
        Ok(Stmt::VarStmt { name, initializer })
    }

    // statement := printStmt | block | ifStmt | whileStmt | forStmt | returnStmt | exprStmt
    fn statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        if self.match_kind(&[TokenKind::Print]) {
            return self.print_statement(diagnostics);
        }
        if self.match_kind(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block(diagnostics)?));
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_statement(diagnostics);
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_statement(diagnostics);
        }
        if self.match_kind(&[TokenKind::For]) {
            return self.for_statement(diagnostics);
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_statement(diagnostics);
        }
        self.expression_statement(diagnostics)
    }

    fn print_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        let value = self.expression(diagnostics)?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.", diagnostics)?;
        Ok(Stmt::PrintStmt(value))
    }

    fn expression_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        let value = self.expression(diagnostics)?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.", diagnostics)?;
        Ok(Stmt::ExpressionStmt(value))
    }

    // block := "{" declaration* "}"
    fn block(&mut self, diagnostics: &mut Diagnostics) -> PResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration(diagnostics) {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => {
                    self.synchronize();
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.", diagnostics)?;
        Ok(statements)
    }

    fn if_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.", diagnostics)?;
        let condition = self.expression(diagnostics)?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.", diagnostics)?;

        let then_branch = Box::new(self.statement(diagnostics)?);
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.statement(diagnostics)?))
        } else {
            None
        };

        Ok(Stmt::IfElse {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.", diagnostics)?;
        let condition = self.expression(diagnostics)?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.", diagnostics)?;
        let body = Box::new(self.statement(diagnostics)?);
        Ok(Stmt::WhileLoop { condition, body })
    }

    /// `for (init; cond; step) body` desugars to `{ init; while (cond) { body; step; } }`,
    /// with a missing condition replaced by literal `true`.
    fn for_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.", diagnostics)?;

        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.match_kind(&[TokenKind::Var]) {
            Some(self.var_declaration(diagnostics)?)
        } else {
            Some(self.expression_statement(diagnostics)?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            self.expression(diagnostics)?
        } else {
            Expr::Literal {
                id: self.id(),
                value: Value::Boolean(true),
            }
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.", diagnostics)?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression(diagnostics)?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.", diagnostics)?;

        let mut body = self.statement(diagnostics)?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::ExpressionStmt(increment)]);
        }
        body = Stmt::WhileLoop {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn return_statement(&mut self, diagnostics: &mut Diagnostics) -> PResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression(diagnostics)?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.", diagnostics)?;
        Ok(Stmt::ReturnStmt { keyword, value })
    }

    // expression := assignment
    fn expression(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        self.assignment(diagnostics)
    }

    // assignment := ( call "." )? IDENT "=" assignment | logic_or
    fn assignment(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let expr = self.logic_or(diagnostics)?;

        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment(diagnostics)?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.id(),
                    name,
                    value,
                }),
                Expr::Get { object, name, .. } => Ok(Expr::SetProp {
                    id: self.id(),
                    object,
                    name,
                    value,
                }),
                _ => {
                    self.error(equals, "Invalid assignment target.", diagnostics);
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.logic_and(diagnostics)?;
        while self.match_kind(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.logic_and(diagnostics)?;
            expr = Expr::Logical {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.equality(diagnostics)?;
        while self.match_kind(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality(diagnostics)?;
            expr = Expr::Logical {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.comparison(diagnostics)?;
        while self.match_kind(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison(diagnostics)?;
            expr = Expr::Binary {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.addition(diagnostics)?;
        while self.match_kind(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.addition(diagnostics)?;
            expr = Expr::Binary {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn addition(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.multiplication(diagnostics)?;
        while self.match_kind(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.multiplication(diagnostics)?;
            expr = Expr::Binary {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn multiplication(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.unary(diagnostics)?;
        while self.match_kind(&[TokenKind::Star, TokenKind::Slash]) {
            let operator = self.previous().clone();
            let right = self.unary(diagnostics)?;
            expr = Expr::Binary {
                id: self.id(),
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let inner = Box::new(self.unary(diagnostics)?);
            return Ok(Expr::Unary {
                id: self.id(),
                operator,
                inner,
            });
        }
        self.call(diagnostics)
    }

    // call := primary ( "(" args? ")" | "." IDENT )*
    fn call(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut expr = self.primary(diagnostics)?;
        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr, diagnostics)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.", diagnostics)?;
                expr = Expr::Get {
                    id: self.id(),
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    self.error(self.peek().clone(), "Can't have more than 255 arguments.", diagnostics);
                }
                args.push(self.expression(diagnostics)?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.", diagnostics)?;
        Ok(Expr::Call {
            id: self.id(),
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    // primary := "true"|"false"|"nil"|"this"|NUMBER|STRING|IDENT | "(" expression ")" | "super" "." IDENT
    fn primary(&mut self, diagnostics: &mut Diagnostics) -> PResult<Expr> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(Expr::Literal { id: self.id(), value: Value::Boolean(false) });
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(Expr::Literal { id: self.id(), value: Value::Boolean(true) });
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(Expr::Literal { id: self.id(), value: Value::Nil });
        }
        if self.match_kind(&[TokenKind::Number, TokenKind::StrLiteral]) {
            let value = self
                .previous()
                .literal
                .clone()
                .expect("scanner always attaches a literal to NUMBER/STRING tokens");
            return Ok(Expr::Literal { id: self.id(), value });
        }
        if self.match_kind(&[TokenKind::This]) {
            return Ok(Expr::ThisExpr {
                id: self.id(),
                keyword: self.previous().clone(),
            });
        }
        if self.match_kind(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'.", diagnostics)?;
            let method = self.consume(TokenKind::Identifier, "Expect superclass method name.", diagnostics)?;
            return Ok(Expr::SuperExpr {
                id: self.id(),
                keyword,
                method,
            });
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            return Ok(Expr::Variable {
                id: self.id(),
                name: self.previous().clone(),
            });
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let inner = Box::new(self.expression(diagnostics)?);
            self.consume(TokenKind::RightParen, "Expect ')' after expression.", diagnostics)?;
            return Ok(Expr::Grouping { id: self.id(), inner });
        }

        Err(self.error(self.peek().clone(), "Expect expression.", diagnostics))
    }

    /// Discards tokens until a statement boundary: after a `;`, or at the start of a
    /// token that begins a new declaration/statement.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str, diagnostics: &mut Diagnostics) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error(self.peek().clone(), message, diagnostics))
    }

    fn error(&self, token: Token, message: &str, diagnostics: &mut Diagnostics) -> ParseError {
        diagnostics.error_at(&token, message);
        ParseError
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);
        (statements, diagnostics.had_error())
    }

    #[test]
    fn parses_print_statement() {
        let (statements, had_error) = parse("print 1 + 2;");
        assert!(!had_error);
        assert_eq!(1, statements.len());
        assert!(matches!(statements[0], Stmt::PrintStmt(_)));
    }

    #[test]
    fn for_loop_desugars_to_block_containing_while() {
        let (statements, had_error) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!had_error);
        match &statements[0] {
            Stmt::Block(inner) => {
                assert_eq!(2, inner.len());
                assert!(matches!(inner[0], Stmt::VarStmt { .. }));
                assert!(matches!(inner[1], Stmt::WhileLoop { .. }));
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn assignment_target_must_be_an_lvalue() {
        let (_, had_error) = parse("1 = 2;");
        assert!(had_error);
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let (_, had_error) = parse("print 1");
        assert!(had_error);
    }

    #[test]
    fn class_with_superclass_parses() {
        let (statements, had_error) = parse("class B < A { show() { print 1; } }");
        assert!(!had_error);
        match &statements[0] {
            Stmt::ClassDecl { superclass, methods, .. } => {
                assert!(superclass.is_some());
                assert_eq!(1, methods.len());
            }
            other => panic!("expected a class decl, got {other:?}"),
        }
    }

    #[test]
    fn panic_mode_recovers_after_missing_semicolon() {
        let (statements, had_error) = parse("print 1 print 2;");
        assert!(had_error);
        // Recovery should still let the driver find the second statement.
        assert!(statements.iter().any(|s| matches!(s, Stmt::PrintStmt(_))));
    }
}
