//! The typed abstract syntax tree produced by the [parser](crate::parser).
//!
//! Expressions and statements are tagged variants (`enum`s) rather than a family of
//! structs implementing a shared "visitor" trait: matching on the tag replaces double
//! dispatch, and the resolver/evaluator each just walk the tree with a `match`.

use std::rc::Rc;

use crate::token::Token;
use crate::value::Value;

/// Identifies an [Expr] node for the resolver's side table, assigned once at parse time.
/// Using a small integer instead of the node's heap address means the side table survives
/// moving or cloning the tree, and needs no `unsafe` pointer games to key by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        id: NodeId,
        value: Value,
    },
    Unary {
        id: NodeId,
        operator: Token,
        inner: Box<Expr>,
    },
    Binary {
        id: NodeId,
        operator: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Grouping {
        id: NodeId,
        inner: Box<Expr>,
    },
    Variable {
        id: NodeId,
        name: Token,
    },
    Assign {
        id: NodeId,
        name: Token,
        value: Box<Expr>,
    },
    Logical {
        id: NodeId,
        operator: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        id: NodeId,
        callee: Box<Expr>,
        paren: Token,
        args: Vec<Expr>,
    },
    Get {
        id: NodeId,
        object: Box<Expr>,
        name: Token,
    },
    SetProp {
        id: NodeId,
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    ThisExpr {
        id: NodeId,
        keyword: Token,
    },
    SuperExpr {
        id: NodeId,
        keyword: Token,
        method: Token,
    },
}

impl Expr {
    /// The stable id used to key the resolver's side table. Every variant that can
    /// appear on the left of a variable reference (`Variable`, `Assign`, `ThisExpr`,
    /// `SuperExpr`) is resolved by this id; the rest carry one too, for uniformity.
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Grouping { id, .. }
            | Expr::Variable { id, .. }
            | Expr::Assign { id, .. }
            | Expr::Logical { id, .. }
            | Expr::Call { id, .. }
            | Expr::Get { id, .. }
            | Expr::SetProp { id, .. }
            | Expr::ThisExpr { id, .. }
            | Expr::SuperExpr { id, .. } => *id,
        }
    }
}

/// A function declaration's shared shape, used both for top-level `fun` statements and
/// for methods inside a `class` body.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    ExpressionStmt(Expr),
    PrintStmt(Expr),
    VarStmt {
        name: Token,
        initializer: Option<Expr>,
    },
    Block(Vec<Stmt>),
    Function(Rc<FunctionDecl>),
    IfElse {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    WhileLoop {
        condition: Expr,
        body: Box<Stmt>,
    },
    ReturnStmt {
        keyword: Token,
        value: Option<Expr>,
    },
    ClassDecl {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
