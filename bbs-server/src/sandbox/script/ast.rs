//! # AST
//!
//! The parse tree for the restricted scripting language remote apps are
//! authored in (§4.7d/e design notes). Deliberately small: no classes, no
//! `eval`, no reflection - what the grammar can express is the actual
//! enforcement mechanism, not a denylist bolted onto a general-purpose
//! language.
//!
//! Every node derives `Serialize`/`Deserialize` because the validated
//! `Program` is the payload `remote::remote_app::RemoteApp` sends across
//! the length-prefixed pipe to the `sandbox-runtime` child process
//! (§4.7e) - the AST itself is the wire format, not a re-parse of source
//! text on the other side.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Unary { op: UnOp, expr: Box<Expr> },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Field { target: Box<Expr>, name: String },
    Index { target: Box<Expr>, index: Box<Expr> },
    /// A function expression - the only way the grammar lets a function
    /// value appear as data (e.g. as a map field: `handleCommand: function(...) {...}`).
    /// There is deliberately no way to construct one from a string (no
    /// `eval`, no `new Function`) - this variant is the sole constructor.
    FunctionLit { params: Vec<String>, body: Vec<Stmt> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Let { name: String, value: Expr },
    Assign { name: String, value: Expr },
    ExprStmt(Expr),
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>> },
    Return(Option<Expr>),
    FunctionDecl { name: String, params: Vec<String>, body: Vec<Stmt> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
