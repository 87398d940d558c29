//! The typed AST node tree. These types are produced only by
//! [`crate::decode`] from the external JSON representation; nothing in the
//! evaluator constructs them from source text.

use std::rc::Rc;

use crate::host::HostClassHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    USub,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Is,
    IsNot,
    Eq,
    Lt,
    LtE,
    Gt,
    GtE,
    NotEq,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// A decoded scalar literal. Numeric narrowing has already been
/// applied by the time this exists.
#[derive(Debug, Clone)]
pub enum Constant {
    None,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(Rc<str>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
}

/// One target of an `Assign`/`For`-loop binding; validated at decode time
/// to be a `Name`, `Attribute`, `Subscript`, or one level of `Tuple`
/// destructuring.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Attribute(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Expr>),
    Tuple(Vec<AssignTarget>),
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub exc_type: Option<String>,
    pub bind_name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: AssignTarget,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassDecorator {
    pub name: String,
    /// Only `frozen=True` on `@dataclass` is acted on; anything else is
    /// retained as opaque JSON.
    pub keywords: Vec<(String, serde_json::Value)>,
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant(Constant),
    Name(String),
    UnaryOp(UnaryOp, Box<Expr>),
    BinaryOp(Box<Expr>, BinOp, Box<Expr>),
    BoolOp(BoolOp, Vec<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    IfExpr(Box<Expr>, Box<Expr>, Box<Expr>),
    Attribute(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Expr>),
    Slice(Option<Box<Expr>>, Option<Box<Expr>>, Option<Box<Expr>>),
    Call(Box<Expr>, Vec<Expr>),
    TupleLit(Vec<Expr>),
    ListLit(Vec<Expr>),
    DictLit(Vec<Expr>, Vec<Expr>),
    ListComp(Box<Expr>, Comprehension),
    FormattedString(Vec<FStringPart>),
    Lambda(Lambda),
    /// A `JavaClass("fully.qualified.Name")` call, rewritten at decode
    /// time into a resolved host-class reference.
    HostClassMarker(HostClassHandle),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Module(Vec<Stmt>),
    StatementBlock(Vec<Stmt>),
    Assign(Vec<AssignTarget>, Expr),
    AugAssign(AssignTarget, BinOp, Expr),
    AnnAssign(AssignTarget, Option<Expr>),
    Delete(Vec<AssignTarget>),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    For(AssignTarget, Expr, Vec<Stmt>),
    While(Expr, Vec<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
    Raise(Option<Expr>),
    Try(Vec<Stmt>, Vec<ExceptHandler>, Vec<Stmt>, Vec<Stmt>),
    GlobalDecl(Vec<String>),
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        decorators: Vec<String>,
    },
    ClassDef {
        name: String,
        body: Vec<Stmt>,
        decorators: Vec<ClassDecorator>,
    },
    ExprStmt(Expr),
}
