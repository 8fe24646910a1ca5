// AST node types for .pif interface files.
//
// Every node carries a `SimpleSpan` for error reporting during resolution.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

pub use crate::expr::BinOp;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete interface file: a sequence of newline-separated items.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub items: Vec<Item>,
    pub span: Span,
}

// ── Items ──

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// `param NAME: TYPE`
    Param(ParamDecl),
    /// `image NAME: TYPE[DIMS]`
    Image(ImageDecl),
    /// `output NAME: TYPE[DIMS]`
    Output(ImageDecl),
    /// `recv.method(args)` evaluated for its effect.
    Method(MethodCall),
    /// `show EXPR`
    Show(ExprAst),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: Ident,
    pub ty: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDecl {
    pub name: Ident,
    pub ty: Ident,
    pub dims: i64,
    pub dims_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub receiver: Ident,
    pub method: Ident,
    pub args: Vec<ExprAst>,
    pub span: Span,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAst {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    /// A declared parameter, a free variable, or the placeholder `_`.
    Name(Ident),
    /// `name(args)`: an image access, or an explicit cast when `name` is a
    /// type name.
    Call { callee: Ident, args: Vec<ExprAst> },
    /// `recv.method(args)` in value position, e.g. `input.width()`.
    Method(MethodCall),
    Neg(Box<ExprAst>),
    Binary {
        op: BinOp,
        lhs: Box<ExprAst>,
        rhs: Box<ExprAst>,
    },
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
