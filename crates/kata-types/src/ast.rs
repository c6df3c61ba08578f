//! AST node types for kata script.
//!
//! Every node carries a [`Span`] for error reporting.
//! Large recursive types are boxed to keep enum sizes reasonable.
//! Function definitions are reference-counted so closures can share them
//! without cloning bodies every time a function expression is evaluated.

use crate::Span;
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete script: a sequence of statements evaluated in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// `{ statements... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

/// A function definition shared by declarations, expressions, and arrows.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<Ident>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    /// Arrow functions do not bind their own `this`.
    pub is_arrow: bool,
    pub span: Span,
}

/// A parameter: `name`, `name = default`, or `...rest`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub default: Option<Expr>,
    pub rest: bool,
}

/// Function body: a block, or a single expression for `x => x * 2`.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    Expr(Box<Expr>),
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `function name(params) { body }` (hoisted)
    Function(Rc<FunctionDef>),
    /// `let x = 1, y`, `const z = 2`, `var w`
    Var(VarDecl),
    /// A bare expression; its value is the statement's completion value.
    Expr(ExprStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(WhileStmt),
    /// `for (init; test; update) body`
    For(ForStmt),
    /// `for (const x of iterable) body`
    ForOf(ForEachStmt),
    /// `for (const key in object) body`
    ForIn(ForEachStmt),
    Return(ReturnStmt),
    Break(Span),
    Continue(Span),
    Throw(ThrowStmt),
    Try(TryStmt),
    Block(Block),
    /// A lone `;`.
    Empty(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
    Var,
}

impl VarKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, VarKind::Const)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: Ident,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub test: Expr,
    pub consequent: Box<Stmt>,
    pub alternate: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    /// Either a `Stmt::Var` or a `Stmt::Expr`.
    pub init: Option<Box<Stmt>>,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// Shared shape of `for..of` and `for..in`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStmt {
    /// `None` when the loop assigns to an existing binding: `for (x of xs)`.
    pub kind: Option<VarKind>,
    pub binding: Ident,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

/// `try { } catch (e) { } finally { }`
#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub block: Block,
    pub param: Option<Ident>,
    pub handler: Option<Block>,
    pub finalizer: Option<Block>,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ── Literals ──
    Number(f64),
    Str(String),
    /// `` `a ${b} c` ``
    Template(Vec<TemplatePart>),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<ListItem>),
    Object(Vec<Property>),

    // ── Names ──
    Identifier(String),
    This,
    Function(Rc<FunctionDef>),

    // ── Access & Calls ──
    /// `object.property`
    Member {
        object: Box<Expr>,
        property: Ident,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ListItem>,
    },

    // ── Operators ──
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// `&&`, `||`, `??` (short-circuiting)
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    /// `target op= value`; `target` is an identifier, member, or index.
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `++x`, `x--`
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl ExprKind {
    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expr),
}

/// An array element or call argument, optionally spread.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Single(Expr),
    /// `...expr`
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// `key: value`, `key` (shorthand), or `key() { }`
    Field { key: PropertyKey, value: Expr },
    /// `...expr`
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    /// `[expr]: value`
    Computed(Expr),
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNotEq,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNotEq,
}

impl BinOp {
    /// Operator symbol for error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Less => "<",
            BinOp::Greater => ">",
            BinOp::LessEq => "<=",
            BinOp::GreaterEq => ">=",
            BinOp::LooseEq => "==",
            BinOp::LooseNotEq => "!=",
            BinOp::StrictEq => "===",
            BinOp::StrictNotEq => "!==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `typeof x`
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary(self) -> Option<BinOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
            AssignOp::Mod => Some(BinOp::Mod),
            AssignOp::Pow => Some(BinOp::Pow),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignable_kinds() {
        let span = Span::point(1, 1);
        let ident = Expr::new(ExprKind::Identifier("x".into()), span);
        assert!(ident.kind.is_assignable());
        let member = ExprKind::Member {
            object: Box::new(ident.clone()),
            property: Ident::new("y", span),
        };
        assert!(member.is_assignable());
        assert!(!ExprKind::Number(1.0).is_assignable());
        assert!(!ExprKind::Call {
            callee: Box::new(ident),
            args: vec![],
        }
        .is_assignable());
    }

    #[test]
    fn compound_assignment_maps_to_binary() {
        assert_eq!(AssignOp::Assign.binary(), None);
        assert_eq!(AssignOp::Add.binary(), Some(BinOp::Add));
        assert_eq!(AssignOp::Pow.binary(), Some(BinOp::Pow));
        assert_eq!(BinOp::StrictNotEq.as_str(), "!==");
    }

    #[test]
    fn const_is_immutable() {
        assert!(VarKind::Let.is_mutable());
        assert!(VarKind::Var.is_mutable());
        assert!(!VarKind::Const.is_mutable());
    }
}
