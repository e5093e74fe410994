//! This module contains the AST data structures for LSL scripts.
//!
//! The tree is purely syntactic; the analysis passes attach types,
//! expression categories, scope addresses and flow facts in side tables
//! keyed by `NodeId` (see `crate::analysis`).

pub(crate) mod print;

use crate::parse::{Ident, NodeId, Span};
use crate::ty::{BinOp, LslType, PostfixOp, PrefixOp};

/// The root of a parsed LSL script: globals and functions in declaration
/// order, the `default` state, and any named states.
#[derive(Debug, Default, Clone)]
pub struct Script {
    /// Globals and functions, interleaved as written.
    pub declarations: Vec<Declaration>,
    pub default_state: Option<State>,
    pub states: Vec<State>,
}

impl Script {
    pub fn new() -> Script {
        Script { declarations: Vec::new(), default_state: None, states: Vec::new() }
    }

    pub fn globals(&self) -> impl Iterator<Item = &GlobalVariable> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Variable(v) => Some(v),
            Declaration::Function(_) => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            Declaration::Variable(_) => None,
        })
    }
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Declaration {
    Variable(GlobalVariable),
    Function(Function),
}

/// A global variable declaration. The initializer, when present, must be a
/// static expression; the analysis enforces that.
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: Ident,
    pub ty: TypeName,
    pub initializer: Option<Expression>,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// A user-defined function. `return_ty` is `None` for void functions;
/// LSL has no spellable `void`.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub return_ty: Option<TypeName>,
    pub params: Vec<Parameter>,
    pub body: CodeScope,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

impl Function {
    pub fn return_type(&self) -> LslType {
        self.return_ty.as_ref().map_or(LslType::Void, |t| t.value)
    }
}

/// The `default` state or a named `state`.
#[derive(Debug, Clone)]
pub struct State {
    pub name: Ident,
    pub is_default: bool,
    pub handlers: Vec<EventHandler>,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// An event handler inside a state. The name must match a library-known
/// event and the parameter types its signature.
#[derive(Debug, Clone)]
pub struct EventHandler {
    pub name: Ident,
    pub params: Vec<Parameter>,
    pub body: CodeScope,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// A function or event handler parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Ident,
    pub ty: TypeName,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// A type annotation as written in source, with its position.
#[derive(Debug, Clone)]
pub struct TypeName {
    pub value: LslType,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// A braced statement list.
#[derive(Debug, Clone)]
pub struct CodeScope {
    pub stmts: Vec<Stmt>,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

/// A local variable declaration statement.
#[derive(Debug, Clone)]
pub struct LocalVariable {
    pub name: Ident,
    pub ty: TypeName,
    pub initializer: Option<Expression>,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

impl Stmt {
    pub(crate) fn new(kind: StmtKind, id: NodeId, span: Span) -> Stmt {
        Stmt { kind, id, span }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// A nested `{ ... }` scope.
    Scope(CodeScope),
    Decl(LocalVariable),
    Expr(Expression),
    /// `if (cond) stmt` with an optional else branch. An `else if` chain
    /// appears as a nested `If` in `else_branch`.
    If {
        condition: Expression,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expression,
        body: Box<Stmt>,
    },
    /// The condition of `do`-`while` runs after the body.
    DoWhile {
        body: Box<Stmt>,
        condition: Expression,
    },
    For {
        init: Vec<Expression>,
        condition: Option<Expression>,
        afterthought: Vec<Expression>,
        body: Box<Stmt>,
    },
    Jump(Ident),
    Label(Ident),
    /// `state target;`, only legal inside event handlers.
    StateChange(Ident),
    Return(Option<Expression>),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

impl Expression {
    pub(crate) fn new(kind: ExpressionKind, id: NodeId, span: Span) -> Expression {
        Expression { kind, id, span }
    }

    /// Whether the positions on this node refer to real source text.
    /// Synthetic nodes carry an unknown span.
    pub fn has_valid_source_range(&self) -> bool {
        self.span != Span::unknown()
    }
}

/// The syntactic forms of LSL expressions. Name references and calls are
/// resolved to user or library symbols during analysis, not here.
#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Lit(Literal),
    /// A bare name; resolves to a variable, parameter, or library constant.
    Var(Ident),
    Binary(BinOp, Box<Expression>, Box<Expression>),
    Prefix(PrefixOp, Box<Expression>),
    Postfix(Box<Expression>, PostfixOp),
    /// Plain `lhs = rhs`.
    Assign(Box<Expression>, Box<Expression>),
    /// Compound `lhs op= rhs`.
    ModifyingAssign(BinOp, Box<Expression>, Box<Expression>),
    /// `name(args...)`; resolves to a user function or a library overload.
    Call(Ident, Vec<Expression>),
    /// `(type)expr`.
    Cast(TypeName, Box<Expression>),
    Paren(Box<Expression>),
    /// `expr.component`, only legal on a variable reference.
    Accessor(Box<Expression>, Ident),
    /// `<x, y, z>`.
    VectorLit(Vec<Expression>),
    /// `<x, y, z, s>`.
    RotationLit(Vec<Expression>),
    /// `[e1, e2, ...]`.
    ListLit(Vec<Expression>),
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub kind: LitKind,
    pub(crate) id: NodeId,
    pub(crate) span: Span,
}

#[derive(Debug, Clone)]
pub enum LitKind {
    /// Decimal or hex integer. The raw text is kept for canonical printing.
    Int(i64, String),
    Float(f64, String),
    /// The processed string value (escapes applied) and the raw source
    /// form between the quotes.
    Str(String, String),
}

impl Literal {
    pub fn ty(&self) -> LslType {
        match self.kind {
            LitKind::Int(..) => LslType::Integer,
            LitKind::Float(..) => LslType::Float,
            LitKind::Str(..) => LslType::String,
        }
    }
}
