//! This module contains the parser for LSL scripts.

use crate::ast::*;
use crate::strings::{StringError, StringPreprocessor};
use crate::ty::{BinOp, LslType, PostfixOp, PrefixOp};
use lazy_static::lazy_static;
use pest::iterators::{Pair, Pairs};
#[allow(deprecated)]
use pest::prec_climber::{Assoc, Operator, PrecClimber};
use pest::Parser;
use pest_derive::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[grammar = "lsl.pest"]
pub(crate) struct LslParser;

lazy_static! {
    // precedence and associativity follow the C operator table, which is
    // what the Linden compiler implements
    #[allow(deprecated)]
    static ref PREC_CLIMBER: PrecClimber<Rule> = {
        use self::Assoc::*;
        use self::Rule::*;

        PrecClimber::new(vec![
            Operator::new(Assign, Right) | Operator::new(AddAssign, Right) | Operator::new(SubAssign, Right)
                | Operator::new(MulAssign, Right) | Operator::new(DivAssign, Right) | Operator::new(ModAssign, Right),
            Operator::new(Or, Left),
            Operator::new(And, Left),
            Operator::new(BitOr, Left),
            Operator::new(BitXor, Left),
            Operator::new(BitAnd, Left),
            Operator::new(Eq, Left) | Operator::new(NotEq, Left),
            Operator::new(Lt, Left) | Operator::new(Le, Left) | Operator::new(Gt, Left) | Operator::new(Ge, Left),
            Operator::new(Shl, Left) | Operator::new(Shr, Left),
            Operator::new(Add, Left) | Operator::new(Sub, Left),
            Operator::new(Mul, Left) | Operator::new(Div, Left) | Operator::new(Mod, Left),
        ])
    };
}

/// A string-literal problem found during parsing, with the span of the
/// offending character.
#[derive(Debug, Clone)]
pub(crate) struct StringLitError {
    pub(crate) error: StringError,
    pub(crate) span: Span,
}

pub(crate) struct ParseOutput {
    pub(crate) script: Script,
    pub(crate) string_errors: Vec<StringLitError>,
}

struct ParseCtx<'a> {
    preprocessor: &'a dyn StringPreprocessor,
    string_errors: Vec<StringLitError>,
}

/// Transforms the textual representation of an LSL script into an AST.
/// All nodes carry `NodeId::DUMMY`; the id-assignment pass numbers them.
pub(crate) fn parse(
    content: &str,
    preprocessor: &dyn StringPreprocessor,
) -> Result<ParseOutput, Box<pest::error::Error<Rule>>> {
    let mut pairs = LslParser::parse(Rule::Script, content).map_err(Box::new)?;
    let mut ctx = ParseCtx { preprocessor, string_errors: Vec::new() };
    let mut script = Script::new();

    let script_pair = pairs.next().expect("Script rule always produces one pair");
    debug_assert!(script_pair.as_rule() == Rule::Script);
    for pair in script_pair.into_inner() {
        match pair.as_rule() {
            Rule::DefaultState => {
                let state = parse_state(&mut ctx, pair, true);
                // a second `default` is kept so the analysis can diagnose it
                if script.default_state.is_none() {
                    script.default_state = Some(state);
                } else {
                    script.states.push(state);
                }
            }
            Rule::StateDef => {
                let state = parse_state(&mut ctx, pair, false);
                script.states.push(state);
            }
            Rule::FunctionDef => {
                let function = parse_function(&mut ctx, pair);
                script.declarations.push(Declaration::Function(function));
            }
            Rule::VarDecl => {
                let (name, ty, initializer, span) = parse_var_decl(&mut ctx, pair);
                script.declarations.push(Declaration::Variable(GlobalVariable {
                    name,
                    ty,
                    initializer,
                    id: NodeId::DUMMY,
                    span,
                }));
            }
            Rule::EOI => {}
            _ => unreachable!("unexpected rule at script level: {:?}", pair.as_rule()),
        }
    }

    Ok(ParseOutput { script, string_errors: ctx.string_errors })
}

fn parse_state(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>, is_default: bool) -> State {
    let span = pair.as_span().into();
    let mut handlers = Vec::new();
    let mut name = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::KwDefault => name = Some(Ident::new("default".to_string(), inner.as_span().into())),
            Rule::KwState => {}
            Rule::Ident => name = Some(parse_ident(&inner)),
            Rule::EventHandler => handlers.push(parse_event_handler(ctx, inner)),
            _ => unreachable!("unexpected rule in state: {:?}", inner.as_rule()),
        }
    }
    State { name: name.expect("grammar guarantees a state name"), is_default, handlers, id: NodeId::DUMMY, span }
}

fn parse_event_handler(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> EventHandler {
    let span = pair.as_span().into();
    let mut inner = pair.into_inner();
    let name = parse_ident(&inner.next().expect("handler name"));
    let mut params = Vec::new();
    let mut body = None;
    for p in inner {
        match p.as_rule() {
            Rule::ParamList => params = parse_params(p),
            Rule::CodeScope => body = Some(parse_code_scope(ctx, p)),
            _ => unreachable!(),
        }
    }
    EventHandler { name, params, body: body.expect("grammar guarantees a body"), id: NodeId::DUMMY, span }
}

fn parse_function(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Function {
    let span = pair.as_span().into();
    let mut return_ty = None;
    let mut name = None;
    let mut params = Vec::new();
    let mut body = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::TypeName => return_ty = Some(parse_type_name(&p)),
            Rule::Ident => name = Some(parse_ident(&p)),
            Rule::ParamList => params = parse_params(p),
            Rule::CodeScope => body = Some(parse_code_scope(ctx, p)),
            _ => unreachable!(),
        }
    }
    Function {
        name: name.expect("grammar guarantees a function name"),
        return_ty,
        params,
        body: body.expect("grammar guarantees a body"),
        id: NodeId::DUMMY,
        span,
    }
}

fn parse_params(pair: Pair<'_, Rule>) -> Vec<Parameter> {
    pair.into_inner()
        .map(|param| {
            let span = param.as_span().into();
            let mut inner = param.into_inner();
            let ty = parse_type_name(&inner.next().expect("parameter type"));
            let name = parse_ident(&inner.next().expect("parameter name"));
            Parameter { name, ty, id: NodeId::DUMMY, span }
        })
        .collect()
}

fn parse_type_name(pair: &Pair<'_, Rule>) -> TypeName {
    let value = LslType::from_type_name(pair.as_str()).expect("grammar only matches valid type names");
    TypeName { value, id: NodeId::DUMMY, span: pair.as_span().into() }
}

fn parse_ident(pair: &Pair<'_, Rule>) -> Ident {
    Ident::new(pair.as_str().to_string(), pair.as_span().into())
}

fn parse_var_decl(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> (Ident, TypeName, Option<Expression>, Span) {
    let span = pair.as_span().into();
    let mut inner = pair.into_inner();
    let ty = parse_type_name(&inner.next().expect("declaration type"));
    let name = parse_ident(&inner.next().expect("declaration name"));
    let initializer = inner.next().map(|e| parse_expression(ctx, e));
    (name, ty, initializer, span)
}

fn parse_code_scope(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> CodeScope {
    let span = pair.as_span().into();
    let stmts = pair.into_inner().map(|s| parse_stmt(ctx, s)).collect();
    CodeScope { stmts, id: NodeId::DUMMY, span }
}

fn parse_stmt(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Stmt {
    debug_assert!(pair.as_rule() == Rule::Stmt);
    let span: Span = pair.as_span().into();
    let inner = pair.into_inner().next().expect("Stmt wraps exactly one alternative");
    let kind = match inner.as_rule() {
        Rule::CodeScope => StmtKind::Scope(parse_code_scope(ctx, inner)),
        Rule::VarDecl => {
            let (name, ty, initializer, decl_span) = parse_var_decl(ctx, inner);
            StmtKind::Decl(LocalVariable { name, ty, initializer, id: NodeId::DUMMY, span: decl_span })
        }
        Rule::IfStmt => {
            let mut condition = None;
            let mut branches = Vec::new();
            for p in inner.into_inner() {
                match p.as_rule() {
                    Rule::KwIf | Rule::KwElse => {}
                    Rule::Expr => condition = Some(parse_expression(ctx, p)),
                    Rule::Stmt => branches.push(parse_stmt(ctx, p)),
                    _ => unreachable!(),
                }
            }
            let mut branches = branches.into_iter();
            let then_branch = Box::new(branches.next().expect("grammar guarantees a then branch"));
            let else_branch = branches.next().map(Box::new);
            StmtKind::If { condition: condition.expect("grammar guarantees a condition"), then_branch, else_branch }
        }
        Rule::WhileStmt => {
            let mut inner = inner.into_inner();
            let _kw = inner.next();
            let condition = parse_expression(ctx, inner.next().expect("while condition"));
            let body = Box::new(parse_stmt(ctx, inner.next().expect("while body")));
            StmtKind::While { condition, body }
        }
        Rule::DoWhileStmt => {
            let mut body = None;
            let mut condition = None;
            for p in inner.into_inner() {
                match p.as_rule() {
                    Rule::KwDo | Rule::KwWhile => {}
                    Rule::Stmt => body = Some(Box::new(parse_stmt(ctx, p))),
                    Rule::Expr => condition = Some(parse_expression(ctx, p)),
                    _ => unreachable!(),
                }
            }
            StmtKind::DoWhile {
                body: body.expect("grammar guarantees a body"),
                condition: condition.expect("grammar guarantees a condition"),
            }
        }
        Rule::ForStmt => parse_for_stmt(ctx, inner),
        Rule::JumpStmt => {
            let ident = inner.into_inner().find(|p| p.as_rule() == Rule::Ident).expect("jump label");
            StmtKind::Jump(parse_ident(&ident))
        }
        Rule::LabelStmt => {
            let ident = inner.into_inner().find(|p| p.as_rule() == Rule::Ident).expect("label name");
            StmtKind::Label(parse_ident(&ident))
        }
        Rule::StateChangeStmt => {
            let target = inner.into_inner().find(|p| p.as_rule() == Rule::StateTarget).expect("state target");
            StmtKind::StateChange(Ident::new(target.as_str().to_string(), target.as_span().into()))
        }
        Rule::ReturnStmt => {
            let expr = inner.into_inner().find(|p| p.as_rule() == Rule::Expr).map(|e| parse_expression(ctx, e));
            StmtKind::Return(expr)
        }
        Rule::EmptyStmt => StmtKind::Empty,
        Rule::ExprStmt => {
            let expr = inner.into_inner().next().expect("expression statement body");
            StmtKind::Expr(parse_expression(ctx, expr))
        }
        _ => unreachable!("unexpected statement rule: {:?}", inner.as_rule()),
    };
    Stmt::new(kind, NodeId::DUMMY, span)
}

fn parse_for_stmt(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> StmtKind {
    let mut init = Vec::new();
    let mut condition = None;
    let mut afterthought = Vec::new();
    let mut body = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::KwFor => {}
            Rule::ForInit => {
                let list = p.into_inner().next().expect("init section wraps an expression list");
                init = list.into_inner().map(|e| parse_expression(ctx, e)).collect();
            }
            Rule::ForCond => {
                let expr = p.into_inner().next().expect("condition section wraps an expression");
                condition = Some(parse_expression(ctx, expr));
            }
            Rule::ForIter => {
                let list = p.into_inner().next().expect("iteration section wraps an expression list");
                afterthought = list.into_inner().map(|e| parse_expression(ctx, e)).collect();
            }
            Rule::Stmt => body = Some(Box::new(parse_stmt(ctx, p))),
            _ => unreachable!(),
        }
    }
    StmtKind::For { init, condition, afterthought, body: body.expect("grammar guarantees a body") }
}

fn parse_expression(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Expression {
    debug_assert!(pair.as_rule() == Rule::Expr);
    let span: Span = pair.as_span().into();
    build_expression_ast(ctx, pair.into_inner(), span)
}

#[allow(deprecated)]
fn build_expression_ast(ctx: &mut ParseCtx<'_>, pairs: Pairs<'_, Rule>, span: Span) -> Expression {
    PREC_CLIMBER.climb(
        pairs,
        |pair: Pair<'_, Rule>| build_unary_ast(ctx, pair),
        |lhs: Expression, op: Pair<'_, Rule>, rhs: Expression| {
            let span = Span { start: lhs.span.start, end: rhs.span.end };
            let kind = match op.as_rule() {
                Rule::Assign => ExpressionKind::Assign(Box::new(lhs), Box::new(rhs)),
                Rule::AddAssign => ExpressionKind::ModifyingAssign(BinOp::Add, Box::new(lhs), Box::new(rhs)),
                Rule::SubAssign => ExpressionKind::ModifyingAssign(BinOp::Sub, Box::new(lhs), Box::new(rhs)),
                Rule::MulAssign => ExpressionKind::ModifyingAssign(BinOp::Mul, Box::new(lhs), Box::new(rhs)),
                Rule::DivAssign => ExpressionKind::ModifyingAssign(BinOp::Div, Box::new(lhs), Box::new(rhs)),
                Rule::ModAssign => ExpressionKind::ModifyingAssign(BinOp::Mod, Box::new(lhs), Box::new(rhs)),
                rule => {
                    let op = match rule {
                        Rule::Add => BinOp::Add,
                        Rule::Sub => BinOp::Sub,
                        Rule::Mul => BinOp::Mul,
                        Rule::Div => BinOp::Div,
                        Rule::Mod => BinOp::Mod,
                        Rule::BitAnd => BinOp::BitAnd,
                        Rule::BitOr => BinOp::BitOr,
                        Rule::BitXor => BinOp::BitXor,
                        Rule::Shl => BinOp::Shl,
                        Rule::Shr => BinOp::Shr,
                        Rule::Eq => BinOp::Eq,
                        Rule::NotEq => BinOp::NotEq,
                        Rule::Lt => BinOp::Lt,
                        Rule::Le => BinOp::Le,
                        Rule::Gt => BinOp::Gt,
                        Rule::Ge => BinOp::Ge,
                        Rule::And => BinOp::And,
                        Rule::Or => BinOp::Or,
                        _ => unreachable!("unexpected binary operator: {:?}", rule),
                    };
                    ExpressionKind::Binary(op, Box::new(lhs), Box::new(rhs))
                }
            };
            Expression::new(kind, NodeId::DUMMY, span)
        },
    )
}

fn build_unary_ast(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Expression {
    debug_assert!(pair.as_rule() == Rule::UnaryExpr);
    let span: Span = pair.as_span().into();
    let mut prefixes: Vec<(Rule, Option<TypeName>)> = Vec::new();
    let mut operand = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::Inc | Rule::Dec | Rule::Neg | Rule::Not | Rule::Tilde => prefixes.push((p.as_rule(), None)),
            Rule::Cast => {
                let ty = parse_type_name(&p.into_inner().next().expect("cast type"));
                prefixes.push((Rule::Cast, Some(ty)));
            }
            Rule::PostfixExpr => operand = Some(build_postfix_ast(ctx, p)),
            _ => unreachable!(),
        }
    }
    let mut expr = operand.expect("grammar guarantees an operand");
    // innermost prefix applies first
    for (rule, cast_ty) in prefixes.into_iter().rev() {
        let kind = match rule {
            Rule::Inc => ExpressionKind::Prefix(PrefixOp::Increment, Box::new(expr)),
            Rule::Dec => ExpressionKind::Prefix(PrefixOp::Decrement, Box::new(expr)),
            Rule::Neg => ExpressionKind::Prefix(PrefixOp::Neg, Box::new(expr)),
            Rule::Not => ExpressionKind::Prefix(PrefixOp::Not, Box::new(expr)),
            Rule::Tilde => ExpressionKind::Prefix(PrefixOp::BitNot, Box::new(expr)),
            Rule::Cast => ExpressionKind::Cast(cast_ty.expect("cast carries a type"), Box::new(expr)),
            _ => unreachable!(),
        };
        expr = Expression::new(kind, NodeId::DUMMY, span);
    }
    expr
}

fn build_postfix_ast(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Expression {
    debug_assert!(pair.as_rule() == Rule::PostfixExpr);
    let span: Span = pair.as_span().into();
    let mut inner = pair.into_inner();
    let mut expr = build_primary_ast(ctx, inner.next().expect("primary expression"));
    for p in inner {
        let kind = match p.as_rule() {
            Rule::Inc => ExpressionKind::Postfix(Box::new(expr), PostfixOp::Increment),
            Rule::Dec => ExpressionKind::Postfix(Box::new(expr), PostfixOp::Decrement),
            Rule::Accessor => {
                let component = parse_ident(&p.into_inner().next().expect("component name"));
                ExpressionKind::Accessor(Box::new(expr), component)
            }
            _ => unreachable!(),
        };
        expr = Expression::new(kind, NodeId::DUMMY, span);
    }
    expr
}

fn build_primary_ast(ctx: &mut ParseCtx<'_>, pair: Pair<'_, Rule>) -> Expression {
    let span: Span = pair.as_span().into();
    let kind = match pair.as_rule() {
        Rule::Ident => ExpressionKind::Var(parse_ident(&pair)),
        Rule::FnCall => {
            let mut inner = pair.into_inner();
            let name = parse_ident(&inner.next().expect("call target"));
            let args = match inner.next() {
                Some(list) => list.into_inner().map(|e| parse_expression(ctx, e)).collect(),
                None => Vec::new(),
            };
            ExpressionKind::Call(name, args)
        }
        Rule::ParenExpr => {
            let inner = pair.into_inner().next().expect("parenthesized expression body");
            ExpressionKind::Paren(Box::new(parse_expression(ctx, inner)))
        }
        Rule::VecRotLit => {
            let components: Vec<Expression> = pair.into_inner().map(|e| parse_expression(ctx, e)).collect();
            match components.len() {
                3 => ExpressionKind::VectorLit(components),
                4 => ExpressionKind::RotationLit(components),
                n => unreachable!("grammar only matches 3 or 4 components, got {}", n),
            }
        }
        Rule::ListLit => {
            let elements = match pair.into_inner().next() {
                Some(list) => list.into_inner().map(|e| parse_expression(ctx, e)).collect(),
                None => Vec::new(),
            };
            ExpressionKind::ListLit(elements)
        }
        Rule::IntLit => {
            let raw = pair.as_str().to_string();
            let value = raw.parse::<i64>().unwrap_or(0);
            ExpressionKind::Lit(Literal { kind: LitKind::Int(value, raw), id: NodeId::DUMMY, span })
        }
        Rule::HexLit => {
            let raw = pair.as_str().to_string();
            let value = i64::from_str_radix(&raw[2..], 16).unwrap_or(0);
            ExpressionKind::Lit(Literal { kind: LitKind::Int(value, raw), id: NodeId::DUMMY, span })
        }
        Rule::FloatLit => {
            let raw = pair.as_str().to_string();
            let numeric = raw.trim_end_matches(|c| c == 'f' || c == 'F');
            let value = numeric.parse::<f64>().unwrap_or(0.0);
            ExpressionKind::Lit(Literal { kind: LitKind::Float(value, raw), id: NodeId::DUMMY, span })
        }
        Rule::StringLit => {
            let raw_with_quotes = pair.as_str();
            let raw = raw_with_quotes[1..raw_with_quotes.len() - 1].to_string();
            let value = match ctx.preprocessor.process(&raw) {
                Ok(processed) => processed,
                Err(errors) => {
                    for error in errors {
                        let at = span.start + 1 + error.offset;
                        ctx.string_errors.push(StringLitError {
                            error,
                            span: Span { start: at, end: at + 1 },
                        });
                    }
                    raw.clone()
                }
            };
            ExpressionKind::Lit(Literal { kind: LitKind::Str(value, raw), id: NodeId::DUMMY, span })
        }
        _ => unreachable!("unexpected rule when parsing primary expression: {:?}", pair.as_rule()),
    };
    Expression::new(kind, NodeId::DUMMY, span)
}

/// A comment extracted from the source, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub kind: CommentKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// Scans the raw source for comments. Separate from the grammar so the
/// parser can skip them while the driver still reports them in order.
pub(crate) fn extract_comments(content: &str) -> Vec<Comment> {
    #[derive(Clone, Copy)]
    enum Mode {
        Normal,
        InString { escaped: bool },
        Line { start: usize },
        Block { start: usize },
    }
    let mut comments = Vec::new();
    let mut mode = Mode::Normal;
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match mode {
            Mode::Normal => {
                if bytes[i] == b'"' {
                    mode = Mode::InString { escaped: false };
                } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    mode = Mode::Line { start: i };
                    i += 1;
                } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
                    mode = Mode::Block { start: i };
                    i += 1;
                }
            }
            Mode::InString { escaped } => {
                if escaped {
                    mode = Mode::InString { escaped: false };
                } else if bytes[i] == b'\\' {
                    mode = Mode::InString { escaped: true };
                } else if bytes[i] == b'"' {
                    mode = Mode::Normal;
                }
            }
            Mode::Line { start } => {
                if bytes[i] == b'\n' {
                    comments.push(Comment {
                        text: content[start..i].to_string(),
                        kind: CommentKind::Line,
                        span: Span { start, end: i },
                    });
                    mode = Mode::Normal;
                }
            }
            Mode::Block { start } => {
                if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    comments.push(Comment {
                        text: content[start..i + 2].to_string(),
                        kind: CommentKind::Block,
                        span: Span { start, end: i + 2 },
                    });
                    mode = Mode::Normal;
                    i += 1;
                }
            }
        }
        i += 1;
    }
    match mode {
        Mode::Line { start } => comments.push(Comment {
            text: content[start..].to_string(),
            kind: CommentKind::Line,
            span: Span { start, end: content.len() },
        }),
        Mode::Block { start } => comments.push(Comment {
            text: content[start..].to_string(),
            kind: CommentKind::Block,
            span: Span { start, end: content.len() },
        }),
        _ => {}
    }
    comments
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: String, span: Span) -> Ident {
        Ident { name, span }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Every node in the AST gets a unique id, represented by a 32bit unsigned integer.
/// The analysis phases use them to key side tables of facts about nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_u32(x: u32) -> NodeId {
        NodeId(x)
    }

    /// The parser initially gives all AST nodes this id; the id-assignment
    /// pass renumbers them to small consecutive values.
    pub const DUMMY: NodeId = NodeId(!0);
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A span marks a range in a file.
/// Start and end positions are *byte* offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn unknown() -> Span {
        Span { start: usize::max_value(), end: usize::max_value() }
    }
}

impl<'a> From<pest::Span<'a>> for Span {
    fn from(span: pest::Span<'a>) -> Self {
        Span { start: span.start(), end: span.end() }
    }
}

/// A mapper from `Span` to actual source code.
#[derive(Debug)]
pub struct SourceMapper {
    path: PathBuf,
    content: String,
    tab_size: usize,
}

#[derive(Debug, Eq, Ord)]
pub(crate) struct CodeLine {
    pub(crate) path: PathBuf,
    pub(crate) line_number: usize,
    pub(crate) column_number: usize,
    pub(crate) line: String,
    pub(crate) highlight: CharSpan,
}

impl PartialEq for CodeLine {
    fn eq(&self, rhs: &CodeLine) -> bool {
        (&self.path, self.line_number, self.column_number).eq(&(&rhs.path, rhs.line_number, rhs.column_number))
    }
}

impl PartialOrd for CodeLine {
    fn partial_cmp(&self, rhs: &CodeLine) -> Option<std::cmp::Ordering> {
        (&self.path, self.line_number, self.column_number).partial_cmp(&(&rhs.path, rhs.line_number, rhs.column_number))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct CharSpan {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl SourceMapper {
    pub fn new(path: PathBuf, content: &str) -> SourceMapper {
        SourceMapper { path, content: content.to_string(), tab_size: 4 }
    }

    pub fn with_tab_size(path: PathBuf, content: &str, tab_size: usize) -> SourceMapper {
        SourceMapper { path, content: content.to_string(), tab_size }
    }

    /// 1-based line and column of a byte offset. Tabs advance the column
    /// by the configured tab size.
    pub fn line_col(&self, byte: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, c) in self.content.char_indices() {
            if i >= byte {
                break;
            }
            match c {
                '\n' => {
                    line += 1;
                    col = 1;
                }
                '\t' => col += self.tab_size,
                _ => col += 1,
            }
        }
        (line, col)
    }

    pub(crate) fn get_line(&self, span: Span) -> Option<CodeLine> {
        if span == Span::unknown() {
            return None;
        }
        let mut byte_offset = 0;
        for (num, line) in self.content.split('\n').enumerate() {
            let line_end = byte_offset + line.len() + 1; // +1 for the newline character

            if span.start < line_end {
                if span.end > line_end {
                    // spans multiple lines; highlight only the first
                }
                let mut column = 0;
                let mut start: Option<usize> = None;
                let mut end: Option<usize> = None;
                let mut i = 0;
                for (index, _) in line.char_indices() {
                    i = index;
                    if index < span.start - byte_offset {
                        column += 1;
                    } else if index == span.start - byte_offset {
                        start = Some(index);
                    }
                    if byte_offset + index == span.end {
                        end = Some(index);
                        break;
                    }
                }
                let (start, end) = (start.unwrap_or(i), end.unwrap_or(line.len()));

                return Some(CodeLine {
                    path: self.path.clone(),
                    line_number: num + 1,
                    column_number: column + 1,
                    line: line.to_string(),
                    highlight: CharSpan { start, end },
                });
            }
            byte_offset = line_end;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::DefaultStringPreprocessor;

    fn parse_ok(source: &str) -> Script {
        let pp = DefaultStringPreprocessor::new();
        parse(source, &pp).unwrap_or_else(|e| panic!("{}", e)).script
    }

    #[test]
    fn parse_minimal_script() {
        let script = parse_ok("default { state_entry() { llOwnerSay(\"hi\"); } }");
        assert!(script.default_state.is_some());
        assert_eq!(script.default_state.as_ref().unwrap().handlers.len(), 1);
    }

    #[test]
    fn parse_globals_and_functions() {
        let script = parse_ok("integer g = 5;\nfloat helper(integer x) { return x * 1.5; }\ndefault { state_entry() {} }");
        assert_eq!(script.globals().count(), 1);
        assert_eq!(script.functions().count(), 1);
        let f = script.functions().next().unwrap();
        assert_eq!(f.name.name, "helper");
        assert_eq!(f.params.len(), 1);
    }

    #[test]
    fn parse_named_states() {
        let script = parse_ok(
            "default { state_entry() {} }\n\
             state armed { touch_start(integer n) {} }\n\
             state idle {}",
        );
        assert!(script.default_state.is_some());
        assert_eq!(script.states.len(), 2);
        assert_eq!(script.states[0].name.name, "armed");
        assert_eq!(script.states[0].handlers.len(), 1);
        assert_eq!(script.states[1].name.name, "idle");
        assert!(!script.states[0].is_default);
    }

    #[test]
    fn parse_keyword_boundary() {
        // `ifx` is an identifier, not the keyword `if`
        let script = parse_ok("default { state_entry() { integer ifx = 1; } }");
        assert!(script.default_state.is_some());
        assert!(parse("default { state_entry() { if(1) ; } }", &DefaultStringPreprocessor::new()).is_ok());
    }

    #[test]
    fn parse_precedence() {
        let script = parse_ok("default { state_entry() { integer x = 1 + 2 * 3; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        let init = match &handler.body.stmts[0].kind {
            StmtKind::Decl(local) => local.initializer.as_ref().unwrap(),
            _ => panic!("expected declaration"),
        };
        // 1 + (2 * 3)
        match &init.kind {
            ExpressionKind::Binary(crate::ty::BinOp::Add, _, rhs) => match &rhs.kind {
                ExpressionKind::Binary(crate::ty::BinOp::Mul, _, _) => {}
                other => panic!("expected multiplication on the right, got {:?}", other),
            },
            other => panic!("expected addition at the top, got {:?}", other),
        }
    }

    #[test]
    fn parse_vector_vs_comparison() {
        let script = parse_ok("default { state_entry() { vector v = <1, 2, 3>; integer b = 1 < 2; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        assert_eq!(handler.body.stmts.len(), 2);
    }

    #[test]
    fn parse_rotation_literal() {
        let script = parse_ok("default { state_entry() { rotation r = <0, 0, 0, 1>; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        let init = match &handler.body.stmts[0].kind {
            StmtKind::Decl(local) => local.initializer.as_ref().unwrap(),
            _ => panic!("expected declaration"),
        };
        match &init.kind {
            ExpressionKind::RotationLit(c) => assert_eq!(c.len(), 4),
            other => panic!("expected rotation literal, got {:?}", other),
        }
    }

    #[test]
    fn parse_for_sections() {
        let script =
            parse_ok("default { state_entry() { integer i; for (i = 0; i < 10; i++) llOwnerSay(\"x\"); } }");
        let handler = &script.default_state.unwrap().handlers[0];
        match &handler.body.stmts[1].kind {
            StmtKind::For { init, condition, afterthought, .. } => {
                assert_eq!(init.len(), 1);
                assert!(condition.is_some());
                assert_eq!(afterthought.len(), 1);
            }
            other => panic!("expected for statement, got {:?}", other),
        }
    }

    #[test]
    fn parse_for_empty_sections() {
        let script = parse_ok("default { state_entry() { for (;;) ; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        match &handler.body.stmts[0].kind {
            StmtKind::For { init, condition, afterthought, .. } => {
                assert!(init.is_empty());
                assert!(condition.is_none());
                assert!(afterthought.is_empty());
            }
            other => panic!("expected for statement, got {:?}", other),
        }
    }

    #[test]
    fn parse_state_change_and_labels() {
        let script = parse_ok(
            "default { touch_start(integer n) { jump skip; @skip; state other; } } state other { state_entry() {} }",
        );
        assert_eq!(script.states.len(), 1);
        let handler = &script.default_state.unwrap().handlers[0];
        assert!(matches!(handler.body.stmts[0].kind, StmtKind::Jump(_)));
        assert!(matches!(handler.body.stmts[1].kind, StmtKind::Label(_)));
        assert!(matches!(handler.body.stmts[2].kind, StmtKind::StateChange(_)));
    }

    #[test]
    fn parse_do_while() {
        let script = parse_ok("default { state_entry() { integer i; do i++; while (i < 3); } }");
        let handler = &script.default_state.unwrap().handlers[0];
        assert!(matches!(handler.body.stmts[1].kind, StmtKind::DoWhile { .. }));
    }

    #[test]
    fn parse_cast_chain() {
        let script = parse_ok("default { state_entry() { integer x = (integer)\"5\"; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        let init = match &handler.body.stmts[0].kind {
            StmtKind::Decl(local) => local.initializer.as_ref().unwrap(),
            _ => panic!("expected declaration"),
        };
        assert!(matches!(init.kind, ExpressionKind::Cast(..)));
    }

    #[test]
    fn parse_string_escapes() {
        let script = parse_ok("default { state_entry() { string s = \"a\\nb\"; } }");
        let handler = &script.default_state.unwrap().handlers[0];
        let init = match &handler.body.stmts[0].kind {
            StmtKind::Decl(local) => local.initializer.as_ref().unwrap(),
            _ => panic!("expected declaration"),
        };
        match &init.kind {
            ExpressionKind::Lit(l) => match &l.kind {
                LitKind::Str(value, raw) => {
                    assert_eq!(value, "a\nb");
                    assert_eq!(raw, "a\\nb");
                }
                other => panic!("expected string literal, got {:?}", other),
            },
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn parse_bad_syntax_is_err() {
        let pp = DefaultStringPreprocessor::new();
        assert!(parse("default { state_entry() { integer = 5; } }", &pp).is_err());
        assert!(parse("garbage", &pp).is_err());
        assert!(parse("default { state_entry() { x = ; } }", &pp).is_err());
    }

    #[test]
    fn extract_comment_stream() {
        let comments = extract_comments("// first\ninteger g; /* second */ default {} // \"not a string\"");
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].kind, CommentKind::Line);
        assert_eq!(comments[1].kind, CommentKind::Block);
        assert_eq!(comments[0].text, "// first");
        assert_eq!(comments[1].text, "/* second */");
    }

    #[test]
    fn comments_inside_strings_ignored() {
        let comments = extract_comments("string s = \"// not a comment\";");
        assert!(comments.is_empty());
    }

    #[test]
    fn mapper_line_col() {
        let mapper = SourceMapper::new(PathBuf::new(), "ab\ncd");
        assert_eq!(mapper.line_col(0), (1, 1));
        assert_eq!(mapper.line_col(4), (2, 2));
    }
}
