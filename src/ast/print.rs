//! This module contains `Display` implementations for the AST.
//!
//! Printing produces canonical source text: re-validating the output
//! yields a structurally equal tree, which is what the round-trip tests
//! rely on.

use super::*;
use std::fmt::{Display, Formatter, Result};

/// Writes out the joined vector `v`, enclosed by the given strings `pref` and `suff`.
pub(crate) fn write_delim_list<T: Display>(
    f: &mut Formatter<'_>,
    v: &[T],
    pref: &str,
    suff: &str,
    join: &str,
) -> Result {
    write!(f, "{}", pref)?;
    if let Some(e) = v.first() {
        write!(f, "{}", e)?;
        for b in &v[1..] {
            write!(f, "{}{}", join, b)?;
        }
    }
    write!(f, "{}", suff)?;
    Ok(())
}

fn write_indented(f: &mut Formatter<'_>, stmt: &Stmt, indent: usize) -> Result {
    let pad = "    ".repeat(indent);
    match &stmt.kind {
        StmtKind::Scope(scope) => write_scope(f, scope, indent),
        StmtKind::Decl(local) => {
            write!(f, "{}{} {}", pad, local.ty, local.name)?;
            if let Some(init) = &local.initializer {
                write!(f, " = {}", init)?;
            }
            writeln!(f, ";")
        }
        StmtKind::Expr(e) => writeln!(f, "{}{};", pad, e),
        StmtKind::If { condition, then_branch, else_branch } => {
            writeln!(f, "{}if ({})", pad, condition)?;
            write_indented(f, then_branch, indent + 1)?;
            if let Some(else_branch) = else_branch {
                writeln!(f, "{}else", pad)?;
                write_indented(f, else_branch, indent + 1)?;
            }
            Ok(())
        }
        StmtKind::While { condition, body } => {
            writeln!(f, "{}while ({})", pad, condition)?;
            write_indented(f, body, indent + 1)
        }
        StmtKind::DoWhile { body, condition } => {
            writeln!(f, "{}do", pad)?;
            write_indented(f, body, indent + 1)?;
            writeln!(f, "{}while ({});", pad, condition)
        }
        StmtKind::For { init, condition, afterthought, body } => {
            write!(f, "{}for (", pad)?;
            write_delim_list(f, init, "", "", ", ")?;
            write!(f, ";")?;
            if let Some(c) = condition {
                write!(f, " {}", c)?;
            }
            write!(f, ";")?;
            if !afterthought.is_empty() {
                write!(f, " ")?;
                write_delim_list(f, afterthought, "", "", ", ")?;
            }
            writeln!(f, ")")?;
            write_indented(f, body, indent + 1)
        }
        StmtKind::Jump(label) => writeln!(f, "{}jump {};", pad, label),
        StmtKind::Label(label) => writeln!(f, "{}@{};", pad, label),
        StmtKind::StateChange(target) => writeln!(f, "{}state {};", pad, target),
        StmtKind::Return(Some(e)) => writeln!(f, "{}return {};", pad, e),
        StmtKind::Return(None) => writeln!(f, "{}return;", pad),
        StmtKind::Empty => writeln!(f, "{};", pad),
    }
}

fn write_scope(f: &mut Formatter<'_>, scope: &CodeScope, indent: usize) -> Result {
    let pad = "    ".repeat(indent);
    writeln!(f, "{}{{", pad)?;
    for stmt in &scope.stmts {
        write_indented(f, stmt, indent + 1)?;
    }
    writeln!(f, "{}}}", pad)
}

impl Display for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for decl in &self.declarations {
            write!(f, "{}", decl)?;
        }
        if let Some(default_state) = &self.default_state {
            write!(f, "{}", default_state)?;
        }
        for state in &self.states {
            write!(f, "{}", state)?;
        }
        Ok(())
    }
}

impl Display for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Declaration::Variable(v) => write!(f, "{}", v),
            Declaration::Function(func) => write!(f, "{}", func),
        }
    }
}

impl Display for GlobalVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.ty, self.name)?;
        if let Some(init) = &self.initializer {
            write!(f, " = {}", init)?;
        }
        writeln!(f, ";")
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(ty) = &self.return_ty {
            write!(f, "{} ", ty)?;
        }
        write!(f, "{}", self.name)?;
        write_delim_list(f, &self.params, "(", ")", ", ")?;
        writeln!(f)?;
        write_scope(f, &self.body, 0)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.is_default {
            writeln!(f, "default")?;
        } else {
            writeln!(f, "state {}", self.name)?;
        }
        writeln!(f, "{{")?;
        for handler in &self.handlers {
            write!(f, "{}", handler)?;
        }
        writeln!(f, "}}")
    }
}

impl Display for EventHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "    {}", self.name)?;
        write_delim_list(f, &self.params, "(", ")", ", ")?;
        writeln!(f)?;
        write_scope(f, &self.body, 1)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.value)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_indented(f, self, 0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.kind {
            ExpressionKind::Lit(l) => write!(f, "{}", l),
            ExpressionKind::Var(name) => write!(f, "{}", name),
            ExpressionKind::Binary(op, lhs, rhs) => write!(f, "{} {} {}", lhs, op, rhs),
            // the space keeps `- -x` from reading back as a decrement
            ExpressionKind::Prefix(op, operand) => write!(f, "{} {}", op, operand),
            ExpressionKind::Postfix(operand, op) => write!(f, "{}{}", operand, op),
            ExpressionKind::Assign(lhs, rhs) => write!(f, "{} = {}", lhs, rhs),
            ExpressionKind::ModifyingAssign(op, lhs, rhs) => write!(f, "{} {}= {}", lhs, op, rhs),
            ExpressionKind::Call(name, args) => {
                write!(f, "{}", name)?;
                write_delim_list(f, args, "(", ")", ", ")
            }
            ExpressionKind::Cast(ty, operand) => write!(f, "({}){}", ty, operand),
            ExpressionKind::Paren(inner) => write!(f, "({})", inner),
            ExpressionKind::Accessor(base, component) => write!(f, "{}.{}", base, component),
            ExpressionKind::VectorLit(components) | ExpressionKind::RotationLit(components) => {
                write_delim_list(f, components, "<", ">", ", ")
            }
            ExpressionKind::ListLit(elements) => write_delim_list(f, elements, "[", "]", ", "),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.kind {
            LitKind::Int(_, raw) => write!(f, "{}", raw),
            LitKind::Float(_, raw) => write!(f, "{}", raw),
            LitKind::Str(_, raw) => write!(f, "\"{}\"", raw),
        }
    }
}
