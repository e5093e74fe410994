//! Type checking and expression categorization.
//!
//! Runs after name resolution. Every expression gets a type, a kind, and
//! the `constant`/`side_effects` properties, stored in a side table keyed
//! by `NodeId`. Expressions that fail a check land in an error set instead;
//! enclosing expressions propagate the failure without re-diagnosing it.

use crate::analysis::naming::{Declaration, NamingResult};
use crate::ast::*;
use crate::parse::NodeId;
use crate::reporting::{DiagnosticCode, Handler};
use crate::stdlib::{resolve_overload, FunctionSig, LibraryProvider, OverloadResolution};
use crate::ty::{
    binary_result, implicitly_convertible, explicitly_convertible, prefix_result, postfix_result, LslType, PrefixOp,
    TupleComponent,
};
use std::collections::{HashMap, HashSet};

/// The syntactic-semantic category of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Literal,
    ParenthesizedExpression,
    BinaryExpression,
    PrefixExpression,
    PostfixExpression,
    Assignment,
    ModifyingAssignment,
    FunctionCall,
    LibraryFunctionCall,
    TypecastExpression,
    VariableReference,
    LibraryConstantReference,
    VectorLiteral,
    RotationLiteral,
    ListLiteral,
    TupleAccessorExpression,
}

#[derive(Debug, Clone, Copy)]
pub struct ExprInfo {
    pub ty: LslType,
    pub kind: ExprKind,
    /// All subexpressions are literal or library-constant forms. Library
    /// function calls are never constant.
    pub constant: bool,
    /// Calls, assignments, and modifying prefix/postfix operations.
    pub side_effects: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TypeTable {
    pub(crate) exprs: HashMap<NodeId, ExprInfo>,
    /// Expressions that failed validation; they carry no entry in `exprs`.
    pub(crate) errors: HashSet<NodeId>,
    /// Library call site to the overload it resolved to.
    pub(crate) resolved_calls: HashMap<NodeId, FunctionSig>,
}

/// Which construct a condition expression belongs to; the diagnostics are
/// per construct.
#[derive(Debug, Clone, Copy)]
enum ConditionKind {
    If,
    ElseIf,
    While,
    DoWhile,
    For,
}

impl ConditionKind {
    fn code(self) -> DiagnosticCode {
        match self {
            ConditionKind::If => DiagnosticCode::IfConditionNotValidType,
            ConditionKind::ElseIf => DiagnosticCode::ElseIfConditionNotValidType,
            ConditionKind::While => DiagnosticCode::WhileLoopConditionNotValidType,
            ConditionKind::DoWhile => DiagnosticCode::DoLoopConditionNotValidType,
            ConditionKind::For => DiagnosticCode::ForLoopConditionNotValidType,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ConditionKind::If => "if",
            ConditionKind::ElseIf => "else if",
            ConditionKind::While => "while loop",
            ConditionKind::DoWhile => "do-while loop",
            ConditionKind::For => "for loop",
        }
    }
}

pub(crate) struct TypeAnalysis<'a> {
    handler: &'a Handler,
    provider: &'a LibraryProvider,
    naming: &'a NamingResult,
    table: TypeTable,
    /// Return type of the enclosing code area; `Void` in event handlers.
    current_return: LslType,
}

impl<'a> TypeAnalysis<'a> {
    pub(crate) fn new(provider: &'a LibraryProvider, naming: &'a NamingResult, handler: &'a Handler) -> Self {
        TypeAnalysis { handler, provider, naming, table: TypeTable::default(), current_return: LslType::Void }
    }

    pub(crate) fn check(mut self, script: &Script) -> TypeTable {
        for var in script.globals() {
            if let Some(init) = &var.initializer {
                let info = self.check_expression(init);
                self.check_static_initializer(init);
                if let Some(info) = info {
                    if !assignable(info.ty, var.ty.value) {
                        self.handler.error_with_span(
                            DiagnosticCode::TypeMismatchInVariableDeclaration,
                            &format!(
                                "cannot initialize {} `{}` with a value of type {}",
                                var.ty.value.type_name(),
                                var.name.name,
                                info.ty.type_name()
                            ),
                            init.span,
                            None,
                        );
                    }
                }
            }
        }
        for func in script.functions() {
            self.current_return = func.return_type();
            self.check_scope(&func.body);
        }
        self.current_return = LslType::Void;
        if let Some(state) = &script.default_state {
            self.check_state(state);
        }
        for state in &script.states {
            self.check_state(state);
        }
        self.table
    }

    fn check_state(&mut self, state: &State) {
        let mut seen: HashSet<&str> = HashSet::new();
        for handler_decl in &state.handlers {
            if !seen.insert(&handler_decl.name.name) {
                self.handler.error_with_span(
                    DiagnosticCode::RedefinedEventHandler,
                    &format!("event `{}` is handled more than once in state `{}`", handler_decl.name.name, state.name.name),
                    handler_decl.name.span,
                    None,
                );
            }
            self.check_event_signature(handler_decl);
            self.current_return = LslType::Void;
            self.check_scope(&handler_decl.body);
        }
    }

    fn check_event_signature(&mut self, handler_decl: &EventHandler) {
        let sig = match self.provider.lookup_event(&handler_decl.name.name) {
            Some(sig) => sig,
            None => {
                self.handler.error_with_span(
                    DiagnosticCode::UnknownEventHandlerDeclared,
                    &format!("`{}` is not a recognized event", handler_decl.name.name),
                    handler_decl.name.span,
                    None,
                );
                return;
            }
        };
        let declared: Vec<LslType> = handler_decl.params.iter().map(|p| p.ty.value).collect();
        let expected: Vec<LslType> = sig.params.iter().map(|p| p.ty).collect();
        if declared != expected {
            let expected_str =
                expected.iter().map(|t| t.type_name()).collect::<Vec<_>>().join(", ");
            self.handler.error_with_span(
                DiagnosticCode::IncorrectEventHandlerSignature,
                &format!("event `{}` takes parameters ({})", handler_decl.name.name, expected_str),
                handler_decl.span,
                None,
            );
        }
    }

    fn check_scope(&mut self, scope: &CodeScope) {
        for stmt in &scope.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Scope(scope) => self.check_scope(scope),
            StmtKind::Decl(local) => self.check_local(local),
            StmtKind::Expr(e) => {
                self.check_expression(e);
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.check_if(condition, then_branch, else_branch.as_deref(), ConditionKind::If)
            }
            StmtKind::While { condition, body } => {
                self.check_condition(condition, ConditionKind::While);
                self.check_branch(body);
            }
            StmtKind::DoWhile { body, condition } => {
                self.check_branch(body);
                self.check_condition(condition, ConditionKind::DoWhile);
            }
            StmtKind::For { init, condition, afterthought, body } => {
                init.iter().for_each(|e| {
                    self.check_expression(e);
                });
                match condition {
                    Some(condition) => self.check_condition(condition, ConditionKind::For),
                    // the grammar allows `for (;;)`; the language does not
                    None => self.handler.error_with_span(
                        DiagnosticCode::MissingConditionalExpression,
                        "for loop is missing its condition expression",
                        stmt.span,
                        None,
                    ),
                }
                afterthought.iter().for_each(|e| {
                    self.check_expression(e);
                });
                self.check_branch(body);
            }
            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),
            StmtKind::Jump(_) | StmtKind::Label(_) | StmtKind::StateChange(_) | StmtKind::Empty => {}
        }
    }

    fn check_if(&mut self, condition: &Expression, then_branch: &Stmt, else_branch: Option<&Stmt>, kind: ConditionKind) {
        self.check_condition(condition, kind);
        self.check_branch(then_branch);
        match else_branch.map(|s| (&s.kind, s)) {
            // an `else if` chain nests in the else branch
            Some((StmtKind::If { condition, then_branch, else_branch }, _)) => {
                self.check_if(condition, then_branch, else_branch.as_deref(), ConditionKind::ElseIf)
            }
            Some((_, stmt)) => self.check_branch(stmt),
            None => {}
        }
    }

    /// The body of a control or loop statement. A bare declaration without
    /// braces is forbidden.
    fn check_branch(&mut self, stmt: &Stmt) {
        if let StmtKind::Decl(local) = &stmt.kind {
            self.handler.error_with_span(
                DiagnosticCode::DefinedVariableInBracelessScope,
                &format!("cannot declare `{}` here without braces", local.name.name),
                stmt.span,
                None,
            );
            self.check_local(local);
        } else {
            self.check_stmt(stmt);
        }
    }

    fn check_local(&mut self, local: &LocalVariable) {
        if let Some(init) = &local.initializer {
            if let Some(info) = self.check_expression(init) {
                if !assignable(info.ty, local.ty.value) {
                    self.handler.error_with_span(
                        DiagnosticCode::TypeMismatchInVariableDeclaration,
                        &format!(
                            "cannot initialize {} `{}` with a value of type {}",
                            local.ty.value.type_name(),
                            local.name.name,
                            info.ty.type_name()
                        ),
                        init.span,
                        None,
                    );
                }
            }
        }
    }

    fn check_condition(&mut self, condition: &Expression, kind: ConditionKind) {
        if let Some(info) = self.check_expression(condition) {
            let valid = matches!(
                info.ty,
                LslType::Integer | LslType::Key | LslType::Vector | LslType::Rotation | LslType::List
            );
            if !valid {
                self.handler.error_with_span(
                    kind.code(),
                    &format!("{} is not a valid {} condition type", info.ty.type_name(), kind.describe()),
                    condition.span,
                    None,
                );
            }
        }
    }

    fn check_return(&mut self, stmt: &Stmt, value: Option<&Expression>) {
        match value {
            Some(e) => {
                let info = self.check_expression(e);
                if self.current_return == LslType::Void {
                    self.handler.error_with_span(
                        DiagnosticCode::ReturnedValueFromVoidFunction,
                        "cannot return a value here",
                        stmt.span,
                        None,
                    );
                } else if let Some(info) = info {
                    if !assignable(info.ty, self.current_return) {
                        self.handler.error_with_span(
                            DiagnosticCode::TypeMismatchInReturnValue,
                            &format!(
                                "returned {} where {} was expected",
                                info.ty.type_name(),
                                self.current_return.type_name()
                            ),
                            e.span,
                            None,
                        );
                    }
                }
            }
            None => {
                if self.current_return != LslType::Void {
                    self.handler.error_with_span(
                        DiagnosticCode::ReturnedVoidFromNonVoidFunction,
                        &format!("function must return a value of type {}", self.current_return.type_name()),
                        stmt.span,
                        None,
                    );
                }
            }
        }
    }

    fn check_expression(&mut self, expr: &Expression) -> Option<ExprInfo> {
        let info = self.compute_expression(expr);
        match info {
            Some(info) => {
                self.table.exprs.insert(expr.id, info);
            }
            None => {
                self.table.errors.insert(expr.id);
            }
        }
        info
    }

    fn compute_expression(&mut self, expr: &Expression) -> Option<ExprInfo> {
        match &expr.kind {
            ExpressionKind::Lit(lit) => Some(ExprInfo {
                ty: lit.ty(),
                kind: ExprKind::Literal,
                constant: true,
                side_effects: false,
            }),
            ExpressionKind::Var(_) => {
                let decl = self.naming.declarations.get(&expr.id)?;
                let ty = decl.var_type()?;
                let constant = matches!(decl, Declaration::LibraryConstant { .. });
                let kind = if constant { ExprKind::LibraryConstantReference } else { ExprKind::VariableReference };
                Some(ExprInfo { ty, kind, constant, side_effects: false })
            }
            ExpressionKind::Paren(inner) => {
                let info = self.check_expression(inner)?;
                Some(ExprInfo { kind: ExprKind::ParenthesizedExpression, ..info })
            }
            ExpressionKind::Binary(op, lhs, rhs) => {
                let l = self.check_expression(lhs);
                let r = self.check_expression(rhs);
                let (l, r) = (l?, r?);
                match binary_result(*op, l.ty, r.ty) {
                    Some(ty) => Some(ExprInfo {
                        ty,
                        kind: ExprKind::BinaryExpression,
                        constant: l.constant && r.constant,
                        side_effects: l.side_effects || r.side_effects,
                    }),
                    None => {
                        self.handler.error_with_span(
                            DiagnosticCode::InvalidBinaryOperation,
                            &format!(
                                "operator `{}` cannot be applied to {} and {}",
                                op,
                                l.ty.type_name(),
                                r.ty.type_name()
                            ),
                            expr.span,
                            None,
                        );
                        None
                    }
                }
            }
            ExpressionKind::Assign(lhs, rhs) => {
                let target = self.check_assign_target(lhs);
                let r = self.check_expression(rhs);
                let target_ty = target?;
                let r = r?;
                if !assignable(r.ty, target_ty) {
                    self.handler.error_with_span(
                        DiagnosticCode::InvalidBinaryOperation,
                        &format!("cannot assign {} to {}", r.ty.type_name(), target_ty.type_name()),
                        expr.span,
                        None,
                    );
                    return None;
                }
                Some(ExprInfo { ty: target_ty, kind: ExprKind::Assignment, constant: false, side_effects: true })
            }
            ExpressionKind::ModifyingAssign(op, lhs, rhs) => {
                let target = self.check_assign_target(lhs);
                let r = self.check_expression(rhs);
                let target_ty = target?;
                let r = r?;
                let ok = binary_result(*op, target_ty, r.ty).map_or(false, |result| assignable(result, target_ty));
                if !ok {
                    self.handler.error_with_span(
                        DiagnosticCode::InvalidBinaryOperation,
                        &format!(
                            "operator `{}=` cannot be applied to {} and {}",
                            op,
                            target_ty.type_name(),
                            r.ty.type_name()
                        ),
                        expr.span,
                        None,
                    );
                    return None;
                }
                Some(ExprInfo { ty: target_ty, kind: ExprKind::ModifyingAssignment, constant: false, side_effects: true })
            }
            ExpressionKind::Prefix(op, operand) => {
                let info = self.check_expression(operand);
                if op.is_modifying() && !self.is_modifiable(operand) {
                    self.handler.error_with_span(
                        DiagnosticCode::ModifyingPrefixOperationOnNonVariable,
                        &format!("`{}` needs a variable operand", op),
                        expr.span,
                        None,
                    );
                    return None;
                }
                let info = info?;
                match prefix_result(*op, info.ty) {
                    Some(ty) => Some(ExprInfo {
                        ty,
                        kind: ExprKind::PrefixExpression,
                        constant: info.constant && !op.is_modifying(),
                        side_effects: info.side_effects || op.is_modifying(),
                    }),
                    None => {
                        self.handler.error_with_span(
                            DiagnosticCode::InvalidPrefixOperation,
                            &format!("operator `{}` cannot be applied to {}", op, info.ty.type_name()),
                            expr.span,
                            None,
                        );
                        None
                    }
                }
            }
            ExpressionKind::Postfix(operand, op) => {
                let info = self.check_expression(operand);
                if !self.is_modifiable(operand) {
                    self.handler.error_with_span(
                        DiagnosticCode::PostfixOperationOnNonVariable,
                        &format!("`{}` needs a variable operand", op),
                        expr.span,
                        None,
                    );
                    return None;
                }
                let info = info?;
                match postfix_result(*op, info.ty) {
                    Some(ty) => {
                        Some(ExprInfo { ty, kind: ExprKind::PostfixExpression, constant: false, side_effects: true })
                    }
                    None => {
                        self.handler.error_with_span(
                            DiagnosticCode::InvalidPostfixOperation,
                            &format!("operator `{}` cannot be applied to {}", op, info.ty.type_name()),
                            expr.span,
                            None,
                        );
                        None
                    }
                }
            }
            ExpressionKind::Cast(target, operand) => {
                // `(integer)(float)x` is rejected by the reference compiler
                if matches!(operand.kind, ExpressionKind::Cast(..)) {
                    self.handler.error_with_span(
                        DiagnosticCode::CastOnCastExpression,
                        "cast applied directly to another cast",
                        expr.span,
                        Some("wrap the inner cast in parentheses"),
                    );
                    self.check_expression(operand);
                    return None;
                }
                let info = self.check_expression(operand)?;
                let to = target.value;
                let ok = info.ty == to || implicitly_convertible(info.ty, to) || explicitly_convertible(info.ty, to);
                if !ok {
                    self.handler.error_with_span(
                        DiagnosticCode::InvalidCastOperation,
                        &format!("cannot cast {} to {}", info.ty.type_name(), to.type_name()),
                        expr.span,
                        None,
                    );
                    return None;
                }
                Some(ExprInfo {
                    ty: to,
                    kind: ExprKind::TypecastExpression,
                    constant: info.constant,
                    side_effects: info.side_effects,
                })
            }
            ExpressionKind::Accessor(base, component) => self.check_accessor(expr, base, component),
            ExpressionKind::Call(name, args) => self.check_call(expr, name, args),
            ExpressionKind::VectorLit(comps) => self.check_tuple_literal(comps, LslType::Vector),
            ExpressionKind::RotationLit(comps) => self.check_tuple_literal(comps, LslType::Rotation),
            ExpressionKind::ListLit(elements) => {
                let infos: Vec<Option<ExprInfo>> = elements.iter().map(|e| self.check_expression(e)).collect();
                let mut failed = false;
                for (element, info) in elements.iter().zip(&infos) {
                    match info {
                        Some(info) if !info.ty.is_valid_list_content() => {
                            let message = if info.ty == LslType::List {
                                "a list cannot contain another list".to_string()
                            } else {
                                format!("{} is not a valid list element type", info.ty.type_name())
                            };
                            self.handler.error_with_span(
                                DiagnosticCode::InvalidListContent,
                                &message,
                                element.span,
                                None,
                            );
                            failed = true;
                        }
                        Some(_) => {}
                        None => failed = true,
                    }
                }
                if failed {
                    return None;
                }
                Some(ExprInfo {
                    ty: LslType::List,
                    kind: ExprKind::ListLiteral,
                    constant: infos.iter().all(|i| i.map_or(false, |i| i.constant)),
                    side_effects: infos.iter().any(|i| i.map_or(false, |i| i.side_effects)),
                })
            }
        }
    }

    fn check_tuple_literal(&mut self, comps: &[Expression], ty: LslType) -> Option<ExprInfo> {
        let code = if ty == LslType::Vector {
            DiagnosticCode::InvalidVectorContent
        } else {
            DiagnosticCode::InvalidRotationContent
        };
        let infos: Vec<Option<ExprInfo>> = comps.iter().map(|e| self.check_expression(e)).collect();
        let mut failed = false;
        for (comp, info) in comps.iter().zip(&infos) {
            match info {
                Some(info) if !assignable(info.ty, LslType::Float) => {
                    self.handler.error_with_span(
                        code,
                        &format!("{} component must be a float, found {}", ty.type_name(), info.ty.type_name()),
                        comp.span,
                        None,
                    );
                    failed = true;
                }
                Some(_) => {}
                None => failed = true,
            }
        }
        if failed {
            return None;
        }
        let kind = if ty == LslType::Vector { ExprKind::VectorLiteral } else { ExprKind::RotationLiteral };
        Some(ExprInfo {
            ty,
            kind,
            constant: infos.iter().all(|i| i.map_or(false, |i| i.constant)),
            side_effects: infos.iter().any(|i| i.map_or(false, |i| i.side_effects)),
        })
    }

    fn check_accessor(&mut self, expr: &Expression, base: &Expression, component: &crate::parse::Ident) -> Option<ExprInfo> {
        if !matches!(base.kind, ExpressionKind::Var(_)) {
            self.check_expression(base);
            self.handler.error_with_span(
                DiagnosticCode::InvalidTupleComponentAccessOperation,
                "component access is only allowed on a variable",
                expr.span,
                None,
            );
            return None;
        }
        let info = self.check_expression(base)?;
        if info.kind == ExprKind::LibraryConstantReference {
            self.handler.error_with_span(
                DiagnosticCode::TupleComponentAccessOnLibraryConstant,
                "cannot access a component of a library constant",
                expr.span,
                None,
            );
            return None;
        }
        let valid = TupleComponent::from_name(&component.name).map_or(false, |c| c.valid_on(info.ty));
        if !valid {
            self.handler.error_with_span(
                DiagnosticCode::InvalidTupleComponentAccessOperation,
                &format!("{} has no component `{}`", info.ty.type_name(), component.name),
                component.span,
                None,
            );
            return None;
        }
        Some(ExprInfo { ty: LslType::Float, kind: ExprKind::TupleAccessorExpression, constant: false, side_effects: false })
    }

    fn check_call(&mut self, expr: &Expression, name: &crate::parse::Ident, args: &[Expression]) -> Option<ExprInfo> {
        let infos: Vec<Option<ExprInfo>> = args.iter().map(|a| self.check_expression(a)).collect();
        let decl = self.naming.declarations.get(&expr.id)?.clone();
        match decl {
            Declaration::Function { name: fn_name } => {
                let finfo = &self.naming.functions[&fn_name];
                let (return_ty, param_types) = (finfo.return_ty, finfo.param_types.clone());
                if args.len() != param_types.len() {
                    self.handler.error_with_span(
                        DiagnosticCode::ImproperParameterCountInFunctionCall,
                        &format!("`{}` takes {} argument(s), {} given", fn_name, param_types.len(), args.len()),
                        expr.span,
                        None,
                    );
                    return None;
                }
                let mut failed = false;
                for ((arg, info), &param_ty) in args.iter().zip(&infos).zip(&param_types) {
                    match info {
                        Some(info) if !assignable(info.ty, param_ty) => {
                            self.handler.error_with_span(
                                DiagnosticCode::ParameterTypeMismatchInFunctionCall,
                                &format!("expected {}, found {}", param_ty.type_name(), info.ty.type_name()),
                                arg.span,
                                None,
                            );
                            failed = true;
                        }
                        Some(_) => {}
                        None => failed = true,
                    }
                }
                if failed {
                    return None;
                }
                Some(ExprInfo { ty: return_ty, kind: ExprKind::FunctionCall, constant: false, side_effects: true })
            }
            Declaration::LibraryFunction { name: fn_name } => {
                let arg_types: Option<Vec<LslType>> = infos.iter().map(|i| i.map(|i| i.ty)).collect();
                let arg_types = arg_types?;
                let candidates = self.provider.lookup_functions(&fn_name);
                let chosen = match resolve_overload(&candidates, &arg_types) {
                    OverloadResolution::Match(sig) => sig.clone(),
                    OverloadResolution::Ambiguous(_) => {
                        self.handler.error_with_span(
                            DiagnosticCode::CallToOverloadedLibraryFunctionIsAmbiguous,
                            &format!("call to overloaded library function `{}` is ambiguous", fn_name),
                            expr.span,
                            None,
                        );
                        return None;
                    }
                    OverloadResolution::NoMatch => {
                        self.diagnose_unmatched_call(expr, name, args, &infos, &candidates);
                        return None;
                    }
                };
                let return_ty = chosen.return_ty;
                self.table.resolved_calls.insert(expr.id, chosen);
                Some(ExprInfo { ty: return_ty, kind: ExprKind::LibraryFunctionCall, constant: false, side_effects: true })
            }
            _ => None,
        }
    }

    /// No overload accepted the call. With a single candidate the arity or
    /// the offending argument gets a precise diagnostic; with several, the
    /// whole call is flagged.
    fn diagnose_unmatched_call(
        &mut self,
        expr: &Expression,
        name: &crate::parse::Ident,
        args: &[Expression],
        infos: &[Option<ExprInfo>],
        candidates: &[&FunctionSig],
    ) {
        if candidates.len() != 1 {
            self.handler.error_with_span(
                DiagnosticCode::NoSuitableLibraryFunctionOverloadFound,
                &format!("no overload of `{}` matches these arguments", name.name),
                expr.span,
                None,
            );
            return;
        }
        let sig = candidates[0];
        let concrete = sig.concrete_param_count();
        let arity_ok = match sig.variadic_param() {
            None => args.len() == concrete,
            Some(_) => args.len() >= concrete,
        };
        if !arity_ok {
            self.handler.error_with_span(
                DiagnosticCode::ImproperParameterCountInFunctionCall,
                &format!("`{}` takes {} argument(s), {} given", name.name, concrete, args.len()),
                expr.span,
                None,
            );
            return;
        }
        for (i, (arg, info)) in args.iter().zip(infos).enumerate() {
            let target = if i < concrete { sig.params[i].ty } else { sig.variadic_param().map_or(LslType::Void, |p| p.ty) };
            if target == LslType::Void {
                continue;
            }
            if let Some(info) = info {
                if !assignable(info.ty, target) {
                    self.handler.error_with_span(
                        DiagnosticCode::ParameterTypeMismatchInFunctionCall,
                        &format!("expected {}, found {}", target.type_name(), info.ty.type_name()),
                        arg.span,
                        None,
                    );
                }
            }
        }
    }

    /// A modifiable lvalue: a reference to a user variable, or a vector or
    /// rotation component of one.
    fn is_modifiable(&self, expr: &Expression) -> bool {
        match &expr.kind {
            ExpressionKind::Var(_) => {
                self.naming.declarations.get(&expr.id).map_or(false, Declaration::is_user_variable)
            }
            ExpressionKind::Accessor(base, _) => self.is_modifiable(base),
            _ => false,
        }
    }

    /// The assignment target of `=` and `op=`. Returns the target's type
    /// when it is a legal lvalue.
    fn check_assign_target(&mut self, lhs: &Expression) -> Option<LslType> {
        let info = self.check_expression(lhs);
        match &lhs.kind {
            ExpressionKind::Var(_) => {
                let info = info?;
                if info.kind == ExprKind::LibraryConstantReference {
                    self.handler.error_with_span(
                        DiagnosticCode::ModifiedLibraryConstant,
                        "cannot assign to a library constant",
                        lhs.span,
                        None,
                    );
                    return None;
                }
                Some(info.ty)
            }
            // accessor validity (including the library-constant case) is
            // checked by the accessor itself
            ExpressionKind::Accessor(..) => info.map(|i| i.ty),
            _ => {
                self.handler.error_with_span(
                    DiagnosticCode::AssignmentToNonassignableExpression,
                    "this expression cannot be assigned to",
                    lhs.span,
                    None,
                );
                None
            }
        }
    }

    /// Static-context rules for global initializers: only literal forms,
    /// names, and unary minus on numeric literals are allowed.
    fn check_static_initializer(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Lit(_) | ExpressionKind::Var(_) => {}
            ExpressionKind::Binary(_, lhs, rhs)
            | ExpressionKind::Assign(lhs, rhs)
            | ExpressionKind::ModifyingAssign(_, lhs, rhs) => {
                self.handler.error_with_span(
                    DiagnosticCode::BinaryOperatorInStaticContext,
                    "binary operators are not allowed in a global initializer",
                    expr.span,
                    None,
                );
                self.check_static_initializer(lhs);
                self.check_static_initializer(rhs);
            }
            ExpressionKind::Paren(inner) => {
                self.handler.error_with_span(
                    DiagnosticCode::ParenthesizedExpressionInStaticContext,
                    "parentheses are not allowed in a global initializer",
                    expr.span,
                    None,
                );
                self.check_static_initializer(inner);
            }
            ExpressionKind::Postfix(inner, _) => {
                self.handler.error_with_span(
                    DiagnosticCode::PostfixOperationInStaticContext,
                    "postfix operators are not allowed in a global initializer",
                    expr.span,
                    None,
                );
                self.check_static_initializer(inner);
            }
            ExpressionKind::Cast(_, inner) => {
                self.handler.error_with_span(
                    DiagnosticCode::CastExpressionInStaticContext,
                    "casts are not allowed in a global initializer",
                    expr.span,
                    None,
                );
                self.check_static_initializer(inner);
            }
            ExpressionKind::Call(..) => {
                self.handler.error_with_span(
                    DiagnosticCode::CallToFunctionInStaticContext,
                    "function calls are not allowed in a global initializer",
                    expr.span,
                    None,
                );
            }
            ExpressionKind::Accessor(base, _) => {
                // component access never appears in the static grammar
                self.handler.error_with_span(
                    DiagnosticCode::PostfixOperationInStaticContext,
                    "component access is not allowed in a global initializer",
                    expr.span,
                    None,
                );
                self.check_static_initializer(base);
            }
            ExpressionKind::Prefix(op, operand) => {
                match (op, &operand.kind) {
                    (PrefixOp::Neg, ExpressionKind::Lit(lit)) if lit.ty() != LslType::String => {}
                    (PrefixOp::Neg, ExpressionKind::VectorLit(_)) => {
                        self.handler.error_with_span(
                            DiagnosticCode::NegateOperationOnVectorLiteralInStaticContext,
                            "cannot negate a vector literal in a global initializer",
                            expr.span,
                            Some("negate each component instead"),
                        );
                    }
                    (PrefixOp::Neg, ExpressionKind::RotationLit(_)) => {
                        self.handler.error_with_span(
                            DiagnosticCode::NegateOperationOnRotationLiteralInStaticContext,
                            "cannot negate a rotation literal in a global initializer",
                            expr.span,
                            Some("negate each component instead"),
                        );
                    }
                    (PrefixOp::Neg, ExpressionKind::Var(_)) => {
                        self.handler.error_with_span(
                            DiagnosticCode::PrefixOperationOnGlobalVariableInStaticContext,
                            "cannot negate a variable in a global initializer",
                            expr.span,
                            None,
                        );
                    }
                    _ => {
                        self.handler.error_with_span(
                            DiagnosticCode::InvalidPrefixOperationUsedInStaticContext,
                            &format!("operator `{}` is not allowed in a global initializer", op),
                            expr.span,
                            None,
                        );
                    }
                }
                self.check_static_initializer(operand);
            }
            ExpressionKind::VectorLit(comps) | ExpressionKind::RotationLit(comps) => {
                let code = if matches!(expr.kind, ExpressionKind::VectorLit(_)) {
                    DiagnosticCode::InvalidVectorContent
                } else {
                    DiagnosticCode::InvalidRotationContent
                };
                for comp in comps {
                    if !is_static_numeric_literal(comp) {
                        self.handler.error_with_span(
                            code,
                            "components must be numeric literals in a global initializer",
                            comp.span,
                            None,
                        );
                    }
                }
            }
            ExpressionKind::ListLit(elements) => {
                for element in elements {
                    if !is_static_list_element(element) {
                        self.handler.error_with_span(
                            DiagnosticCode::InvalidListContent,
                            "list elements must be literals in a global initializer",
                            element.span,
                            None,
                        );
                    }
                }
            }
        }
    }
}

fn assignable(from: LslType, to: LslType) -> bool {
    from == to || implicitly_convertible(from, to)
}

fn is_static_numeric_literal(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Lit(lit) => lit.ty() == LslType::Integer || lit.ty() == LslType::Float,
        ExpressionKind::Prefix(PrefixOp::Neg, inner) => is_static_numeric_literal(inner),
        _ => false,
    }
}

fn is_static_list_element(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Lit(_) => true,
        ExpressionKind::Prefix(PrefixOp::Neg, inner) => is_static_numeric_literal(inner),
        ExpressionKind::VectorLit(comps) | ExpressionKind::RotationLit(comps) => {
            comps.iter().all(is_static_numeric_literal)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::id_assignment::assign_ids;
    use crate::analysis::naming::NamingAnalysis;
    use crate::parse::SourceMapper;
    use crate::strings::DefaultStringPreprocessor;
    use std::path::PathBuf;

    fn run(source: &str) -> (TypeTable, Handler) {
        let mut script = crate::parse::parse(source, &DefaultStringPreprocessor::new())
            .unwrap_or_else(|e| panic!("{}", e))
            .script;
        assign_ids(&mut script);
        let handler = Handler::new(SourceMapper::new(PathBuf::new(), source));
        let provider = crate::stdlib::LibraryProvider::embedded(&["lsl", "ossl"]);
        let naming = NamingAnalysis::new(&provider, &handler).check(&script);
        let table = TypeAnalysis::new(&provider, &naming, &handler).check(&script);
        (table, handler)
    }

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        run(source).1.emitted_codes()
    }

    #[test]
    fn clean_script_has_no_errors() {
        let (table, handler) = run(
            "integer g = 2;\nfloat half(integer x) { return x / 2.0; }\n\
             default { touch_start(integer n) { llOwnerSay((string)((integer)half(g + n))); } }",
        );
        assert!(!handler.contains_error());
        assert!(table.errors.is_empty());
    }

    #[test]
    fn integer_widens_to_float() {
        assert!(codes("default { state_entry() { float f = 3; } }").is_empty());
    }

    #[test]
    fn string_and_key_interconvert() {
        assert!(codes("default { state_entry() { key k = \"abc\"; string s = k; } }").is_empty());
    }

    #[test]
    fn declaration_type_mismatch() {
        assert_eq!(
            codes("default { state_entry() { integer x = \"no\"; } }"),
            vec![DiagnosticCode::TypeMismatchInVariableDeclaration]
        );
    }

    #[test]
    fn invalid_binary_operation() {
        assert_eq!(
            codes("default { state_entry() { string s = \"a\" - \"b\"; } }"),
            vec![DiagnosticCode::InvalidBinaryOperation]
        );
    }

    #[test]
    fn dot_product_types() {
        assert!(codes("default { state_entry() { float f = <1,2,3> * <4,5,6>; vector c = <1,2,3> % <4,5,6>; } }")
            .is_empty());
    }

    #[test]
    fn list_concatenation() {
        assert!(codes("default { state_entry() { list l = [1] + \"x\"; l = 2.5 + l; } }").is_empty());
    }

    #[test]
    fn list_cannot_nest() {
        assert_eq!(
            codes("default { state_entry() { list l = [[1]]; } }"),
            vec![DiagnosticCode::InvalidListContent]
        );
    }

    #[test]
    fn condition_types() {
        assert!(codes("default { state_entry() { key k; if (k) llOwnerSay(\"y\"); } }").is_empty());
        assert_eq!(
            codes("default { state_entry() { float f; if (f) llOwnerSay(\"y\"); } }"),
            vec![DiagnosticCode::IfConditionNotValidType]
        );
        assert_eq!(
            codes("default { state_entry() { float f; if (1) ; else if (f) ; } }"),
            vec![DiagnosticCode::ElseIfConditionNotValidType]
        );
        assert_eq!(
            codes("default { state_entry() { string s; while (s) ; } }"),
            vec![DiagnosticCode::WhileLoopConditionNotValidType]
        );
        assert_eq!(
            codes("default { state_entry() { integer i; for (i = 0;; i++) ; } }"),
            vec![DiagnosticCode::MissingConditionalExpression]
        );
        assert!(codes("default { state_entry() { integer i; for (i = 0; i < 3; i++) ; } }").is_empty());
    }

    #[test]
    fn braceless_declaration() {
        assert_eq!(
            codes("default { state_entry() { if (1) integer x = 2; } }"),
            vec![DiagnosticCode::DefinedVariableInBracelessScope]
        );
    }

    #[test]
    fn return_rules() {
        assert_eq!(
            codes("f() { return 1; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::ReturnedValueFromVoidFunction]
        );
        assert_eq!(
            codes("integer f() { return; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::ReturnedVoidFromNonVoidFunction]
        );
        assert_eq!(
            codes("integer f() { return \"x\"; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::TypeMismatchInReturnValue]
        );
        assert_eq!(
            codes("default { state_entry() { return 1; } }"),
            vec![DiagnosticCode::ReturnedValueFromVoidFunction]
        );
    }

    #[test]
    fn assignment_targets() {
        assert_eq!(
            codes("default { state_entry() { 1 = 2; } }"),
            vec![DiagnosticCode::AssignmentToNonassignableExpression]
        );
        assert_eq!(
            codes("default { state_entry() { PI = 3.0; } }"),
            vec![DiagnosticCode::ModifiedLibraryConstant]
        );
        assert!(codes("default { state_entry() { vector v; v.x = 1.0; v.x += 2; } }").is_empty());
    }

    #[test]
    fn modifying_operators_need_variables() {
        assert_eq!(
            codes("default { state_entry() { ++3; } }"),
            vec![DiagnosticCode::ModifyingPrefixOperationOnNonVariable]
        );
        assert_eq!(
            codes("default { state_entry() { 3++; } }"),
            vec![DiagnosticCode::PostfixOperationOnNonVariable]
        );
    }

    #[test]
    fn accessor_rules() {
        assert_eq!(
            codes("default { state_entry() { float x = ZERO_VECTOR.x; } }"),
            vec![DiagnosticCode::TupleComponentAccessOnLibraryConstant]
        );
        assert_eq!(
            codes("default { state_entry() { vector v; float f = v.s; } }"),
            vec![DiagnosticCode::InvalidTupleComponentAccessOperation]
        );
        assert!(codes("default { state_entry() { rotation r; float f = r.s; } }").is_empty());
    }

    #[test]
    fn cast_rules() {
        assert!(codes("default { state_entry() { integer i = (integer)\"42\"; string s = (string)[1,2]; } }")
            .is_empty());
        assert_eq!(
            codes("default { state_entry() { vector v = (vector)1; } }"),
            vec![DiagnosticCode::InvalidCastOperation]
        );
        assert_eq!(
            codes("default { state_entry() { integer i = (integer)(float)\"1\"; } }"),
            vec![DiagnosticCode::CastOnCastExpression]
        );
        assert!(codes("default { state_entry() { integer i = (integer)((float)\"1\"); } }").is_empty());
        // only the enumerated casts exist; there is no boxing cast into a
        // list and no float-to-string cast
        assert_eq!(
            codes("default { state_entry() { list l = (list)5; } }"),
            vec![DiagnosticCode::InvalidCastOperation]
        );
        assert_eq!(
            codes("default { state_entry() { string s = (string)1.5; } }"),
            vec![DiagnosticCode::InvalidCastOperation]
        );
    }

    #[test]
    fn user_function_calls() {
        assert_eq!(
            codes("f(integer a) {}\ndefault { state_entry() { f(1, 2); } }"),
            vec![DiagnosticCode::ImproperParameterCountInFunctionCall]
        );
        assert_eq!(
            codes("f(integer a) {}\ndefault { state_entry() { f(\"x\"); } }"),
            vec![DiagnosticCode::ParameterTypeMismatchInFunctionCall]
        );
    }

    #[test]
    fn library_call_diagnostics() {
        // single candidate: precise argument diagnostic
        assert_eq!(
            codes("default { state_entry() { llAbs(\"x\"); } }"),
            vec![DiagnosticCode::ParameterTypeMismatchInFunctionCall]
        );
        // two overloads, neither takes these argument types
        assert_eq!(
            codes("default { state_entry() { key k; osNpcSay(k, k, \"hi\"); } }"),
            vec![DiagnosticCode::NoSuitableLibraryFunctionOverloadFound]
        );
    }

    #[test]
    fn overload_resolution_records_choice() {
        let (table, handler) =
            run("default { state_entry() { osNpcSay(NULL_KEY, 0, \"hi\"); } }");
        assert!(!handler.contains_error());
        let chosen = table.resolved_calls.values().next().expect("one resolved call");
        assert_eq!(chosen.params.len(), 3);
    }

    #[test]
    fn variadic_library_call() {
        let source = r#"<LSLLibraryData>
            <LibraryFunction Name="modSendCommand" ReturnType="key" Subsets="os-mod-api">
                <Parameter Name="module" Type="string"/>
                <Parameter Name="command" Type="string"/>
                <Parameter Name="args" Type="void" Variadic="true"/>
            </LibraryFunction>
            <SupportedEventHandler Name="state_entry" Subsets="os-mod-api"/>
        </LSLLibraryData>"#;
        let provider =
            crate::stdlib::LibraryProvider::from_xml(source, &["os-mod-api"], crate::stdlib::FilterMode::Live).unwrap();
        let script_source = "default { state_entry() { modSendCommand(\"mod\", \"cmd\", 1, <1,2,3>, \"x\"); } }";
        let mut script =
            crate::parse::parse(script_source, &DefaultStringPreprocessor::new()).unwrap().script;
        assign_ids(&mut script);
        let handler = Handler::new(SourceMapper::new(PathBuf::new(), script_source));
        let naming = NamingAnalysis::new(&provider, &handler).check(&script);
        TypeAnalysis::new(&provider, &naming, &handler).check(&script);
        assert!(!handler.contains_error());
    }

    #[test]
    fn event_handler_checks() {
        assert_eq!(
            codes("default { no_such_event() {} }"),
            vec![DiagnosticCode::UnknownEventHandlerDeclared]
        );
        assert_eq!(
            codes("default { touch_start(string s) {} }"),
            vec![DiagnosticCode::IncorrectEventHandlerSignature]
        );
        assert_eq!(
            codes("default { state_entry() {} state_entry() {} }"),
            vec![DiagnosticCode::RedefinedEventHandler]
        );
    }

    #[test]
    fn static_context_violations() {
        assert_eq!(
            codes("integer x = 1 + 2;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::BinaryOperatorInStaticContext]
        );
        assert_eq!(
            codes("integer x = (1);\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::ParenthesizedExpressionInStaticContext]
        );
        assert_eq!(
            codes("vector v = -<1,2,3>;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NegateOperationOnVectorLiteralInStaticContext]
        );
        assert_eq!(
            codes("rotation r = -<1,2,3,4>;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NegateOperationOnRotationLiteralInStaticContext]
        );
        assert_eq!(
            codes("integer a = 1;\ninteger b = -a;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::PrefixOperationOnGlobalVariableInStaticContext]
        );
        assert_eq!(
            codes("integer x = llAbs(1);\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::CallToFunctionInStaticContext]
        );
        assert!(codes("integer a = 1;\ninteger b = a;\nvector v = <1, -2.5, 3>;\ndefault { state_entry() {} }")
            .is_empty());
    }

    #[test]
    fn static_tuple_components_must_be_literals() {
        assert_eq!(
            codes("integer g = 1;\nvector v = <g, 0, 0>;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::InvalidVectorContent]
        );
    }

    #[test]
    fn constant_propagation_through_literal_forms() {
        let (table, handler) = run("default { state_entry() { list l = [1, PI, \"x\"]; } }");
        assert!(!handler.contains_error());
        let list_info = table
            .exprs
            .values()
            .find(|i| i.kind == ExprKind::ListLiteral)
            .expect("list literal typed");
        assert!(list_info.constant);
        assert!(!list_info.side_effects);
    }
}
