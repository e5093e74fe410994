//! Name resolution and scope addressing.
//!
//! Resolves every name use to its declaration and records the result in a
//! side table keyed by the use site's `NodeId`. Scopes get addresses of the
//! form (code area, scope id, scope level): the code area counter bumps on
//! every function or event handler body, the scope id starts at 1 per code
//! area and bumps on every nested scope without ever going back down, and
//! the level tracks brace depth.

use crate::ast::*;
use crate::parse::{Ident, NodeId, Span};
use crate::reporting::{DiagnosticCode, Handler, LabeledSpan};
use crate::stdlib::LibraryProvider;
use crate::ty::LslType;
use std::collections::HashMap;

pub(crate) type DeclarationTable = HashMap<NodeId, Declaration>;

/// What a name at a use site resolved to.
#[derive(Debug, Clone)]
pub(crate) enum Declaration {
    Global { decl: NodeId, ty: LslType },
    Local { decl: NodeId, ty: LslType },
    Param { decl: NodeId, ty: LslType },
    Function { name: String },
    LibraryFunction { name: String },
    LibraryConstant { name: String, ty: LslType },
}

impl Declaration {
    /// The type a variable reference with this resolution has, if it is a
    /// variable-like name.
    pub(crate) fn var_type(&self) -> Option<LslType> {
        match self {
            Declaration::Global { ty, .. } | Declaration::Local { ty, .. } | Declaration::Param { ty, .. } => Some(*ty),
            Declaration::LibraryConstant { ty, .. } => Some(*ty),
            Declaration::Function { .. } | Declaration::LibraryFunction { .. } => None,
        }
    }

    pub(crate) fn is_user_variable(&self) -> bool {
        matches!(self, Declaration::Global { .. } | Declaration::Local { .. } | Declaration::Param { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ScopeAddress {
    pub(crate) code_area: u32,
    pub(crate) scope_id: u32,
    pub(crate) level: u32,
}

/// A user function's callable shape, for call checking.
#[derive(Debug, Clone)]
pub(crate) struct FuncInfo {
    pub(crate) id: NodeId,
    pub(crate) return_ty: LslType,
    pub(crate) param_types: Vec<LslType>,
}

#[derive(Debug, Default)]
pub(crate) struct NamingResult {
    /// Use-site node to resolved declaration.
    pub(crate) declarations: DeclarationTable,
    /// Scope addresses for code scopes, local declarations, and labels.
    pub(crate) scopes: HashMap<NodeId, ScopeAddress>,
    /// `jump` statement to the `@label` statement it targets.
    pub(crate) jumps: HashMap<NodeId, NodeId>,
    /// State name to state node, `default` included.
    pub(crate) states: HashMap<String, NodeId>,
    /// `state X;` statement to the target state node.
    pub(crate) state_changes: HashMap<NodeId, NodeId>,
    pub(crate) functions: HashMap<String, FuncInfo>,
}

pub(crate) struct NamingAnalysis<'a> {
    handler: &'a Handler,
    provider: &'a LibraryProvider,
    result: NamingResult,
    globals: HashMap<String, (NodeId, LslType)>,
    params: HashMap<String, (NodeId, LslType)>,
    locals: ScopedDecl,
    /// Labels of the current code area, collected up front so forward
    /// jumps resolve.
    labels: HashMap<String, NodeId>,
    code_area: u32,
    next_scope_id: u32,
    level: u32,
    in_function: bool,
}

impl<'a> NamingAnalysis<'a> {
    pub(crate) fn new(provider: &'a LibraryProvider, handler: &'a Handler) -> Self {
        NamingAnalysis {
            handler,
            provider,
            result: NamingResult::default(),
            globals: HashMap::new(),
            params: HashMap::new(),
            locals: ScopedDecl::new(),
            labels: HashMap::new(),
            code_area: 0,
            next_scope_id: 0,
            level: 0,
            in_function: false,
        }
    }

    pub(crate) fn check(mut self, script: &Script) -> NamingResult {
        self.collect_states(script);
        self.collect_functions(script);

        // globals in declaration order, so later initializers see earlier
        // globals but not later ones
        for var in script.globals() {
            if let Some(init) = &var.initializer {
                self.check_expression(init);
            }
            self.declare_global(var);
        }

        for func in script.functions() {
            self.check_function(func);
        }
        if let Some(state) = &script.default_state {
            self.check_state(state);
        }
        for state in &script.states {
            self.check_state(state);
        }
        self.result
    }

    fn collect_states(&mut self, script: &Script) {
        match &script.default_state {
            Some(state) => {
                self.result.states.insert("default".to_string(), state.id);
                if state.handlers.is_empty() {
                    self.handler.error_with_span(
                        DiagnosticCode::StateHasNoEventHandlers,
                        "`default` state has no event handlers",
                        state.span,
                        Some("a state must contain at least one event handler"),
                    );
                }
            }
            None => self.handler.error(DiagnosticCode::MissingDefaultState, "script defines no `default` state"),
        }
        for state in &script.states {
            if state.is_default {
                // the parser keeps extra `default` blocks as ordinary states
                self.handler.error_with_span(
                    DiagnosticCode::RedefinedDefaultState,
                    "`default` state is defined more than once",
                    state.span,
                    None,
                );
                continue;
            }
            if self.result.states.contains_key(&state.name.name) {
                self.handler.error_with_span(
                    DiagnosticCode::RedefinedStateName,
                    &format!("state `{}` is defined more than once", state.name.name),
                    state.name.span,
                    None,
                );
                continue;
            }
            if state.handlers.is_empty() {
                self.handler.error_with_span(
                    DiagnosticCode::StateHasNoEventHandlers,
                    &format!("state `{}` has no event handlers", state.name.name),
                    state.span,
                    Some("a state must contain at least one event handler"),
                );
            }
            self.result.states.insert(state.name.name.clone(), state.id);
        }
    }

    fn collect_functions(&mut self, script: &Script) {
        let mut first_spans: HashMap<String, Span> = HashMap::new();
        for func in script.functions() {
            if self.check_library_collision(&func.name) {
                continue;
            }
            if let Some(&first) = first_spans.get(&func.name.name) {
                self.handler.error_with_spans(
                    DiagnosticCode::RedefinedFunction,
                    &format!("function `{}` is defined more than once", func.name.name),
                    vec![
                        LabeledSpan::new(func.name.span, "user functions cannot be overloaded", true),
                        LabeledSpan::new(first, "first defined here", false),
                    ],
                );
                continue;
            }
            first_spans.insert(func.name.name.clone(), func.name.span);
            self.result.functions.insert(
                func.name.name.clone(),
                FuncInfo {
                    id: func.id,
                    return_ty: func.return_type(),
                    param_types: func.params.iter().map(|p| p.ty.value).collect(),
                },
            );
        }
    }

    /// Diagnoses a user declaration whose name the active library subsets
    /// already define. Returns true when a collision was found.
    fn check_library_collision(&mut self, name: &Ident) -> bool {
        if self.provider.lookup_constant(&name.name).is_some() {
            self.handler.error_with_span(
                DiagnosticCode::RedefinedStandardLibraryConstant,
                &format!("`{}` redefines a standard library constant", name.name),
                name.span,
                None,
            );
            true
        } else if !self.provider.lookup_functions(&name.name).is_empty() {
            self.handler.error_with_span(
                DiagnosticCode::RedefinedStandardLibraryFunction,
                &format!("`{}` redefines a standard library function", name.name),
                name.span,
                None,
            );
            true
        } else {
            false
        }
    }

    fn declare_global(&mut self, var: &GlobalVariable) {
        if self.check_library_collision(&var.name) {
            return;
        }
        if self.globals.contains_key(&var.name.name) || self.result.functions.contains_key(&var.name.name) {
            self.handler.error_with_span(
                DiagnosticCode::VariableRedefined,
                &format!("global `{}` is defined more than once", var.name.name),
                var.name.span,
                None,
            );
            return;
        }
        self.globals.insert(var.name.name.clone(), (var.id, var.ty.value));
    }

    fn check_function(&mut self, func: &Function) {
        self.enter_code_area(true);
        self.declare_params(&func.params);
        self.collect_labels(&func.body);
        self.check_scope(&func.body);
        self.exit_code_area();
    }

    fn check_state(&mut self, state: &State) {
        for handler in &state.handlers {
            self.enter_code_area(false);
            self.declare_params(&handler.params);
            self.collect_labels(&handler.body);
            self.check_scope(&handler.body);
            self.exit_code_area();
        }
    }

    fn enter_code_area(&mut self, in_function: bool) {
        self.code_area += 1;
        self.next_scope_id = 0;
        self.level = 0;
        self.in_function = in_function;
        self.params.clear();
        self.labels.clear();
    }

    fn exit_code_area(&mut self) {
        debug_assert!(self.level == 0, "unbalanced scopes");
    }

    fn declare_params(&mut self, params: &[Parameter]) {
        for param in params {
            if self.check_library_collision(&param.name) {
                continue;
            }
            if self.params.contains_key(&param.name.name) {
                self.handler.error_with_span(
                    DiagnosticCode::ParameterNameRedefined,
                    &format!("parameter `{}` is declared more than once", param.name.name),
                    param.name.span,
                    None,
                );
                continue;
            }
            self.params.insert(param.name.name.clone(), (param.id, param.ty.value));
        }
    }

    fn collect_labels(&mut self, scope: &CodeScope) {
        for stmt in &scope.stmts {
            self.collect_labels_stmt(stmt);
        }
    }

    fn collect_labels_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Label(name) => {
                if self.labels.contains_key(&name.name) {
                    self.handler.error_with_span(
                        DiagnosticCode::RedefinedLabel,
                        &format!("label `{}` is declared more than once in this code area", name.name),
                        name.span,
                        None,
                    );
                } else {
                    self.labels.insert(name.name.clone(), stmt.id);
                }
            }
            StmtKind::Scope(scope) => self.collect_labels(scope),
            StmtKind::If { then_branch, else_branch, .. } => {
                self.collect_labels_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.collect_labels_stmt(else_branch);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
                self.collect_labels_stmt(body)
            }
            _ => {}
        }
    }

    fn check_scope(&mut self, scope: &CodeScope) {
        self.next_scope_id += 1;
        self.level += 1;
        let address = ScopeAddress { code_area: self.code_area, scope_id: self.next_scope_id, level: self.level };
        self.result.scopes.insert(scope.id, address);
        self.locals.push();
        for stmt in &scope.stmts {
            self.check_stmt(stmt, address);
        }
        self.locals.pop();
        self.level -= 1;
    }

    fn check_stmt(&mut self, stmt: &Stmt, address: ScopeAddress) {
        match &stmt.kind {
            StmtKind::Scope(scope) => self.check_scope(scope),
            StmtKind::Decl(local) => {
                if let Some(init) = &local.initializer {
                    self.check_expression(init);
                }
                self.result.scopes.insert(local.id, address);
                self.declare_local(local);
            }
            StmtKind::Expr(e) => self.check_expression(e),
            StmtKind::If { condition, then_branch, else_branch } => {
                self.check_expression(condition);
                self.check_stmt(then_branch, address);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch, address);
                }
            }
            StmtKind::While { condition, body } => {
                self.check_expression(condition);
                self.check_stmt(body, address);
            }
            StmtKind::DoWhile { body, condition } => {
                self.check_stmt(body, address);
                self.check_expression(condition);
            }
            StmtKind::For { init, condition, afterthought, body } => {
                init.iter().for_each(|e| self.check_expression(e));
                if let Some(condition) = condition {
                    self.check_expression(condition);
                }
                afterthought.iter().for_each(|e| self.check_expression(e));
                self.check_stmt(body, address);
            }
            StmtKind::Jump(name) => match self.labels.get(&name.name) {
                Some(&label) => {
                    self.result.jumps.insert(stmt.id, label);
                }
                None => self.handler.error_with_span(
                    DiagnosticCode::JumpToUndefinedLabel,
                    &format!("jump to undefined label `{}`", name.name),
                    name.span,
                    Some("labels are only visible within their own function or event handler"),
                ),
            },
            StmtKind::Label(name) => {
                self.result.scopes.insert(stmt.id, address);
                debug_assert!(self.labels.contains_key(&name.name) || self.handler.contains_error());
            }
            StmtKind::StateChange(target) => {
                if self.in_function {
                    self.handler.error_with_span(
                        DiagnosticCode::StateChangeInFunction,
                        "state change inside a function",
                        stmt.span,
                        Some("`state` statements are only allowed inside event handlers"),
                    );
                }
                match self.result.states.get(&target.name) {
                    Some(&state) => {
                        self.result.state_changes.insert(stmt.id, state);
                    }
                    None => self.handler.error_with_span(
                        DiagnosticCode::ChangeToUndefinedState,
                        &format!("change to undefined state `{}`", target.name),
                        target.span,
                        None,
                    ),
                }
            }
            StmtKind::Return(Some(e)) => self.check_expression(e),
            StmtKind::Return(None) | StmtKind::Empty => {}
        }
    }

    fn declare_local(&mut self, local: &LocalVariable) {
        if self.check_library_collision(&local.name) {
            return;
        }
        if self.locals.contains_in_current(&local.name.name) {
            self.handler.error_with_span(
                DiagnosticCode::VariableRedefined,
                &format!("variable `{}` is defined more than once in this scope", local.name.name),
                local.name.span,
                None,
            );
            return;
        }
        // shadowing globals, parameters and outer locals is allowed
        self.locals.add(&local.name.name, local.id, local.ty.value);
    }

    fn check_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Lit(_) => {}
            ExpressionKind::Var(name) => match self.resolve_variable(&name.name) {
                Some(decl) => {
                    self.result.declarations.insert(expr.id, decl);
                }
                None => self.handler.error_with_span(
                    DiagnosticCode::UndefinedVariableReference,
                    &format!("reference to undefined variable `{}`", name.name),
                    name.span,
                    None,
                ),
            },
            ExpressionKind::Call(name, args) => {
                args.iter().for_each(|a| self.check_expression(a));
                if self.result.functions.contains_key(&name.name) {
                    self.result.declarations.insert(expr.id, Declaration::Function { name: name.name.clone() });
                } else if !self.provider.lookup_functions(&name.name).is_empty() {
                    self.result.declarations.insert(expr.id, Declaration::LibraryFunction { name: name.name.clone() });
                } else {
                    self.handler.error_with_span(
                        DiagnosticCode::CallToUndefinedFunction,
                        &format!("call to undefined function `{}`", name.name),
                        name.span,
                        None,
                    );
                }
            }
            ExpressionKind::Binary(_, lhs, rhs)
            | ExpressionKind::Assign(lhs, rhs)
            | ExpressionKind::ModifyingAssign(_, lhs, rhs) => {
                self.check_expression(lhs);
                self.check_expression(rhs);
            }
            ExpressionKind::Prefix(_, e)
            | ExpressionKind::Postfix(e, _)
            | ExpressionKind::Paren(e)
            | ExpressionKind::Cast(_, e)
            | ExpressionKind::Accessor(e, _) => self.check_expression(e),
            ExpressionKind::VectorLit(comps) | ExpressionKind::RotationLit(comps) | ExpressionKind::ListLit(comps) => {
                comps.iter().for_each(|e| self.check_expression(e))
            }
        }
    }

    /// Lookup order: locals innermost-first, then parameters, then globals,
    /// then library constants.
    fn resolve_variable(&self, name: &str) -> Option<Declaration> {
        if let Some(&(decl, ty)) = self.locals.get_decl_for(name) {
            return Some(Declaration::Local { decl, ty });
        }
        if let Some(&(decl, ty)) = self.params.get(name) {
            return Some(Declaration::Param { decl, ty });
        }
        if let Some(&(decl, ty)) = self.globals.get(name) {
            return Some(Declaration::Global { decl, ty });
        }
        if let Some(constant) = self.provider.lookup_constant(name) {
            return Some(Declaration::LibraryConstant { name: constant.name.clone(), ty: constant.ty });
        }
        None
    }
}

/// A stack of per-scope declaration maps.
#[derive(Debug)]
struct ScopedDecl {
    scopes: Vec<HashMap<String, (NodeId, LslType)>>,
}

impl ScopedDecl {
    fn new() -> Self {
        ScopedDecl { scopes: Vec::new() }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        assert!(self.scopes.pop().is_some());
    }

    fn add(&mut self, name: &str, id: NodeId, ty: LslType) {
        self.scopes.last_mut().expect("add_decl_for on empty scope stack").insert(name.to_string(), (id, ty));
    }

    fn contains_in_current(&self, name: &str) -> bool {
        self.scopes.last().map_or(false, |scope| scope.contains_key(name))
    }

    fn get_decl_for(&self, name: &str) -> Option<&(NodeId, LslType)> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::id_assignment::assign_ids;
    use crate::parse::SourceMapper;
    use crate::reporting::Handler;
    use crate::strings::DefaultStringPreprocessor;
    use std::path::PathBuf;

    fn run(source: &str) -> (NamingResult, Handler) {
        let mut script = crate::parse::parse(source, &DefaultStringPreprocessor::new())
            .unwrap_or_else(|e| panic!("{}", e))
            .script;
        assign_ids(&mut script);
        let handler = Handler::new(SourceMapper::new(PathBuf::new(), source));
        let provider = crate::stdlib::LibraryProvider::embedded(&["lsl"]);
        let analysis = NamingAnalysis::new(&provider, &handler);
        let result = analysis.check(&script);
        (result, handler)
    }

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        run(source).1.emitted_codes()
    }

    #[test]
    fn resolves_clean_script() {
        let (result, handler) = run(
            "integer g = 1;\ninteger f(integer x) { integer y = x + g; return y; }\ndefault { state_entry() { f(1); } }",
        );
        assert!(!handler.contains_error());
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.states.len(), 1);
    }

    #[test]
    fn missing_default_state() {
        assert_eq!(codes("state foo { state_entry() {} }"), vec![DiagnosticCode::MissingDefaultState]);
    }

    #[test]
    fn undefined_variable() {
        assert_eq!(
            codes("default { state_entry() { llOwnerSay(missing); } }"),
            vec![DiagnosticCode::UndefinedVariableReference]
        );
    }

    #[test]
    fn undefined_function() {
        assert_eq!(
            codes("default { state_entry() { missing(); } }"),
            vec![DiagnosticCode::CallToUndefinedFunction]
        );
    }

    #[test]
    fn global_forward_reference_is_undefined() {
        assert_eq!(
            codes("integer a = b;\ninteger b = 1;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::UndefinedVariableReference]
        );
    }

    #[test]
    fn redefine_library_constant() {
        assert_eq!(
            codes("integer PI = 3;\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::RedefinedStandardLibraryConstant]
        );
    }

    #[test]
    fn redefine_library_function() {
        assert_eq!(
            codes("integer llAbs(integer x) { return x; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::RedefinedStandardLibraryFunction]
        );
    }

    #[test]
    fn shadowing_is_allowed() {
        assert!(codes(
            "integer x = 1;\ninteger f(integer x) { integer y = x; { integer x; x = y; } return x; }\ndefault { state_entry() {} }"
        )
        .is_empty());
    }

    #[test]
    fn redefined_function() {
        // the second definition carries a secondary span pointing at the first
        assert_eq!(
            codes("f() {}\nf(integer a) {}\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::RedefinedFunction]
        );
    }

    #[test]
    fn redefinition_in_same_scope() {
        assert_eq!(
            codes("default { state_entry() { integer x; integer x; } }"),
            vec![DiagnosticCode::VariableRedefined]
        );
    }

    #[test]
    fn duplicate_parameter() {
        assert_eq!(
            codes("f(integer a, integer a) {}\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::ParameterNameRedefined]
        );
    }

    #[test]
    fn jump_resolution_is_per_code_area() {
        assert_eq!(
            codes("f() { @here; }\ng() { jump here; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::JumpToUndefinedLabel]
        );
        assert!(codes("f() { jump ahead; llOwnerSay(\"x\"); @ahead; }\ndefault { state_entry() {} }").is_empty());
    }

    #[test]
    fn state_change_in_function() {
        assert_eq!(
            codes("f() { state other; }\ndefault { state_entry() {} }\nstate other { state_entry() {} }"),
            vec![DiagnosticCode::StateChangeInFunction]
        );
    }

    #[test]
    fn state_change_to_default_always_resolves() {
        assert!(codes("default { touch_start(integer n) { state default; } }").is_empty());
    }

    #[test]
    fn undefined_state_target() {
        assert_eq!(
            codes("default { touch_start(integer n) { state nowhere; } }"),
            vec![DiagnosticCode::ChangeToUndefinedState]
        );
    }

    #[test]
    fn empty_named_state() {
        assert_eq!(
            codes("default { state_entry() {} }\nstate foo {}"),
            vec![DiagnosticCode::StateHasNoEventHandlers]
        );
    }

    #[test]
    fn scope_addresses_reset_per_code_area() {
        let (result, _) = run("f() { { } }\ng() { }\ndefault { state_entry() {} }");
        let mut addresses: Vec<ScopeAddress> = result.scopes.values().copied().collect();
        addresses.sort();
        // f: (1,1,1) and (1,2,2); g: (2,1,1); handler: (3,1,1)
        assert_eq!(
            addresses,
            vec![
                ScopeAddress { code_area: 1, scope_id: 1, level: 1 },
                ScopeAddress { code_area: 1, scope_id: 2, level: 2 },
                ScopeAddress { code_area: 2, scope_id: 1, level: 1 },
                ScopeAddress { code_area: 3, scope_id: 1, level: 1 },
            ]
        );
    }
}
