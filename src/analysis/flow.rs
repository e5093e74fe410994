//! Return-path and dead-code analysis.
//!
//! Runs after type checking, over one code area at a time. Each statement
//! computes whether control definitely leaves through a `return` or through
//! a `jump`; siblings after a terminating statement are unreachable until a
//! label makes them addressable again.

use crate::analysis::naming::NamingResult;
use crate::ast::*;
use crate::parse::NodeId;
use crate::reporting::{DiagnosticCode, Handler};
use crate::ty::LslType;
use std::collections::{HashMap, HashSet};

/// How control leaves a statement, when it always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Control can fall through to the next sibling.
    Continue,
    /// Every path ends in a `return`.
    Return,
    /// Every path ends in a `jump` to the label with this node id.
    Jump(NodeId),
}

impl Exit {
    fn terminates(self) -> bool {
        self != Exit::Continue
    }
}

#[derive(Debug, Default)]
pub(crate) struct FlowResult {
    /// Statements that can never execute.
    pub(crate) dead: HashSet<NodeId>,
    /// Whether the body of each function or event handler has a guaranteed
    /// return path, keyed by the declaration's node id.
    pub(crate) body_returns: HashMap<NodeId, bool>,
}

pub(crate) struct FlowAnalysis<'a> {
    handler: &'a Handler,
    naming: &'a NamingResult,
    result: FlowResult,
}

impl<'a> FlowAnalysis<'a> {
    pub(crate) fn new(naming: &'a NamingResult, handler: &'a Handler) -> Self {
        FlowAnalysis { handler, naming, result: FlowResult::default() }
    }

    pub(crate) fn check(mut self, script: &Script) -> FlowResult {
        for func in script.functions() {
            let exit = self.check_scope(&func.body);
            let returns = exit == Exit::Return;
            self.result.body_returns.insert(func.id, returns);
            if func.return_type() != LslType::Void && !returns {
                self.handler.error_with_span(
                    DiagnosticCode::NotAllCodePathsReturnAValue,
                    &format!("not all code paths of `{}` return a value", func.name.name),
                    func.name.span,
                    None,
                );
            }
        }
        let states = script.default_state.iter().chain(&script.states);
        for state in states {
            for handler_decl in &state.handlers {
                let exit = self.check_scope(&handler_decl.body);
                self.result.body_returns.insert(handler_decl.id, exit == Exit::Return);
            }
        }
        self.result
    }

    /// Walks the statements of a scope in order. The scope's exit is the
    /// exit of its first terminating statement; everything after it is dead
    /// until a label is reached.
    fn check_scope(&mut self, scope: &CodeScope) -> Exit {
        let mut exit = Exit::Continue;
        let mut warned = false;
        for stmt in &scope.stmts {
            if exit.terminates() {
                if matches!(stmt.kind, StmtKind::Label(_)) {
                    // reachable again through a jump
                    exit = Exit::Continue;
                    warned = false;
                    continue;
                }
                self.result.dead.insert(stmt.id);
                if !warned {
                    let cause = match exit {
                        Exit::Return => "return",
                        _ => "jump",
                    };
                    self.handler.warn_with_span(
                        DiagnosticCode::DeadCodeAfterReturnPath,
                        &format!("unreachable statement after a guaranteed {}", cause),
                        stmt.span,
                        None,
                    );
                    warned = true;
                }
                // unreachable nested code is not analyzed further
                continue;
            }
            exit = self.check_stmt(stmt);
        }
        exit
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Exit {
        match &stmt.kind {
            StmtKind::Return(_) => Exit::Return,
            StmtKind::Jump(_) => {
                match self.naming.jumps.get(&stmt.id) {
                    Some(&label) => Exit::Jump(label),
                    // unresolved jumps were already diagnosed
                    None => Exit::Continue,
                }
            }
            StmtKind::Scope(scope) => self.check_scope(scope),
            StmtKind::If { condition: _, then_branch, else_branch } => {
                self.check_chain(then_branch, else_branch.as_deref())
            }
            // a loop condition may be false on entry, so loops never
            // guarantee an exit; LSL has no `break` to complicate this
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
                self.check_stmt(body);
                Exit::Continue
            }
            StmtKind::Decl(_)
            | StmtKind::Expr(_)
            | StmtKind::Label(_)
            | StmtKind::StateChange(_)
            | StmtKind::Empty => Exit::Continue,
        }
    }

    /// An if/else-if/else chain terminates only when an `else` exists and
    /// every branch terminates the same way: all returning, or all jumping
    /// to one label (a constant jump).
    fn check_chain(&mut self, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Exit {
        let mut exits = vec![self.check_stmt(then_branch)];
        let mut tail = else_branch;
        loop {
            match tail.map(|s| (&s.kind, s)) {
                None => return Exit::Continue,
                Some((StmtKind::If { then_branch, else_branch, .. }, _)) => {
                    exits.push(self.check_stmt(then_branch));
                    tail = else_branch.as_deref();
                }
                Some((_, stmt)) => {
                    exits.push(self.check_stmt(stmt));
                    break;
                }
            }
        }
        if exits.iter().all(|e| *e == Exit::Return) {
            return Exit::Return;
        }
        if let Exit::Jump(target) = exits[0] {
            if exits.iter().all(|e| *e == Exit::Jump(target)) {
                return Exit::Jump(target);
            }
        }
        Exit::Continue
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

    fn run(source: &str) -> (FlowResult, Handler) {
        let mut script = crate::parse::parse(source, &DefaultStringPreprocessor::new())
            .unwrap_or_else(|e| panic!("{}", e))
            .script;
        assign_ids(&mut script);
        let handler = Handler::new(SourceMapper::new(PathBuf::new(), source));
        let provider = crate::stdlib::LibraryProvider::embedded(&["lsl"]);
        let naming = NamingAnalysis::new(&provider, &handler).check(&script);
        let result = FlowAnalysis::new(&naming, &handler).check(&script);
        (result, handler)
    }

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        run(source).1.emitted_codes()
    }

    #[test]
    fn straight_line_return() {
        let (result, handler) = run("integer f() { return 1; }\ndefault { state_entry() {} }");
        assert!(!handler.contains_error());
        assert!(result.body_returns.values().any(|&r| r));
        assert!(result.dead.is_empty());
    }

    #[test]
    fn missing_return_path() {
        assert_eq!(
            codes("integer f() { llOwnerSay(\"x\"); }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NotAllCodePathsReturnAValue]
        );
    }

    #[test]
    fn dead_code_after_return() {
        let (result, handler) =
            run("integer g() { return 1; llOwnerSay(\"x\"); }\ndefault { state_entry() {} }");
        assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::DeadCodeAfterReturnPath]);
        assert_eq!(handler.emitted_errors(), 0);
        assert_eq!(result.dead.len(), 1);
        assert!(result.body_returns.values().any(|&r| r));
    }

    #[test]
    fn dead_run_warns_once() {
        let (result, handler) = run(
            "f() { return; llOwnerSay(\"a\"); llOwnerSay(\"b\"); }\ndefault { state_entry() {} }",
        );
        assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::DeadCodeAfterReturnPath]);
        assert_eq!(result.dead.len(), 2);
    }

    #[test]
    fn label_resumes_liveness() {
        let source = "integer f() { jump skip; llOwnerSay(\"dead\"); @skip; return 1; }\n\
                      default { state_entry() {} }";
        let (result, handler) = run(source);
        assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::DeadCodeAfterReturnPath]);
        assert_eq!(handler.emitted_errors(), 0);
        assert_eq!(result.dead.len(), 1);
        assert!(result.body_returns.values().any(|&r| r));
    }

    #[test]
    fn full_if_chain_counts_as_return() {
        let source = "integer f(integer x) {\n\
                      if (x == 1) return 1;\n\
                      else if (x == 2) return 2;\n\
                      else return 0;\n\
                      }\ndefault { state_entry() {} }";
        assert!(codes(source).is_empty());
    }

    #[test]
    fn if_without_else_is_not_a_return_path() {
        assert_eq!(
            codes("integer f(integer x) { if (x) return 1; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NotAllCodePathsReturnAValue]
        );
    }

    #[test]
    fn loops_never_guarantee_return() {
        assert_eq!(
            codes("integer f() { while (1) return 1; }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NotAllCodePathsReturnAValue]
        );
        assert_eq!(
            codes("integer f() { do return 1; while (1); }\ndefault { state_entry() {} }"),
            vec![DiagnosticCode::NotAllCodePathsReturnAValue]
        );
    }

    #[test]
    fn nested_scope_return_propagates() {
        assert!(codes("integer f() { { return 1; } }\ndefault { state_entry() {} }").is_empty());
    }

    #[test]
    fn constant_jump_chain_kills_following_code() {
        let source = "f(integer x) {\n\
                      if (x) jump out;\n\
                      else jump out;\n\
                      llOwnerSay(\"dead\");\n\
                      @out;\n\
                      llOwnerSay(\"alive\");\n\
                      }\ndefault { state_entry() {} }";
        let (result, handler) = run(source);
        assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::DeadCodeAfterReturnPath]);
        assert_eq!(result.dead.len(), 1);
    }

    #[test]
    fn jumps_to_different_labels_fall_through() {
        let source = "f(integer x) {\n\
                      if (x) jump a;\n\
                      else jump b;\n\
                      llOwnerSay(\"reachable\");\n\
                      @a; @b;\n\
                      }\ndefault { state_entry() {} }";
        let (result, handler) = run(source);
        assert!(handler.emitted_codes().is_empty());
        assert!(result.dead.is_empty());
    }
}
