//! Assigns every AST node a unique, small id. The parser leaves
//! `NodeId::DUMMY` everywhere; the analysis side tables require real ids.

use crate::ast::*;
use crate::parse::NodeId;

pub(crate) fn assign_ids(script: &mut Script) {
    let mut next_id_counter: u32 = 0;
    let mut next_id = || {
        let res = next_id_counter;
        next_id_counter += 1;
        NodeId::from_u32(res)
    };

    for decl in &mut script.declarations {
        match decl {
            Declaration::Variable(var) => {
                assert!(var.id == NodeId::DUMMY, "ids already assigned");
                var.id = next_id();
                var.ty.id = next_id();
                if let Some(init) = &mut var.initializer {
                    assign_ids_expr(init, &mut next_id);
                }
            }
            Declaration::Function(func) => assign_ids_function(func, &mut next_id),
        }
    }
    if let Some(state) = &mut script.default_state {
        assign_ids_state(state, &mut next_id);
    }
    for state in &mut script.states {
        assign_ids_state(state, &mut next_id);
    }
}

fn assign_ids_function(func: &mut Function, next_id: &mut impl FnMut() -> NodeId) {
    assert!(func.id == NodeId::DUMMY, "ids already assigned");
    func.id = next_id();
    if let Some(ty) = &mut func.return_ty {
        ty.id = next_id();
    }
    for param in &mut func.params {
        param.id = next_id();
        param.ty.id = next_id();
    }
    assign_ids_scope(&mut func.body, next_id);
}

fn assign_ids_state(state: &mut State, next_id: &mut impl FnMut() -> NodeId) {
    assert!(state.id == NodeId::DUMMY, "ids already assigned");
    state.id = next_id();
    for handler in &mut state.handlers {
        handler.id = next_id();
        for param in &mut handler.params {
            param.id = next_id();
            param.ty.id = next_id();
        }
        assign_ids_scope(&mut handler.body, next_id);
    }
}

fn assign_ids_scope(scope: &mut CodeScope, next_id: &mut impl FnMut() -> NodeId) {
    scope.id = next_id();
    for stmt in &mut scope.stmts {
        assign_ids_stmt(stmt, next_id);
    }
}

fn assign_ids_stmt(stmt: &mut Stmt, next_id: &mut impl FnMut() -> NodeId) {
    assert!(stmt.id == NodeId::DUMMY, "ids already assigned");
    stmt.id = next_id();
    match &mut stmt.kind {
        StmtKind::Scope(scope) => assign_ids_scope(scope, next_id),
        StmtKind::Decl(local) => {
            local.id = next_id();
            local.ty.id = next_id();
            if let Some(init) = &mut local.initializer {
                assign_ids_expr(init, next_id);
            }
        }
        StmtKind::Expr(e) => assign_ids_expr(e, next_id),
        StmtKind::If { condition, then_branch, else_branch } => {
            assign_ids_expr(condition, next_id);
            assign_ids_stmt(then_branch, next_id);
            if let Some(else_branch) = else_branch {
                assign_ids_stmt(else_branch, next_id);
            }
        }
        StmtKind::While { condition, body } => {
            assign_ids_expr(condition, next_id);
            assign_ids_stmt(body, next_id);
        }
        StmtKind::DoWhile { body, condition } => {
            assign_ids_stmt(body, next_id);
            assign_ids_expr(condition, next_id);
        }
        StmtKind::For { init, condition, afterthought, body } => {
            init.iter_mut().for_each(|e| assign_ids_expr(e, next_id));
            if let Some(condition) = condition {
                assign_ids_expr(condition, next_id);
            }
            afterthought.iter_mut().for_each(|e| assign_ids_expr(e, next_id));
            assign_ids_stmt(body, next_id);
        }
        StmtKind::Return(Some(e)) => assign_ids_expr(e, next_id),
        StmtKind::Jump(_) | StmtKind::Label(_) | StmtKind::StateChange(_) | StmtKind::Return(None) | StmtKind::Empty => {
        }
    }
}

fn assign_ids_expr(expr: &mut Expression, next_id: &mut impl FnMut() -> NodeId) {
    assert!(expr.id == NodeId::DUMMY, "ids already assigned");
    expr.id = next_id();
    match &mut expr.kind {
        ExpressionKind::Lit(lit) => lit.id = next_id(),
        ExpressionKind::Var(_) => {}
        ExpressionKind::Binary(_, lhs, rhs)
        | ExpressionKind::Assign(lhs, rhs)
        | ExpressionKind::ModifyingAssign(_, lhs, rhs) => {
            assign_ids_expr(lhs, next_id);
            assign_ids_expr(rhs, next_id);
        }
        ExpressionKind::Prefix(_, e) | ExpressionKind::Paren(e) | ExpressionKind::Postfix(e, _)
        | ExpressionKind::Accessor(e, _) => assign_ids_expr(e, next_id),
        ExpressionKind::Cast(ty, e) => {
            ty.id = next_id();
            assign_ids_expr(e, next_id);
        }
        ExpressionKind::Call(_, args) => args.iter_mut().for_each(|e| assign_ids_expr(e, next_id)),
        ExpressionKind::VectorLit(comps) | ExpressionKind::RotationLit(comps) | ExpressionKind::ListLit(comps) => {
            comps.iter_mut().for_each(|e| assign_ids_expr(e, next_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::DefaultStringPreprocessor;

    #[test]
    fn ids_are_dense_and_unique() {
        let mut script = crate::parse::parse(
            "integer g = 1;\ninteger f(integer x) { return x + g; }\ndefault { state_entry() { llOwnerSay(\"hi\"); } }",
            &DefaultStringPreprocessor::new(),
        )
        .unwrap()
        .script;
        assign_ids(&mut script);
        let mut seen = std::collections::HashSet::new();
        for decl in &script.declarations {
            let id = match decl {
                crate::ast::Declaration::Variable(v) => v.id,
                crate::ast::Declaration::Function(f) => f.id,
            };
            assert!(id != NodeId::DUMMY);
            assert!(seen.insert(id));
        }
        assert!(script.default_state.as_ref().unwrap().id != NodeId::DUMMY);
    }
}
