//! This module provides analysis steps based on the AST.
//!
//! In detail,
//! * `id_assignment` assigns unique ids to all nodes of the AST
//! * `naming` resolves names against scopes, code areas, and the library
//! * `semantic` checks types and categorizes expressions
//! * `flow` computes return paths and dead code

pub(crate) mod flow;
pub(crate) mod id_assignment;
pub(crate) mod naming;
pub(crate) mod semantic;

use self::flow::FlowAnalysis;
use self::naming::NamingAnalysis;
use self::semantic::TypeAnalysis;
use crate::ast::Script;
use crate::reporting::Handler;
use crate::stdlib::LibraryProvider;

pub(crate) use self::flow::FlowResult;
pub(crate) use self::naming::NamingResult;
pub(crate) use self::semantic::TypeTable;

pub(crate) struct AnalysisResult {
    pub(crate) naming: NamingResult,
    pub(crate) types: TypeTable,
    pub(crate) flow: FlowResult,
}

/// Runs every analysis pass in order. Later passes run even when earlier
/// ones reported errors, so a single invocation surfaces as many problems
/// as possible; consult the handler for the error count.
pub(crate) fn analyze(script: &mut Script, provider: &LibraryProvider, handler: &Handler) -> AnalysisResult {
    id_assignment::assign_ids(script);

    let naming = NamingAnalysis::new(provider, handler).check(script);
    let types = TypeAnalysis::new(provider, &naming, handler).check(script);
    let flow = FlowAnalysis::new(&naming, handler).check(script);

    log::debug!(
        "analysis finished: {} declaration(s), {} typed expression(s), {} dead statement(s)",
        naming.declarations.len(),
        types.exprs.len(),
        flow.dead.len()
    );
    AnalysisResult { naming, types, flow }
}
