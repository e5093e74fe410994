//! Validator for the Linden Scripting Language (LSL).
//!
//! Parses a script, resolves names against a configurable standard library,
//! type-checks every expression, and runs return-path and dead-code
//! analysis, reporting structured diagnostics with source ranges.

#![deny(unsafe_code)] // disallow unsafe code by default
#![forbid(unused_must_use)] // disallow discarding errors

mod analysis;
pub mod ast;
mod parse;
mod reporting;
mod stdlib;
mod strings;
#[cfg(test)]
mod tests;
mod ty;

// module containing the code for the executables
pub mod app {
    pub mod analyze;
}

use std::path::PathBuf;

pub use crate::parse::{Comment, CommentKind, SourceMapper, Span};
pub use crate::reporting::{DiagnosticCode, Handler};
pub use crate::stdlib::{ConstantSig, EventSig, FilterMode, FunctionSig, LibraryProvider, KNOWN_SUBSETS};
pub use crate::strings::{DefaultStringPreprocessor, StringError, StringErrorKind, StringPreprocessor};
pub use crate::ty::LslType;

use crate::ast::Script;
use crate::strings::StringErrorKind::{IllegalCharacter, InvalidEscapeCode};

/// Options for a validation run.
pub struct ValidatorConfig {
    tab_size: usize,
    extract_comments: bool,
    preprocessor: Box<dyn StringPreprocessor>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            tab_size: 4,
            extract_comments: true,
            preprocessor: Box::new(DefaultStringPreprocessor::new()),
        }
    }
}

impl ValidatorConfig {
    pub fn new() -> Self {
        ValidatorConfig::default()
    }

    /// Tab width used when mapping byte offsets to columns.
    pub fn tab_size(mut self, tab_size: usize) -> Self {
        self.tab_size = tab_size;
        self
    }

    pub fn extract_comments(mut self, extract: bool) -> Self {
        self.extract_comments = extract;
        self
    }

    pub fn preprocessor(mut self, preprocessor: Box<dyn StringPreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }
}

/// The outcome of a validation run. The syntax tree is absent when the
/// grammar-level parser could not produce one.
#[derive(Debug)]
pub struct ValidatedUnit {
    pub script: Option<Script>,
    /// Comments in source order, when extraction is enabled.
    pub comments: Vec<Comment>,
    pub errors: usize,
    pub warnings: usize,
}

impl ValidatedUnit {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Validates a script against the given library, reporting through the
/// given handler. Diagnostics are flushed in source order before this
/// returns.
pub fn validate(
    source: &str,
    provider: &LibraryProvider,
    handler: &Handler,
    config: &ValidatorConfig,
) -> ValidatedUnit {
    let comments = if config.extract_comments { parse::extract_comments(source) } else { Vec::new() };

    let script = match parse::parse(source, config.preprocessor.as_ref()) {
        Ok(output) => {
            for string_error in &output.string_errors {
                let (code, message) = match string_error.error.kind {
                    IllegalCharacter(c) => (
                        DiagnosticCode::IllegalStringCharacter,
                        format!("illegal character `{}` in string literal", c.escape_default()),
                    ),
                    InvalidEscapeCode(c) => {
                        (DiagnosticCode::InvalidStringEscapeCode, format!("`\\{}` is not a valid escape code", c))
                    }
                };
                handler.error_with_span(code, &message, string_error.span, None);
            }
            let mut script = output.script;
            analysis::analyze(&mut script, provider, handler);
            Some(script)
        }
        Err(e) => {
            let span = match e.location {
                pest::error::InputLocation::Pos(pos) => Span { start: pos, end: pos },
                pest::error::InputLocation::Span((start, end)) => Span { start, end },
            };
            handler.error_with_span(
                DiagnosticCode::GrammarLevelParserSyntaxError,
                &format!("syntax error: {}", e.variant.message()),
                span,
                None,
            );
            None
        }
    };

    handler.flush();
    log::debug!(
        "validation finished with {} error(s) and {} warning(s)",
        handler.emitted_errors(),
        handler.emitted_warnings()
    );
    ValidatedUnit { script, comments, errors: handler.emitted_errors(), warnings: handler.emitted_warnings() }
}

/// Convenience entry that builds the handler from the source itself, with
/// the configured tab width. Returns the handler alongside the unit so the
/// caller can inspect the emitted codes.
pub fn validate_standalone(
    path: PathBuf,
    source: &str,
    provider: &LibraryProvider,
    config: &ValidatorConfig,
) -> (ValidatedUnit, Handler) {
    let mapper = SourceMapper::with_tab_size(path, source, config.tab_size);
    let handler = Handler::new(mapper);
    let unit = validate(source, provider, &handler, config);
    (unit, handler)
}
