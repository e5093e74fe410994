//! This module contains the diagnostic handler the validator reports
//! warnings and errors through.
//!
//! Every diagnostic carries a [`DiagnosticCode`] so host applications can
//! consume a structured variant instead of matching on message strings.
//! Diagnostics are accumulated and delivered in source order (start byte
//! ascending, ties broken by registration order).

use self::Level::*;
use crate::parse::{CodeLine, SourceMapper, Span};
use std::cell::{Cell, RefCell};
#[cfg(not(test))]
use std::io::Write;
use termcolor::{Color, ColorSpec};
#[cfg(not(test))]
use termcolor::{ColorChoice, StandardStream, WriteColor};

/// Structured identity of every diagnostic the validator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticCode {
    GrammarLevelParserSyntaxError,

    UndefinedVariableReference,
    CallToUndefinedFunction,
    JumpToUndefinedLabel,
    ChangeToUndefinedState,

    VariableRedefined,
    RedefinedFunction,
    RedefinedLabel,
    RedefinedStateName,
    RedefinedDefaultState,
    RedefinedEventHandler,
    RedefinedStandardLibraryConstant,
    RedefinedStandardLibraryFunction,
    ParameterNameRedefined,

    TypeMismatchInVariableDeclaration,
    TypeMismatchInReturnValue,
    ReturnedValueFromVoidFunction,
    ReturnedVoidFromNonVoidFunction,
    ImproperParameterCountInFunctionCall,
    ParameterTypeMismatchInFunctionCall,

    InvalidBinaryOperation,
    InvalidPrefixOperation,
    InvalidPostfixOperation,
    InvalidCastOperation,
    CastOnCastExpression,
    AssignmentToNonassignableExpression,
    ModifiedLibraryConstant,
    ModifyingPrefixOperationOnNonVariable,
    PostfixOperationOnNonVariable,
    InvalidTupleComponentAccessOperation,
    TupleComponentAccessOnLibraryConstant,

    InvalidVectorContent,
    InvalidRotationContent,
    InvalidListContent,

    BinaryOperatorInStaticContext,
    ParenthesizedExpressionInStaticContext,
    PostfixOperationInStaticContext,
    InvalidPrefixOperationUsedInStaticContext,
    PrefixOperationOnGlobalVariableInStaticContext,
    NegateOperationOnVectorLiteralInStaticContext,
    NegateOperationOnRotationLiteralInStaticContext,
    CastExpressionInStaticContext,
    CallToFunctionInStaticContext,

    MissingDefaultState,
    StateHasNoEventHandlers,
    UnknownEventHandlerDeclared,
    IncorrectEventHandlerSignature,
    StateChangeInFunction,

    MissingConditionalExpression,
    IfConditionNotValidType,
    ElseIfConditionNotValidType,
    WhileLoopConditionNotValidType,
    DoLoopConditionNotValidType,
    ForLoopConditionNotValidType,
    DefinedVariableInBracelessScope,

    NotAllCodePathsReturnAValue,
    DeadCodeAfterReturnPath,

    IllegalStringCharacter,
    InvalidStringEscapeCode,

    CallToOverloadedLibraryFunctionIsAmbiguous,
    NoSuitableLibraryFunctionOverloadFound,
}

/// A handler is responsible for collecting and emitting warnings and errors.
pub struct Handler {
    error_count: RefCell<usize>,
    warning_count: RefCell<usize>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    /// Number of diagnostics already rendered by [`Handler::flush`].
    flushed: Cell<usize>,
    emitter: RefCell<Box<dyn Emitter>>,
    mapper: SourceMapper,
    line_map: RefCell<Option<Box<dyn Fn(usize) -> usize>>>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("error_count", &self.error_count)
            .field("warning_count", &self.warning_count)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl Handler {
    pub fn new(mapper: SourceMapper) -> Self {
        Handler {
            error_count: RefCell::new(0),
            warning_count: RefCell::new(0),
            diagnostics: RefCell::new(Vec::new()),
            flushed: Cell::new(0),
            emitter: RefCell::new(Box::new(StderrEmitter::new())),
            mapper,
            line_map: RefCell::new(None),
        }
    }

    /// Installs a hook remapping internal 1-based line numbers to user
    /// coordinates. Editor hosts that prepend a prologue use this.
    pub fn set_line_map(&self, map: Box<dyn Fn(usize) -> usize>) {
        *self.line_map.borrow_mut() = Some(map);
    }

    pub fn contains_error(&self) -> bool {
        self.emitted_errors() > 0
    }

    pub fn emitted_errors(&self) -> usize {
        *self.error_count.borrow()
    }

    pub fn emitted_warnings(&self) -> usize {
        *self.warning_count.borrow()
    }

    /// The codes emitted so far, in source order.
    pub fn emitted_codes(&self) -> Vec<DiagnosticCode> {
        let mut diags: Vec<(usize, usize, DiagnosticCode)> = self
            .diagnostics
            .borrow()
            .iter()
            .enumerate()
            .map(|(seq, d)| (d.sort_key(), seq, d.code))
            .collect();
        diags.sort();
        diags.into_iter().map(|(_, _, c)| c).collect()
    }

    /// Records a diagnostic. Rendering happens in [`Handler::flush`] so the
    /// output respects source order regardless of analysis pass order.
    fn emit(&self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            *self.error_count.borrow_mut() += 1;
        }
        if diagnostic.is_warning() {
            *self.warning_count.borrow_mut() += 1;
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Renders all recorded diagnostics through the emitter, sorted by the
    /// start of their primary span, ties by registration order.
    pub fn flush(&self) {
        let diags = self.diagnostics.borrow();
        let mut order: Vec<usize> = (self.flushed.get()..diags.len()).collect();
        order.sort_by_key(|&i| (diags[i].sort_key(), i));
        let line_map = self.line_map.borrow();
        let mut emitter = self.emitter.borrow_mut();
        for &i in &order {
            emitter.emit(&self.mapper, &diags[i], line_map.as_deref());
        }
        self.flushed.set(diags.len());
    }

    pub fn error(&self, code: DiagnosticCode, message: &str) {
        self.emit(Diagnostic { code, level: Error, message: message.to_owned(), span: Vec::new() });
    }

    pub fn error_with_span(&self, code: DiagnosticCode, message: &str, span: Span, label: Option<&str>) {
        self.emit(Diagnostic {
            code,
            level: Error,
            message: message.to_owned(),
            span: vec![LabeledSpan::new(span, label.unwrap_or(""), true)],
        });
    }

    pub fn warn_with_span(&self, code: DiagnosticCode, message: &str, span: Span, label: Option<&str>) {
        self.emit(Diagnostic {
            code,
            level: Warning,
            message: message.to_owned(),
            span: vec![LabeledSpan::new(span, label.unwrap_or(""), true)],
        });
    }

    pub fn error_with_spans(&self, code: DiagnosticCode, message: &str, spans: Vec<LabeledSpan>) {
        self.emit(Diagnostic { code, level: Error, message: message.to_owned(), span: spans });
    }
}

/// Emitter trait for rendering diagnostics.
pub(crate) trait Emitter: std::fmt::Debug {
    fn emit(&mut self, mapper: &SourceMapper, diagnostic: &Diagnostic, line_map: Option<&dyn Fn(usize) -> usize>);
}

/// Emits errors to stderr.
#[derive(Debug)]
struct StderrEmitter {}

impl StderrEmitter {
    fn new() -> Self {
        StderrEmitter {}
    }
}

impl Emitter for StderrEmitter {
    /// standard emit implementation
    #[cfg(not(test))]
    fn emit(&mut self, mapper: &SourceMapper, diagnostic: &Diagnostic, line_map: Option<&dyn Fn(usize) -> usize>) {
        let mut stderr = StandardStream::stderr(ColorChoice::Always);
        for line in render(mapper, diagnostic, line_map) {
            for part in &line.strings {
                stderr.set_color(&part.color).expect("cannot set output color");
                write!(&mut stderr, "{}", part.string).expect("writing to stderr failed");
            }
            writeln!(&mut stderr).expect("writing to stderr failed");
        }
        stderr.reset().expect("cannot reset output color");
        stderr.flush().expect("flushing stderr failed");
    }

    /// suppress output when testing
    #[cfg(test)]
    fn emit(&mut self, _mapper: &SourceMapper, _diagnostic: &Diagnostic, _line_map: Option<&dyn Fn(usize) -> usize>) {
    }
}

fn render(
    mapper: &SourceMapper,
    diagnostic: &Diagnostic,
    line_map: Option<&dyn Fn(usize) -> usize>,
) -> Vec<ColoredLine> {
    let mut lines = Vec::new();

    // header, e.g. `error: some error message`
    let mut line = ColoredLine::new();
    line.push(diagnostic.level.to_str(), diagnostic.level.to_color());
    line.push(": ", ColorSpec::new());
    line.push(&diagnostic.message, ColorSpec::new().set_bold(true).clone());
    lines.push(line);

    let snippets: Vec<(CodeLine, Option<String>, bool)> = diagnostic
        .span
        .iter()
        .flat_map(|s| mapper.get_line(s.span).map(|l| (l, s.label.clone(), s.primary)))
        .collect();

    if !snippets.is_empty() {
        let map_line = |n: usize| line_map.map_or(n, |f| f(n));
        let line_number_length =
            snippets.iter().map(|(s, _, _)| format!("{}", map_line(s.line_number)).len()).fold(0, std::cmp::max);

        let (main, _, _) = snippets.first().expect("nonempty");
        let mut rendered_line = ColoredLine::new();
        rendered_line.push(&" ".repeat(line_number_length), ColorSpec::new());
        rendered_line.push("--> ", ColorSpec::new().set_fg(Some(Color::Blue)).clone());
        rendered_line.push(
            &format!("{}:{}:{}", main.path.display(), map_line(main.line_number), main.column_number),
            ColorSpec::new(),
        );
        lines.push(rendered_line);

        for (snippet, label, primary) in snippets {
            let mut rendered_line = ColoredLine::new();
            rendered_line.push(
                &format!("{} | ", map_line(snippet.line_number)),
                ColorSpec::new().set_fg(Some(Color::Blue)).clone(),
            );
            rendered_line.push(&snippet.line, ColorSpec::new());
            lines.push(rendered_line);

            let color = if primary {
                diagnostic.level.to_color()
            } else {
                let mut colorspec = ColorSpec::new();
                colorspec.set_intense(true).set_bold(true).set_fg(Some(Color::Blue));
                colorspec
            };
            let highlight_char = if primary { "^" } else { "-" };

            let mut marker_line = ColoredLine::new();
            marker_line.push(
                &format!("{} | ", " ".repeat(line_number_length)),
                ColorSpec::new().set_fg(Some(Color::Blue)).clone(),
            );
            marker_line.push(
                &format!(
                    "{}{}",
                    " ".repeat(snippet.highlight.start),
                    highlight_char.repeat((snippet.highlight.end - snippet.highlight.start).max(1))
                ),
                color.clone(),
            );
            if let Some(label) = label {
                marker_line.push(&format!(" {}", label), color);
            }
            lines.push(marker_line);
        }
    }

    lines.push(ColoredLine::new());
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Level {
    Error,
    Warning,
}

/// A structured representation of a user-facing diagnostic.
#[derive(Debug, Clone)]
pub(crate) struct Diagnostic {
    pub(crate) code: DiagnosticCode,
    pub(crate) level: Level,
    pub(crate) message: String,
    pub(crate) span: Vec<LabeledSpan>,
}

impl Diagnostic {
    fn is_error(&self) -> bool {
        self.level == Error
    }

    fn is_warning(&self) -> bool {
        self.level == Warning
    }

    /// Byte offset of the primary span; diagnostics without a span sort first.
    fn sort_key(&self) -> usize {
        self.span.iter().find(|s| s.primary).or_else(|| self.span.first()).map_or(0, |s| s.span.start)
    }
}

impl Level {
    pub(crate) fn to_str(self) -> &'static str {
        match self {
            Error => "error",
            Warning => "warning",
        }
    }

    pub(crate) fn to_color(self) -> ColorSpec {
        let mut colorspec = ColorSpec::new();
        colorspec.set_intense(true).set_bold(true);
        match self {
            Error => colorspec.set_fg(Some(Color::Red)),
            Warning => colorspec.set_fg(Some(Color::Yellow)),
        };
        colorspec
    }
}

/// Show a label (message) next to the position in source code.
#[derive(Debug, Clone)]
pub struct LabeledSpan {
    span: Span,
    label: Option<String>,
    primary: bool,
}

impl LabeledSpan {
    pub fn new(span: Span, label: &str, primary: bool) -> Self {
        let label = if label.is_empty() { None } else { Some(label.to_string()) };
        LabeledSpan { span, label, primary }
    }
}

#[derive(Debug)]
struct ColoredString {
    string: String,
    color: ColorSpec,
}

#[derive(Debug)]
struct ColoredLine {
    strings: Vec<ColoredString>,
}

impl ColoredLine {
    fn new() -> ColoredLine {
        ColoredLine { strings: Vec::new() }
    }

    fn push(&mut self, string: &str, color: ColorSpec) {
        self.strings.push(ColoredString { string: string.to_owned(), color })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_diagnostic() -> Diagnostic {
        Diagnostic {
            code: DiagnosticCode::UndefinedVariableReference,
            level: Error,
            message: "undefined variable `def`".to_string(),
            span: vec![LabeledSpan::new(Span { start: 4, end: 7 }, "not found in this scope", true)],
        }
    }

    fn rendered(line_map: Option<&dyn Fn(usize) -> usize>) -> String {
        let mapper = SourceMapper::new(PathBuf::new(), "abc\ndef\n");
        let lines: Vec<String> = render(&mapper, &sample_diagnostic(), line_map)
            .iter()
            .map(|l| l.strings.iter().map(|s| s.string.as_str()).collect())
            .collect();
        lines.join("\n")
    }

    #[test]
    fn rendering_points_at_the_source_line() {
        let plain = rendered(None);
        assert!(plain.contains("undefined variable `def`"));
        assert!(plain.contains("2 | "));
        assert!(plain.contains("^^^ not found in this scope"));
    }

    #[test]
    fn line_map_remaps_rendered_line_numbers() {
        let shifted = rendered(Some(&|n| n + 100));
        assert!(shifted.contains("102 | "));
        assert!(shifted.contains(":102:"));
        assert!(!shifted.contains("\n2 | "));
    }

    #[test]
    fn handler_accepts_a_line_map() {
        let handler = Handler::new(SourceMapper::new(PathBuf::new(), "abc\ndef\n"));
        handler.set_line_map(Box::new(|n| n + 100));
        handler.error_with_span(
            DiagnosticCode::UndefinedVariableReference,
            "undefined variable `def`",
            Span { start: 4, end: 7 },
            None,
        );
        handler.flush();
        assert_eq!(handler.emitted_errors(), 1);
        assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::UndefinedVariableReference]);
    }
}
