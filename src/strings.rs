//! This module contains the string pre-processor seam.
//!
//! String literals are run through a pre-processor before the processed
//! value is attached to the literal node. The default implementation
//! applies LSL's escape sequences; hosts can substitute their own, for
//! example to reject characters their runtime cannot store.

use std::collections::HashMap;

/// A single character-level problem found while processing a string body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringErrorKind {
    /// A character the pre-processor refuses, e.g. an embedded NUL.
    IllegalCharacter(char),
    /// An unrecognized `\x` escape code.
    InvalidEscapeCode(char),
}

/// Error location is a byte offset into the raw string body (between the
/// quotes), so the caller can point a span at the exact character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError {
    pub kind: StringErrorKind,
    pub offset: usize,
}

/// Translates a raw string body into its runtime value, or reports the
/// offending characters.
pub trait StringPreprocessor {
    fn process(&self, raw: &str) -> Result<String, Vec<StringError>>;
}

/// The default LSL string pre-processor.
///
/// Recognizes `\n`, `\t`, `\"` and `\\`; additional escapes can be added
/// through the substitution table. Unknown escapes are errors, matching
/// the reference compiler.
pub struct DefaultStringPreprocessor {
    substitutions: HashMap<char, &'static str>,
}

impl Default for DefaultStringPreprocessor {
    fn default() -> Self {
        let mut substitutions = HashMap::new();
        substitutions.insert('n', "\n");
        // the Linden compiler expands \t to four spaces
        substitutions.insert('t', "    ");
        substitutions.insert('"', "\"");
        substitutions.insert('\\', "\\");
        DefaultStringPreprocessor { substitutions }
    }
}

impl DefaultStringPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the escape table, e.g. `with_escape('r', "\r")`.
    pub fn with_escape(mut self, code: char, replacement: &'static str) -> Self {
        self.substitutions.insert(code, replacement);
        self
    }
}

impl StringPreprocessor for DefaultStringPreprocessor {
    fn process(&self, raw: &str) -> Result<String, Vec<StringError>> {
        let mut out = String::with_capacity(raw.len());
        let mut errors = Vec::new();
        let mut chars = raw.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some((_, code)) => match self.substitutions.get(&code) {
                        Some(replacement) => out.push_str(replacement),
                        None => errors.push(StringError {
                            kind: StringErrorKind::InvalidEscapeCode(code),
                            offset,
                        }),
                    },
                    // dangling backslash at the end of the body
                    None => errors.push(StringError { kind: StringErrorKind::InvalidEscapeCode('\\'), offset }),
                }
            } else if c == '\0' {
                errors.push(StringError { kind: StringErrorKind::IllegalCharacter(c), offset });
            } else {
                out.push(c);
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_escapes() {
        let pp = DefaultStringPreprocessor::new();
        assert_eq!(pp.process("hello").unwrap(), "hello");
        assert_eq!(pp.process("a\\nb").unwrap(), "a\nb");
        assert_eq!(pp.process("a\\tb").unwrap(), "a    b");
        assert_eq!(pp.process("say \\\"hi\\\"").unwrap(), "say \"hi\"");
        assert_eq!(pp.process("c:\\\\temp").unwrap(), "c:\\temp");
    }

    #[test]
    fn invalid_escape_reported_with_offset() {
        let pp = DefaultStringPreprocessor::new();
        let errs = pp.process("ab\\qcd").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, StringErrorKind::InvalidEscapeCode('q'));
        assert_eq!(errs[0].offset, 2);
    }

    #[test]
    fn extended_table() {
        let pp = DefaultStringPreprocessor::new().with_escape('r', "\r");
        assert_eq!(pp.process("a\\rb").unwrap(), "a\rb");
    }

    #[test]
    fn collects_every_error() {
        let pp = DefaultStringPreprocessor::new();
        let errs = pp.process("\\q\\z").unwrap_err();
        assert_eq!(errs.len(), 2);
    }
}
