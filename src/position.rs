//! Source locations: `(file, line, column-offset)` triples shared by the lexer,
//! the parse-time error taxonomy, and the runtime back-trace.

use crate::Identifier;
use std::fmt;

/// A location within a named source file.
///
/// `line == 0 && column == 0` means "end of input" (no position), matching
/// the sentinel `Position::NONE` convention the lexer uses throughout.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SourceLocation {
    file: Identifier,
    line: u32,
    column: u32,
}

impl SourceLocation {
    /// The location representing "no position" / end of input.
    #[must_use]
    pub fn none() -> Self {
        Self {
            file: Identifier::new(),
            line: 0,
            column: 0,
        }
    }

    /// The first line, first column of `file`.
    #[must_use]
    pub fn start(file: impl Into<Identifier>) -> Self {
        Self {
            file: file.into(),
            line: 1,
            column: 1,
        }
    }

    /// Construct an explicit location. `line == 0` collapses to [`SourceLocation::none`].
    #[must_use]
    pub fn new(file: impl Into<Identifier>, line: u32, column: u32) -> Self {
        if line == 0 {
            return Self::none();
        }
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// 1-based line number, or `None` if this is [`SourceLocation::NONE`].
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        if self.line == 0 {
            None
        } else {
            Some(self.line)
        }
    }

    /// 1-based column offset, or `None` if this is [`SourceLocation::NONE`].
    #[must_use]
    pub const fn column(&self) -> Option<u32> {
        if self.line == 0 || self.column == 0 {
            None
        } else {
            Some(self.column)
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    pub(crate) fn advance(&mut self) {
        if self.column < u32::MAX {
            self.column += 1;
        }
    }

    pub(crate) fn newline(&mut self) {
        if self.line < u32::MAX {
            self.line += 1;
            self.column = 1;
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<end of input>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

impl fmt::Debug for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
