//! Parse-time error taxonomy: a single structured `(status, location, length)`
//! triple plus a derived human message, shared by the lexer and the JSON/JSON5
//! parser (spec.md §7, grounded in Asteria's `Parser_Error::do_compose_message`
//! and `rhai::error_parsing`'s `LexError`/`ParseErrorType` split).

use crate::SourceLocation;
use std::fmt;

/// Every status code the lexer or JSON parser can raise. Exhaustive for this
/// crate's core (spec.md §6).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ParseErrorKind {
    Utf8SequenceInvalid,
    NullCharacterDisallowed,
    TokenCharacterUnrecognized,
    StringLiteralUnclosed,
    EscapeSequenceUnknown,
    EscapeSequenceIncomplete,
    EscapeSequenceInvalidHex,
    EscapeUtfCodePointInvalid,
    NumericLiteralInvalid,
    NumericLiteralSuffixInvalid,
    IntegerLiteralOverflow,
    IntegerLiteralInexact,
    RealLiteralOverflow,
    RealLiteralUnderflow,
    BlockCommentUnclosed,
    LineTooLong,
    TooManyLines,

    // JSON / JSON5 parser extensions.
    FileOpenFailed,
    ExpressionExpected,
    ColonExpected,
    CommaExpected,
    ClosedBraceOrCommaExpected,
    ClosedBraceOrJson5KeyExpected,
}

impl ParseErrorKind {
    /// One-line description, independent of location — mirrors
    /// `describe_parser_status` in the original source.
    #[must_use]
    pub fn describe(self) -> &'static str {
        use ParseErrorKind::*;
        match self {
            Utf8SequenceInvalid => "the source line is not valid UTF-8",
            NullCharacterDisallowed => "a plain NUL character is not allowed in source text",
            TokenCharacterUnrecognized => "the character does not start any recognized token",
            StringLiteralUnclosed => "a string literal is missing its closing quote",
            EscapeSequenceUnknown => "an unknown escape sequence was encountered",
            EscapeSequenceIncomplete => "an escape sequence is missing trailing characters",
            EscapeSequenceInvalidHex => "an escape sequence contains non-hexadecimal digits",
            EscapeUtfCodePointInvalid => {
                "a \\u or \\U escape does not encode a valid Unicode scalar value"
            }
            NumericLiteralInvalid => "the numeric literal has an invalid digit sequence",
            NumericLiteralSuffixInvalid => {
                "the numeric literal is followed by an invalid trailing character"
            }
            IntegerLiteralOverflow => "the integer literal is too large to fit in 64 bits",
            IntegerLiteralInexact => "the integer literal cannot be represented exactly",
            RealLiteralOverflow => "the real literal overflows to infinity",
            RealLiteralUnderflow => "the real literal underflows to zero",
            BlockCommentUnclosed => "a block comment was not closed before the end of input",
            LineTooLong => "a source line is too long",
            TooManyLines => "the source file has too many lines",
            FileOpenFailed => "the file could not be opened for reading",
            ExpressionExpected => "an expression was expected here",
            ColonExpected => "a colon was expected here",
            CommaExpected => "a comma was expected here",
            ClosedBraceOrCommaExpected => "a closing brace or a comma was expected here",
            ClosedBraceOrJson5KeyExpected => "a closing brace or an object key was expected here",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A structured parse-time error: status code, source location, and the
/// byte-length of the offending span.
#[derive(Debug, Clone)]
pub struct ParseError {
    kind: ParseErrorKind,
    location: SourceLocation,
    length: usize,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, location: SourceLocation, length: usize) -> Self {
        Self {
            kind,
            location,
            length,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_none() {
            write!(f, "error at the end of input: {}", self.kind.describe())
        } else {
            write!(
                f,
                "error at {} (length {}): {}",
                self.location,
                self.length,
                self.kind.describe()
            )
        }
    }
}

impl std::error::Error for ParseError {}

// Exceptions-as-control-flow in the original source become a `Result` type
// here; `ParseError` is plain data so copying or cloning it can never panic,
// matching spec.md §7's "copy/move of error objects must not themselves throw."
pub type ParseResult<T> = Result<T, ParseError>;
