//! The lexer: source bytes to a token stream (spec.md §4.1).
//!
//! A line-oriented scanner in the style of `rhai::token`'s character-level
//! state machine, generalized to the richer JSON5-flavoured numeric/string
//! grammar and the `(file, line, column)` source locations Asteria's
//! `Token_stream` (see `examples/original_source/asteria/src/compiler/
//! token_stream.cpp`) carries per line.

use crate::error_parsing::{ParseError, ParseErrorKind, ParseResult};
use crate::position::SourceLocation;
use std::collections::VecDeque;
use std::fmt;

const MAX_LINE_LEN: usize = i32::MAX as usize;
const MAX_LINES: usize = i32::MAX as usize;

/// Per-compile dialect configuration (spec.md §6).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LexerOptions {
    /// Numeric literals without a radix point parse as `real`, not `integer`.
    pub integers_as_reals: bool,
    /// Single-quoted strings honor `\`-escapes.
    pub escapable_single_quotes: bool,
    /// Reserved words tokenize as plain identifiers.
    pub keywords_as_identifiers: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            integers_as_reals: false,
            escapable_single_quotes: false,
            keywords_as_identifiers: false,
        }
    }
}

impl LexerOptions {
    /// The dialect the JSON/JSON5 codec configures the lexer with
    /// (spec.md §4.5).
    #[must_use]
    pub fn json5() -> Self {
        Self {
            integers_as_reals: true,
            escapable_single_quotes: true,
            keywords_as_identifiers: true,
        }
    }
}

/// Reserved words. Tokenized as [`TokenKind::Keyword`] unless
/// [`LexerOptions::keywords_as_identifiers`] is set.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Keyword {
    Var,
    Const,
    Func,
    If,
    Else,
    Switch,
    Case,
    Default,
    Do,
    While,
    For,
    Each,
    Try,
    Catch,
    Throw,
    Break,
    Continue,
    Return,
    Null,
    True,
    False,
    Unset,
    And,
    Or,
    Not,
    Assert,
    Defer,
}

impl Keyword {
    const TABLE: &'static [(&'static str, Keyword)] = &[
        ("and", Keyword::And),
        ("assert", Keyword::Assert),
        ("break", Keyword::Break),
        ("case", Keyword::Case),
        ("catch", Keyword::Catch),
        ("const", Keyword::Const),
        ("continue", Keyword::Continue),
        ("default", Keyword::Default),
        ("defer", Keyword::Defer),
        ("do", Keyword::Do),
        ("each", Keyword::Each),
        ("else", Keyword::Else),
        ("false", Keyword::False),
        ("for", Keyword::For),
        ("func", Keyword::Func),
        ("if", Keyword::If),
        ("not", Keyword::Not),
        ("null", Keyword::Null),
        ("or", Keyword::Or),
        ("return", Keyword::Return),
        ("switch", Keyword::Switch),
        ("throw", Keyword::Throw),
        ("true", Keyword::True),
        ("try", Keyword::Try),
        ("unset", Keyword::Unset),
        ("var", Keyword::Var),
        ("while", Keyword::While),
    ];

    /// Binary search of the sorted keyword table (spec.md §4.1).
    #[must_use]
    pub fn lookup(ident: &str) -> Option<Keyword> {
        Self::TABLE
            .binary_search_by_key(&ident, |(name, _)| *name)
            .ok()
            .map(|i| Self::TABLE[i].1)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, kw)| *kw == self)
            .map(|(name, _)| *name)
            .unwrap_or("<keyword>")
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Punctuators, longest-prefix-match scanned (spec.md §4.1: "~60 symbols").
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Punctuator {
    Not,          // !
    NotEq,        // !=
    Percent,      // %
    PercentEq,    // %=
    Amp,          // &
    AmpAmp,       // &&
    AmpAmpEq,     // &&=
    AmpEq,        // &=
    LParen,       // (
    RParen,       // )
    Star,         // *
    StarStar,     // **
    StarStarEq,   // **=
    StarEq,       // *=
    Plus,         // +
    PlusPlus,     // ++
    PlusEq,       // +=
    Comma,        // ,
    Minus,        // -
    MinusMinus,   // --
    MinusEq,      // -=
    Arrow,        // ->
    Dot,          // .
    Ellipsis,     // ...
    Slash,        // /
    SlashEq,      // /=
    Colon,        // :
    ColonColon,   // ::
    Semicolon,    // ;
    Lt,           // <
    Shl,          // <<
    Sll,          // <<<
    SllEq,        // <<<=
    ShlEq,        // <<=
    Le,           // <=
    Spaceship,    // <=>
    Assign,       // =
    Eq,           // ==
    FatArrow,     // =>
    Gt,           // >
    Ge,           // >=
    Shr,          // >>
    ShrEq,        // >>=
    Srl,          // >>>
    SrlEq,        // >>>=
    Question,     // ?
    Coalesce,     // ??
    CoalesceEq,   // ??=
    QuestionEq,   // ?=
    LBracket,     // [
    RBracket,     // ]
    Caret,        // ^
    CaretEq,      // ^=
    LBrace,       // {
    Pipe,         // |
    PipeEq,       // |=
    PipePipe,     // ||
    PipePipeEq,   // ||=
    RBrace,       // }
    Tilde,        // ~
}

impl Punctuator {
    /// Sorted longest-first so a linear scan finds the maximal munch; the
    /// real structure is still "sorted by first byte" per spec.md §4.1, this
    /// flattens that into one table scanned with `starts_with`.
    const TABLE: &'static [(&'static str, Punctuator)] = &[
        ("...", Punctuator::Ellipsis),
        ("<<<=", Punctuator::SllEq),
        (">>>=", Punctuator::SrlEq),
        ("<<<", Punctuator::Sll),
        (">>>", Punctuator::Srl),
        ("<<=", Punctuator::ShlEq),
        (">>=", Punctuator::ShrEq),
        ("<=>", Punctuator::Spaceship),
        ("&&=", Punctuator::AmpAmpEq),
        ("||=", Punctuator::PipePipeEq),
        ("??=", Punctuator::CoalesceEq),
        ("**=", Punctuator::StarStarEq),
        ("!=", Punctuator::NotEq),
        ("%=", Punctuator::PercentEq),
        ("&&", Punctuator::AmpAmp),
        ("&=", Punctuator::AmpEq),
        ("**", Punctuator::StarStar),
        ("*=", Punctuator::StarEq),
        ("++", Punctuator::PlusPlus),
        ("+=", Punctuator::PlusEq),
        ("--", Punctuator::MinusMinus),
        ("-=", Punctuator::MinusEq),
        ("->", Punctuator::Arrow),
        ("/=", Punctuator::SlashEq),
        ("::", Punctuator::ColonColon),
        ("<<", Punctuator::Shl),
        ("<=", Punctuator::Le),
        ("==", Punctuator::Eq),
        ("=>", Punctuator::FatArrow),
        (">=", Punctuator::Ge),
        (">>", Punctuator::Shr),
        ("??", Punctuator::Coalesce),
        ("?=", Punctuator::QuestionEq),
        ("^=", Punctuator::CaretEq),
        ("|=", Punctuator::PipeEq),
        ("||", Punctuator::PipePipe),
        ("!", Punctuator::Not),
        ("%", Punctuator::Percent),
        ("&", Punctuator::Amp),
        ("(", Punctuator::LParen),
        (")", Punctuator::RParen),
        ("*", Punctuator::Star),
        ("+", Punctuator::Plus),
        (",", Punctuator::Comma),
        ("-", Punctuator::Minus),
        (".", Punctuator::Dot),
        ("/", Punctuator::Slash),
        (":", Punctuator::Colon),
        (";", Punctuator::Semicolon),
        ("<", Punctuator::Lt),
        ("=", Punctuator::Assign),
        (">", Punctuator::Gt),
        ("?", Punctuator::Question),
        ("[", Punctuator::LBracket),
        ("]", Punctuator::RBracket),
        ("^", Punctuator::Caret),
        ("{", Punctuator::LBrace),
        ("|", Punctuator::Pipe),
        ("}", Punctuator::RBrace),
        ("~", Punctuator::Tilde),
    ];

    /// Longest-prefix match against `text`; returns the punctuator and its
    /// byte length, or `None` if no punctuator starts here.
    #[must_use]
    pub fn scan(text: &str) -> Option<(Punctuator, usize)> {
        Self::TABLE
            .iter()
            .find(|(sym, _)| text.starts_with(sym))
            .map(|(sym, p)| (*p, sym.len()))
    }

    #[must_use]
    pub fn literal(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, p)| *p == self)
            .map(|(sym, _)| *sym)
            .unwrap_or("<punctuator>")
    }
}

impl fmt::Display for Punctuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

/// The payload carried by a [`Token`] (spec.md §3.4).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Punctuator(Punctuator),
    Identifier(String),
    IntegerLiteral(i64),
    RealLiteral(f64),
    StringLiteral(Vec<u8>),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => fmt::Display::fmt(k, f),
            Self::Punctuator(p) => fmt::Display::fmt(p, f),
            Self::Identifier(s) => f.write_str(s),
            Self::IntegerLiteral(n) => write!(f, "{}", n),
            Self::RealLiteral(n) => write!(f, "{}", n),
            Self::StringLiteral(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// A lexeme: `(source location, length, kind)` (spec.md §3.4).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    location: SourceLocation,
    length: usize,
    kind: TokenKind,
}

impl Token {
    #[must_use]
    pub fn new(location: SourceLocation, length: usize, kind: TokenKind) -> Self {
        Self {
            location,
            length,
            kind,
        }
    }

    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }
}

/// The consumable output of the lexer.
///
/// The algorithm in spec.md §4.1 builds the token vector and reverses it in
/// place so the parser can pop from the tail cheaply; a `VecDeque` gives the
/// same O(1) peek/advance/push-back guarantees without that reversal step
/// (spec.md §9's "an implementation detail of the source ... a
/// re-implementation may use a deque"), so that is what this crate stores
/// tokens in, consumed front-to-back in source order.
#[derive(Debug, Clone, Default)]
pub struct TokenStream(VecDeque<Token>);

impl TokenStream {
    #[must_use]
    pub fn peek(&self) -> Option<&Token> {
        self.0.front()
    }

    pub fn advance(&mut self) -> Option<Token> {
        self.0.pop_front()
    }

    /// Push a token back onto the front, e.g. after a failed speculative
    /// lookahead in the JSON parser.
    pub fn push_front(&mut self, token: Token) {
        self.0.push_front(token);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.advance()
    }
}

/// Scan `source` (a single named file's bytes) into a [`TokenStream`]
/// (spec.md §4.1).
pub fn tokenize(source: &[u8], file: &str, options: &LexerOptions) -> ParseResult<TokenStream> {
    let mut tokens = Vec::new();
    let mut lines = split_lines(source)?;

    // Shebang: discarded only if it is physically the first line.
    if let Some(first) = lines.first() {
        if first.starts_with(b"#!") {
            lines.remove(0);
        }
    }

    let mut block_comment_open: Option<SourceLocation> = None;

    for (line_no, raw_line) in lines.iter().enumerate() {
        let line_no = (line_no + 1) as u32;
        let text = std::str::from_utf8(raw_line).map_err(|_| {
            ParseError::new(
                ParseErrorKind::Utf8SequenceInvalid,
                SourceLocation::new(file, line_no, 1),
                raw_line.len(),
            )
        })?;
        if text.as_bytes().contains(&0) {
            return Err(ParseError::new(
                ParseErrorKind::NullCharacterDisallowed,
                SourceLocation::new(file, line_no, 1),
                1,
            ));
        }

        scan_line(text, file, line_no, options, &mut tokens, &mut block_comment_open)?;
    }

    if let Some(loc) = block_comment_open {
        return Err(ParseError::new(ParseErrorKind::BlockCommentUnclosed, loc, 2));
    }

    Ok(TokenStream(tokens.into()))
}

/// Split `source` into logical lines terminated by LF or EOF (spec.md §4.1
/// step 1).
fn split_lines(source: &[u8]) -> ParseResult<Vec<&[u8]>> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    for (i, &b) in source.iter().enumerate() {
        if b == b'\n' {
            let line = &source[start..i];
            if line.len() >= MAX_LINE_LEN {
                return Err(ParseError::new(
                    ParseErrorKind::LineTooLong,
                    SourceLocation::new("", (lines.len() + 1) as u32, 1),
                    line.len(),
                ));
            }
            lines.push(line);
            start = i + 1;
            if lines.len() >= MAX_LINES {
                return Err(ParseError::new(
                    ParseErrorKind::TooManyLines,
                    SourceLocation::none(),
                    0,
                ));
            }
        }
    }
    if start < source.len() {
        lines.push(&source[start..]);
    }
    Ok(lines)
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_id_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_digit_for_radix(c: char, radix: u32) -> bool {
    match radix {
        2 => c == '0' || c == '1',
        16 => c.is_ascii_hexdigit(),
        _ => c.is_ascii_digit(),
    }
}

/// Scan one already-UTF8-validated source line, appending tokens.
fn scan_line(
    text: &str,
    file: &str,
    line_no: u32,
    options: &LexerOptions,
    tokens: &mut Vec<Token>,
    block_comment_open: &mut Option<SourceLocation>,
) -> ParseResult<()> {
    let chars: Vec<char> = text.chars().collect();
    let mut col = 0usize; // 0-based index into `chars`
    let mut column_no = 1u32; // 1-based column, matches SourceLocation

    while col < chars.len() {
        let loc = SourceLocation::new(file, line_no, column_no);

        // Carry-over block comment.
        if block_comment_open.is_some() {
            if let Some(end) = find_subslice(&chars[col..], &['*', '/']) {
                col += end + 2;
                column_no += (end + 2) as u32;
                *block_comment_open = None;
                continue;
            } else {
                // Rest of line is still inside the comment.
                return Ok(());
            }
        }

        let c = chars[col];

        if c == ' ' || c == '\t' || c == '\r' {
            col += 1;
            column_no += 1;
            continue;
        }

        if c == '/' && chars.get(col + 1) == Some(&'/') {
            return Ok(()); // line comment: abandon rest of line
        }

        if c == '/' && chars.get(col + 1) == Some(&'*') {
            *block_comment_open = Some(loc.clone());
            col += 2;
            column_no += 2;
            if let Some(end) = find_subslice(&chars[col..], &['*', '/']) {
                col += end + 2;
                column_no += (end + 2) as u32;
                *block_comment_open = None;
            } else {
                return Ok(());
            }
            continue;
        }

        // Numeric literal: digit, or `.` followed by a digit, or a sign in
        // unary position followed by a digit.
        let prev_kind = tokens.last().map(Token::kind);
        let unary_ok = allows_unary_sign(prev_kind);

        if c.is_ascii_digit()
            || (c == '.' && chars.get(col + 1).map_or(false, |d| d.is_ascii_digit()))
            || ((c == '+' || c == '-')
                && unary_ok
                && chars
                    .get(col + 1)
                    .map_or(false, |d| d.is_ascii_digit() || *d == '.'))
        {
            let (kind, consumed) = scan_number(&chars[col..], options, &loc)?;
            tokens.push(Token::new(loc, consumed, kind));
            col += consumed;
            column_no += consumed as u32;
            continue;
        }

        if let Some((p, len)) = Punctuator::scan(&chars[col..].iter().collect::<String>()) {
            tokens.push(Token::new(loc, len, TokenKind::Punctuator(p)));
            col += len;
            column_no += len as u32;
            continue;
        }

        if c == '"' {
            let (bytes, consumed) = scan_quoted_string(&chars[col..], '"', true, &loc)?;
            tokens.push(Token::new(loc, consumed, TokenKind::StringLiteral(bytes)));
            col += consumed;
            column_no += consumed as u32;
            continue;
        }

        if c == '\'' {
            let (bytes, consumed) =
                scan_quoted_string(&chars[col..], '\'', options.escapable_single_quotes, &loc)?;
            tokens.push(Token::new(loc, consumed, TokenKind::StringLiteral(bytes)));
            col += consumed;
            column_no += consumed as u32;
            continue;
        }

        if is_id_start(c) {
            let mut end = col + 1;
            while end < chars.len() && is_id_continue(chars[end]) {
                end += 1;
            }
            let ident: String = chars[col..end].iter().collect();
            let len = end - col;
            let kind = if !options.keywords_as_identifiers {
                match Keyword::lookup(&ident) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Identifier(ident),
                }
            } else {
                TokenKind::Identifier(ident)
            };
            tokens.push(Token::new(loc, len, kind));
            col = end;
            column_no += len as u32;
            continue;
        }

        return Err(ParseError::new(ParseErrorKind::TokenCharacterUnrecognized, loc, 1));
    }

    Ok(())
}

fn allows_unary_sign(prev: Option<&TokenKind>) -> bool {
    match prev {
        None => true,
        Some(TokenKind::Identifier(_))
        | Some(TokenKind::IntegerLiteral(_))
        | Some(TokenKind::RealLiteral(_))
        | Some(TokenKind::StringLiteral(_))
        | Some(TokenKind::Keyword(Keyword::True))
        | Some(TokenKind::Keyword(Keyword::False))
        | Some(TokenKind::Keyword(Keyword::Null)) => false,
        Some(TokenKind::Punctuator(p)) => !matches!(
            p,
            Punctuator::RParen | Punctuator::RBracket | Punctuator::RBrace
        ),
        Some(TokenKind::Keyword(_)) => true,
    }
}

fn find_subslice(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Scan a numeric literal starting at `chars[0]`. Returns the resulting
/// token kind and the number of `char`s consumed.
fn scan_number(
    chars: &[char],
    options: &LexerOptions,
    loc: &SourceLocation,
) -> ParseResult<(TokenKind, usize)> {
    let mut i = 0usize;
    let mut sign = 1i64;
    if chars[0] == '+' || chars[0] == '-' {
        if chars[0] == '-' {
            sign = -1;
        }
        i += 1;
    }

    let radix: u32;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
        radix = 16;
        i += 2;
    } else if chars[i] == '0' && matches!(chars.get(i + 1), Some('b') | Some('B')) {
        radix = 2;
        i += 2;
    } else {
        radix = 10;
    }

    let mantissa_start = i;
    let mut has_radix_point = false;
    let mut has_digits = false;

    while i < chars.len() {
        let c = chars[i];
        if is_digit_for_radix(c, radix) {
            has_digits = true;
            i += 1;
        } else if c == '`' {
            let prev_ok = i > mantissa_start && is_digit_for_radix(chars[i - 1], radix);
            let next_ok = chars
                .get(i + 1)
                .map_or(false, |d| is_digit_for_radix(*d, radix));
            if !prev_ok || !next_ok {
                return Err(ParseError::new(
                    ParseErrorKind::NumericLiteralInvalid,
                    loc.clone(),
                    i + 1,
                ));
            }
            i += 1;
        } else if c == '.' && !has_radix_point {
            has_radix_point = true;
            i += 1;
        } else {
            break;
        }
    }

    if !has_digits {
        return Err(ParseError::new(
            ParseErrorKind::NumericLiteralInvalid,
            loc.clone(),
            i,
        ));
    }

    let mantissa_end = i;
    let mantissa: String = chars[mantissa_start..mantissa_end]
        .iter()
        .filter(|&&c| c != '`')
        .collect();

    let exponent_marker = if radix == 16 { ('p', 'P') } else { ('e', 'E') };
    let mut has_exponent = false;
    let mut exponent: i32 = 0;
    if chars.get(i).map_or(false, |&c| c == exponent_marker.0 || c == exponent_marker.1) {
        has_exponent = true;
        i += 1;
        let mut exp_sign = 1i32;
        if chars.get(i).map_or(false, |&c| c == '+' || c == '-') {
            if chars[i] == '-' {
                exp_sign = -1;
            }
            i += 1;
        }
        let exp_start = i;
        while chars.get(i).map_or(false, |c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == exp_start {
            return Err(ParseError::new(
                ParseErrorKind::NumericLiteralInvalid,
                loc.clone(),
                i,
            ));
        }
        let exp_digits: String = chars[exp_start..i].iter().collect();
        exponent = exp_sign
            * exp_digits
                .parse::<i32>()
                .map_err(|_| ParseError::new(ParseErrorKind::RealLiteralOverflow, loc.clone(), i))?;
    }

    // Trailing alphanumeric characters after the literal are an error.
    let suffix_start = i;
    while chars.get(i).map_or(false, |c| is_id_continue(*c)) {
        i += 1;
    }
    if i != suffix_start {
        return Err(ParseError::new(
            ParseErrorKind::NumericLiteralSuffixInvalid,
            loc.clone(),
            i,
        ));
    }

    let is_real = has_radix_point || has_exponent || options.integers_as_reals;

    if !is_real {
        let value = parse_unsigned(&mantissa, radix)
            .ok_or_else(|| ParseError::new(ParseErrorKind::IntegerLiteralOverflow, loc.clone(), i))?;
        let as_i64 = if radix == 10 {
            if value > i64::MAX as u128 {
                return Err(ParseError::new(ParseErrorKind::IntegerLiteralOverflow, loc.clone(), i));
            }
            value as i64
        } else {
            if value > u64::MAX as u128 {
                return Err(ParseError::new(ParseErrorKind::IntegerLiteralOverflow, loc.clone(), i));
            }
            value as u64 as i64
        };
        return Ok((TokenKind::IntegerLiteral(as_i64.wrapping_mul(sign)), i));
    }

    let magnitude = if radix == 16 {
        parse_radix_float(&mantissa, 16, exponent)
    } else if radix == 2 {
        parse_radix_float(&mantissa, 2, exponent)
    } else {
        // Decimal: reassemble a standard float literal string and let the
        // stdlib parser do IEEE-correct rounding.
        let mut s = mantissa.clone();
        if has_exponent {
            s.push('e');
            s.push_str(&exponent.to_string());
        }
        s.parse::<f64>()
            .map_err(|_| ParseError::new(ParseErrorKind::NumericLiteralInvalid, loc.clone(), i))?
    };

    let value = magnitude * sign as f64;
    if value.is_infinite() {
        return Err(ParseError::new(ParseErrorKind::RealLiteralOverflow, loc.clone(), i));
    }
    if value == 0.0 && mantissa.chars().any(|c| c != '0' && c != '.') {
        return Err(ParseError::new(ParseErrorKind::RealLiteralUnderflow, loc.clone(), i));
    }
    Ok((TokenKind::RealLiteral(value), i))
}

fn parse_unsigned(digits: &str, radix: u32) -> Option<u128> {
    let mut value: u128 = 0;
    for c in digits.chars() {
        if c == '.' {
            continue;
        }
        let d = c.to_digit(radix)? as u128;
        value = value.checked_mul(radix as u128)?.checked_add(d)?;
    }
    Some(value)
}

/// Parse `int[.frac]` in `radix` and apply `2^exponent` — used for hex
/// (`0x1.8p+10` = 1536.0) and binary (`0b1.1e1`) floating literals, the
/// IEEE-754 hex-float grammar spec.md §4.1 and §8 require.
fn parse_radix_float(text: &str, radix: u32, exponent: i32) -> f64 {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((a, b)) => (a, b),
        None => (text, ""),
    };
    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64;
    }
    let mut scale = 1f64 / radix as f64;
    for c in frac_part.chars() {
        value += c.to_digit(radix).unwrap_or(0) as f64 * scale;
        scale /= radix as f64;
    }
    value * 2f64.powi(exponent)
}

/// Scan a quoted string literal (spec.md §4.1), returning raw bytes (not
/// necessarily valid UTF-8, since `\xHH` injects arbitrary bytes) and the
/// number of `char`s consumed including both quotes.
fn scan_quoted_string(
    chars: &[char],
    quote: char,
    honor_escapes: bool,
    loc: &SourceLocation,
) -> ParseResult<(Vec<u8>, usize)> {
    let mut i = 1usize; // skip opening quote
    let mut out = Vec::new();

    loop {
        let c = *chars.get(i).ok_or_else(|| {
            ParseError::new(ParseErrorKind::StringLiteralUnclosed, loc.clone(), i)
        })?;

        if c == quote {
            i += 1;
            return Ok((out, i));
        }

        if c == '\\' && honor_escapes {
            let (bytes, consumed) = scan_escape(&chars[i..], loc, i)?;
            out.extend_from_slice(&bytes);
            i += consumed;
            continue;
        }

        let mut buf = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        i += 1;
    }
}

/// Decode one escape sequence starting at `rest[0] == '\\'`. Returns the
/// decoded bytes and the number of `char`s consumed (including the
/// backslash).
fn scan_escape(rest: &[char], loc: &SourceLocation, offset: usize) -> ParseResult<(Vec<u8>, usize)> {
    let kind = *rest.get(1).ok_or_else(|| {
        ParseError::new(ParseErrorKind::EscapeSequenceIncomplete, loc.clone(), offset + 1)
    })?;

    let simple = |b: u8| Ok((vec![b], 2));
    match kind {
        'a' => simple(0x07),
        'b' => simple(0x08),
        'f' => simple(0x0C),
        'n' => simple(b'\n'),
        'r' => simple(b'\r'),
        't' => simple(b'\t'),
        'v' => simple(0x0B),
        '0' => simple(0x00),
        'Z' => simple(0x1A),
        'e' => simple(0x1B),
        '\\' => simple(b'\\'),
        '\'' => simple(b'\''),
        '"' => simple(b'"'),
        '?' => simple(b'?'),
        '/' => simple(b'/'),
        'x' => {
            let hex: String = rest.get(2..4).map_or(String::new(), |s| s.iter().collect());
            if hex.len() != 2 {
                return Err(ParseError::new(
                    ParseErrorKind::EscapeSequenceIncomplete,
                    loc.clone(),
                    offset + 2,
                ));
            }
            let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                ParseError::new(ParseErrorKind::EscapeSequenceInvalidHex, loc.clone(), offset + 2)
            })?;
            Ok((vec![byte], 4))
        }
        'u' => decode_unicode_escape(rest, loc, offset, 4),
        'U' => decode_unicode_escape(rest, loc, offset, 6),
        _ => Err(ParseError::new(
            ParseErrorKind::EscapeSequenceUnknown,
            loc.clone(),
            offset + 2,
        )),
    }
}

fn decode_unicode_escape(
    rest: &[char],
    loc: &SourceLocation,
    offset: usize,
    digits: usize,
) -> ParseResult<(Vec<u8>, usize)> {
    let hex: String = rest
        .get(2..2 + digits)
        .map_or(String::new(), |s| s.iter().collect());
    if hex.len() != digits {
        return Err(ParseError::new(
            ParseErrorKind::EscapeSequenceIncomplete,
            loc.clone(),
            offset + 2,
        ));
    }
    let code = u32::from_str_radix(&hex, 16).map_err(|_| {
        ParseError::new(ParseErrorKind::EscapeSequenceInvalidHex, loc.clone(), offset + 2)
    })?;
    let ch = char::from_u32(code).ok_or_else(|| {
        ParseError::new(ParseErrorKind::EscapeUtfCodePointInvalid, loc.clone(), offset + 2)
    })?;
    let mut buf = [0u8; 4];
    Ok((
        ch.encode_utf8(&mut buf).as_bytes().to_vec(),
        2 + digits,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_kind(src: &str) -> TokenKind {
        let stream = tokenize(src.as_bytes(), "test", &LexerOptions::default()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(tokens.len(), 1, "expected exactly one token from {:?}, got {:?}", src, tokens);
        tokens.into_iter().next().unwrap().kind().clone()
    }

    #[test]
    fn decimal_exponent_literal() {
        assert_eq!(one_kind("1.5e3"), TokenKind::RealLiteral(1500.0));
    }

    #[test]
    fn hex_float_literal() {
        assert_eq!(one_kind("0x1.8p+10"), TokenKind::RealLiteral(1536.0));
    }

    #[test]
    fn binary_literal_with_digit_separator() {
        assert_eq!(one_kind("0b101`0"), TokenKind::IntegerLiteral(10));
    }

    #[test]
    fn maximal_munch_prefers_longest_punctuator() {
        assert_eq!(
            one_kind("<<<="),
            TokenKind::Punctuator(Punctuator::SllEq)
        );
    }

    #[test]
    fn maximal_munch_does_not_overshoot() {
        let stream = tokenize(b"<<=x", "test", &LexerOptions::default()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(*tokens[0].kind(), TokenKind::Punctuator(Punctuator::ShlEq));
        assert_eq!(*tokens[1].kind(), TokenKind::Identifier("x".into()));
    }

    #[test]
    fn keyword_lookup_is_exact() {
        let stream = tokenize(b"var format", "test", &LexerOptions::default()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(*tokens[0].kind(), TokenKind::Keyword(Keyword::Var));
        assert_eq!(tokens[1].kind(), &TokenKind::Identifier("format".into()));
    }

    #[test]
    fn json5_options_treat_keywords_as_identifiers_and_bare_ints_as_reals() {
        let stream = tokenize(b"true 3", "test", &LexerOptions::json5()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(tokens[0].kind(), &TokenKind::Identifier("true".into()));
        assert_eq!(tokens[1].kind(), &TokenKind::RealLiteral(3.0));
    }

    #[test]
    fn unary_sign_only_after_operator_or_start() {
        // `1-2` is subtraction, not `1` then unary-minus `2`.
        let stream = tokenize(b"1-2", "test", &LexerOptions::default()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(*tokens[0].kind(), TokenKind::IntegerLiteral(1));
        assert_eq!(*tokens[1].kind(), TokenKind::Punctuator(Punctuator::Minus));
        assert_eq!(*tokens[2].kind(), TokenKind::IntegerLiteral(2));
    }

    #[test]
    fn unary_sign_after_lparen_is_part_of_number() {
        let stream = tokenize(b"(-2)", "test", &LexerOptions::default()).unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(*tokens[1].kind(), TokenKind::IntegerLiteral(-2));
    }

    #[test]
    fn string_literal_decodes_escapes() {
        let kind = one_kind(r#""a\nb\x41""#);
        match kind {
            TokenKind::StringLiteral(bytes) => assert_eq!(bytes, b"a\nbA"),
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn long_unicode_escape_takes_six_hex_digits() {
        let kind = one_kind(r#""\U01F600""#);
        match kind {
            TokenKind::StringLiteral(bytes) => {
                assert_eq!(String::from_utf8(bytes).unwrap(), "\u{1F600}");
            }
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_block_comment_is_an_error() {
        let err = tokenize(b"/* never closed", "test", &LexerOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::BlockCommentUnclosed);
    }

    #[test]
    fn shebang_is_stripped_only_on_first_line() {
        let stream = tokenize(b"#!/usr/bin/env lumen\nvar x", "test", &LexerOptions::default())
            .unwrap();
        let tokens: Vec<Token> = stream.collect();
        assert_eq!(*tokens[0].kind(), TokenKind::Keyword(Keyword::Var));
    }
}
