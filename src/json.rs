//! Non-recursive JSON/JSON5 formatting and parsing (spec.md §4.5).
//!
//! Grounded in `examples/original_source/asteria/src/library/json.{hpp,cpp}`'s
//! `std_json_format`/`std_json_format5`/`std_json_parse`/`std_json_parse_file`
//! surface. The formatter walks an explicit frame stack instead of
//! recursing so that a deeply nested `Value` cannot overflow the host's
//! stack; the parser reuses [`crate::token`]'s lexer (configured via
//! [`crate::token::LexerOptions::json5`]) the same way the original reuses
//! its own tokenizer for object/array punctuation.

use crate::error_parsing::{ParseError, ParseErrorKind, ParseResult};
use crate::immutable_string::ImmutableString;
use crate::position::SourceLocation;
use crate::token::{tokenize, Keyword, LexerOptions, Punctuator, Token, TokenKind, TokenStream};
use crate::value::Value;
use std::fmt::Write as _;
use std::rc::Rc;

/// How a formatted document is indented (spec.md §4.5).
#[derive(Debug, Clone)]
pub enum Indenter {
    /// Single-line output, values separated by `", "` and `": "`.
    None,
    /// Indent each nesting level by `width` spaces.
    Spaces(usize),
    /// Indent each nesting level with a literal string (e.g. `"\t"`).
    Custom(String),
}

impl Indenter {
    fn unit(&self) -> String {
        match self {
            Indenter::None => String::new(),
            Indenter::Spaces(n) => " ".repeat(*n),
            Indenter::Custom(s) => s.clone(),
        }
    }

    fn is_pretty(&self) -> bool {
        !matches!(self, Indenter::None)
    }
}

enum Frame<'a> {
    ArrayItem {
        items: &'a [Value],
        index: usize,
        depth: usize,
    },
    ObjectMember {
        members: &'a [(ImmutableString, Value)],
        index: usize,
        depth: usize,
        json5: bool,
        wrote: bool,
    },
}

/// Render `value` as standard JSON (spec.md §4.5's `format`).
#[must_use]
pub fn format(value: &Value, indenter: &Indenter) -> String {
    format_impl(value, indenter, false)
}

/// Render `value` as JSON5: bare object keys where possible, a trailing
/// comma before each closing `]`/`}` whenever `indenter` is not
/// [`Indenter::None`] (spec.md §4.5: "JSON5 with non-empty indent adds
/// trailing commas before array/object closers"), and non-finite reals
/// spelled out as `NaN`/`Infinity`/`-Infinity` rather than rejected.
#[must_use]
pub fn format5(value: &Value, indenter: &Indenter) -> String {
    format_impl(value, indenter, true)
}

fn format_impl(value: &Value, indenter: &Indenter, json5: bool) -> String {
    let mut out = String::new();
    let unit = indenter.unit();
    let pretty = indenter.is_pretty();
    let mut stack: Vec<Frame> = Vec::new();

    write_scalar_or_open(&mut out, value, &mut stack, 0, json5);

    while let Some(frame) = stack.last_mut() {
        match frame {
            Frame::ArrayItem { items, index, depth } => {
                if *index >= items.len() {
                    let depth = *depth;
                    let trailing_comma = json5 && pretty && !items.is_empty();
                    stack.pop();
                    if trailing_comma {
                        out.push(',');
                    }
                    close_container(&mut out, ']', depth, pretty, &unit);
                    continue;
                }
                let i = *index;
                let d = *depth;
                *index += 1;
                if i > 0 {
                    out.push(',');
                    if !pretty {
                        out.push(' ');
                    }
                }
                newline_indent(&mut out, pretty, &unit, d + 1);
                write_scalar_or_open(&mut out, &items[i], &mut stack, d + 1, json5);
            }
            Frame::ObjectMember {
                members,
                index,
                depth,
                json5: j5,
                wrote,
            } => {
                // Opaque and function values have no JSON representation;
                // such members are skipped entirely rather than rendered as
                // `null` (unlike an opaque/function array element, which
                // still occupies its slot as `null`).
                while *index < members.len()
                    && matches!(members[*index].1, Value::Opaque(_) | Value::Function(_))
                {
                    *index += 1;
                }
                if *index >= members.len() {
                    let depth = *depth;
                    let trailing_comma = json5 && pretty && *wrote;
                    stack.pop();
                    if trailing_comma {
                        out.push(',');
                    }
                    close_container(&mut out, '}', depth, pretty, &unit);
                    continue;
                }
                let i = *index;
                let d = *depth;
                let j5 = *j5;
                *index += 1;
                if *wrote {
                    out.push(',');
                    if !pretty {
                        out.push(' ');
                    }
                }
                *wrote = true;
                newline_indent(&mut out, pretty, &unit, d + 1);
                write_key(&mut out, &members[i].0, j5);
                out.push_str(": ");
                write_scalar_or_open(&mut out, &members[i].1, &mut stack, d + 1, json5);
            }
        }
    }

    out
}

fn write_scalar_or_open<'a>(
    out: &mut String,
    value: &'a Value,
    stack: &mut Vec<Frame<'a>>,
    depth: usize,
    json5: bool,
) {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
            } else {
                out.push('[');
                stack.push(Frame::ArrayItem {
                    items,
                    index: 0,
                    depth,
                });
            }
        }
        Value::Object(members) => {
            if members.is_empty() {
                out.push_str("{}");
            } else {
                out.push('{');
                stack.push(Frame::ObjectMember {
                    members,
                    index: 0,
                    depth,
                    json5,
                    wrote: false,
                });
            }
        }
        other => write_scalar(out, other, json5),
    }
}

fn close_container(out: &mut String, close: char, depth: usize, pretty: bool, unit: &str) {
    newline_indent(out, pretty, unit, depth);
    out.push(close);
}

fn newline_indent(out: &mut String, pretty: bool, unit: &str, depth: usize) {
    if pretty {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(unit);
        }
    }
}

fn write_key(out: &mut String, key: &str, json5: bool) {
    if json5 && is_bare_identifier(key) {
        out.push_str(key);
    } else {
        write_json_string(out, key);
    }
}

fn is_bare_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_scalar(out: &mut String, value: &Value, json5: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::Real(r) => write_real(out, *r, json5),
        Value::String(s) => write_json_string(out, s.as_str()),
        // Reached for a bare top-level value or an array element; an object
        // member with one of these types is filtered out before this is
        // ever called (see the `ObjectMember` frame above).
        Value::Opaque(_) | Value::Function(_) => out.push_str("null"),
        Value::Array(_) | Value::Object(_) => unreachable!("containers open a frame instead"),
    }
}

fn write_real(out: &mut String, r: f64, json5: bool) {
    if r.is_nan() {
        out.push_str(if json5 { "NaN" } else { "null" });
    } else if r.is_infinite() {
        if json5 {
            out.push_str(if r > 0.0 { "Infinity" } else { "-Infinity" });
        } else {
            out.push_str("null");
        }
    } else {
        let _ = write!(out, "{}", r);
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7E => {
                write_escaped_unicode(out, c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Escape one codepoint as `\uXXXX`, splitting anything past the Basic
/// Multilingual Plane (above `U+FFFF`) into a UTF-16 surrogate pair, since a
/// JSON string is defined over UTF-16 code units.
fn write_escaped_unicode(out: &mut String, c: char) {
    let cp = c as u32;
    if cp > 0xFFFF {
        let v = cp - 0x10000;
        let high = 0xD800 + (v >> 10);
        let low = 0xDC00 + (v & 0x3FF);
        let _ = write!(out, "\\u{:04x}\\u{:04x}", high, low);
    } else {
        let _ = write!(out, "\\u{:04x}", cp);
    }
}

/// Parse a JSON or JSON5 document from `text` (spec.md §4.5's `parse`).
/// The lexer is reused in its [`LexerOptions::json5`] dialect so that both
/// strict JSON and the JSON5 superset (bare keys, single-quoted strings,
/// trailing-comma-free numbers with leading `+`) parse through one grammar.
pub fn parse(text: &str, file: &str) -> ParseResult<Value> {
    let mut stream = tokenize(text.as_bytes(), file, &LexerOptions::json5())?;
    let value = parse_value(&mut stream)?;
    if let Some(extra) = stream.peek() {
        return Err(ParseError::new(
            ParseErrorKind::CommaExpected,
            extra.location().clone(),
            extra.length(),
        ));
    }
    Ok(value)
}

/// Parse a JSON/JSON5 document from a file on disk (spec.md §4.5's
/// `parse_file`).
pub fn parse_file(path: &str) -> ParseResult<Value> {
    let bytes = std::fs::read(path).map_err(|_| {
        ParseError::new(ParseErrorKind::FileOpenFailed, SourceLocation::none(), 0)
    })?;
    parse(&String::from_utf8_lossy(&bytes), path)
}

enum BuildFrame {
    Array(Vec<Value>),
    Object(Vec<(ImmutableString, Value)>, Option<ImmutableString>),
}

/// What the next token starts: a complete scalar, or the opening of a
/// container whose members still need to be read.
enum Next {
    Value(Value),
    OpenArray,
    OpenObject(ImmutableString),
}

/// Non-recursive descent: every `[`/`{` just pushes a [`BuildFrame`] and
/// loops back for the next token, rather than calling back into itself, so
/// arbitrarily deep nesting (e.g. adversarial input like `[[[[[...`) costs
/// stack-free heap growth instead of host call-stack depth.
fn parse_value(stream: &mut TokenStream) -> ParseResult<Value> {
    let mut stack: Vec<BuildFrame> = Vec::new();
    let mut pending = read_next(stream)?;

    loop {
        let current = match pending {
            Next::Value(v) => v,
            Next::OpenArray => {
                stack.push(BuildFrame::Array(Vec::new()));
                pending = read_next(stream)?;
                continue;
            }
            Next::OpenObject(key) => {
                stack.push(BuildFrame::Object(Vec::new(), Some(key)));
                pending = read_next(stream)?;
                continue;
            }
        };

        match stack.last_mut() {
            None => return Ok(current),
            Some(BuildFrame::Array(items)) => {
                items.push(current);
                match stream.peek().map(Token::kind) {
                    Some(TokenKind::Punctuator(Punctuator::Comma)) => {
                        stream.advance();
                        // JSON5 tolerates a trailing comma right before the
                        // closing bracket (spec.md's "parsing `[1,2,3,]`
                        // equals parsing `[1,2,3]`").
                        if matches!(
                            stream.peek().map(Token::kind),
                            Some(TokenKind::Punctuator(Punctuator::RBracket))
                        ) {
                            stream.advance();
                            let BuildFrame::Array(items) = stack.pop().unwrap() else {
                                unreachable!()
                            };
                            pending = Next::Value(Value::Array(Rc::new(items)));
                        } else {
                            pending = read_next(stream)?;
                        }
                    }
                    Some(TokenKind::Punctuator(Punctuator::RBracket)) => {
                        stream.advance();
                        let BuildFrame::Array(items) = stack.pop().unwrap() else {
                            unreachable!()
                        };
                        pending = Next::Value(Value::Array(Rc::new(items)));
                    }
                    _ => {
                        return Err(unexpected(
                            stream,
                            ParseErrorKind::ClosedBraceOrCommaExpected,
                        ))
                    }
                }
            }
            Some(BuildFrame::Object(members, pending_key)) => {
                let key = pending_key.take().expect("key parsed before value");
                // A repeated key overwrites the earlier member in place
                // rather than appending a duplicate, so the last occurrence
                // in source order wins (matching ordinary JSON object
                // semantics).
                match members.iter_mut().find(|(k, _)| k.as_str() == key.as_str()) {
                    Some(slot) => slot.1 = current,
                    None => members.push((key, current)),
                }
                match stream.peek().map(Token::kind) {
                    Some(TokenKind::Punctuator(Punctuator::Comma)) => {
                        stream.advance();
                        // JSON5 tolerates a trailing comma right before the
                        // closing brace, same as the array case above.
                        if matches!(
                            stream.peek().map(Token::kind),
                            Some(TokenKind::Punctuator(Punctuator::RBrace))
                        ) {
                            stream.advance();
                            let BuildFrame::Object(members, _) = stack.pop().unwrap() else {
                                unreachable!()
                            };
                            pending = Next::Value(Value::Object(Rc::new(members)));
                        } else {
                            let key = parse_object_key(stream)?;
                            expect_punct(stream, Punctuator::Colon, ParseErrorKind::ColonExpected)?;
                            if let Some(BuildFrame::Object(_, pending)) = stack.last_mut() {
                                *pending = Some(key);
                            }
                            pending = read_next(stream)?;
                        }
                    }
                    Some(TokenKind::Punctuator(Punctuator::RBrace)) => {
                        stream.advance();
                        let BuildFrame::Object(members, _) = stack.pop().unwrap() else {
                            unreachable!()
                        };
                        pending = Next::Value(Value::Object(Rc::new(members)));
                    }
                    _ => {
                        return Err(unexpected(
                            stream,
                            ParseErrorKind::ClosedBraceOrCommaExpected,
                        ))
                    }
                }
            }
        }
    }
}

fn read_next(stream: &mut TokenStream) -> ParseResult<Next> {
    let token = stream
        .advance()
        .ok_or_else(|| ParseError::new(ParseErrorKind::ExpressionExpected, SourceLocation::none(), 0))?;

    match token.kind() {
        TokenKind::Punctuator(Punctuator::LBracket) => {
            if matches!(
                stream.peek().map(Token::kind),
                Some(TokenKind::Punctuator(Punctuator::RBracket))
            ) {
                stream.advance();
                return Ok(Next::Value(Value::Array(Rc::new(Vec::new()))));
            }
            Ok(Next::OpenArray)
        }
        TokenKind::Punctuator(Punctuator::LBrace) => {
            if matches!(
                stream.peek().map(Token::kind),
                Some(TokenKind::Punctuator(Punctuator::RBrace))
            ) {
                stream.advance();
                return Ok(Next::Value(Value::Object(Rc::new(Vec::new()))));
            }
            let key = parse_object_key(stream)?;
            expect_punct(stream, Punctuator::Colon, ParseErrorKind::ColonExpected)?;
            Ok(Next::OpenObject(key))
        }
        TokenKind::Keyword(Keyword::Null) => Ok(Next::Value(Value::Null)),
        TokenKind::Keyword(Keyword::True) => Ok(Next::Value(Value::Boolean(true))),
        TokenKind::Keyword(Keyword::False) => Ok(Next::Value(Value::Boolean(false))),
        TokenKind::IntegerLiteral(n) => Ok(Next::Value(Value::Integer(*n))),
        TokenKind::RealLiteral(r) => Ok(Next::Value(Value::Real(*r))),
        TokenKind::StringLiteral(bytes) => Ok(Next::Value(Value::String(
            String::from_utf8_lossy(bytes).into_owned().into(),
        ))),
        _ => Err(ParseError::new(
            ParseErrorKind::ExpressionExpected,
            token.location().clone(),
            token.length(),
        )),
    }
}

fn parse_object_key(stream: &mut TokenStream) -> ParseResult<ImmutableString> {
    let token = stream.advance().ok_or_else(|| {
        ParseError::new(ParseErrorKind::ClosedBraceOrJson5KeyExpected, SourceLocation::none(), 0)
    })?;
    match token.kind() {
        TokenKind::StringLiteral(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned().into()),
        TokenKind::Identifier(s) => Ok(s.as_str().into()),
        // JSON5 allows reserved words as bare keys too.
        TokenKind::Keyword(kw) => Ok(kw.as_str().into()),
        _ => Err(ParseError::new(
            ParseErrorKind::ClosedBraceOrJson5KeyExpected,
            token.location().clone(),
            token.length(),
        )),
    }
}

fn expect_punct(stream: &mut TokenStream, p: Punctuator, on_missing: ParseErrorKind) -> ParseResult<()> {
    match stream.peek().map(Token::kind) {
        Some(TokenKind::Punctuator(found)) if *found == p => {
            stream.advance();
            Ok(())
        }
        Some(tok) => Err(ParseError::new(on_missing, stream.peek().unwrap().location().clone(), tok_len(tok))),
        None => Err(ParseError::new(on_missing, SourceLocation::none(), 0)),
    }
}

fn tok_len(kind: &TokenKind) -> usize {
    match kind {
        TokenKind::Identifier(s) => s.len(),
        _ => 1,
    }
}

fn unexpected(stream: &mut TokenStream, kind: ParseErrorKind) -> ParseError {
    match stream.peek() {
        Some(t) => ParseError::new(kind, t.location().clone(), t.length()),
        None => ParseError::new(kind, SourceLocation::none(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_structure() {
        let value = parse(r#"{"a": [1, 2.5, "x", null, true]}"#, "test").unwrap();
        let rendered = format(&value, &Indenter::None);
        assert_eq!(rendered, r#"{"a": [1, 2.5, "x", null, true]}"#);
    }

    #[test]
    fn json5_accepts_bare_keys_and_single_quotes() {
        let value = parse("{a: 'hi', b: 1}", "test").unwrap();
        match value {
            Value::Object(m) => {
                assert_eq!(m[0].0.as_str(), "a");
                assert!(m[0].1.value_eq(&Value::from("hi")));
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn format5_spells_out_non_finite_reals() {
        let rendered = format5(&Value::Real(f64::NAN), &Indenter::None);
        assert_eq!(rendered, "NaN");
        let rendered = format(&Value::Real(f64::NAN), &Indenter::None);
        assert_eq!(rendered, "null");
    }

    #[test]
    fn trailing_comma_is_tolerated_in_arrays_and_objects() {
        let with_comma = parse("[1,2,3,]", "test").unwrap();
        let without = parse("[1,2,3]", "test").unwrap();
        assert!(with_comma.value_eq(&without));

        let obj = parse("{x:1,}", "test").unwrap();
        match obj {
            Value::Object(m) => assert_eq!(m.len(), 1),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn pretty_indent_nests_by_depth() {
        let value = parse("[1, [2]]", "test").unwrap();
        let rendered = format(&value, &Indenter::Spaces(2));
        assert_eq!(rendered, "[\n  1,\n  [\n    2\n  ]\n]");
    }

    #[test]
    fn non_ascii_characters_escape_as_unicode_sequences() {
        let rendered = format(&Value::from("a\u{00e9}"), &Indenter::None);
        assert_eq!(rendered, "\"a\\u00e9\"");
    }

    #[test]
    fn astral_characters_escape_as_surrogate_pairs() {
        // U+1F600 GRINNING FACE, encoded as the UTF-16 surrogate pair
        // 0xD83D 0xDE00.
        let rendered = format(&Value::from("\u{1F600}"), &Indenter::None);
        assert_eq!(rendered, "\"\\ud83d\\ude00\"");
    }

    #[test]
    fn format5_adds_trailing_comma_when_pretty() {
        let value = parse("[1, 2]", "test").unwrap();
        let rendered = format5(&value, &Indenter::Spaces(2));
        assert_eq!(rendered, "[\n  1,\n  2,\n]");

        // Compact (non-pretty) JSON5 still omits the trailing comma.
        let compact = format5(&value, &Indenter::None);
        assert_eq!(compact, "[1, 2]");
    }

    #[test]
    fn plain_format_never_adds_trailing_comma() {
        let value = parse("[1, 2]", "test").unwrap();
        let rendered = format(&value, &Indenter::Spaces(2));
        assert_eq!(rendered, "[\n  1,\n  2\n]");
    }

    #[test]
    fn opaque_and_function_members_are_omitted_from_objects() {
        #[derive(Debug)]
        struct Dummy;
        impl crate::value::Opaque for Dummy {
            fn type_name(&self) -> &'static str {
                "dummy"
            }
        }

        let members = vec![
            ("a".into(), Value::Integer(1)),
            ("b".into(), Value::Opaque(std::rc::Rc::new(Dummy))),
            ("c".into(), Value::Integer(2)),
        ];
        let value = Value::Object(Rc::new(members));
        let rendered = format(&value, &Indenter::None);
        assert_eq!(rendered, r#"{"a": 1, "c": 2}"#);
    }

    #[test]
    fn duplicate_object_keys_keep_the_last_value() {
        let value = parse(r#"{"a": 1, "a": 2}"#, "test").unwrap();
        match value {
            Value::Object(m) => {
                assert_eq!(m.len(), 1);
                assert!(m[0].1.value_eq(&Value::Integer(2)));
            }
            _ => panic!("expected object"),
        }
    }
}
