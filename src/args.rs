//! Host-interop argument reading (spec.md §4.3).
//!
//! Grounded in `examples/original_source/asteria/src/library/
//! argument_reader.cpp`'s `Argument_Reader`: a fluent `start()/opt()/req()/
//! finish()` API that records, as it goes, a byte-encoded "prototype" of the
//! parameter list it expected, so that a native function with several
//! overloads can accumulate one prototype per attempted overload and — if
//! every overload rejects the call — render all of them in a single
//! diagnostic via [`ArgumentReader::no_matching_function_call`].
//!
//! The byte encoding is carried over unchanged from the original:
//!
//! ```text
//!   bit 5 (0x20) = required    bit 4 (0x10) = generic (untyped)
//!   bits 3:0     = value-kind nibble (only meaningful when bit 4 is clear)
//! ```
//!
//! `do_fail`'s branch on `m_throw_on_failure` (immediate `ASTERIA_THROW_
//! RUNTIME_ERROR` vs. silently marking the attempt failed) is carried over
//! as [`ArgumentReader::throw_on_failure`]: when set, a type mismatch in
//! [`ArgumentReader::opt`]/[`ArgumentReader::req`] returns `Err` immediately
//! with the exact wording `do_read_typed_argument_optional`/`_required` use
//! ("Argument N had type `X`, but `K` or `null` was expected." / "...`K`
//! was expected." without the `null` clause for `req`), instead of
//! accumulating into the batched [`ArgumentReader::no_matching_function_call`]
//! diagnostic.

use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::position::SourceLocation;
use crate::value::Value;
use std::fmt;

const FLAG_REQUIRED: u8 = 0x20;
const FLAG_GENERIC: u8 = 0x10;
const KIND_MASK: u8 = 0x0F;
/// `required | generic` together mean "variadic placeholder" (the `...` the
/// original renders at the end of a variadic overload's prototype).
const VARIADIC_PLACEHOLDER: u8 = FLAG_REQUIRED | FLAG_GENERIC;

fn kind_nibble(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) => 2,
        Value::Real(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
        Value::Opaque(_) => 7,
        Value::Function(_) => 8,
    }
}

fn kind_name(nibble: u8) -> &'static str {
    match nibble {
        0 => "null",
        1 => "boolean",
        2 => "integer",
        3 => "real",
        4 => "string",
        5 => "array",
        6 => "object",
        7 => "opaque",
        _ => "function",
    }
}

fn encode_optional(v: &Value) -> u8 {
    kind_nibble(v)
}

fn encode_required(v: &Value) -> u8 {
    FLAG_REQUIRED | kind_nibble(v)
}

struct DecodedParam(u8);

impl fmt::Display for DecodedParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = self.0;
        let generic = byte & FLAG_GENERIC != 0;
        let required = byte & FLAG_REQUIRED != 0;
        if generic && required {
            return f.write_str("...");
        }
        if generic {
            return f.write_str("<generic>");
        }
        if required {
            return f.write_str(kind_name(byte & KIND_MASK));
        }
        write!(f, "[{}]", kind_name(byte & KIND_MASK))
    }
}

/// Fluent reader over one native-function call's argument list (spec.md
/// §4.3). A single `ArgumentReader` may be `start()`-ed repeatedly to try
/// several overloads in turn; each attempt's parameter shape is recorded so
/// that if every overload is rejected,
/// [`ArgumentReader::no_matching_function_call`] can render the whole set.
pub struct ArgumentReader<'a> {
    name: String,
    args: &'a [Value],
    location: SourceLocation,
    prototype: Vec<u8>,
    overloads: Vec<u8>,
    succeeded: bool,
    finished: bool,
    throw_on_failure: bool,
}

/// A checkpoint of the prototype cursor (spec.md §4.3's `save_state`/
/// `load_state`), so two overloads that share a common leading parameter
/// list can read that prefix once and branch from the same point.
#[derive(Debug, Clone)]
pub struct ReaderState {
    prototype_len: usize,
    succeeded: bool,
}

impl<'a> ArgumentReader<'a> {
    /// `(function-name, arg-vector, throw_on_failure-flag)` (spec.md §4.3).
    /// With `throw_on_failure` set, the first mismatched argument returns an
    /// immediate per-argument diagnostic instead of silently failing this
    /// attempt for later batched reporting.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        args: &'a [Value],
        location: SourceLocation,
        throw_on_failure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            args,
            location,
            prototype: Vec::new(),
            overloads: Vec::new(),
            succeeded: true,
            finished: true,
            throw_on_failure,
        }
    }

    /// Begin (or restart, for a new overload attempt) recording a parameter
    /// prototype.
    pub fn start(&mut self) -> &mut Self {
        self.prototype.clear();
        self.finished = false;
        self.succeeded = true;
        self
    }

    /// Check-point the prototype cursor.
    #[must_use]
    pub fn save_state(&self) -> ReaderState {
        ReaderState {
            prototype_len: self.prototype.len(),
            succeeded: self.succeeded,
        }
    }

    /// Restore a cursor saved by [`ArgumentReader::save_state`], so a
    /// following overload attempt can re-try from the shared prefix instead
    /// of re-validating it.
    pub fn load_state(&mut self, state: &ReaderState) -> &mut Self {
        self.prototype.truncate(state.prototype_len);
        self.succeeded = state.succeeded;
        self
    }

    fn peek_optional(&mut self) -> Option<&'a Value> {
        if !self.succeeded {
            return None;
        }
        let index = self.prototype.len() - 1;
        self.args.get(index)
    }

    /// `None` means "a previous step already failed, do nothing further";
    /// `Some(None)` means "this slot is required and no argument was
    /// supplied for it".
    fn peek_required(&mut self) -> Option<Option<&'a Value>> {
        if !self.succeeded {
            return None;
        }
        let index = self.prototype.len() - 1;
        Some(self.args.get(index))
    }

    /// Read an untyped generic argument into `value`, or leave it untouched
    /// if the caller didn't supply one (spec.md §4.3's "optional, generic"
    /// parameter kind).
    pub fn opt_value(&mut self, value: &mut Value) -> &mut Self {
        self.prototype.push(FLAG_GENERIC);
        if let Some(arg) = self.peek_optional() {
            *value = arg.clone();
        }
        self
    }

    /// Read an optional, typed argument: `null` or a missing argument both
    /// leave `value` untouched; any other type mismatch fails the reader —
    /// immediately, with "argument N had type X, but K or null was
    /// expected", if [`ArgumentReader::throw_on_failure`](Self) was set.
    pub fn opt<T, F>(
        &mut self,
        value: &mut T,
        extract: F,
        sample: &Value,
    ) -> RuntimeResult<&mut Self>
    where
        F: FnOnce(&Value) -> Option<T>,
    {
        self.prototype.push(encode_optional(sample));
        if let Some(arg) = self.peek_optional() {
            if arg.is_null() {
                return Ok(self);
            }
            match extract(arg) {
                Some(v) => *value = v,
                None => {
                    let err = self.mismatch_error(arg, sample, true);
                    self.succeeded = false;
                    if self.throw_on_failure {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self)
    }

    /// Read a required, typed argument — immediately, with "argument N had
    /// type X, but K was expected", if [`ArgumentReader::throw_on_failure`]
    /// was set.
    pub fn req<T, F>(
        &mut self,
        value: &mut T,
        extract: F,
        sample: &Value,
    ) -> RuntimeResult<&mut Self>
    where
        F: FnOnce(&Value) -> Option<T>,
    {
        self.prototype.push(encode_required(sample));
        if let Some(slot) = self.peek_required() {
            match slot {
                Some(arg) => match extract(arg) {
                    Some(v) => *value = v,
                    None => {
                        let err = self.mismatch_error(arg, sample, false);
                        self.succeeded = false;
                        if self.throw_on_failure {
                            return Err(err);
                        }
                    }
                },
                None => {
                    let err = self.missing_argument_error();
                    self.succeeded = false;
                    if self.throw_on_failure {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self)
    }

    /// The "no enough arguments were provided" diagnostic for a required
    /// slot with nothing supplied (spec.md §4.3, wording from
    /// `do_peek_argument_required_opt`).
    fn missing_argument_error(&self) -> RuntimeError {
        RuntimeError::new(
            RuntimeErrorKind::NoMatchingFunctionCall(format!(
                "no enough arguments were provided for `{}` (expecting at least {})",
                self.name,
                self.prototype.len()
            )),
            self.location.clone(),
        )
    }

    /// Build the "argument N had type X, but K [or null] was expected"
    /// diagnostic for the slot just pushed onto the prototype (spec.md §4.3,
    /// wording from `do_read_typed_argument_optional`/`_required`).
    fn mismatch_error(&self, observed: &Value, sample: &Value, allow_null: bool) -> RuntimeError {
        let index = self.prototype.len();
        let expected = kind_name(kind_nibble(sample));
        let msg = if allow_null {
            format!(
                "argument {} had type {}, but {} or null was expected",
                index,
                observed.type_name(),
                expected
            )
        } else {
            format!("argument {} had type {}, but {} was expected", index, observed.type_name(), expected)
        };
        RuntimeError::new(RuntimeErrorKind::NoMatchingFunctionCall(msg), self.location.clone())
    }

    /// Record this attempt's prototype (appending a variadic placeholder if
    /// requested), and report whether it succeeded plus how many named
    /// parameters it declared.
    fn check_finish(&mut self, variadic: bool) -> Option<usize> {
        let mut nparams = self.prototype.len();
        if variadic {
            self.prototype.push(VARIADIC_PLACEHOLDER);
            nparams += 1;
        }
        self.overloads
            .extend_from_slice(&(nparams as u32).to_ne_bytes());
        self.overloads.extend_from_slice(&self.prototype);
        self.finished = true;

        if !self.succeeded {
            return None;
        }
        Some(nparams)
    }

    /// Close out a fixed-arity overload attempt: succeeds only if no extra
    /// arguments were supplied beyond the declared parameters.
    pub fn finish(&mut self) -> bool {
        match self.check_finish(false) {
            Some(nparams) => {
                if nparams < self.args.len() {
                    self.succeeded = false;
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Close out a variadic overload attempt, collecting every argument past
    /// the declared parameters into `rest`.
    pub fn finish_variadic(&mut self, rest: &mut Vec<Value>) -> bool {
        match self.check_finish(true) {
            Some(nparams) => {
                rest.clear();
                rest.extend(self.args[nparams.min(self.args.len())..].iter().cloned());
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Render a diagnostic listing the call's actual argument types and
    /// every overload prototype attempted so far, then return it as an
    /// error (spec.md §4.3, exact wording grounded in
    /// `Argument_Reader::throw_no_matching_function_call`).
    #[must_use]
    pub fn no_matching_function_call(&self) -> RuntimeError {
        let mut msg = format!(
            "there was no matching overload for function call `{}({})`.",
            self.name,
            self.args
                .iter()
                .map(|a| kind_name(kind_nibble(a)))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if !self.overloads.is_empty() {
            msg.push_str("\n[list of overloads: ");
            let mut offset = 0usize;
            let mut first = true;
            while offset < self.overloads.len() {
                let nparams = u32::from_ne_bytes(
                    self.overloads[offset..offset + 4].try_into().unwrap(),
                ) as usize;
                offset += 4;
                if !first {
                    msg.push_str(", ");
                }
                first = false;
                let params: Vec<String> = self.overloads[offset..offset + nparams]
                    .iter()
                    .map(|&b| DecodedParam(b).to_string())
                    .collect();
                msg.push_str(&format!("`{}({})`", self.name, params.join(", ")));
                offset += nparams;
            }
            msg.push(']');
        }

        RuntimeError::new(RuntimeErrorKind::NoMatchingFunctionCall(msg), self.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::start("native")
    }

    #[test]
    fn optional_missing_argument_leaves_default() {
        let args: Vec<Value> = vec![];
        let mut reader = ArgumentReader::new("f", &args, loc(), false);
        let mut x = 7i64;
        reader
            .start()
            .opt(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap();
        assert!(reader.finish());
        assert_eq!(x, 7);
    }

    #[test]
    fn required_missing_argument_fails() {
        let args: Vec<Value> = vec![];
        let mut reader = ArgumentReader::new("f", &args, loc(), false);
        let mut x = 0i64;
        reader
            .start()
            .req(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap();
        assert!(!reader.succeeded());
    }

    #[test]
    fn required_missing_argument_throws_immediately_when_configured() {
        let args: Vec<Value> = vec![];
        let mut reader = ArgumentReader::new("f", &args, loc(), true);
        let mut x = 0i64;
        let err = reader
            .start()
            .req(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap_err();
        assert!(err.to_string().contains("no enough arguments"));
    }

    #[test]
    fn required_type_mismatch_throws_immediately_when_configured() {
        let args = vec![Value::from("oops")];
        let mut reader = ArgumentReader::new("f", &args, loc(), true);
        let mut x = 0i64;
        let err = reader
            .start()
            .req(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("argument 1"));
        assert!(msg.contains("string"));
        assert!(msg.contains("integer"));
    }

    #[test]
    fn save_and_load_state_shares_a_common_prefix() {
        let args = vec![Value::Integer(1), Value::from("oops")];
        let mut reader = ArgumentReader::new("f", &args, loc(), false);
        reader.start();
        let mut x = 0i64;
        reader
            .req(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap();
        let checkpoint = reader.save_state();

        let mut y = 0.0f64;
        reader
            .req(
                &mut y,
                |v| if let Value::Real(n) = v { Some(*n) } else { None },
                &Value::Real(0.0),
            )
            .unwrap();
        assert!(!reader.succeeded());

        reader.load_state(&checkpoint);
        let mut z = String::new();
        reader
            .req(
                &mut z,
                |v| if let Value::String(s) = v { Some(s.to_string()) } else { None },
                &Value::from(""),
            )
            .unwrap();
        assert!(reader.succeeded());
        assert_eq!(z, "oops");
    }

    #[test]
    fn no_matching_overload_lists_every_attempt() {
        let args = vec![Value::from("oops")];
        let mut reader = ArgumentReader::new("add", &args, loc(), false);
        let mut x = 0i64;
        reader
            .start()
            .req(
                &mut x,
                |v| if let Value::Integer(n) = v { Some(*n) } else { None },
                &Value::Integer(0),
            )
            .unwrap();
        reader.finish();
        assert!(!reader.succeeded());

        let mut y = 0.0f64;
        reader
            .start()
            .req(
                &mut y,
                |v| if let Value::Real(n) = v { Some(*n) } else { None },
                &Value::Real(0.0),
            )
            .unwrap();
        reader.finish();

        let err = reader.no_matching_function_call();
        let msg = err.to_string();
        assert!(msg.contains("add(string)"));
        assert!(msg.contains("add(integer)"));
        assert!(msg.contains("add(real)"));
    }
}
