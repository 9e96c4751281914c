//! Run-time error taxonomy: a free-form diagnostic message plus a back-trace
//! of `(location, function_signature)` frames accumulated as the error
//! unwinds the interpreter (spec.md §7), grounded in `rhai::error::
//! EvalAltResult`'s `ErrorInFunctionCall` chaining and in this crate's own
//! dedicated kinds for immutable-variable writes and argument-reader
//! mismatches (spec.md §3.3, §4.3).

use crate::SourceLocation;
use std::fmt;

/// A single frame of the back-trace: where the error passed through, and the
/// signature of the function it was passing through.
#[derive(Debug, Clone)]
pub struct BacktraceFrame {
    location: SourceLocation,
    function_signature: String,
}

impl BacktraceFrame {
    #[must_use]
    pub fn new(location: SourceLocation, function_signature: impl Into<String>) -> Self {
        Self {
            location,
            function_signature: function_signature.into(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    #[must_use]
    pub fn function_signature(&self) -> &str {
        &self.function_signature
    }
}

impl fmt::Display for BacktraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  at {} ({})", self.function_signature, self.location)
    }
}

/// The specific shape of a runtime failure. Most failures are free-form
/// (`Message`); a handful of operations in this crate raise a dedicated kind
/// so callers can match on them without string comparison.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RuntimeErrorKind {
    /// Free-form diagnostic, e.g. raised by script-level `throw`.
    Message(String),
    /// Write attempted against a variable flagged immutable (spec.md §3.3).
    ImmutableVariable,
    /// Reference write attempted against a `constant` root (spec.md §3.2).
    ConstantNotWritable,
    /// No overload of a native function matched the supplied arguments
    /// (spec.md §4.3); carries the rendered diagnostic.
    NoMatchingFunctionCall(String),
    /// A module load cycle was detected by the loader lock (spec.md §5).
    CircularImport(String),
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(s) => f.write_str(s),
            Self::ImmutableVariable => f.write_str("variable is immutable and cannot be modified"),
            Self::ConstantNotWritable => f.write_str("cannot write through a constant reference"),
            Self::NoMatchingFunctionCall(diag) => f.write_str(diag),
            Self::CircularImport(path) => write!(f, "circular import detected: {}", path),
        }
    }
}

/// A run-time error: kind, the location it was first raised at, and the
/// back-trace accumulated as it propagates through call frames.
///
/// Cloning a `RuntimeError` can never panic (spec.md §7's "copy/move of
/// error objects must not themselves throw" guarantee) since every field is
/// plain owned data.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    kind: RuntimeErrorKind,
    location: SourceLocation,
    backtrace: Vec<BacktraceFrame>,
}

impl RuntimeError {
    #[must_use]
    pub fn new(kind: RuntimeErrorKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            backtrace: Vec::new(),
        }
    }

    #[must_use]
    pub fn message(msg: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(RuntimeErrorKind::Message(msg.into()), location)
    }

    #[must_use]
    pub fn kind(&self) -> &RuntimeErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    #[must_use]
    pub fn backtrace(&self) -> &[BacktraceFrame] {
        &self.backtrace
    }

    /// Push a frame as the error unwinds through a call boundary. Called at
    /// every function-call exit point in the (external) executor.
    pub fn push_frame(&mut self, location: SourceLocation, function_signature: impl Into<String>) {
        self.backtrace
            .push(BacktraceFrame::new(location, function_signature));
    }

    #[must_use]
    pub fn with_frame(mut self, location: SourceLocation, function_signature: impl Into<String>) -> Self {
        self.push_frame(location, function_signature);
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.location)?;
        for frame in self.backtrace.iter().rev() {
            write!(f, "\n{}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
