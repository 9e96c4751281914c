//! # Lumen
//!
//! Lumen is the embeddable core of a dynamically-typed scripting language:
//! a lexer, a tagged-union value model, an l-value reference model, a
//! three-generation tracking garbage collector, a host-interop argument
//! reader, and a JSON/JSON5 codec. It deliberately stops short of an AST,
//! parser, or evaluator — those live one layer up, built on top of the
//! primitives this crate exposes.
//!
//! ## A quick example
//!
//! ```
//! use lumen::gc::{GcConfig, GenerationalCollector};
//! use lumen::value::Value;
//! use lumen::reference::Reference;
//! use lumen::position::SourceLocation;
//!
//! let mut gc = GenerationalCollector::new(GcConfig::default());
//! let var = gc.create(Value::from(vec![Value::Integer(1), Value::Integer(2)]), false);
//! let at = SourceLocation::start("example");
//!
//! let r = Reference::from_variable(var).with_modifier(
//!     lumen::reference::Modifier::ArrayIndex(0),
//! );
//! assert!(r.read(&at).unwrap().value_eq(&Value::Integer(1)));
//! ```

pub mod args;
pub mod context;
mod error;
mod error_parsing;
pub mod gc;
mod immutable_string;
pub mod json;
pub mod position;
pub mod reference;
pub mod token;
pub mod value;
pub mod variable;

pub use args::ArgumentReader;
pub use context::GlobalContext;
pub use error::{BacktraceFrame, RuntimeError, RuntimeErrorKind, RuntimeResult};
pub use error_parsing::{ParseError, ParseErrorKind, ParseResult};
pub use gc::{GcConfig, Generation, GenerationalCollector};
pub use immutable_string::ImmutableString;
pub use position::SourceLocation;
pub use reference::{Modifier, Reference, Root};
pub use token::{tokenize, Keyword, LexerOptions, Punctuator, Token, TokenKind, TokenStream};
pub use value::{NativeFunction, Opaque, Value};
pub use variable::Variable;

/// An identifier. [`SmartString`] is used because most identifiers are
/// short ASCII words, so the common case stores inline with no allocation.
pub(crate) type Identifier = SmartString;

pub(crate) type SmartString = smartstring::SmartString<smartstring::Compact>;

/// Variable-sized array of [`Value`]s, the backing storage for
/// [`Value::Array`].
pub type Array = Vec<Value>;

/// An insertion-ordered list of key/value members, the backing storage for
/// [`Value::Object`].
pub type Object = Vec<value::Member>;

/// Alias to [`smallvec::SmallVec<[T; 4]>`], used for small fixed-capacity
/// lists such as an argument reader's in-progress prototype.
pub(crate) type StaticVec<T> = smallvec::SmallVec<[T; 4]>;
