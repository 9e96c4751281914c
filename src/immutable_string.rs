//! The [`ImmutableString`] type — an interned, reference-counted string used
//! for object keys and `Value::String` payloads so that cloning a [`Value`](crate::Value)
//! never copies string bytes.

use crate::SmartString;
use std::{
    borrow::Borrow,
    fmt,
    hash::Hash,
    ops::Deref,
    rc::Rc,
    str::FromStr,
};

/// An immutable, reference-counted string.
///
/// Wraps an [`Rc`]`<`[`SmartString`][smartstring::SmartString]`>` so cloning is a refcount
/// bump, not a byte copy. Two clones are `==` to each other and to any `&str` with the
/// same contents.
///
/// ```
/// use lumen::ImmutableString;
///
/// let s1: ImmutableString = "hello".into();
/// let s2 = s1.clone(); // no string data is copied
/// assert_eq!(s1, s2);
/// assert_eq!(s1, "hello");
/// ```
#[derive(Clone, Eq, Ord, Hash, Default)]
pub struct ImmutableString(Rc<SmartString>);

impl Deref for ImmutableString {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ImmutableString {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for ImmutableString {
    #[inline(always)]
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ImmutableString {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self(Rc::new(value.into()))
    }
}

impl From<String> for ImmutableString {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self(Rc::new(value.into()))
    }
}

impl From<&String> for ImmutableString {
    #[inline(always)]
    fn from(value: &String) -> Self {
        Self(Rc::new(value.as_str().into()))
    }
}

impl From<ImmutableString> for String {
    #[inline(always)]
    fn from(value: ImmutableString) -> Self {
        match Rc::try_unwrap(value.0) {
            Ok(s) => s.into(),
            Err(rc) => rc.as_str().into(),
        }
    }
}

impl FromStr for ImmutableString {
    type Err = std::convert::Infallible;

    #[inline(always)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for ImmutableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.0.as_str(), f)
    }
}

impl fmt::Debug for ImmutableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_str(), f)
    }
}

impl<S: AsRef<str>> PartialEq<S> for ImmutableString {
    #[inline(always)]
    fn eq(&self, other: &S) -> bool {
        self.as_str().eq(other.as_ref())
    }
}

impl PartialEq<ImmutableString> for str {
    #[inline(always)]
    fn eq(&self, other: &ImmutableString) -> bool {
        self.eq(other.as_str())
    }
}

impl<S: AsRef<str>> PartialOrd<S> for ImmutableString {
    fn partial_cmp(&self, other: &S) -> Option<std::cmp::Ordering> {
        self.as_str().partial_cmp(other.as_ref())
    }
}

impl ImmutableString {
    #[inline(always)]
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(SmartString::new()))
    }

    #[inline(always)]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Number of strong references sharing this string's backing storage.
    #[inline(always)]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}
