//! # Opaque positional arguments.
//!
//! A publish call carries an ordered list of [`Value`]s. Each value is a boxed
//! `dyn Any` plus the type name it was built from, so mismatches can be reported
//! with both sides spelled out.
//!
//! ## Example
//! ```rust
//! use dispatchbus::{Args, args};
//!
//! let a = args![1_u32, "x"];
//! assert_eq!(a.len(), 2);
//! assert_eq!(a.get::<u32>(0), Some(&1));
//! assert_eq!(a.get::<&str>(1), Some(&"x"));
//! assert!(a.get::<String>(1).is_none());
//! ```

use std::any::{Any, type_name};
use std::fmt;

use crate::error::ArgError;

/// A single type-erased argument.
pub struct Value {
    inner: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps any `'static + Send + Sync` value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Type name recorded at construction.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the value holds a `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the value as `T`, if it is one.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Consumes the value, returning the `T` inside or the value itself on mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.inner.downcast::<T>() {
            Ok(b) => Ok(*b),
            Err(inner) => Err(Self { inner, type_name }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.type_name).finish()
    }
}

/// Ordered positional arguments for one publish call.
#[derive(Debug, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    /// Empty argument list.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Appends a value (builder style).
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Appends a value.
    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Value::new(value));
    }

    /// Appends an already-erased value.
    pub fn push_value(&mut self, value: Value) {
        self.values.push(value);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows the argument at `index` as `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(Value::downcast_ref::<T>)
    }

    /// Borrows the erased argument at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterates the erased arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Fails with [`ArgError::Arity`] unless exactly `expected` arguments are present.
    pub fn expect_len(&self, expected: usize) -> Result<(), ArgError> {
        if self.values.len() == expected {
            Ok(())
        } else {
            Err(ArgError::Arity {
                expected,
                got: self.values.len(),
            })
        }
    }

    /// Extracts the argument at `index` through [`FromArg`].
    pub fn extract<T: FromArg>(&self, index: usize) -> Result<T, ArgError> {
        match self.values.get(index) {
            Some(v) => T::from_arg(v).ok_or(ArgError::Type {
                index,
                expected: type_name::<T>(),
                found: v.type_name(),
            }),
            None => Err(ArgError::Arity {
                expected: index + 1,
                got: self.values.len(),
            }),
        }
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Conversion from an erased argument into a typed handler parameter.
///
/// Implemented for every `Clone + Send + Sync + 'static` type: the parameter
/// receives a clone of the published value. Wrap large payloads in `Arc` to
/// keep that clone cheap.
pub trait FromArg: Sized {
    fn from_arg(value: &Value) -> Option<Self>;
}

impl<T> FromArg for T
where
    T: Any + Clone + Send + Sync,
{
    #[inline]
    fn from_arg(value: &Value) -> Option<Self> {
        value.downcast_ref::<T>().cloned()
    }
}

/// Builds [`Args`](crate::Args) from a comma-separated list of expressions.
///
/// ```rust
/// use dispatchbus::args;
///
/// let empty = args![];
/// assert!(empty.is_empty());
///
/// let two = args![7_i64, String::from("seven")];
/// assert_eq!(two.get::<String>(1).map(String::as_str), Some("seven"));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut args = $crate::Args::new();
        $( args.push($value); )+
        args
    }};
}
