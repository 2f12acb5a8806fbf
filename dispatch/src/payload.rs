//! Untyped event payloads.
//!
//! An event carries zero, one or two values. Values are type-erased and shared
//! (`Arc<dyn Any + Send + Sync>`) because the same payload is handed to every
//! observer in a snapshot, on a different thread from the one that dispatched.
//!
//! The arity of an invocation always equals the number of values present. A
//! second value without a first is rejected instead of being silently
//! delivered as a one-argument call.

use std::{any::Any, fmt, sync::Arc};

use crate::selector::Arity;

/// A single type-erased payload value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value into a [`Value`].
///
/// ```rust
/// use rusty_dispatch::payload;
///
/// let v = payload::value(42u32);
/// assert_eq!(v.downcast_ref::<u32>(), Some(&42));
/// ```
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Payload of one dispatch, with its arity encoded in the variant.
#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    None,
    One(Value),
    Two(Value, Value),
}

impl Payload {
    /// Build a payload from two optional values.
    ///
    /// Returns [`PayloadError::MissingFirst`] when `second` is present but
    /// `first` is not.
    pub fn from_options(first: Option<Value>, second: Option<Value>) -> Result<Self, PayloadError> {
        match (first, second) {
            (None, None) => Ok(Payload::None),
            (Some(a), None) => Ok(Payload::One(a)),
            (Some(a), Some(b)) => Ok(Payload::Two(a, b)),
            (None, Some(_)) => Err(PayloadError::MissingFirst),
        }
    }

    /// Number of values carried.
    #[inline]
    pub fn arity(&self) -> Arity {
        match self {
            Payload::None => Arity::Zero,
            Payload::One(_) => Arity::One,
            Payload::Two(..) => Arity::Two,
        }
    }

    /// The first value, if any.
    pub fn first(&self) -> Option<&Value> {
        match self {
            Payload::None => None,
            Payload::One(a) | Payload::Two(a, _) => Some(a),
        }
    }

    /// The second value, if any.
    pub fn second(&self) -> Option<&Value> {
        match self {
            Payload::Two(_, b) => Some(b),
            _ => None,
        }
    }

    /// Downcast the value at `index` (0 or 1) to `T`.
    ///
    /// Returns `None` if the value is absent or of another type.
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        let value = match index {
            0 => self.first(),
            1 => self.second(),
            _ => None,
        }?;
        value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("arity", &self.arity())
            .finish_non_exhaustive()
    }
}

/// A payload combination that cannot be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// A second value was supplied without a first one.
    MissingFirst,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::MissingFirst => {
                f.write_str("second payload value supplied without a first value")
            }
        }
    }
}

impl std::error::Error for PayloadError {}
