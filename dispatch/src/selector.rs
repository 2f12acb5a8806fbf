//! Event identifiers.
//!
//! A [`Selector`] names an event the way a method name names a message: the
//! dispatcher never interprets it, it only hands it to each observer together
//! with the payload. Observers decide whether they handle it.

use std::fmt;

/// Name of an event delivered through a [`Dispatcher`](crate::Dispatcher).
///
/// Selectors are cheap to copy and compare. They are usually declared as
/// constants next to the observer trait that handles them:
///
/// ```rust
/// use rusty_dispatch::Selector;
///
/// pub const DID_FINISH: Selector = Selector::new("did_finish");
/// assert_eq!(DID_FINISH.name(), "did_finish");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector(&'static str);

impl Selector {
    /// Create a selector from its name.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Selector(name)
    }

    /// The selector's name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&'static str> for Selector {
    fn from(name: &'static str) -> Self {
        Selector::new(name)
    }
}

/// Number of payload values an invocation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arity {
    Zero,
    One,
    Two,
}

impl Arity {
    /// Number of arguments as an integer.
    #[inline]
    pub const fn count(self) -> usize {
        match self {
            Arity::Zero => 0,
            Arity::One => 1,
            Arity::Two => 2,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO: Selector = Selector::new("foo");

    #[test]
    fn selectors_compare_by_name() {
        assert_eq!(FOO, Selector::from("foo"));
        assert_ne!(FOO, Selector::new("bar"));
    }

    #[test]
    fn selector_displays_name() {
        assert_eq!(FOO.to_string(), "foo");
    }

    #[test]
    fn arity_counts() {
        assert_eq!(Arity::Zero.count(), 0);
        assert_eq!(Arity::One.count(), 1);
        assert_eq!(Arity::Two.count(), 2);
        assert!(Arity::One < Arity::Two);
    }
}
