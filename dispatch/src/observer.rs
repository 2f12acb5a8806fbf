//! The capability interface every observer implements.
//!
//! Delivery is a two-step conversation with each observer: first
//! [`responds_to`](Observer::responds_to) asks whether it handles an event
//! with a given number of arguments, then [`perform`](Observer::perform)
//! invokes it. Observers that answer `false` are skipped without error.
//!
//! ```rust
//! use rusty_dispatch::{Arity, Observer, Payload, Selector};
//!
//! const PROGRESS: Selector = Selector::new("progress");
//!
//! struct ProgressBar;
//!
//! impl Observer for ProgressBar {
//!     fn responds_to(&self, selector: Selector, arity: Arity) -> bool {
//!         selector == PROGRESS && arity == Arity::One
//!     }
//!
//!     fn perform(&self, _selector: Selector, payload: &Payload) {
//!         if let Some(percent) = payload.arg::<u8>(0) {
//!             println!("{percent}%");
//!         }
//!     }
//! }
//! ```

use crate::{payload::Payload, selector::{Arity, Selector}};

/// An object that can be notified of events by name.
///
/// Observers are invoked on the dispatcher's delivery context, which is
/// usually not the thread that registered them, so they must be `Send + Sync`.
/// Interior state is the observer's own business (`Mutex`, atomics, channels).
pub trait Observer: Send + Sync {
    /// Whether this observer handles `selector` invoked with `arity` values.
    fn responds_to(&self, selector: Selector, arity: Arity) -> bool;

    /// Handle `selector`. Only called after `responds_to` returned `true` for
    /// the same selector and `payload.arity()`.
    fn perform(&self, selector: Selector, payload: &Payload);
}
