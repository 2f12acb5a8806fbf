//! In-process event dispatch to weakly held observers.
//!
//! - [`WeakSet`]: identity-keyed set of non-owning observer references.
//! - [`Dispatcher`]: thread-safe registry that delivers named events to its
//!   observers on a single [`DeliveryContext`].
//! - [`Dispatchable`]: forwarding contract for objects that own a dispatcher.
//!
//! Observers implement the [`Observer`] capability interface: they are asked
//! whether they respond to a [`Selector`] with a given [`Arity`] and, if so,
//! are handed the [`Payload`].

pub mod context;
pub mod dispatchable;
pub mod dispatcher;
pub mod observer;
pub mod payload;
pub mod selector;
pub mod weak_set;

pub use context::{DeliveryContext, DeliveryError, DeliveryHandle, DeliveryThread, ManualQueue};
pub use dispatchable::Dispatchable;
pub use dispatcher::Dispatcher;
pub use observer::Observer;
pub use payload::{Payload, PayloadError, Value};
pub use selector::{Arity, Selector};
pub use weak_set::WeakSet;
