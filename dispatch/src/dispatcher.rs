//! Thread-safe observer registry with single-context delivery.
//!
//! A [`Dispatcher`] owns a [`WeakSet`] of observers behind a mutex and a
//! [`DeliveryContext`]. Registration and dispatch may happen from any thread;
//! observer callbacks only ever run on the delivery context.
//!
//! # Dispatch
//!
//! Each call to [`dispatch()`](Dispatcher::dispatch):
//! 1. Takes the lock just long enough to snapshot the live observers.
//! 2. Schedules one unit of work that walks the snapshot, asks every observer
//!    whether it [responds to](Observer::responds_to) the selector with the
//!    payload's arity, and [performs](Observer::perform) it if so.
//! 3. Returns without waiting for delivery.
//!
//! Observers added after the snapshot are not notified by that dispatch.
//! Observers removed after the snapshot still are, as long as they are alive
//! when delivery reaches them. The snapshot holds only weak handles, so a
//! pending delivery never keeps an observer alive.
//!
//! A panic inside one observer is caught and logged; the rest of the snapshot
//! is still delivered.
//!
//! # Teardown
//!
//! Pending snapshots live in a table shared with the scheduled work rather
//! than inside it. Dropping the dispatcher empties that table together with
//! the observer set, so every reference it held is released at once and
//! deliveries that have not started find nothing to deliver. A delivery that
//! is already walking its snapshot stops before the next invocation; an
//! observer that is already running finishes normally.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rusty_dispatch::{Arity, Dispatcher, ManualQueue, Observer, Payload, Selector, payload};
//!
//! const RENAMED: Selector = Selector::new("renamed");
//!
//! struct Title;
//! impl Observer for Title {
//!     fn responds_to(&self, selector: Selector, arity: Arity) -> bool {
//!         selector == RENAMED && arity == Arity::One
//!     }
//!     fn perform(&self, _: Selector, payload: &Payload) {
//!         assert_eq!(payload.arg::<&str>(0), Some(&"draft.txt"));
//!     }
//! }
//!
//! let queue = ManualQueue::new();
//! let dispatcher = Dispatcher::<dyn Observer>::new(queue.clone());
//! let title: Arc<dyn Observer> = Arc::new(Title);
//!
//! dispatcher.add(&title);
//! dispatcher.dispatch(RENAMED, Some(payload::value("draft.txt")), None);
//! queue.run_pending();
//! ```

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use crate::{
    context::{DeliveryContext, DeliveryThread, Work},
    observer::Observer,
    payload::{Payload, Value},
    selector::Selector,
    weak_set::WeakSet,
};

/// Broadcasts named events to a set of weakly held observers.
pub struct Dispatcher<O: ?Sized + Observer + 'static> {
    observers: Mutex<WeakSet<O>>,
    context: Arc<dyn DeliveryContext>,
    pending: Arc<Pending<O>>,
    label: String,
}

/// Snapshots of scheduled deliveries, keyed by dispatch sequence number.
struct Pending<O: ?Sized> {
    /// Cleared on drop; consulted before every invocation.
    alive: AtomicBool,
    next: AtomicU64,
    snapshots: Mutex<HashMap<u64, Vec<Weak<O>>>>,
}

impl<O: ?Sized> Pending<O> {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            next: AtomicU64::new(0),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    fn snapshots(&self) -> MutexGuard<'_, HashMap<u64, Vec<Weak<O>>>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn park(&self, snapshot: Vec<Weak<O>>) -> u64 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.snapshots().insert(id, snapshot);
        id
    }

    fn take(&self, id: u64) -> Option<Vec<Weak<O>>> {
        self.snapshots().remove(&id)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn tear_down(&self) {
        self.alive.store(false, Ordering::Release);
        self.snapshots().clear();
    }
}

impl<O: ?Sized + Observer + 'static> Dispatcher<O> {
    /// Create a dispatcher that delivers on `context`.
    pub fn new(context: impl DeliveryContext + 'static) -> Self {
        Self::with_context(Arc::new(context))
    }

    /// Create a dispatcher sharing an existing context.
    pub fn with_context(context: Arc<dyn DeliveryContext>) -> Self {
        Self {
            observers: Mutex::new(WeakSet::new()),
            context,
            pending: Arc::new(Pending::new()),
            label: "dispatcher".to_string(),
        }
    }

    /// Create a dispatcher that delivers on `thread`.
    pub fn on_thread(thread: &DeliveryThread) -> Self {
        Self::new(thread.handle())
    }

    /// Name used in log output.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The set is left consistent by every critical section, so a poisoned
    /// lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, WeakSet<O>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `observer`. Registering twice has no further effect.
    pub fn add(&self, observer: &Arc<O>) {
        self.lock().add(observer);
        log::trace!("{}: observer added", self.label);
    }

    /// Unregister `observer`. Unknown observers are ignored.
    pub fn del(&self, observer: &Arc<O>) {
        self.lock().remove(observer);
        log::trace!("{}: observer removed", self.label);
    }

    /// Snapshot of the currently live observers, in no particular order.
    pub fn observers(&self) -> Vec<Arc<O>> {
        self.lock().all_objects()
    }

    /// Whether `observer` is registered and alive.
    pub fn contains(&self, observer: &Arc<O>) -> bool {
        self.lock().contains(observer)
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        let mut observers = self.lock();
        observers.prune();
        observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch `selector` with up to two payload values.
    ///
    /// The invocation arity is the number of values present.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `object2` is given without `object1`. Release
    /// builds log the violation and drop the dispatch.
    pub fn dispatch(&self, selector: Selector, object1: Option<Value>, object2: Option<Value>) {
        let payload = match Payload::from_options(object1, object2) {
            Ok(payload) => payload,
            Err(err) => {
                if cfg!(debug_assertions) {
                    panic!("{}: dispatch of '{}': {}", self.label, selector, err);
                }
                log::error!("{}: dropping dispatch of '{}': {}", self.label, selector, err);
                return;
            }
        };
        self.post(selector, payload);
    }

    /// Dispatch `selector` with an already checked payload.
    pub fn post(&self, selector: Selector, payload: Payload) {
        let snapshot = self.lock().snapshot();
        if snapshot.is_empty() {
            log::trace!("{}: '{}' has no observers", self.label, selector);
            return;
        }

        log::trace!(
            "{}: scheduling '{}' with {} argument(s) for {} observer(s)",
            self.label,
            selector,
            payload.arity(),
            snapshot.len()
        );

        let pending = Arc::clone(&self.pending);
        let id = pending.park(snapshot);
        let work: Work = Box::new(move || deliver(selector, &payload, id, &pending));

        if let Err(err) = self.context.schedule(work) {
            self.pending.take(id);
            log::warn!("{}: dropping dispatch of '{}': {}", self.label, selector, err);
        }
    }
}

/// Walk one snapshot on the delivery context.
fn deliver<O: ?Sized + Observer>(
    selector: Selector,
    payload: &Payload,
    id: u64,
    pending: &Pending<O>,
) {
    let Some(snapshot) = pending.take(id) else {
        log::trace!("dispatcher torn down; discarding '{}'", selector);
        return;
    };
    let arity = payload.arity();
    for weak in &snapshot {
        if !pending.is_alive() {
            log::trace!("dispatcher torn down; discarding rest of '{}'", selector);
            return;
        }
        let Some(observer) = weak.upgrade() else {
            continue;
        };
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            if observer.responds_to(selector, arity) {
                observer.perform(selector, payload);
            }
        }));
        if invoked.is_err() {
            log::error!("observer panicked handling '{}'; continuing delivery", selector);
        }
    }
}

impl<O: ?Sized + Observer + 'static> Drop for Dispatcher<O> {
    fn drop(&mut self) {
        self.pending.tear_down();
        self.lock().remove_all();
        log::debug!("{}: torn down", self.label);
    }
}

impl<O: ?Sized + Observer + 'static> fmt::Debug for Dispatcher<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("label", &self.label)
            .field("observers", &*self.lock())
            .finish_non_exhaustive()
    }
}
