//! Forwarding contract for objects that broadcast events.
//!
//! A host owns one [`Dispatcher`] for its whole lifetime and exposes
//! `add`/`del`/`dispatch` by forwarding to it. Implementing [`Dispatchable`]
//! only requires returning that dispatcher; the three methods are provided.
//!
//! ```rust
//! use rusty_dispatch::{Dispatchable, Dispatcher, ManualQueue, Observer};
//!
//! struct Player {
//!     dispatcher: Dispatcher<dyn Observer>,
//! }
//!
//! impl Dispatchable for Player {
//!     type Ability = dyn Observer;
//!
//!     fn dispatcher(&self) -> &Dispatcher<dyn Observer> {
//!         &self.dispatcher
//!     }
//! }
//!
//! let player = Player { dispatcher: Dispatcher::new(ManualQueue::new()) };
//! assert!(player.dispatcher().is_empty());
//! ```

use std::sync::Arc;

use crate::{dispatcher::Dispatcher, observer::Observer, payload::Value, selector::Selector};

/// An object that broadcasts events through an owned [`Dispatcher`].
pub trait Dispatchable {
    /// The observer interface this host notifies.
    type Ability: ?Sized + Observer + 'static;

    /// The dispatcher owned by this host.
    fn dispatcher(&self) -> &Dispatcher<Self::Ability>;

    fn add(&self, observer: &Arc<Self::Ability>) {
        self.dispatcher().add(observer);
    }

    fn del(&self, observer: &Arc<Self::Ability>) {
        self.dispatcher().del(observer);
    }

    fn dispatch(&self, selector: Selector, object1: Option<Value>, object2: Option<Value>) {
        self.dispatcher().dispatch(selector, object1, object2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::ManualQueue,
        payload::{self, Payload},
        selector::Arity,
    };
    use std::sync::Mutex;

    const DID_SAVE: Selector = Selector::new("did_save");
    const DID_CLOSE: Selector = Selector::new("did_close");

    trait DocumentObserver: Observer {
        fn saved_paths(&self) -> Vec<String>;
    }

    #[derive(Default)]
    struct Autosave {
        saved: Mutex<Vec<String>>,
    }

    impl Observer for Autosave {
        fn responds_to(&self, selector: Selector, arity: Arity) -> bool {
            selector == DID_SAVE && arity == Arity::One
        }

        fn perform(&self, _: Selector, payload: &Payload) {
            if let Some(path) = payload.arg::<String>(0) {
                self.saved.lock().unwrap().push(path.clone());
            }
        }
    }

    impl DocumentObserver for Autosave {
        fn saved_paths(&self) -> Vec<String> {
            self.saved.lock().unwrap().clone()
        }
    }

    struct Document {
        dispatcher: Dispatcher<dyn DocumentObserver>,
    }

    impl Document {
        fn new(queue: &ManualQueue) -> Self {
            Self {
                dispatcher: Dispatcher::new(queue.clone()).with_label("document"),
            }
        }

        fn save(&self, path: &str) {
            self.dispatch(DID_SAVE, Some(payload::value(path.to_string())), None);
        }
    }

    impl Dispatchable for Document {
        type Ability = dyn DocumentObserver;

        fn dispatcher(&self) -> &Dispatcher<dyn DocumentObserver> {
            &self.dispatcher
        }
    }

    #[test]
    fn host_forwards_to_its_dispatcher() {
        let queue = ManualQueue::new();
        let document = Document::new(&queue);
        let autosave: Arc<dyn DocumentObserver> = Arc::new(Autosave::default());

        document.add(&autosave);
        document.save("notes.md");
        document.dispatch(DID_CLOSE, None, None);
        queue.run_pending();

        assert_eq!(autosave.saved_paths(), vec!["notes.md".to_string()]);

        document.del(&autosave);
        document.save("ignored.md");
        queue.run_pending();

        assert_eq!(autosave.saved_paths(), vec!["notes.md".to_string()]);
    }

    #[test]
    fn dropping_host_stops_delivery() {
        let queue = ManualQueue::new();
        let document = Document::new(&queue);
        let autosave: Arc<dyn DocumentObserver> = Arc::new(Autosave::default());
        document.add(&autosave);

        document.save("late.md");
        drop(document);
        queue.run_pending();

        assert!(autosave.saved_paths().is_empty());
        assert_eq!(Arc::weak_count(&autosave), 0);
    }
}
