//! A set of non-owning observer references.
//!
//! [`WeakSet`] holds `Weak` handles keyed by the identity of the shared
//! allocation they point to. It never keeps an observer alive: once the last
//! `Arc` to an observer is dropped, the entry stops being returned and is
//! purged on the next pruning pass.
//!
//! # Identity
//!
//! The key is the address of the `Arc` allocation (metadata of unsized
//! pointers is discarded). A stored `Weak` pins that allocation, so the
//! address cannot be handed to a different observer while the entry exists.
//! Registering the same `Arc` twice, or two clones of it, yields one entry.
//!
//! # Thread Safety
//!
//! `WeakSet` is not synchronized. The [`Dispatcher`](crate::Dispatcher) wraps
//! it in a mutex and is the only intended concurrent user.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

/// Identity of an observer: the address of its shared allocation.
type Key = usize;

#[inline]
fn key_of<O: ?Sized>(observer: &Arc<O>) -> Key {
    Arc::as_ptr(observer) as *const () as usize
}

/// Identity-keyed set of weak observer references.
pub struct WeakSet<O: ?Sized> {
    entries: HashMap<Key, Weak<O>>,
}

impl<O: ?Sized> WeakSet<O> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a weak reference to `observer` unless it is already present.
    pub fn add(&mut self, observer: &Arc<O>) {
        self.entries
            .entry(key_of(observer))
            .or_insert_with(|| Arc::downgrade(observer));
    }

    /// Remove the entry for `observer`. Absent observers are ignored.
    pub fn remove(&mut self, observer: &Arc<O>) {
        self.entries.remove(&key_of(observer));
    }

    /// Drop every entry.
    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    /// Whether `observer` is registered and alive.
    pub fn contains(&self, observer: &Arc<O>) -> bool {
        self.entries
            .get(&key_of(observer))
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of stored entries, including dead ones not yet pruned.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge entries whose referent has died. Returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            log::debug!("pruned {} dead observer(s), {} remaining", pruned, self.entries.len());
        }
        pruned
    }

    /// Point-in-time list of every live observer, in no particular order.
    ///
    /// Dead entries are pruned as a side effect.
    pub fn all_objects(&mut self) -> Vec<Arc<O>> {
        self.prune();
        self.entries.values().filter_map(Weak::upgrade).collect()
    }

    /// Like [`all_objects`](Self::all_objects) but hands back weak handles,
    /// so holding the snapshot does not extend any observer's lifetime.
    pub fn snapshot(&mut self) -> Vec<Weak<O>> {
        self.prune();
        self.entries.values().cloned().collect()
    }
}

impl<O: ?Sized> Default for WeakSet<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized> fmt::Debug for WeakSet<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Probe(&'static str);

    impl Named for Probe {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn probe(name: &'static str) -> Arc<dyn Named> {
        Arc::new(Probe(name))
    }

    fn names(set: &mut WeakSet<dyn Named>) -> Vec<String> {
        let mut names: Vec<_> = set
            .all_objects()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        names.sort();
        names
    }

    // ==================== Membership ====================

    #[test]
    fn new_set_is_empty() {
        let mut set = WeakSet::<dyn Named>::new();
        assert!(set.is_empty());
        assert!(set.all_objects().is_empty());
    }

    #[test]
    fn add_makes_observer_visible() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");

        set.add(&a);
        set.add(&b);

        assert_eq!(names(&mut set), vec!["a", "b"]);
        assert!(set.contains(&a));
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = WeakSet::new();
        let a = probe("a");

        set.add(&a);
        set.add(&a);
        set.add(&Arc::clone(&a));

        assert_eq!(set.len(), 1);
        assert_eq!(set.all_objects().len(), 1);
    }

    #[test]
    fn re_adding_keeps_the_original_handle() {
        let mut set = WeakSet::new();
        let a = probe("a");
        set.add(&a);

        for _ in 0..3 {
            set.add(&a);
        }

        // One entry, one weak handle: nothing is downgraded for a known key.
        assert_eq!(set.len(), 1);
        assert_eq!(Arc::weak_count(&a), 1);
    }

    #[test]
    fn identity_survives_unsized_coercion() {
        let mut set = WeakSet::<dyn Named>::new();
        let concrete = Arc::new(Probe("a"));
        let erased: Arc<dyn Named> = concrete.clone();
        let erased_again: Arc<dyn Named> = concrete;

        set.add(&erased);
        set.add(&erased_again);

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_drops_entry() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");
        set.add(&a);
        set.add(&b);

        set.remove(&a);

        assert_eq!(names(&mut set), vec!["b"]);
        assert!(!set.contains(&a));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let stranger = probe("stranger");
        set.add(&a);

        set.remove(&stranger);
        set.remove(&stranger);

        assert_eq!(names(&mut set), vec!["a"]);
    }

    #[test]
    fn remove_all_clears() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");
        set.add(&a);
        set.add(&b);

        set.remove_all();

        assert!(set.is_empty());
        assert_eq!(Arc::weak_count(&a), 0);
        assert_eq!(Arc::weak_count(&b), 0);
    }

    // ==================== Liveness ====================

    #[test]
    fn set_does_not_own_observers() {
        let mut set = WeakSet::new();
        let a = probe("a");
        set.add(&a);

        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(Arc::weak_count(&a), 1);
    }

    #[test]
    fn dead_observer_is_never_returned() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");
        set.add(&a);
        set.add(&b);

        drop(a);

        assert_eq!(names(&mut set), vec!["b"]);
    }

    #[test]
    fn enumeration_prunes_dead_entries() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");
        set.add(&a);
        set.add(&b);
        drop(a);

        // Dead entry lingers until the next pass.
        assert_eq!(set.len(), 2);

        set.all_objects();

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn prune_reports_dropped_entries() {
        let mut set = WeakSet::new();
        let a = probe("a");
        let b = probe("b");
        let c = probe("c");
        set.add(&a);
        set.add(&b);
        set.add(&c);
        drop(a);
        drop(c);

        assert_eq!(set.prune(), 2);
        assert_eq!(set.prune(), 0);
    }

    #[test]
    fn snapshot_holds_weak_handles() {
        let mut set = WeakSet::new();
        let a = probe("a");
        set.add(&a);

        let snapshot = set.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(Arc::strong_count(&a), 1);

        drop(a);
        assert!(snapshot[0].upgrade().is_none());
    }

    #[test]
    fn re_adding_keeps_dead_neighbours_until_pruned() {
        let mut set = WeakSet::<Probe>::new();
        let a = Arc::new(Probe("a"));
        let b = Arc::new(Probe("b"));
        set.add(&a);
        set.add(&b);
        drop(b);

        set.add(&a);

        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
        assert_eq!(set.all_objects().len(), 1);
    }
}
