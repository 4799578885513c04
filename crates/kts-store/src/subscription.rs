//! Path-keyed subscriber registry.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use kts_types::KeyPath;

/// A zero-argument change callback. Subscribers are expected to re-read the
/// namespace rather than receive the new value.
pub type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as a [`Subscriber`].
pub fn subscriber(callback: impl Fn() + Send + Sync + 'static) -> Subscriber {
    Arc::new(callback)
}

fn same_subscriber(a: &Subscriber, b: &Subscriber) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// The set of `(path, subscriber)` pairs of one namespace.
///
/// A subscriber is identified by its allocation: registering the same `Arc`
/// twice under one path is a no-op, and unsubscribing needs that same `Arc`.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Mutex<Vec<(KeyPath, Subscriber)>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair. Returns `false` if it was already registered.
    pub fn insert(&self, path: KeyPath, subscriber: Subscriber) -> bool {
        let mut entries = self.entries.lock().expect("lock poisoned");
        if entries
            .iter()
            .any(|(p, s)| *p == path && same_subscriber(s, &subscriber))
        {
            return false;
        }
        entries.push((path, subscriber));
        true
    }

    /// Remove a pair. Removing one that is not registered is a no-op.
    pub fn remove(&self, path: &KeyPath, subscriber: &Subscriber) -> bool {
        let mut entries = self.entries.lock().expect("lock poisoned");
        let before = entries.len();
        entries.retain(|(p, s)| !(p == path && same_subscriber(s, subscriber)));
        entries.len() != before
    }

    pub fn contains(&self, path: &KeyPath, subscriber: &Subscriber) -> bool {
        self.entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .any(|(p, s)| p == path && same_subscriber(s, subscriber))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct subscribed paths, in path order.
    pub fn paths(&self) -> BTreeSet<KeyPath> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Invoke every subscriber whose path is a prefix of `path` or has
    /// `path` as a prefix. Returns the number of callbacks invoked.
    ///
    /// Matching entries are snapshotted and the lock released before any
    /// callback runs, so callbacks may subscribe or unsubscribe. An entry
    /// removed by an earlier callback of the same round is skipped.
    pub fn notify(&self, path: &KeyPath) -> usize {
        let matching: Vec<(KeyPath, Subscriber)> = self
            .entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(p, _)| p.overlaps(path))
            .cloned()
            .collect();

        let mut invoked = 0;
        for (p, callback) in matching {
            if self.contains(&p, &callback) {
                callback();
                invoked += 1;
            }
        }
        invoked
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Subscriber) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, subscriber(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn ancestors_and_descendants_are_notified() {
        let registry = SubscriberRegistry::new();
        let (root_hits, root) = counter();
        let (a_hits, a) = counter();
        let (abc_hits, abc) = counter();
        let (other_hits, other) = counter();
        registry.insert(KeyPath::root(), root);
        registry.insert(KeyPath::from(["a"]), a);
        registry.insert(KeyPath::from(["a", "b", "c"]), abc);
        registry.insert(KeyPath::from(["z"]), other);

        assert_eq!(registry.notify(&KeyPath::from(["a", "b"])), 3);
        assert_eq!(root_hits.load(Ordering::SeqCst), 1);
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(abc_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let registry = SubscriberRegistry::new();
        let (hits, s) = counter();
        assert!(registry.insert(KeyPath::from(["a"]), s.clone()));
        assert!(!registry.insert(KeyPath::from(["a"]), s.clone()));
        registry.notify(&KeyPath::from(["a"]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn identity_is_the_allocation_and_the_path() {
        let registry = SubscriberRegistry::new();
        let (_, s) = counter();
        let (_, lookalike) = counter();
        registry.insert(KeyPath::from(["a"]), s.clone());
        assert!(!registry.remove(&KeyPath::from(["a"]), &lookalike));
        assert!(!registry.remove(&KeyPath::from(["b"]), &s));
        assert!(registry.remove(&KeyPath::from(["a"]), &s));
        assert!(registry.is_empty());
    }

    #[test]
    fn callback_can_unsubscribe_a_later_sibling() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (second_hits, second) = counter();
        let path = KeyPath::from(["a"]);

        let r = registry.clone();
        let victim = second.clone();
        let p = path.clone();
        let first = subscriber(move || {
            r.remove(&p, &victim);
        });
        registry.insert(path.clone(), first);
        registry.insert(path.clone(), second);

        assert_eq!(registry.notify(&path), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn paths_are_distinct() {
        let registry = SubscriberRegistry::new();
        let (_, s1) = counter();
        let (_, s2) = counter();
        registry.insert(KeyPath::from(["a"]), s1);
        registry.insert(KeyPath::from(["a"]), s2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.paths().len(), 1);
    }
}
