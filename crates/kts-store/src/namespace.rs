use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use kts_types::{KeyPath, OverlayTree, Value};

use crate::error::{StoreError, StoreResult};
use crate::subscription::{Subscriber, SubscriberRegistry};

/// A top-level subtree of [`Storage`](crate::Storage) with its own data and
/// subscribers.
///
/// Paths passed to a namespace are relative to it: the namespace name has
/// already been stripped.
#[async_trait]
pub trait Namespace: Send + Sync {
    /// The value at `path`, or `None` if nothing defines it.
    fn get(&self, path: &KeyPath) -> Option<Value>;

    /// Write `value` at `path` and notify overlapping subscribers.
    fn set(&self, path: &KeyPath, value: Value) -> StoreResult<()>;

    fn subscribe(&self, path: &KeyPath, subscriber: Subscriber);

    /// Returns `false` if the pair was not subscribed.
    fn unsubscribe(&self, path: &KeyPath, subscriber: &Subscriber) -> bool;

    /// Synchronously invoke every subscriber whose path overlaps `path`.
    fn notify(&self, path: &KeyPath);

    fn is_loading(&self, _path: &KeyPath) -> bool {
        false
    }

    fn is_error(&self, _path: &KeyPath) -> bool {
        false
    }

    fn is_saving(&self, _path: &KeyPath) -> bool {
        false
    }

    /// Send the data under `path` to the server and return the confirmed
    /// value. Namespaces with nowhere to save to are read-only here.
    async fn save(&self, _path: &KeyPath) -> StoreResult<Value> {
        Err(StoreError::ReadOnly)
    }
}

/// Client-only data: one local tree and its subscribers.
#[derive(Debug, Default)]
pub struct LocalNamespace {
    local: RwLock<OverlayTree>,
    subscribers: SubscriberRegistry,
}

impl LocalNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A namespace pre-populated with `root`.
    pub fn with_root(root: Value) -> Self {
        Self {
            local: RwLock::new(OverlayTree::from_value(root)),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// The current snapshot of the local tree.
    pub fn snapshot(&self) -> OverlayTree {
        self.local.read().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Namespace for LocalNamespace {
    fn get(&self, path: &KeyPath) -> Option<Value> {
        self.local.read().expect("lock poisoned").get(path).cloned()
    }

    fn set(&self, path: &KeyPath, value: Value) -> StoreResult<()> {
        {
            let mut local = self.local.write().expect("lock poisoned");
            *local = local.set(path, value);
        }
        debug!(path = %path, "local set");
        self.notify(path);
        Ok(())
    }

    fn subscribe(&self, path: &KeyPath, subscriber: Subscriber) {
        self.subscribers.insert(path.clone(), subscriber);
    }

    fn unsubscribe(&self, path: &KeyPath, subscriber: &Subscriber) -> bool {
        self.subscribers.remove(path, subscriber)
    }

    fn notify(&self, path: &KeyPath) {
        self.subscribers.notify(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::subscriber;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counting() -> (Arc<AtomicUsize>, Subscriber) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, subscriber(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn absent_reads_are_none() {
        let ns = LocalNamespace::new();
        assert_eq!(ns.get(&KeyPath::from(["missing"])), None);
        assert!(!ns.is_loading(&KeyPath::root()));
        assert!(!ns.is_error(&KeyPath::root()));
        assert!(!ns.is_saving(&KeyPath::root()));
    }

    #[test]
    fn set_is_visible_from_ancestors() {
        let ns = LocalNamespace::new();
        ns.set(&KeyPath::from(["a", "name"]), Value::from("X")).unwrap();
        assert_eq!(
            ns.get(&KeyPath::from(["a"])),
            Some(Value::from(json!({"name": "X"})))
        );
    }

    #[test]
    fn set_notifies_overlapping_subscribers_once() {
        let ns = LocalNamespace::new();
        let (parent_hits, parent) = counting();
        let (child_hits, child) = counting();
        let (sibling_hits, sibling) = counting();
        ns.subscribe(&KeyPath::from(["a"]), parent);
        ns.subscribe(&KeyPath::from(["a", "b", "c"]), child);
        ns.subscribe(&KeyPath::from(["x"]), sibling);

        ns.set(&KeyPath::from(["a", "b"]), Value::from(1)).unwrap();
        assert_eq!(parent_hits.load(Ordering::SeqCst), 1);
        assert_eq!(child_hits.load(Ordering::SeqCst), 1);
        assert_eq!(sibling_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let ns = LocalNamespace::new();
        let (hits, s) = counting();
        let path = KeyPath::from(["a"]);
        ns.subscribe(&path, s.clone());
        ns.set(&path, Value::from(1)).unwrap();
        assert!(ns.unsubscribe(&path, &s));
        assert!(!ns.unsubscribe(&path, &s));
        ns.set(&path, Value::from(2)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself_and_reenter() {
        let ns = Arc::new(LocalNamespace::new());
        let path = KeyPath::from(["a"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Subscriber>>> = Arc::new(Mutex::new(None));

        let (n, p, s, me) = (ns.clone(), path.clone(), seen.clone(), slot.clone());
        let callback = subscriber(move || {
            s.lock().unwrap().push(n.get(&p));
            if let Some(this) = me.lock().unwrap().take() {
                n.unsubscribe(&p, &this);
            }
        });
        *slot.lock().unwrap() = Some(callback.clone());
        ns.subscribe(&path, callback);

        ns.set(&path, Value::from(1)).unwrap();
        ns.set(&path, Value::from(2)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(Value::from(1))]);
    }

    #[tokio::test]
    async fn local_namespaces_cannot_save() {
        let ns = LocalNamespace::new();
        assert_eq!(ns.save(&KeyPath::root()).await, Err(StoreError::ReadOnly));
    }

    fn key_path() -> impl Strategy<Value = KeyPath> {
        proptest::collection::vec("[a-c]", 0..4)
            .prop_map(|segments| segments.into_iter().map(kts_types::Segment::Key).collect())
    }

    proptest! {
        #[test]
        fn set_then_get_roundtrips(path in key_path(), leaf in any::<i64>()) {
            let ns = LocalNamespace::with_root(Value::from(json!({"seed": {"x": 1}})));
            ns.set(&path, Value::from(leaf)).unwrap();
            prop_assert_eq!(ns.get(&path), Some(Value::from(leaf)));
        }

        #[test]
        fn ancestor_read_contains_the_write(
            prefix in key_path(),
            suffix in key_path(),
            leaf in any::<i64>(),
        ) {
            let ns = LocalNamespace::new();
            let full = prefix.join(&suffix);
            ns.set(&full, Value::from(leaf)).unwrap();
            let ancestor = ns.get(&prefix).unwrap();
            prop_assert_eq!(ancestor.get(&suffix), Some(&Value::from(leaf)));
        }

        #[test]
        fn each_set_notifies_ancestor_subscribers_exactly_once(
            prefix in key_path(),
            suffix in key_path(),
        ) {
            let ns = LocalNamespace::new();
            let (hits, s) = counting();
            ns.subscribe(&prefix, s);
            ns.set(&prefix.join(&suffix), Value::from(1)).unwrap();
            ns.set(&prefix.join(&suffix), Value::from(2)).unwrap();
            prop_assert_eq!(hits.load(Ordering::SeqCst), 2);
        }
    }
}
