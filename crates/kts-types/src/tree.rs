//! Persistent overlay trees and layered reads.
//!
//! An [`OverlayTree`] is an immutable snapshot: `set` and `remove` return a
//! new tree that shares every untouched subtree with the old one and rebuilds
//! only the spine from the root to the modified path. A reader holding an
//! older tree keeps seeing the older snapshot.

use std::sync::Arc;

use crate::path::{KeyPath, Segment};
use crate::value::{merge, Map, Value};

/// An immutable mapping from key paths to values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayTree {
    root: Option<Value>,
}

impl OverlayTree {
    /// An empty tree that defines nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(root: Value) -> Self {
        Self { root: Some(root) }
    }

    pub fn root(&self) -> Option<&Value> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The value at `path`, or `None` if neither it nor a container
    /// ancestor defines it.
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.root.as_ref().and_then(|root| root.get(path))
    }

    /// A new tree whose subtree at `path` equals `value`.
    ///
    /// Missing ancestors are created as containers; a leaf ancestor is
    /// replaced by a container. The empty path replaces the whole root.
    pub fn set(&self, path: &KeyPath, value: Value) -> Self {
        let root = set_in(self.root.as_ref(), path.segments(), value);
        Self { root: Some(root) }
    }

    /// A new tree with the subtree at `path` removed.
    ///
    /// Removing a path that is not defined returns an equal tree.
    pub fn remove(&self, path: &KeyPath) -> Self {
        if path.is_empty() {
            return Self::new();
        }
        match self.root.as_ref().and_then(|root| remove_in(root, path.segments())) {
            Some(root) => Self { root: Some(root) },
            None => self.clone(),
        }
    }

    /// Returns `true` if both trees are the same version (identical root
    /// allocation). Any `set` produces a tree that is not `ptr_eq` to its
    /// source.
    pub fn ptr_eq(&self, other: &OverlayTree) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

fn set_in(node: Option<&Value>, segments: &[Segment], value: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value;
    };
    let mut map = match node {
        Some(Value::Container(existing)) => Map::clone(existing),
        _ => Map::new(),
    };
    let child = set_in(map.get(head), rest, value);
    map.insert(head.clone(), child);
    Value::Container(Arc::new(map))
}

/// Returns `None` when nothing at `segments` exists to remove.
fn remove_in(node: &Value, segments: &[Segment]) -> Option<Value> {
    let (head, rest) = segments.split_first()?;
    let existing = node.as_container()?;
    let child = existing.get(head)?;
    let mut map = Map::clone(existing);
    if rest.is_empty() {
        map.remove(head);
    } else {
        map.insert(head.clone(), remove_in(child, rest)?);
    }
    Some(Value::Container(Arc::new(map)))
}

/// Read `path` through a stack of layers ordered highest precedence first.
///
/// The layers are walked together one segment at a time. At every node the
/// highest layer that defines something decides its kind: a leaf there masks
/// all lower layers (and nothing exists below it), while a container drops
/// lower-layer leaves and keeps descending with lower-layer containers. The
/// node reached at the end of `path` is the recursive [`merge`] of the layers
/// still standing.
pub fn compose(layers: &[&OverlayTree], path: &KeyPath) -> Option<Value> {
    let mut nodes: Vec<&Value> = layers.iter().filter_map(|tree| tree.root()).collect();
    for segment in path {
        nodes = mask(nodes);
        if nodes.first().map_or(true, |top| top.is_leaf()) {
            return None;
        }
        nodes = nodes.into_iter().filter_map(|node| node.child(segment)).collect();
    }
    let nodes = mask(nodes);
    let (bottom, higher) = nodes.split_last()?;
    Some(
        higher
            .iter()
            .rev()
            .fold(Value::clone(bottom), |acc, node| merge(node, &acc)),
    )
}

fn mask(nodes: Vec<&Value>) -> Vec<&Value> {
    match nodes.first().copied() {
        Some(top) if top.is_leaf() => vec![top],
        _ => nodes.into_iter().filter(|n| n.is_container()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> OverlayTree {
        OverlayTree::from_value(Value::from(json))
    }

    fn path<const N: usize>(segments: [&str; N]) -> KeyPath {
        KeyPath::from(segments)
    }

    #[test]
    fn empty_tree_defines_nothing() {
        let t = OverlayTree::new();
        assert!(t.is_empty());
        assert_eq!(t.get(&KeyPath::root()), None);
        assert_eq!(t.get(&path(["a"])), None);
    }

    #[test]
    fn set_creates_missing_ancestors() {
        let t = OverlayTree::new().set(&path(["a", "b"]), Value::from(1));
        assert_eq!(t.get(&path(["a", "b"])), Some(&Value::from(1)));
        assert_eq!(t.get(&path(["a"])), Some(&Value::from(json!({"b": 1}))));
    }

    #[test]
    fn set_at_root_replaces_everything() {
        let t = tree(json!({"a": 1})).set(&KeyPath::root(), Value::from("x"));
        assert_eq!(t.root(), Some(&Value::from("x")));
    }

    #[test]
    fn set_beneath_leaf_replaces_leaf() {
        let t = tree(json!({"a": 5})).set(&path(["a", "b"]), Value::from(1));
        assert_eq!(t.get(&path(["a"])), Some(&Value::from(json!({"b": 1}))));
    }

    #[test]
    fn set_leaves_old_snapshot_untouched() {
        let before = tree(json!({"a": {"x": 1}, "b": {"y": 2}}));
        let after = before.set(&path(["a", "x"]), Value::from(9));
        assert_eq!(before.get(&path(["a", "x"])), Some(&Value::from(1)));
        assert_eq!(after.get(&path(["a", "x"])), Some(&Value::from(9)));
        assert!(!after.ptr_eq(&before));
        // The untouched sibling is shared, not copied.
        let old_b = before.get(&path(["b"])).unwrap();
        let new_b = after.get(&path(["b"])).unwrap();
        assert!(old_b.ptr_eq(new_b));
    }

    #[test]
    fn remove_deletes_subtree_only() {
        let t = tree(json!({"a": {"x": 1, "y": 2}}));
        let removed = t.remove(&path(["a", "x"]));
        assert_eq!(removed.get(&path(["a"])), Some(&Value::from(json!({"y": 2}))));
        assert_eq!(t.remove(&path(["missing"])), t);
        assert!(t.remove(&KeyPath::root()).is_empty());
    }

    #[test]
    fn compose_local_leaf_wins_outright() {
        let local = tree(json!({"a": "L"}));
        let remote = tree(json!({"a": {"x": 1}}));
        assert_eq!(compose(&[&local, &remote], &path(["a"])), Some(Value::from("L")));
        assert_eq!(compose(&[&local, &remote], &path(["a", "x"])), None);
    }

    #[test]
    fn compose_merges_containers_by_precedence() {
        let local = tree(json!({"a": {"name": "L"}}));
        let staged = tree(json!({"a": {"name": "S", "draft": true}}));
        let remote = tree(json!({"a": {"name": "R", "id": 7}}));
        let layers = [&local, &staged, &remote];
        assert_eq!(
            compose(&layers, &path(["a"])),
            Some(Value::from(json!({"name": "L", "draft": true, "id": 7})))
        );
        assert_eq!(compose(&layers, &path(["a", "id"])), Some(Value::from(7)));
        assert_eq!(compose(&layers, &path(["b"])), None);
    }

    #[test]
    fn compose_skips_lower_leaves_under_higher_container() {
        let local = tree(json!({"a": {"x": 1}}));
        let remote = tree(json!({"a": "old"}));
        assert_eq!(
            compose(&[&local, &remote], &path(["a"])),
            Some(Value::from(json!({"x": 1})))
        );
    }

    #[test]
    fn compose_of_nothing_is_absent() {
        let empty = OverlayTree::new();
        assert_eq!(compose(&[&empty, &empty], &KeyPath::root()), None);
        assert_eq!(compose(&[], &path(["a"])), None);
    }

    fn segs() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-c]", 0..4)
    }

    proptest! {
        #[test]
        fn set_then_get_roundtrips(base in segs(), leaf in any::<i64>()) {
            let p: KeyPath = base.into_iter().map(Segment::Key).collect();
            let t = OverlayTree::new().set(&p, Value::from(leaf));
            prop_assert_eq!(t.get(&p), Some(&Value::from(leaf)));
        }

        #[test]
        fn ancestor_read_contains_suffix(
            prefix in segs(),
            suffix in segs(),
            leaf in any::<i64>(),
        ) {
            let p1: KeyPath = prefix.into_iter().map(Segment::Key).collect();
            let rel: KeyPath = suffix.into_iter().map(Segment::Key).collect();
            let p2 = p1.join(&rel);
            let t = tree(json!({"seed": 1})).set(&p2, Value::from(leaf));
            let ancestor = t.get(&p1).unwrap();
            prop_assert_eq!(ancestor.get(&rel), Some(&Value::from(leaf)));
        }

        #[test]
        fn set_preserves_unrelated_paths(a in segs(), b in segs()) {
            let pa: KeyPath = a.into_iter().map(Segment::Key).collect();
            let pb: KeyPath = b.into_iter().map(Segment::Key).collect();
            prop_assume!(!pa.overlaps(&pb));
            let t = OverlayTree::new().set(&pa, Value::from(1)).set(&pb, Value::from(2));
            prop_assert_eq!(t.get(&pa), Some(&Value::from(1)));
        }
    }
}
