use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::path::{KeyPath, Segment};

/// Child mapping of a [`Value::Container`].
pub type Map = BTreeMap<Segment, Value>;

/// A non-container value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A stored value: either a scalar leaf or a container of further values.
///
/// Containers are reference-counted so that trees can share unchanged
/// subtrees between versions. Cloning a `Value` never deep-copies.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    Leaf(Scalar),
    Container(Arc<Map>),
}

impl Value {
    /// The `null` leaf. A null leaf is a defined value, not an absence.
    pub const fn null() -> Self {
        Self::Leaf(Scalar::Null)
    }

    /// An empty container.
    pub fn empty() -> Self {
        Self::Container(Arc::new(Map::new()))
    }

    /// Build a container from `(segment, value)` pairs.
    pub fn container<K, V, I>(entries: I) -> Self
    where
        K: Into<Segment>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Container(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn as_container(&self) -> Option<&Map> {
        match self {
            Self::Container(map) => Some(map),
            Self::Leaf(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Leaf(scalar) => Some(scalar),
            Self::Container(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Leaf(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Leaf(Scalar::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    /// Direct child of a container.
    pub fn child(&self, segment: &Segment) -> Option<&Value> {
        self.as_container().and_then(|map| map.get(segment))
    }

    /// Navigate to `path` below this value.
    ///
    /// Returns `None` if a segment is missing or an intermediate value is a
    /// leaf.
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        path.iter().try_fold(self, |node, segment| node.child(segment))
    }

    /// Returns `true` if two values share the same container allocation.
    ///
    /// Leaves are never pointer-identical.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Container(a), Self::Container(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert to a `serde_json::Value`. Container keys are stringified.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Leaf(Scalar::Null) => serde_json::Value::Null,
            Self::Leaf(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Self::Leaf(Scalar::Number(n)) => serde_json::Value::Number(n.clone()),
            Self::Leaf(Scalar::String(s)) => serde_json::Value::String(s.clone()),
            Self::Container(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_json_key(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Recursively overlay `higher` onto `lower`.
///
/// When both are containers the result holds `lower`'s keys overlaid by
/// `higher`'s, merging nested containers. Otherwise `higher` wins outright:
/// a leaf masks whatever `lower` defines, and a container replaces a leaf.
pub fn merge(higher: &Value, lower: &Value) -> Value {
    match (higher, lower) {
        (Value::Container(high), Value::Container(low)) => {
            if high.is_empty() {
                return lower.clone();
            }
            if low.is_empty() {
                return higher.clone();
            }
            let mut out = Map::clone(low);
            for (key, high_child) in high.iter() {
                let merged = match out.get(key) {
                    Some(low_child) => merge(high_child, low_child),
                    None => high_child.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Container(Arc::new(out))
        }
        _ => higher.clone(),
    }
}

/// [`merge`] lifted over optional layers.
pub fn merge_opt(higher: Option<&Value>, lower: Option<&Value>) -> Option<Value> {
    match (higher, lower) {
        (Some(h), Some(l)) => Some(merge(h, l)),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(Scalar::Null) => f.write_str("null"),
            Self::Leaf(Scalar::Bool(b)) => write!(f, "{b}"),
            Self::Leaf(Scalar::Number(n)) => write!(f, "{n}"),
            Self::Leaf(Scalar::String(s)) => write!(f, "{s:?}"),
            Self::Container(map) => f.debug_map().entries(map.iter()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::null(),
            serde_json::Value::Bool(b) => Self::Leaf(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Self::Leaf(Scalar::Number(n)),
            serde_json::Value::String(s) => Self::Leaf(Scalar::String(s)),
            serde_json::Value::Array(items) => Self::Container(Arc::new(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Segment::Index(i as u64), Value::from(v)))
                    .collect(),
            )),
            serde_json::Value::Object(obj) => Self::Container(Arc::new(
                obj.into_iter()
                    .map(|(k, v)| (Segment::from_json_key(&k), Value::from(v)))
                    .collect(),
            )),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self::Leaf(scalar)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Leaf(Scalar::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Leaf(Scalar::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Leaf(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Leaf(Scalar::Number(n.into()))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Leaf(Scalar::Number(n.into()))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Leaf(Scalar::Number(n.into()))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn json_roundtrip_preserves_structure() {
        let original = json!({"name": "X", "id": 7, "tags": {"0": "a", "1": "b"}, "on": true, "nil": null});
        assert_eq!(v(original.clone()).to_json(), original);
    }

    #[test]
    fn arrays_become_indexed_containers() {
        let value = v(json!(["a", "b"]));
        assert_eq!(value.child(&Segment::Index(1)), Some(&Value::from("b")));
        assert_eq!(value.to_json(), json!({"0": "a", "1": "b"}));
    }

    #[test]
    fn get_navigates_and_stops_at_leaves() {
        let value = v(json!({"a": {"b": 1}}));
        assert_eq!(value.get(&KeyPath::from(["a", "b"])), Some(&Value::from(1)));
        assert_eq!(value.get(&KeyPath::root()), Some(&value));
        assert_eq!(value.get(&KeyPath::from(["a", "b", "c"])), None);
        assert_eq!(value.get(&KeyPath::from(["z"])), None);
    }

    #[test]
    fn merge_overlays_containers_recursively() {
        let higher = v(json!({"a": {"x": 1}, "b": 2}));
        let lower = v(json!({"a": {"x": 0, "y": 9}, "c": 3}));
        assert_eq!(
            merge(&higher, &lower),
            v(json!({"a": {"x": 1, "y": 9}, "b": 2, "c": 3}))
        );
    }

    #[test]
    fn leaf_masks_container() {
        let higher = Value::from("masked");
        let lower = v(json!({"a": 1}));
        assert_eq!(merge(&higher, &lower), higher);
    }

    #[test]
    fn container_replaces_leaf() {
        let higher = v(json!({"a": 1}));
        assert_eq!(merge(&higher, &Value::from(5)), higher);
    }

    #[test]
    fn merge_with_empty_side_shares_structure() {
        let lower = v(json!({"a": 1}));
        assert!(merge(&Value::empty(), &lower).ptr_eq(&lower));
        assert!(merge(&lower, &Value::empty()).ptr_eq(&lower));
    }

    #[test]
    fn merge_opt_prefers_defined_side() {
        let a = Value::from(1);
        assert_eq!(merge_opt(Some(&a), None), Some(a.clone()));
        assert_eq!(merge_opt(None, Some(&a)), Some(a.clone()));
        assert_eq!(merge_opt(None, None), None);
    }

    #[test]
    fn null_is_a_leaf() {
        assert!(Value::null().is_leaf());
        assert_eq!(Value::null().to_json(), serde_json::Value::Null);
    }

    #[test]
    fn serde_goes_through_json_shape() {
        let value = Value::container([("id", Value::from(7)), ("name", Value::from("X"))]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"id":7,"name":"X"}"#);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }
}
