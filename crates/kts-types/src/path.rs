use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A single scalar step in a [`KeyPath`].
///
/// Integer segments sort before string segments, so containers keyed by
/// indices iterate in numeric order ahead of any named keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Index(u64),
    Key(String),
}

impl Segment {
    /// Interpret a JSON object key as a segment.
    ///
    /// Keys written in canonical decimal form (`"0"`, `"17"`, but not `"07"`)
    /// become [`Segment::Index`]; everything else stays a string key.
    pub fn from_json_key(key: &str) -> Self {
        let canonical = !key.is_empty()
            && key.bytes().all(|b| b.is_ascii_digit())
            && (key == "0" || !key.starts_with('0'));
        match key.parse::<u64>() {
            Ok(index) if canonical => Self::Index(index),
            _ => Self::Key(key.to_string()),
        }
    }

    /// The string form used as a JSON object key.
    pub fn to_json_key(&self) -> String {
        match self {
            Self::Index(i) => i.to_string(),
            Self::Key(k) => k.clone(),
        }
    }

    /// Convert a JSON scalar into a segment.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TypeError> {
        match value {
            serde_json::Value::String(s) => Ok(Self::Key(s.clone())),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Self::Index)
                .ok_or_else(|| TypeError::InvalidSegment(n.to_string())),
            other => Err(TypeError::InvalidSegment(other.to_string())),
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => write!(f, "{k:?}"),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<u64> for Segment {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

/// An immutable, ordered sequence of [`Segment`]s addressing a subtree.
///
/// The empty path addresses the root of a tree.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.0.first()
    }

    /// Split off the leading segment, returning it with the remaining path.
    pub fn split_first(&self) -> Option<(&Segment, KeyPath)> {
        self.0
            .split_first()
            .map(|(head, rest)| (head, KeyPath(rest.to_vec())))
    }

    /// The first `arity` segments of this path (the whole path if shorter).
    pub fn truncate(&self, arity: usize) -> KeyPath {
        KeyPath(self.0[..arity.min(self.0.len())].to_vec())
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        KeyPath(segments)
    }

    /// A new path with all of `other`'s segments appended.
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        let mut segments = Vec::with_capacity(self.len() + other.len());
        segments.extend_from_slice(&self.0);
        segments.extend_from_slice(&other.0);
        KeyPath(segments)
    }

    /// Returns `true` if `self` is an initial subsequence of `other`.
    ///
    /// Every path is a prefix of itself, and the root is a prefix of all.
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// The suffix of `self` after `prefix`, if `prefix` is a prefix of `self`.
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<KeyPath> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| KeyPath(rest.to_vec()))
    }

    /// Returns `true` if either path is a prefix of the other, i.e. the two
    /// agree on every segment up to the shorter length.
    pub fn overlaps(&self, other: &KeyPath) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// Parse a path from a JSON array of strings and non-negative integers.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TypeError> {
        let items = value
            .as_array()
            .ok_or_else(|| TypeError::InvalidPath(format!("expected array, got {value}")))?;
        items
            .iter()
            .map(Segment::from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(KeyPath)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<Segment>> for KeyPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl<S: Into<Segment>, const N: usize> From<[S; N]> for KeyPath {
    fn from(segments: [S; N]) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<Segment> for KeyPath {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a KeyPath {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
