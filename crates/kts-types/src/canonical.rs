//! Canonical byte encoding for content hashing.
//!
//! Every encoded item starts with a one-byte tag and variable-length parts
//! carry a big-endian `u64` length prefix, so distinct values never share an
//! encoding. Containers are written in key order, which makes the output
//! independent of how a value was built.

use crate::path::{KeyPath, Segment};
use crate::value::{Scalar, Value};

/// Types with a deterministic, injective byte encoding.
pub trait Canonical {
    fn encode_canonical(&self, out: &mut Vec<u8>);

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_canonical(&mut out);
        out
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    out.extend_from_slice(bytes);
}

impl Canonical for str {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        out.push(b's');
        put_bytes(out, self.as_bytes());
    }
}

impl Canonical for Segment {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Segment::Index(i) => {
                out.push(b'i');
                out.extend_from_slice(&i.to_be_bytes());
            }
            Segment::Key(k) => k.as_str().encode_canonical(out),
        }
    }
}

impl Canonical for KeyPath {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        out.push(b'p');
        out.extend_from_slice(&(self.len() as u64).to_be_bytes());
        for segment in self {
            segment.encode_canonical(out);
        }
    }
}

impl Canonical for Value {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Value::Leaf(Scalar::Null) => out.push(b'n'),
            Value::Leaf(Scalar::Bool(false)) => out.push(b'f'),
            Value::Leaf(Scalar::Bool(true)) => out.push(b't'),
            Value::Leaf(Scalar::Number(n)) => {
                out.push(b'd');
                put_bytes(out, n.to_string().as_bytes());
            }
            Value::Leaf(Scalar::String(s)) => s.as_str().encode_canonical(out),
            Value::Container(map) => {
                out.push(b'm');
                out.extend_from_slice(&(map.len() as u64).to_be_bytes());
                for (key, child) in map.iter() {
                    key.encode_canonical(out);
                    child.encode_canonical(out);
                }
            }
        }
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(b'0'),
            Some(inner) => {
                out.push(b'1');
                inner.encode_canonical(out);
            }
        }
    }
}
