use std::fmt;

use kts_types::Canonical;

use crate::message::{CallName, Payload};

/// Domain tag mixed into every call digest.
const CALL_DOMAIN: &str = "kts-call-v1";

/// Domain-separated BLAKE3 digest of a logical call.
///
/// Computed over the canonical encoding of `(namespace, call, keys, value)`,
/// so two calls digest equally exactly when they are structurally equal,
/// independent of how their values were assembled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallDigest([u8; 32]);

impl CallDigest {
    pub fn of(namespace: &str, call: &CallName, payload: &Payload) -> Self {
        let mut buf = Vec::new();
        namespace.encode_canonical(&mut buf);
        call.as_str().encode_canonical(&mut buf);
        payload.keys.encode_canonical(&mut buf);
        payload.value.encode_canonical(&mut buf);

        let mut hasher = blake3::Hasher::new();
        hasher.update(CALL_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(&buf);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for CallDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallDigest({})", self.short_hex())
    }
}

impl fmt::Display for CallDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
