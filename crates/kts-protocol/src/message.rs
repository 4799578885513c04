use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kts_types::{KeyPath, Value};

use crate::digest::CallDigest;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// The operation a call asks the server to perform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallName {
    Load,
    Save,
    Custom(String),
}

impl CallName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for CallName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "load" => Self::Load,
            "save" => Self::Save,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for CallName {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<CallName> for String {
    fn from(name: CallName) -> Self {
        match name {
            CallName::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for CallName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of a call: the addressed keys and, for writes, the value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub keys: KeyPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Payload {
    pub fn keys(keys: KeyPath) -> Self {
        Self { keys, value: None }
    }

    pub fn with_value(keys: KeyPath, value: Value) -> Self {
        Self {
            keys,
            value: Some(value),
        }
    }
}

/// One logical call addressed to a namespace on the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub namespace: String,
    pub call: CallName,
    pub payload: Payload,
}

impl CallEnvelope {
    pub fn new(namespace: impl Into<String>, call: impl Into<CallName>, payload: Payload) -> Self {
        Self {
            namespace: namespace.into(),
            call: call.into(),
            payload,
        }
    }

    /// Content digest used to recognize structurally equal calls.
    pub fn digest(&self) -> CallDigest {
        CallDigest::of(&self.namespace, &self.call, &self.payload)
    }
}

/// Identifier of one batched network exchange.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// A new time-ordered batch identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({})", self.0)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Several calls carried by a single exchange, keyed by per-call id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub id: BatchId,
    pub version: u32,
    pub calls: BTreeMap<u64, CallEnvelope>,
}

impl BatchRequest {
    pub fn new(calls: BTreeMap<u64, CallEnvelope>) -> Self {
        Self {
            id: BatchId::new(),
            version: PROTOCOL_VERSION,
            calls,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Result of a single call: `{"value": ...}` or `{"error": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Value(Value),
    Error(String),
}

impl CallOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(message) => Err(message),
        }
    }
}

impl From<Result<Value, String>> for CallOutcome {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(message) => Self::Error(message),
        }
    }
}

/// Per-call outcomes of a batch, keyed by the ids of the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub id: BatchId,
    pub results: BTreeMap<u64, CallOutcome>,
}

impl BatchResponse {
    pub fn new(id: BatchId) -> Self {
        Self {
            id,
            results: BTreeMap::new(),
        }
    }
}
