use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use kts_protocol::{CallEnvelope, CallName};
use kts_sync::CallHandler;
use kts_types::{KeyPath, OverlayTree, Segment, Value};

use crate::error::{ServerError, ServerResult};

/// In-memory data source keyed by namespace, then by the call's keys.
///
/// `load` answers the value stored at the keys (`null` when nothing is
/// there) and `save` stores the given value and echoes it back as the
/// confirmed state.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<OverlayTree>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend holding `root`, whose top-level keys are namespace names.
    pub fn with_root(root: Value) -> Self {
        Self {
            data: RwLock::new(OverlayTree::from_value(root)),
        }
    }

    pub fn from_json(text: &str) -> ServerResult<Self> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ServerError::Seed(e.to_string()))?;
        if !json.is_object() {
            return Err(ServerError::Seed("top level must be an object of namespaces".into()));
        }
        Ok(Self::with_root(Value::from(json)))
    }

    pub fn from_json_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn get(&self, path: &KeyPath) -> Option<Value> {
        self.data.read().expect("lock poisoned").get(path).cloned()
    }

    fn scoped(call: &CallEnvelope) -> KeyPath {
        KeyPath::new(vec![Segment::Key(call.namespace.clone())]).join(&call.payload.keys)
    }
}

#[async_trait]
impl CallHandler for MemoryBackend {
    async fn handle(&self, call: &CallEnvelope) -> Result<Value, String> {
        let path = Self::scoped(call);
        debug!(call = %call.call, path = %path, "backend call");
        match &call.call {
            CallName::Load => Ok(self.get(&path).unwrap_or_else(Value::null)),
            CallName::Save => {
                let value = call
                    .payload
                    .value
                    .clone()
                    .ok_or_else(|| "save requires a value".to_string())?;
                let mut data = self.data.write().expect("lock poisoned");
                *data = data.set(&path, value.clone());
                Ok(value)
            }
            CallName::Custom(name) => Err(format!("unknown call: {name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kts_protocol::Payload;
    use serde_json::json;

    fn call(namespace: &str, name: CallName, payload: Payload) -> CallEnvelope {
        CallEnvelope::new(namespace, name, payload)
    }

    #[tokio::test]
    async fn load_reads_within_the_namespace() {
        let backend = MemoryBackend::from_json(r#"{"users": {"a": {"name": "X"}}, "posts": {"a": 1}}"#).unwrap();
        let loaded = backend
            .handle(&call("users", CallName::Load, Payload::keys(KeyPath::from(["a"]))))
            .await
            .unwrap();
        assert_eq!(loaded, Value::from(json!({"name": "X"})));

        let missing = backend
            .handle(&call("users", CallName::Load, Payload::keys(KeyPath::from(["zz"]))))
            .await
            .unwrap();
        assert_eq!(missing, Value::null());
    }

    #[tokio::test]
    async fn save_stores_and_echoes() {
        let backend = MemoryBackend::new();
        let value = Value::from(json!({"name": "X"}));
        let saved = backend
            .handle(&call(
                "users",
                CallName::Save,
                Payload::with_value(KeyPath::from(["a"]), value.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(saved, value);
        assert_eq!(backend.get(&KeyPath::from(["users", "a", "name"])), Some(Value::from("X")));
    }

    #[tokio::test]
    async fn other_calls_fail_individually() {
        let backend = MemoryBackend::new();
        let err = backend
            .handle(&call("users", CallName::from("refresh"), Payload::keys(KeyPath::root())))
            .await
            .unwrap_err();
        assert_eq!(err, "unknown call: refresh");
        let err = backend
            .handle(&call("users", CallName::Save, Payload::keys(KeyPath::root())))
            .await
            .unwrap_err();
        assert!(err.contains("requires a value"));
    }

    #[test]
    fn seed_must_be_an_object() {
        assert!(matches!(MemoryBackend::from_json("[1, 2]"), Err(ServerError::Seed(_))));
        assert!(matches!(MemoryBackend::from_json("{"), Err(ServerError::Seed(_))));
    }

    #[test]
    fn seed_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"{"users": {"a": 1}}"#).unwrap();
        let backend = MemoryBackend::from_json_file(&path).unwrap();
        assert_eq!(backend.get(&KeyPath::from(["users", "a"])), Some(Value::from(1)));
    }
}
