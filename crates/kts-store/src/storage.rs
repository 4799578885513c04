use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use kts_sync::RequestLayer;
use kts_types::{KeyPath, Value};

use crate::config::{Arity, NamespaceKind, StorageConfig};
use crate::error::{StoreError, StoreResult};
use crate::namespace::{LocalNamespace, Namespace};
use crate::remote::RemoteNamespace;
use crate::subscription::Subscriber;

/// Registry of namespaces addressed by the first segment of a path.
///
/// Every pass-through operation splits `path` into the namespace name and
/// the rest, and delegates the rest to the registered namespace.
///
/// Cloning yields an independent registry that shares the registered
/// namespaces by reference: registering on the clone overrides names for
/// the clone only, while data and subscribers of shared namespaces stay
/// shared.
#[derive(Clone, Default)]
pub struct Storage {
    namespaces: HashMap<String, Arc<dyn Namespace>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every namespace listed in `config`. Remote namespaces issue
    /// their calls through `layer`.
    pub fn from_config(config: &StorageConfig, layer: Arc<dyn RequestLayer>) -> StoreResult<Self> {
        let mut storage = Self::new();
        for entry in &config.namespaces {
            let namespace: Arc<dyn Namespace> = match entry.kind {
                NamespaceKind::Local => Arc::new(LocalNamespace::new()),
                NamespaceKind::Remote => Arc::new(RemoteNamespace::with_capabilities(
                    entry.name.clone(),
                    Arc::clone(&layer),
                    Arity::try_from(entry.key_arity)?,
                    Arity::try_from(entry.save_arity)?,
                    entry.capabilities(),
                )),
            };
            storage.register(entry.name.clone(), namespace);
        }
        Ok(storage)
    }

    /// Register `namespace` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, namespace: Arc<dyn Namespace>) {
        let name = name.into();
        debug!(namespace = %name, "registered");
        self.namespaces.insert(name, namespace);
    }

    pub fn get_namespace(&self, name: &str) -> StoreResult<Arc<dyn Namespace>> {
        self.namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    fn route(&self, path: &KeyPath) -> StoreResult<(&dyn Namespace, KeyPath)> {
        let (head, rest) = path
            .split_first()
            .ok_or_else(|| StoreError::InvalidArgument("path must start with a namespace".into()))?;
        let name = head.to_string();
        let namespace = self
            .namespaces
            .get(&name)
            .ok_or(StoreError::NotFound(name))?;
        Ok((namespace.as_ref(), rest))
    }

    pub fn get(&self, path: &KeyPath) -> StoreResult<Option<Value>> {
        let (namespace, rest) = self.route(path)?;
        Ok(namespace.get(&rest))
    }

    pub fn set(&self, path: &KeyPath, value: Value) -> StoreResult<()> {
        let (namespace, rest) = self.route(path)?;
        namespace.set(&rest, value)
    }

    pub fn is_loading(&self, path: &KeyPath) -> StoreResult<bool> {
        let (namespace, rest) = self.route(path)?;
        Ok(namespace.is_loading(&rest))
    }

    pub fn is_error(&self, path: &KeyPath) -> StoreResult<bool> {
        let (namespace, rest) = self.route(path)?;
        Ok(namespace.is_error(&rest))
    }

    pub fn is_saving(&self, path: &KeyPath) -> StoreResult<bool> {
        let (namespace, rest) = self.route(path)?;
        Ok(namespace.is_saving(&rest))
    }

    pub fn subscribe(&self, path: &KeyPath, subscriber: Subscriber) -> StoreResult<()> {
        let (namespace, rest) = self.route(path)?;
        namespace.subscribe(&rest, subscriber);
        Ok(())
    }

    pub fn unsubscribe(&self, path: &KeyPath, subscriber: &Subscriber) -> StoreResult<bool> {
        let (namespace, rest) = self.route(path)?;
        Ok(namespace.unsubscribe(&rest, subscriber))
    }

    pub async fn save(&self, path: &KeyPath) -> StoreResult<Value> {
        let (namespace, rest) = self.route(path)?;
        namespace.save(&rest).await
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("namespaces", &self.names())
            .finish()
    }
}
