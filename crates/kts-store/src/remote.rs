//! Server-backed namespaces.
//!
//! A [`RemoteNamespace`] layers optimistic local edits over data staged for
//! an in-flight save over the last data confirmed by the server. Loads and
//! saves are coalesced per unit: a load per key truncated to the key arity,
//! a save per key truncated to the save arity.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use kts_protocol::{CallName, Payload};
use kts_sync::RequestLayer;
use kts_types::{KeyPath, Value};

use crate::config::{Arity, Capabilities};
use crate::error::{StoreError, StoreResult};
use crate::namespace::Namespace;
use crate::state::{LayeredState, LoadState};
use crate::subscription::{Subscriber, SubscriberRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoadTrigger {
    /// A read found nothing; a key that already loaded is not fetched again.
    Read,
    /// Requested directly; anything not already loading is fetched again.
    Explicit,
}

struct Inner {
    name: String,
    key_arity: Arity,
    save_arity: Arity,
    capabilities: Capabilities,
    layer: Arc<dyn RequestLayer>,
    state: RwLock<LayeredState>,
    subscribers: SubscriberRegistry,
    poller: Mutex<Option<JoinHandle<()>>>,
    /// Runtime current at construction, used when called from outside one.
    runtime: Option<Handle>,
}

/// A namespace whose data is loaded from and saved to a server through a
/// [`RequestLayer`].
///
/// Cloning is cheap and clones share all state. Loads, saves and polling run
/// as Tokio tasks on the current runtime, or on the runtime that was current
/// when the namespace was built. With neither, reads mark the unit errored
/// and saves fail with a transport error.
#[derive(Clone)]
pub struct RemoteNamespace {
    inner: Arc<Inner>,
}

impl RemoteNamespace {
    pub fn new(
        name: impl Into<String>,
        layer: Arc<dyn RequestLayer>,
        key_arity: Arity,
        save_arity: Arity,
    ) -> Self {
        Self::with_capabilities(name, layer, key_arity, save_arity, Capabilities::default())
    }

    pub fn with_capabilities(
        name: impl Into<String>,
        layer: Arc<dyn RequestLayer>,
        key_arity: Arity,
        save_arity: Arity,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                key_arity,
                save_arity,
                capabilities,
                layer,
                state: RwLock::new(LayeredState::default()),
                subscribers: SubscriberRegistry::new(),
                poller: Mutex::new(None),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn key_arity(&self) -> Arity {
        self.inner.key_arity
    }

    pub fn save_arity(&self) -> Arity {
        self.inner.save_arity
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Fetch the load unit containing `path` from the server.
    ///
    /// Returns `None` without issuing anything if that unit is already
    /// loading, or if no runtime is reachable (the unit is then errored). The returned task settles the load state and notifies
    /// subscribers of the unit on success; dropping it does not cancel the
    /// load.
    pub fn load(&self, path: &KeyPath) -> Option<JoinHandle<()>> {
        self.inner.load(path, LoadTrigger::Explicit)
    }

    pub fn load_state(&self, path: &KeyPath) -> LoadState {
        let key = self.inner.key_arity.truncate(path);
        self.inner.state.read().expect("lock poisoned").load_state(&key)
    }

    /// Forward a custom call to the server without touching any layer.
    pub async fn invoke(&self, call: impl Into<CallName>, payload: Payload) -> StoreResult<Value> {
        let call = call.into();
        debug!(namespace = %self.inner.name, %call, keys = %payload.keys, "invoke");
        Ok(self.inner.layer.perform(&self.inner.name, call, payload).await?)
    }

    /// Whether the poll task is currently running.
    pub fn is_polling(&self) -> bool {
        self.inner.poller.lock().expect("lock poisoned").is_some()
    }
}

impl Inner {
    fn runtime(&self) -> Option<Handle> {
        Handle::try_current().ok().or_else(|| self.runtime.clone())
    }

    fn load(self: &Arc<Self>, path: &KeyPath, trigger: LoadTrigger) -> Option<JoinHandle<()>> {
        let key = self.key_arity.truncate(path);
        let runtime = {
            let mut state = self.state.write().expect("lock poisoned");
            // A miss below a loaded unit is missing server data, not a reason
            // to fetch the unit again.
            let proceed = match (trigger, state.load_state(&key)) {
                (_, LoadState::Loading) => false,
                (LoadTrigger::Read, LoadState::Loaded) => false,
                _ => true,
            };
            if !proceed {
                return None;
            }
            let Some(runtime) = self.runtime() else {
                state.loads.insert(key.clone(), LoadState::Error);
                drop(state);
                warn!(namespace = %self.name, key = %key, "load failed: no async runtime");
                return None;
            };
            state.loads.insert(key.clone(), LoadState::Loading);
            runtime
        };
        debug!(namespace = %self.name, key = %key, ?trigger, "load issued");

        let inner = Arc::clone(self);
        Some(runtime.spawn(async move { inner.complete_load(key).await }))
    }

    async fn complete_load(&self, key: KeyPath) {
        let result = self
            .layer
            .perform(&self.name, CallName::Load, Payload::keys(key.clone()))
            .await;
        match result {
            Ok(value) => {
                {
                    let mut state = self.state.write().expect("lock poisoned");
                    state.remote = state.remote.set(&key, value);
                    state.loads.insert(key.clone(), LoadState::Loaded);
                }
                debug!(namespace = %self.name, key = %key, "load complete");
                self.subscribers.notify(&key);
            }
            Err(err) => {
                self.state
                    .write()
                    .expect("lock poisoned")
                    .loads
                    .insert(key.clone(), LoadState::Error);
                warn!(namespace = %self.name, key = %key, error = %err, "load failed");
            }
        }
    }

    async fn complete_save(&self, key: KeyPath, data: Value) -> StoreResult<Value> {
        let result = self
            .layer
            .perform(&self.name, CallName::Save, Payload::with_value(key.clone(), data))
            .await;
        let outcome = {
            let mut state = self.state.write().expect("lock poisoned");
            state.saving.remove(&key);
            match result {
                Ok(confirmed) => {
                    state.commit(&key, confirmed.clone());
                    Ok(confirmed)
                }
                Err(err) => {
                    state.rollback(&key);
                    Err(StoreError::from(err))
                }
            }
        };
        match &outcome {
            Ok(_) => debug!(namespace = %self.name, key = %key, "save confirmed"),
            Err(err) => warn!(namespace = %self.name, key = %key, error = %err, "save failed, local edits restored"),
        }
        self.subscribers.notify(&key);
        outcome
    }

    /// Start or stop the poll task to match whether anyone is subscribed.
    fn update_poller(self: &Arc<Self>) {
        let Some(interval) = self.capabilities.poll_interval.filter(|d| !d.is_zero()) else {
            return;
        };
        let mut poller = self.poller.lock().expect("lock poisoned");
        let observed = !self.subscribers.is_empty();
        if observed && poller.is_none() {
            let Some(runtime) = self.runtime() else {
                warn!(namespace = %self.name, "polling not started: no async runtime");
                return;
            };
            debug!(namespace = %self.name, ?interval, "polling started");
            *poller = Some(runtime.spawn(poll(Arc::downgrade(self), interval)));
        } else if !observed {
            if let Some(task) = poller.take() {
                debug!(namespace = %self.name, "polling stopped");
                task.abort();
            }
        }
    }

    /// Reload every distinct load unit someone is subscribed to. A unit
    /// still loading from an earlier tick or read is left to finish.
    fn refresh_subscribed(self: &Arc<Self>) {
        let keys: BTreeSet<KeyPath> = self
            .subscribers
            .paths()
            .iter()
            .map(|path| self.key_arity.truncate(path))
            .collect();
        debug!(namespace = %self.name, keys = keys.len(), "poll tick");
        for key in keys {
            self.load(&key, LoadTrigger::Explicit);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(poller) = self.poller.get_mut() {
            if let Some(task) = poller.take() {
                task.abort();
            }
        }
    }
}

async fn poll(inner: Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.refresh_subscribed();
    }
}

#[async_trait]
impl Namespace for RemoteNamespace {
    /// Composed read of the local, staged and remote layers. A miss starts a
    /// background load of the containing unit unless that unit is loading
    /// or already loaded.
    fn get(&self, path: &KeyPath) -> Option<Value> {
        let value = self.inner.state.read().expect("lock poisoned").read(path);
        if value.is_none() {
            self.inner.load(path, LoadTrigger::Read);
        }
        value
    }

    fn set(&self, path: &KeyPath, value: Value) -> StoreResult<()> {
        if self.inner.capabilities.read_only {
            return Err(StoreError::ReadOnly);
        }
        {
            let mut state = self.inner.state.write().expect("lock poisoned");
            state.local = state.local.set(path, value);
        }
        debug!(namespace = %self.inner.name, path = %path, "local set");
        self.notify(path);
        Ok(())
    }

    fn subscribe(&self, path: &KeyPath, subscriber: Subscriber) {
        self.inner.subscribers.insert(path.clone(), subscriber);
        self.inner.update_poller();
    }

    fn unsubscribe(&self, path: &KeyPath, subscriber: &Subscriber) -> bool {
        let removed = self.inner.subscribers.remove(path, subscriber);
        self.inner.update_poller();
        removed
    }

    fn notify(&self, path: &KeyPath) {
        self.inner.subscribers.notify(path);
    }

    fn is_loading(&self, path: &KeyPath) -> bool {
        self.load_state(path) == LoadState::Loading
    }

    fn is_error(&self, path: &KeyPath) -> bool {
        self.load_state(path) == LoadState::Error
    }

    fn is_saving(&self, path: &KeyPath) -> bool {
        let key = self.inner.save_arity.truncate(path);
        self.inner.state.read().expect("lock poisoned").saving.contains(&key)
    }

    /// Stage the local data of the save unit containing `path`, send it, and
    /// settle the layers from the server's answer.
    ///
    /// On failure the staged data is merged back beneath any local edits made
    /// in the meantime and the error is returned. The exchange runs to
    /// completion even if this future is dropped.
    async fn save(&self, path: &KeyPath) -> StoreResult<Value> {
        let inner = &self.inner;
        if inner.capabilities.read_only {
            return Err(StoreError::ReadOnly);
        }
        if !inner.save_arity.covers(path) {
            return Err(StoreError::InvalidArgument(format!(
                "save key not specific enough: {path} is shorter than save arity {}",
                inner.save_arity.get()
            )));
        }

        let Some(runtime) = inner.runtime() else {
            return Err(StoreError::Transport("no async runtime to run the save on".into()));
        };
        let key = inner.save_arity.truncate(path);
        let data = {
            let mut state = inner.state.write().expect("lock poisoned");
            if state.saving.contains(&key) {
                return Err(StoreError::Conflict(key));
            }
            let data = state.stage(&key);
            state.saving.insert(key.clone());
            data
        };
        debug!(namespace = %inner.name, key = %key, "save issued");

        let inner = Arc::clone(inner);
        runtime
            .spawn(async move { inner.complete_save(key, data).await })
            .await
            .map_err(|err| StoreError::Transport(format!("save task failed: {err}")))?
    }
}

impl std::fmt::Debug for RemoteNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteNamespace")
            .field("name", &self.inner.name)
            .field("key_arity", &self.inner.key_arity)
            .field("save_arity", &self.inner.save_arity)
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}
