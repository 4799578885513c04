//! Debounced, deduplicating request batcher.
//!
//! Logical calls accumulate in a pending batch keyed by [`CallDigest`]. A
//! call structurally equal to one already pending gets a clone of the same
//! shared future instead of a new slot. Every new call restarts a debounce
//! timer; when it fires the whole pending batch is swapped out and sent as
//! one exchange, and each caller is settled from its own entry of the
//! response.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use kts_protocol::{BatchRequest, CallDigest, CallEnvelope, CallName, CallOutcome, Payload};
use kts_types::Value;

use crate::error::{SyncError, SyncResult};
use crate::transport::{RequestLayer, Transport};

/// Future for the result of a batched call. Cloning it is cheap and every
/// clone resolves to the same result.
pub type CallFuture = Shared<BoxFuture<'static, SyncResult<Value>>>;

/// Configuration for the [`RequestBatcher`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Quiet period after the last call before a batch is sent.
    pub debounce_ms: u64,
    /// A batch reaching this many distinct calls is sent immediately.
    pub max_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 10,
            max_batch_size: 256,
        }
    }
}

impl BatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

struct PendingCall {
    envelope: CallEnvelope,
    reply: oneshot::Sender<SyncResult<Value>>,
}

#[derive(Default)]
struct PendingBatch {
    calls: Vec<PendingCall>,
    futures: HashMap<CallDigest, CallFuture>,
    /// Bumped whenever the debounce restarts or the batch is taken; a timer
    /// whose epoch is stale does nothing when it fires.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

impl PendingBatch {
    fn disarm(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.epoch
    }

    /// Swap out everything pending. Calls arriving afterwards start a fresh
    /// batch.
    fn take(&mut self) -> Vec<PendingCall> {
        self.disarm();
        self.futures.clear();
        std::mem::take(&mut self.calls)
    }
}

struct BatcherInner {
    transport: Arc<dyn Transport>,
    config: BatchConfig,
    pending: Mutex<PendingBatch>,
    exchanges: AtomicU64,
}

/// Turns many logical calls into deduplicated, debounced exchanges.
///
/// Cloning a `RequestBatcher` yields another handle to the same pending
/// batch.
#[derive(Clone)]
pub struct RequestBatcher {
    inner: Arc<BatcherInner>,
}

impl RequestBatcher {
    pub fn new(transport: Arc<dyn Transport>, config: BatchConfig) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                transport,
                config,
                pending: Mutex::new(PendingBatch::default()),
                exchanges: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }

    /// Enqueue a call and return a future for its result.
    ///
    /// If a structurally equal call is already waiting in the current batch,
    /// its future is returned and no new work is scheduled.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime, which drives the debounce
    /// timer and the exchange.
    pub fn call(&self, envelope: CallEnvelope) -> CallFuture {
        let digest = envelope.digest();
        let mut pending = self.inner.pending.lock().expect("batcher lock poisoned");
        if let Some(existing) = pending.futures.get(&digest) {
            debug!(%digest, namespace = %envelope.namespace, call = %envelope.call, "joined pending call");
            return existing.clone();
        }

        let (reply, rx) = oneshot::channel();
        let future = async move { rx.await.unwrap_or(Err(SyncError::Cancelled)) }
            .boxed()
            .shared();
        debug!(%digest, namespace = %envelope.namespace, call = %envelope.call, "queued call");
        pending.futures.insert(digest, future.clone());
        pending.calls.push(PendingCall { envelope, reply });

        let inner = Arc::clone(&self.inner);
        if pending.calls.len() >= self.inner.config.max_batch_size {
            let calls = pending.take();
            tokio::spawn(async move { inner.send(calls).await });
        } else {
            let epoch = pending.disarm();
            let delay = self.inner.config.debounce();
            pending.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let calls = {
                    let mut pending = inner.pending.lock().expect("batcher lock poisoned");
                    if pending.epoch != epoch {
                        return;
                    }
                    // Nobody may abort this task once it owns the batch.
                    pending.timer = None;
                    pending.take()
                };
                inner.send(calls).await;
            }));
        }
        future
    }

    /// Send the pending batch now, without waiting for the debounce timer,
    /// and wait until its callers have been settled.
    pub async fn flush(&self) {
        let calls = self.inner.pending.lock().expect("batcher lock poisoned").take();
        self.inner.send(calls).await;
    }

    /// Number of distinct calls waiting for the next exchange.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().expect("batcher lock poisoned").calls.len()
    }

    /// Number of exchanges issued so far.
    pub fn exchanges(&self) -> u64 {
        self.inner.exchanges.load(Ordering::Relaxed)
    }
}

impl BatcherInner {
    async fn send(&self, calls: Vec<PendingCall>) {
        if calls.is_empty() {
            return;
        }
        let mut envelopes = BTreeMap::new();
        let mut replies = Vec::with_capacity(calls.len());
        for (id, call) in (0u64..).zip(calls) {
            envelopes.insert(id, call.envelope);
            replies.push((id, call.reply));
        }
        let request = BatchRequest::new(envelopes);
        let batch_id = request.id;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        debug!(%batch_id, calls = request.len(), "sending batch");

        match self.transport.exchange(request).await {
            Ok(response) if response.id != batch_id => {
                let err = SyncError::Protocol(format!(
                    "response {} does not answer batch {batch_id}",
                    response.id
                ));
                warn!(%batch_id, error = %err, "batch rejected");
                for (_, reply) in replies {
                    let _ = reply.send(Err(err.clone()));
                }
            }
            Ok(mut response) => {
                for (id, reply) in replies {
                    let result = match response.results.remove(&id) {
                        Some(CallOutcome::Value(value)) => Ok(value),
                        Some(CallOutcome::Error(message)) => Err(SyncError::Remote(message)),
                        None => Err(SyncError::Remote(format!("no result for call {id}"))),
                    };
                    // The receiver may be gone if every caller dropped its future.
                    let _ = reply.send(result);
                }
            }
            Err(err) => {
                warn!(%batch_id, error = %err, "batch exchange failed");
                for (_, reply) in replies {
                    let _ = reply.send(Err(err.clone()));
                }
            }
        }
    }
}

#[async_trait]
impl RequestLayer for RequestBatcher {
    async fn perform(&self, namespace: &str, call: CallName, payload: Payload) -> SyncResult<Value> {
        self.call(CallEnvelope::new(namespace, call, payload)).await
    }
}

impl std::fmt::Debug for RequestBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBatcher")
            .field("config", &self.inner.config)
            .field("pending", &self.pending_len())
            .field("exchanges", &self.exchanges())
            .finish()
    }
}
