//! Distinct dispatch of triggered actions.
//!
//! One trigger can fan out into many `(namespace, call, payload)` actions,
//! several of which may be identical once their arguments are resolved. An
//! [`ActionSet`] keeps only the first of each structurally equal action, in
//! a single pass, before anything is sent.

use std::collections::HashSet;

use futures::future::join_all;

use kts_protocol::{CallDigest, CallEnvelope};
use kts_types::Value;

use crate::error::SyncResult;
use crate::transport::RequestLayer;

#[derive(Debug, Default)]
pub struct ActionSet {
    actions: Vec<CallEnvelope>,
    seen: HashSet<CallDigest>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action. Returns `false` if an equal action is already present.
    pub fn insert(&mut self, action: CallEnvelope) -> bool {
        if !self.seen.insert(action.digest()) {
            return false;
        }
        self.actions.push(action);
        true
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallEnvelope> {
        self.actions.iter()
    }

    /// Issue every distinct action concurrently and pair each with its
    /// result, in insertion order.
    pub async fn dispatch(self, layer: &dyn RequestLayer) -> Vec<(CallEnvelope, SyncResult<Value>)> {
        let results = join_all(
            self.actions
                .iter()
                .map(|a| layer.perform(&a.namespace, a.call.clone(), a.payload.clone())),
        )
        .await;
        self.actions.into_iter().zip(results).collect()
    }
}

impl Extend<CallEnvelope> for ActionSet {
    fn extend<I: IntoIterator<Item = CallEnvelope>>(&mut self, iter: I) {
        for action in iter {
            self.insert(action);
        }
    }
}

impl FromIterator<CallEnvelope> for ActionSet {
    fn from_iter<I: IntoIterator<Item = CallEnvelope>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
