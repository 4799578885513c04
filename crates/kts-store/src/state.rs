use std::collections::{HashMap, HashSet};

use kts_types::{compose, KeyPath, OverlayTree, Value};

/// Load progress of one load key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    #[default]
    Unset,
    Loading,
    Loaded,
    Error,
}

/// The three data layers of a remote namespace plus its per-key progress.
///
/// `local` holds optimistic edits, `staged` holds data handed to an
/// in-flight save, and `remote` holds the last state confirmed by the
/// server. Reads see them in that order of precedence.
#[derive(Clone, Debug, Default)]
pub struct LayeredState {
    pub local: OverlayTree,
    pub staged: OverlayTree,
    pub remote: OverlayTree,
    pub loads: HashMap<KeyPath, LoadState>,
    pub saving: HashSet<KeyPath>,
}

impl LayeredState {
    pub fn read(&self, path: &KeyPath) -> Option<Value> {
        compose(&[&self.local, &self.staged, &self.remote], path)
    }

    pub fn load_state(&self, key: &KeyPath) -> LoadState {
        self.loads.get(key).copied().unwrap_or_default()
    }

    /// Move the local data under `key` to the staged layer and return it.
    /// Without local data an empty container is staged.
    pub fn stage(&mut self, key: &KeyPath) -> Value {
        let data = self.local.get(key).cloned().unwrap_or_else(Value::empty);
        self.staged = self.staged.set(key, data.clone());
        self.local = self.local.remove(key);
        data
    }

    /// A save succeeded: the server's value replaces the staged data.
    pub fn commit(&mut self, key: &KeyPath, confirmed: Value) {
        self.staged = self.staged.remove(key);
        self.remote = self.remote.set(key, confirmed);
    }

    /// A save failed: staged data returns to the local layer, under any
    /// edits made while the save was in flight.
    pub fn rollback(&mut self, key: &KeyPath) {
        let restored = kts_types::merge_opt(self.local.get(key), self.staged.get(key));
        self.local = match restored {
            Some(value) => self.local.set(key, value),
            None => self.local.remove(key),
        };
        self.staged = self.staged.remove(key);
    }
}
