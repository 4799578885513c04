//! Layered key-tree storage for KeyTree Sync.
//!
//! A [`Storage`] routes paths to namespaces by their first segment. A
//! [`LocalNamespace`] holds client-only data. A [`RemoteNamespace`] reads
//! through three layers:
//!
//! - `local` -- optimistic edits not yet sent
//! - `staged` -- data handed to an in-flight save
//! - `remote` -- the last state confirmed by the server
//!
//! Reads compose the layers in that order. A read that finds nothing starts
//! a background load of its unit; subscribers hear about the result and
//! re-read. Saves move local data to `staged`, send it, and either commit
//! the server's answer or merge the data back beneath newer local edits.

pub mod config;
pub mod error;
pub mod namespace;
pub mod remote;
pub mod state;
pub mod storage;
pub mod subscription;

pub use config::{Arity, Capabilities, NamespaceKind, NamespaceSpec, StorageConfig};
pub use error::{StoreError, StoreResult};
pub use namespace::{LocalNamespace, Namespace};
pub use remote::RemoteNamespace;
pub use state::{LayeredState, LoadState};
pub use storage::Storage;
pub use subscription::{subscriber, Subscriber, SubscriberRegistry};
