//! Request layer for KeyTree Sync.
//!
//! Namespaces issue logical `load`/`save`/custom calls through a
//! [`RequestLayer`]. The [`RequestBatcher`] implementation coalesces
//! structurally equal calls, debounces bursts, and ships each batch as one
//! exchange over a [`Transport`].

pub mod actions;
pub mod batcher;
pub mod error;
pub mod transport;

pub use actions::ActionSet;
pub use batcher::{BatchConfig, CallFuture, RequestBatcher};
pub use error::{SyncError, SyncResult};
pub use transport::{CallHandler, HandlerTransport, RequestLayer, Transport};
