//! HTTP server for KeyTree Sync.
//!
//! Answers batched call exchanges on `POST /v1/batch`. Each call is handed
//! to a [`CallHandler`](kts_sync::CallHandler) backend; the bundled
//! [`MemoryBackend`] keeps everything in memory. [`RouterTransport`] drives
//! the router in-process for tests and demos.

pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod transport;

pub use backend::MemoryBackend;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::KtsServer;
pub use transport::RouterTransport;
