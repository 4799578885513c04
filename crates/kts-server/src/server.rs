use std::sync::Arc;

use tokio::net::TcpListener;

use kts_sync::CallHandler;

use crate::backend::MemoryBackend;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// KTS batch server.
pub struct KtsServer {
    config: ServerConfig,
    backend: Arc<dyn CallHandler>,
}

impl KtsServer {
    pub fn new(config: ServerConfig, backend: Arc<dyn CallHandler>) -> Self {
        Self { config, backend }
    }

    /// A server over a [`MemoryBackend`], seeded from `config.seed` if set.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let backend = match &config.seed {
            Some(path) => MemoryBackend::from_json_file(path)?,
            None => MemoryBackend::new(),
        };
        Ok(Self::new(config, Arc::new(backend)))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            backend: Arc::clone(&self.backend),
            max_batch_calls: self.config.max_batch_calls,
        })
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("KTS server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
