//! kbchat Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use kbchat_core::VectorBackend;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main kbchat web server
pub struct KbChatServer {
    config: WebConfig,
    state: AppState,
}

impl KbChatServer {
    /// Create a new server, building state from configuration
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(config: WebConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until interrupted
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting kbchat web server");
        info!("Development mode: {}", self.config.dev_mode);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Builder for KbChatServer
pub struct KbChatServerBuilder {
    config: WebConfig,
}

impl KbChatServerBuilder {
    /// Start from environment configuration
    pub fn new() -> Self {
        Self {
            config: WebConfig::from_env(),
        }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = database_url.into();
        self
    }

    pub fn config_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    pub fn vector_backend(mut self, backend: VectorBackend) -> Self {
        self.config.vector_backend = Some(backend);
        self
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Build the server
    pub async fn build(self) -> WebResult<KbChatServer> {
        KbChatServer::new(self.config).await
    }
}

impl Default for KbChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_builder() {
        let builder = KbChatServerBuilder::new()
            .host("localhost")
            .port(3000)
            .dev_mode(true)
            .database_url("sqlite://kbchat.db")
            .vector_backend(VectorBackend::Memory);

        assert_eq!(builder.config().host, "localhost");
        assert_eq!(builder.config().port, 3000);
        assert!(builder.config().dev_mode);
        assert_eq!(builder.config().database_url, "sqlite://kbchat.db");
        assert_eq!(builder.config().vector_backend, Some(VectorBackend::Memory));
    }

    #[test]
    fn test_default_config() {
        let config = WebConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.vector_backend.is_none());
    }
}
