//! kbchat Web Server
//!
//! HTTP surface for multi-tenant knowledge-base chat: authentication, chat answering,
//! document ingestion, chat-log listing and per-company chatbot settings.

pub mod auth;
pub mod database;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use error::ApiError;
pub use server::KbChatServer;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use kbchat_core::VectorBackend;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Multipart framing on top of the largest accepted document
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let body_limit = state.ingestion.max_upload_bytes() + BODY_LIMIT_SLACK;

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(openapi::docs_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable development mode
    pub dev_mode: bool,
    /// SQLite URL for users, chat logs and document rows
    pub database_url: String,
    /// Optional TOML file with model, index and retry settings
    pub config_path: Option<String>,
    /// Overrides the vector backend from the config file
    pub vector_backend: Option<VectorBackend>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
            database_url: "sqlite::memory:".to_string(),
            config_path: None,
            vector_backend: None,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("KBCHAT_HOST").unwrap_or(defaults.host),
            port: std::env::var("KBCHAT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dev_mode: std::env::var("KBCHAT_DEV_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            config_path: std::env::var("KBCHAT_CONFIG").ok(),
            vector_backend: std::env::var("KBCHAT_VECTOR_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<kbchat_core::KbChatError> for WebError {
    fn from(err: kbchat_core::KbChatError) -> Self {
        WebError::Config(err.to_string())
    }
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;
