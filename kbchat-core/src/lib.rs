//! kbchat core - shared data structures, collaborator traits and infrastructure
//!
//! Everything the answering flow, the ingestion pipeline and the web layer agree on
//! lives here: the error type, retry/timeout helpers, logging setup, configuration
//! and the traits that external services are injected through.

pub mod company;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod traits;
pub mod types;

pub use company::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use retry::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
