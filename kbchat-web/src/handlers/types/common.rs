//! Common types used across multiple handlers

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    #[schema(example = "healthy")]
    pub status: String,
    /// `ok`, `unreachable` or `not_configured`
    #[schema(example = "ok")]
    pub database: String,
    /// Where tenant vector indexes live: `memory` or `external`
    #[schema(example = "external")]
    pub knowledge_bases: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Unauthorized")]
    pub error: String,
}
