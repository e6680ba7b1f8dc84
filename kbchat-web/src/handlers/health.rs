//! Health check handlers

use super::types::HealthResponse;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use tracing::warn;

/// Liveness plus a round trip to the database when one is attached
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    summary = "Health check",
    description = "Report server status and whether the database answers",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.database {
        Some(database) => match sqlx::query("SELECT 1").execute(database.pool()).await {
            Ok(_) => "ok",
            Err(e) => {
                warn!("Health check database query failed: {}", e);
                "unreachable"
            }
        },
        None => "not_configured",
    };

    let (status, code) = if database == "unreachable" {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("healthy", StatusCode::OK)
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            database: database.to_string(),
            knowledge_bases: if state.index_registry.is_some() {
                "memory"
            } else {
                "external"
            }
            .to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
