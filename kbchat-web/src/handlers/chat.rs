//! Chat answering handler

use super::types::{ChatRequest, ChatResponse, ErrorResponse};
use crate::{auth::User, ApiError, AppState};
use axum::{body::Bytes, extract::State, response::Json};
use tracing::{debug, info};

/// Answer the last message of a conversation for a tenant
///
/// The caller is authenticated before the body is read, so an unauthenticated request is
/// rejected with 401 whatever its body.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "Chat",
    summary = "Ask a question",
    description = "Answer from the tenant's knowledge base, falling back to the generative model",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer produced", body = ChatResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 503, description = "No answering path succeeded", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn chat_query(
    State(state): State<AppState>,
    user: User,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!("Rejected chat body: {}", e);
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    info!(
        user_id = %user.id,
        tenant_id = %request.company_id,
        turns = request.messages.len(),
        "Processing chat query"
    );

    let answer = state
        .orchestrator
        .answer(&request.messages, &request.company_id, &user.id)
        .await?;

    Ok(Json(ChatResponse {
        text: answer.text,
        source: answer.source,
    }))
}
