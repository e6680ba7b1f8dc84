//! Chat log listing

use super::types::{ChatLogEntry, ChatLogQuery, ErrorResponse};
use crate::{auth::CompanyOrAdmin, ApiError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
};
use kbchat_core::UserRole;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

/// Recent chat logs, newest first
///
/// Company accounts see their own tenant. Administrators name the tenant with `company_id`.
#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "Chat",
    summary = "List chat logs",
    params(ChatLogQuery),
    responses(
        (status = 200, description = "Chat logs", body = [ChatLogEntry]),
        (status = 400, description = "Missing company_id", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not allowed to read this tenant", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_chats(
    State(state): State<AppState>,
    CompanyOrAdmin(user): CompanyOrAdmin,
    query: Result<Query<ChatLogQuery>, QueryRejection>,
) -> Result<Json<Vec<ChatLogEntry>>, ApiError> {
    let Query(query) =
        query.map_err(|_| ApiError::BadRequest("Invalid query parameters".to_string()))?;

    let company_id = match user.role {
        UserRole::Admin => query
            .company_id
            .ok_or_else(|| ApiError::BadRequest("company_id is required".to_string()))?,
        _ => {
            let own = user.company_id.clone().ok_or(ApiError::Forbidden)?;
            if query.company_id.as_deref().is_some_and(|c| c != own) {
                return Err(ApiError::Forbidden);
            }
            own
        }
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = state.chat_log.list_for_company(&company_id, limit).await?;
    Ok(Json(records.into_iter().map(ChatLogEntry::from).collect()))
}
