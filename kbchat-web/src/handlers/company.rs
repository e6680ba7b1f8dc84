//! Company chatbot settings, the public widget config and dashboard counts

use super::types::{
    CompanySettings, CompanyStatsResponse, CompanySummary, ErrorResponse, WidgetConfig,
    WidgetConfigQuery,
};
use crate::{
    auth::{AdminUser, CompanyUser},
    ApiError, AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
};
use kbchat_core::{ChatbotCustomization, WidgetAppearance};
use tracing::{debug, info};

fn invalid_body(rejection: JsonRejection) -> ApiError {
    debug!("Rejected settings body: {}", rejection);
    ApiError::BadRequest("Invalid request body".to_string())
}

fn tenant(user: &crate::auth::User) -> Result<&str, ApiError> {
    user.company_id.as_deref().ok_or(ApiError::Forbidden)
}

/// The caller's chatbot settings
#[utoipa::path(
    get,
    path = "/api/company/settings",
    tag = "Company",
    summary = "Get chatbot settings",
    responses(
        (status = 200, description = "Current settings", body = CompanySettings),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a company account", body = ErrorResponse),
        (status = 404, description = "No company profile", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_company_settings(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
) -> Result<Json<CompanySettings>, ApiError> {
    let company = state
        .companies
        .get(tenant(&user)?)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(CompanySettings::from(company)))
}

/// Replace the chatbot copy
#[utoipa::path(
    put,
    path = "/api/company/customization",
    request_body = Object,
    tag = "Company",
    summary = "Update chatbot customization",
    description = "`welcomeMessage`, `tone` (friendly, professional, casual), `fallbackMessage` and `responseLength` (short, medium, detailed). Omitted fields take their defaults.",
    responses(
        (status = 200, description = "Updated settings", body = CompanySettings),
        (status = 400, description = "Invalid settings", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a company account", body = ErrorResponse),
        (status = 404, description = "No company profile", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_customization(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
    body: Result<Json<ChatbotCustomization>, JsonRejection>,
) -> Result<Json<CompanySettings>, ApiError> {
    let Json(customization) = body.map_err(invalid_body)?;
    customization.validate()?;

    let company_id = tenant(&user)?;
    state
        .companies
        .update_customization(company_id, &customization)
        .await?;
    info!(company_id = %company_id, "Chatbot customization updated");

    get_company_settings(State(state), CompanyUser(user)).await
}

/// Replace the widget colours
#[utoipa::path(
    put,
    path = "/api/company/appearance",
    request_body = Object,
    tag = "Company",
    summary = "Update widget appearance",
    description = "`colorScheme` (light, dark) and eight colours as `#rgb` or `#rrggbb`. Omitted fields take their defaults.",
    responses(
        (status = 200, description = "Updated settings", body = CompanySettings),
        (status = 400, description = "Invalid colour", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a company account", body = ErrorResponse),
        (status = 404, description = "No company profile", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_appearance(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
    body: Result<Json<WidgetAppearance>, JsonRejection>,
) -> Result<Json<CompanySettings>, ApiError> {
    let Json(appearance) = body.map_err(invalid_body)?;
    appearance.validate()?;

    let company_id = tenant(&user)?;
    state
        .companies
        .update_appearance(company_id, &appearance)
        .await?;
    info!(company_id = %company_id, "Widget appearance updated");

    get_company_settings(State(state), CompanyUser(user)).await
}

/// Title, greeting and colours for the embeddable widget
#[utoipa::path(
    get,
    path = "/api/company/widget-config",
    tag = "Company",
    summary = "Public widget configuration",
    params(WidgetConfigQuery),
    responses(
        (status = 200, description = "Widget configuration", body = WidgetConfig),
        (status = 400, description = "Missing companyId", body = ErrorResponse),
        (status = 404, description = "Unknown company", body = ErrorResponse)
    )
)]
pub async fn get_widget_config(
    State(state): State<AppState>,
    query: Result<Query<WidgetConfigQuery>, QueryRejection>,
) -> Result<Json<WidgetConfig>, ApiError> {
    let company_id = query
        .ok()
        .and_then(|Query(q)| q.company_id)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("companyId is required".to_string()))?;

    let company = state
        .companies
        .get(&company_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(WidgetConfig::from(company)))
}

/// Document and chat counts for the caller's tenant
#[utoipa::path(
    get,
    path = "/api/company/stats",
    tag = "Company",
    summary = "Dashboard counts",
    responses(
        (status = 200, description = "Counts", body = CompanyStatsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a company account", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_company_stats(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
) -> Result<Json<CompanyStatsResponse>, ApiError> {
    let stats = state.companies.stats(tenant(&user)?).await?;
    Ok(Json(stats.into()))
}

/// Every company with its counts, newest first
#[utoipa::path(
    get,
    path = "/api/admin/companies",
    tag = "Company",
    summary = "List companies",
    responses(
        (status = 200, description = "Companies", body = [CompanySummary]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_companies(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<CompanySummary>>, ApiError> {
    let companies = state.companies.list().await?;

    let mut summaries = Vec::with_capacity(companies.len());
    for company in companies {
        let stats = state.companies.stats(&company.id).await?;
        summaries.push(CompanySummary::new(company, stats));
    }
    Ok(Json(summaries))
}
