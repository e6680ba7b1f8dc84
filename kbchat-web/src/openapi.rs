//! OpenAPI specification for the kbchat web server

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::users::{AuthResponse, LoginRequest, RegisterRequest, UserInfo};
use crate::handlers::{
    ChatLogEntry, ChatRequest, ChatResponse, CompanySettings, CompanyStatsResponse,
    CompanySummary, DocumentInfo, ErrorResponse, HealthResponse, UploadResponse, WidgetConfig,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "kbchat Web API",
        version = "0.1.0",
        description = "Multi-tenant knowledge-base chat",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::handlers::health_check,
        crate::auth::handlers::register_user,
        crate::auth::handlers::login_user,
        crate::auth::handlers::get_current_user,
        crate::handlers::chat_query,
        crate::handlers::list_chats,
        crate::handlers::upload_document,
        crate::handlers::list_documents,
        crate::handlers::get_company_settings,
        crate::handlers::update_customization,
        crate::handlers::update_appearance,
        crate::handlers::get_widget_config,
        crate::handlers::get_company_stats,
        crate::handlers::list_companies,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UserInfo,
            ChatRequest,
            ChatResponse,
            ChatLogEntry,
            DocumentInfo,
            UploadResponse,
            CompanySettings,
            WidgetConfig,
            CompanyStatsResponse,
            CompanySummary,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and identity"),
        (name = "Chat", description = "Question answering and chat logs"),
        (name = "Documents", description = "Knowledge base ingestion"),
        (name = "Company", description = "Chatbot settings, widget configuration and dashboards"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Bearer token security scheme
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI at `/swagger-ui`, raw document at `/api-docs/openapi.json`
pub fn docs_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "kbchat Web API");
        assert!(openapi.paths.paths.contains_key("/api/chat"));
        assert!(openapi.paths.paths.contains_key("/api/documents"));
        assert!(openapi.paths.paths.contains_key("/api/company/widget-config"));
        assert!(openapi.paths.paths.contains_key("/api/admin/companies"));

        let components = openapi.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("ChatResponse"));
    }
}
