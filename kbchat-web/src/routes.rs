//! Route definitions for the kbchat web server

use crate::{auth, handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Authentication
        .route("/auth/register", post(auth::handlers::register_user))
        .route("/auth/login", post(auth::handlers::login_user))
        .route("/auth/me", get(auth::handlers::get_current_user))
        // Chat answering and logs
        .route("/chat", post(handlers::chat_query))
        .route("/chats", get(handlers::list_chats))
        // Knowledge base documents
        .route(
            "/documents",
            post(handlers::upload_document).get(handlers::list_documents),
        )
        // Company chatbot settings and dashboard
        .route("/company/settings", get(handlers::get_company_settings))
        .route("/company/customization", put(handlers::update_customization))
        .route("/company/appearance", put(handlers::update_appearance))
        .route("/company/widget-config", get(handlers::get_widget_config))
        .route("/company/stats", get(handlers::get_company_stats))
        // Administration
        .route("/admin/companies", get(handlers::list_companies))
}
