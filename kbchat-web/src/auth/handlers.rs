//! Authentication handlers for registration, login and identity

use super::{
    jwt::AuthError,
    users::{AuthResponse, LoginRequest, RegisterRequest},
    User,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use kbchat_core::{Company, UserRole};
use tracing::{debug, info};

fn invalid_body(rejection: JsonRejection) -> AuthError {
    debug!("Rejected auth request body: {}", rejection);
    AuthError::InvalidInput("Invalid request body".to_string())
}

/// User registration endpoint
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register an account",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn register_user(
    State(app_state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let Json(request) = body.map_err(invalid_body)?;
    let response = app_state.user_service.register(request).await?;

    if let (UserRole::Company, Some(company_id)) =
        (response.user.role, &response.user.company_id)
    {
        app_state
            .companies
            .create(&Company::new(company_id.as_str(), response.user.name.as_str()))
            .await
            .map_err(|e| {
                e.log();
                AuthError::Storage("company profile".to_string())
            })?;

        if let Some(registry) = &app_state.index_registry {
            registry.create_index(company_id);
        }
    }

    info!("User registered successfully: {}", response.user.id);
    Ok((StatusCode::CREATED, Json(response)))
}

/// User login endpoint
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_user(
    State(app_state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = body.map_err(invalid_body)?;
    let response = app_state.user_service.login(request).await?;

    info!("User logged in successfully: {}", response.user.id);
    Ok(Json(response))
}

/// Get current user information
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current identity",
    responses(
        (status = 200, description = "Authenticated caller"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_current_user(user: User) -> Json<User> {
    debug!("Getting current user info: {}", user.id);
    Json(user)
}
