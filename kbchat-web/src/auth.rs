//! Authentication and authorization using Axum extractors

pub mod database;
pub mod handlers;
pub mod jwt;
pub mod users;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use jwt::{AuthError, Claims};
use kbchat_core::UserRole;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether the caller may act on `company_id`'s knowledge base
    pub fn owns_company(&self, company_id: &str) -> bool {
        self.role == UserRole::Company && self.company_id.as_deref() == Some(company_id)
    }
}

impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;
        Ok(claims.to_user())
    }
}

/// Caller lacks the role a route requires
#[derive(Debug)]
pub struct PermissionDenied {
    pub required_role: String,
    pub user_id: Option<String>,
}

impl PermissionDenied {
    pub fn new(required_role: &str, user_id: Option<String>) -> Self {
        Self {
            required_role: required_role.to_string(),
            user_id,
        }
    }
}

impl IntoResponse for PermissionDenied {
    fn into_response(self) -> Response {
        debug!(
            user_id = ?self.user_id,
            required_role = %self.required_role,
            "Permission denied"
        );
        (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "Forbidden" })),
        )
            .into_response()
    }
}

/// Rejection for role-gated extractors
#[derive(Debug)]
pub enum RoleRejection {
    Auth(AuthError),
    Denied(PermissionDenied),
}

impl IntoResponse for RoleRejection {
    fn into_response(self) -> Response {
        match self {
            RoleRejection::Auth(e) => e.into_response(),
            RoleRejection::Denied(e) => e.into_response(),
        }
    }
}

impl From<AuthError> for RoleRejection {
    fn from(err: AuthError) -> Self {
        RoleRejection::Auth(err)
    }
}

/// A caller with the `company` role and a tenant
#[derive(Debug, Clone)]
pub struct CompanyUser(pub User);

impl<S> FromRequestParts<S> for CompanyUser
where
    S: Send + Sync,
{
    type Rejection = RoleRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        if user.role != UserRole::Company || user.company_id.is_none() {
            return Err(RoleRejection::Denied(PermissionDenied::new(
                "company",
                Some(user.id),
            )));
        }
        Ok(CompanyUser(user))
    }
}

/// A caller with the `company` or `admin` role
#[derive(Debug, Clone)]
pub struct CompanyOrAdmin(pub User);

impl<S> FromRequestParts<S> for CompanyOrAdmin
where
    S: Send + Sync,
{
    type Rejection = RoleRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        match user.role {
            UserRole::Admin | UserRole::Company => Ok(CompanyOrAdmin(user)),
            UserRole::Customer => Err(RoleRejection::Denied(PermissionDenied::new(
                "company or admin",
                Some(user.id),
            ))),
        }
    }
}

/// A caller with the `admin` role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = RoleRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(RoleRejection::Denied(PermissionDenied::new(
                "admin",
                Some(user.id),
            )));
        }
        Ok(AdminUser(user))
    }
}
