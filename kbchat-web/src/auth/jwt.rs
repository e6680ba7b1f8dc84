//! JWT authentication based on the Axum examples

use super::User;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use kbchat_core::UserRole;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Access tokens live for one day
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// JWT signing keys - initialized from environment variable
static KEYS: LazyLock<Keys> = LazyLock::new(|| match configured_secret() {
    Some(secret) => Keys::new(secret.as_bytes()),
    None => {
        warn!("JWT_SECRET not set, signing with a random key; tokens will not survive a restart");
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Keys::new(&secret)
    }
});

/// Non-empty `JWT_SECRET`, if set
pub fn configured_secret() -> Option<String> {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|secret| !secret.trim().is_empty())
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    /// Tenant the user belongs to, if any
    pub company_id: Option<String>,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            company_id: user.company_id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECONDS)).timestamp(),
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.sub.clone(),
            email: self.email.clone(),
            role: self.role,
            company_id: self.company_id.clone(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token creation failed")]
    TokenCreation,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Email already exists")]
    EmailTaken,
    #[error("{0}")]
    InvalidInput(String),
    #[error("User store error: {0}")]
    Storage(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
            }
            // Token problems are indistinguishable to the client
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::MissingAuthHeader => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AuthError::EmailTaken => (StatusCode::CONFLICT, self.to_string()),
            AuthError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AuthError::TokenCreation | AuthError::Storage(_) => {
                warn!(error = %self, "Authentication backend failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// JWT token utilities
pub struct JwtService;

impl JwtService {
    pub fn issue(user: &User) -> Result<String, AuthError> {
        encode(&Header::default(), &Claims::for_user(user), &KEYS.encoding).map_err(|e| {
            warn!("Failed to encode JWT token: {}", e);
            AuthError::TokenCreation
        })
    }

    pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
        let token_data =
            decode::<Claims>(token, &KEYS.decoding, &Validation::default()).map_err(|e| {
                debug!("Token verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })?;

        let claims = token_data.claims;
        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

/// Extracts and verifies the bearer token. Runs before any body extractor.
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        JwtService::verify_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> User {
        User {
            id: "user-1".to_string(),
            email: "jo@example.com".to_string(),
            role: UserRole::Customer,
            company_id: None,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let token = JwtService::issue(&customer()).unwrap();
        let claims = JwtService::verify_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, UserRole::Customer);
        assert_eq!(claims.to_user(), customer());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let mut token = JwtService::issue(&customer()).unwrap();
        token.push('x');
        assert!(matches!(
            JwtService::verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_claims_are_detected() {
        let mut claims = Claims::for_user(&customer());
        claims.exp = Utc::now().timestamp() - 10;
        assert!(claims.is_expired());
    }

    #[test]
    fn token_errors_render_as_unauthorized() {
        let response = AuthError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::EmailTaken.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
