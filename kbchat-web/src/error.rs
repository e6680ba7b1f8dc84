//! HTTP error responses
//!
//! Every failure leaves the server as `{ "error": <message> }` with one of a fixed set of
//! statuses. Internal detail is logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use kbchat_core::KbChatError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Failed to generate response")]
    Unavailable,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<KbChatError> for ApiError {
    fn from(err: KbChatError) -> Self {
        err.log();
        match err {
            KbChatError::Validation { message, .. } => ApiError::BadRequest(message),
            KbChatError::Authentication { .. } => ApiError::Unauthorized,
            KbChatError::NotFound { .. } => ApiError::NotFound,
            KbChatError::Unavailable { .. } => ApiError::Unavailable,
            _ => ApiError::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbchat_core::{validation_error, ErrorContext};

    #[test]
    fn validation_keeps_its_message() {
        let err: ApiError =
            validation_error!("No message content provided", "content", "test").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No message content provided");
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err: ApiError = KbChatError::Storage {
            message: "disk full at /var/lib/kbchat".to_string(),
            source: None,
            context: ErrorContext::new("test"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn unavailable_maps_to_503() {
        let err: ApiError = KbChatError::Unavailable {
            message: "model down".to_string(),
            context: ErrorContext::new("test"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Failed to generate response");
    }
}
