//! Shared classification of upstream HTTP failures

use kbchat_core::{ErrorContext, KbChatError};
use reqwest::StatusCode;
use std::time::Duration;

/// Shortened response body for error messages
pub(crate) fn body_excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Map a non-success status to an error.
///
/// 429 and 5xx are transient. Every other status is handed to `permanent`.
pub(crate) fn status_error(
    component: &str,
    operation: &str,
    status: StatusCode,
    body: &str,
    permanent: impl FnOnce(String) -> KbChatError,
) -> KbChatError {
    let message = format!("{} returned {}: {}", component, status, body_excerpt(body));

    if status == StatusCode::TOO_MANY_REQUESTS {
        return KbChatError::RateLimit {
            message,
            retry_after_ms: None,
            context: ErrorContext::new(component)
                .with_operation(operation)
                .with_suggestion("Wait before retrying or raise the provider quota"),
        };
    }

    if status.is_server_error() {
        return KbChatError::Network {
            message,
            source: None,
            context: ErrorContext::new(component)
                .with_operation(operation)
                .with_metadata("status", status.as_str()),
        };
    }

    permanent(message)
}

/// Map a transport failure (connect, timeout, body read) to an error
pub(crate) fn transport_error(
    component: &str,
    operation: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> KbChatError {
    if err.is_timeout() {
        return KbChatError::Timeout {
            operation: format!("{}::{}", component, operation),
            duration_ms: timeout.as_millis() as u64,
            context: ErrorContext::new(component).with_operation(operation),
        };
    }

    KbChatError::Network {
        message: format!("{} request failed: {}", component, err),
        source: Some(Box::new(err)),
        context: ErrorContext::new(component)
            .with_operation(operation)
            .with_suggestion("Check network connectivity and the service base URL"),
    }
}
