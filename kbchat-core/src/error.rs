//! Unified error handling system
//!
//! Provides structured error types with context, recovery classification, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type KbChatResult<T> = Result<T, KbChatError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the kbchat system
#[derive(Error, Debug)]
pub enum KbChatError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Retrieval error: {message}")]
    Retrieval {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        provider: Option<String>,
        context: ErrorContext,
    },

    #[error("LLM error: {message}")]
    Llm {
        message: String,
        provider: Option<String>,
        model: Option<String>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
        context: ErrorContext,
    },

    /// Every answering path has been exhausted
    #[error("Service unavailable: {message}")]
    Unavailable {
        message: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl KbChatError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            KbChatError::Validation { context, .. } => Some(context),
            KbChatError::Authentication { context, .. } => Some(context),
            KbChatError::NotFound { context, .. } => Some(context),
            KbChatError::Retrieval { context, .. } => Some(context),
            KbChatError::Embedding { context, .. } => Some(context),
            KbChatError::Llm { context, .. } => Some(context),
            KbChatError::Storage { context, .. } => Some(context),
            KbChatError::Config { context, .. } => Some(context),
            KbChatError::Network { context, .. } => Some(context),
            KbChatError::Timeout { context, .. } => Some(context),
            KbChatError::RateLimit { context, .. } => Some(context),
            KbChatError::Unavailable { context, .. } => Some(context),
            KbChatError::Internal { context, .. } => Some(context),
            KbChatError::Io(_) | KbChatError::Serialization(_) => None,
        }
    }

    /// Transient failures worth another attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KbChatError::Network { .. } | KbChatError::Timeout { .. } | KbChatError::RateLimit { .. }
        )
    }

    /// Errors caused by the caller rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            KbChatError::Validation { .. } | KbChatError::Authentication { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            KbChatError::Internal { .. } | KbChatError::Unavailable { .. } => {
                error!(error_id = ?error_id, error = %self, "Internal error occurred");
            }
            KbChatError::Config { .. } | KbChatError::Validation { .. } => {
                error!(error_id = ?error_id, error = %self, "Configuration or validation error");
            }
            KbChatError::Network { .. }
            | KbChatError::Timeout { .. }
            | KbChatError::RateLimit { .. } => {
                warn!(
                    error_id = ?error_id,
                    error = %self,
                    "Network or timeout error (may be recoverable)"
                );
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::KbChatError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::KbChatError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file and environment"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::KbChatError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check if the resource exists and is accessible"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::KbChatError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::KbChatError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! network_error {
    ($msg:expr, $component:expr) => {
        $crate::KbChatError::Network {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::KbChatError::Network {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity"),
        }
    };
}
