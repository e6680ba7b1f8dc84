//! Chat-related types

use kbchat_core::{AnswerSource, ChatLogRecord, ChatTurn};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Chat request: the conversation so far, last turn being the question
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatTurn>,
    #[serde(rename = "companyId")]
    #[schema(example = "acme")]
    pub company_id: String,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub text: String,
    /// `knowledge_base` or `generative_model`
    #[schema(value_type = String, example = "knowledge_base")]
    pub source: AnswerSource,
}

/// Filters for listing chat logs
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChatLogQuery {
    /// Tenant to list; required for administrators
    pub company_id: Option<String>,
    /// Maximum number of records, newest first
    pub limit: Option<usize>,
}

/// A logged exchange
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatLogEntry {
    pub id: String,
    pub user_id: String,
    pub company_id: String,
    pub message: String,
    pub response: String,
    #[schema(value_type = String)]
    pub source: AnswerSource,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ChatLogRecord> for ChatLogEntry {
    fn from(record: ChatLogRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            company_id: record.company_id,
            message: record.message,
            response: record.response,
            source: record.source,
            created_at: record.created_at,
        }
    }
}
