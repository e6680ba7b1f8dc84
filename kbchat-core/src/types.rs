//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation as sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Which answering path produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    KnowledgeBase,
    GenerativeModel,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::KnowledgeBase => "knowledge_base",
            AnswerSource::GenerativeModel => "generative_model",
        }
    }

    pub fn is_knowledge_base(&self) -> bool {
        matches!(self, AnswerSource::KnowledgeBase)
    }

    pub fn from_knowledge_base_flag(flag: bool) -> Self {
        if flag {
            AnswerSource::KnowledgeBase
        } else {
            AnswerSource::GenerativeModel
        }
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final answer returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

/// A persisted question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogRecord {
    pub id: String,
    pub user_id: String,
    pub company_id: String,
    pub message: String,
    pub response: String,
    pub source: AnswerSource,
    pub created_at: DateTime<Utc>,
}

impl ChatLogRecord {
    pub fn new(user_id: &str, company_id: &str, message: &str, answer: &Answer) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            message: message.to_string(),
            response: answer.text.clone(),
            source: answer.source,
            created_at: Utc::now(),
        }
    }
}

/// Role of a message sent to the generative backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// A message sent to the generative backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for PromptMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn.role {
            ChatRole::User => PromptMessage::user(turn.content.clone()),
            ChatRole::Assistant => PromptMessage::assistant(turn.content.clone()),
        }
    }
}

/// A chunk ready to be written into a vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

/// A chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Company,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Company => "company",
            UserRole::Customer => "customer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "company" => Ok(UserRole::Company),
            "customer" => Ok(UserRole::Customer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Metadata row for an ingested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDocument {
    pub id: String,
    pub company_id: String,
    pub file_name: String,
    pub file_type: String,
    pub chunk_count: usize,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Name of the vector index holding a tenant's knowledge base
pub fn tenant_index_name(tenant_id: &str) -> String {
    format!("company-{}", tenant_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_source_serializes_as_snake_case() {
        let json = serde_json::to_string(&AnswerSource::KnowledgeBase).unwrap();
        assert_eq!(json, "\"knowledge_base\"");
        let json = serde_json::to_string(&AnswerSource::GenerativeModel).unwrap();
        assert_eq!(json, "\"generative_model\"");
    }

    #[test]
    fn index_name_is_derived_from_tenant() {
        assert_eq!(tenant_index_name("acme"), "company-acme");
    }

    #[test]
    fn chat_turn_role_parses_lowercase() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(turn.role, ChatRole::Assistant);
        assert!(serde_json::from_str::<ChatTurn>(r#"{"role":"system","content":"x"}"#).is_err());
    }
}
