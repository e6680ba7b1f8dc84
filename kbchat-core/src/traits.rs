//! Collaborator traits
//!
//! External services (model provider, vector store, relational store) are reached only
//! through these traits and injected as `Arc<dyn _>`.

use crate::company::{ChatbotCustomization, Company, CompanyStats, WidgetAppearance};
use crate::error::KbChatResult;
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Chat-completion backend
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Complete a prompt and return the answer text
    async fn complete(&self, messages: &[PromptMessage]) -> KbChatResult<String>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Text embedding backend
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each input text, preserving order
    async fn embed(&self, texts: &[String]) -> KbChatResult<Vec<Vec<f32>>>;
}

/// One tenant's vector collection
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Most similar chunks first
    async fn query(&self, embedding: &[f32], top_k: usize) -> KbChatResult<Vec<ScoredChunk>>;

    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> KbChatResult<()>;

    async fn delete(&self, ids: &[String]) -> KbChatResult<()>;

    fn name(&self) -> &str;
}

/// Maps a tenant to its vector index
#[async_trait]
pub trait IndexResolver: Send + Sync {
    /// Returns `NotFound` when the tenant has no index
    async fn resolve(&self, tenant_id: &str) -> KbChatResult<Arc<dyn VectorIndex>>;
}

/// Durable chat log
#[async_trait]
pub trait ChatLogStore: Send + Sync {
    async fn insert(&self, record: &ChatLogRecord) -> KbChatResult<()>;

    /// Newest first
    async fn list_for_company(
        &self,
        company_id: &str,
        limit: usize,
    ) -> KbChatResult<Vec<ChatLogRecord>>;
}

/// Ingested document metadata
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &CompanyDocument) -> KbChatResult<()>;

    async fn list_for_company(&self, company_id: &str) -> KbChatResult<Vec<CompanyDocument>>;
}

/// Company profiles and their chatbot settings
#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn create(&self, company: &Company) -> KbChatResult<()>;

    async fn get(&self, company_id: &str) -> KbChatResult<Option<Company>>;

    /// `NotFound` when the company does not exist
    async fn update_customization(
        &self,
        company_id: &str,
        customization: &ChatbotCustomization,
    ) -> KbChatResult<()>;

    /// `NotFound` when the company does not exist
    async fn update_appearance(
        &self,
        company_id: &str,
        appearance: &WidgetAppearance,
    ) -> KbChatResult<()>;

    /// Newest first
    async fn list(&self) -> KbChatResult<Vec<Company>>;

    /// Uploaded documents and logged chats for the tenant
    async fn stats(&self, company_id: &str) -> KbChatResult<CompanyStats>;
}
