//! Configuration management

use crate::error::{ErrorContext, KbChatError, KbChatResult};
use crate::logging::LoggingConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KbChatConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
    pub indexing: IndexingConfig,
    pub logging: LoggingConfig,
}

/// Generative model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "deepseek/deepseek-r1-0528".to_string(),
            temperature: 0.7,
            max_tokens: None,
            api_key: None,
        }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 100,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Pinecone,
    Memory,
}

impl std::str::FromStr for VectorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pinecone" => Ok(VectorBackend::Pinecone),
            "memory" => Ok(VectorBackend::Memory),
            other => Err(format!("unknown vector backend: {}", other)),
        }
    }
}

/// Vector index service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    pub backend: VectorBackend,
    pub control_plane_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Pinecone,
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Remote-call retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 1000,
            timeout_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Document ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_upload_bytes: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl KbChatConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> KbChatResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KbChatError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: KbChatConfig = toml::from_str(&content).map_err(|e| KbChatError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> KbChatResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| KbChatError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| KbChatError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Overlay secrets and overrides from the process environment
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key.clone());
            }
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            self.vector_index.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("KBCHAT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("KBCHAT_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> KbChatResult<()> {
        fn invalid(message: &str, suggestion: &str) -> KbChatError {
            KbChatError::Config {
                message: message.to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion(suggestion),
            }
        }

        if self.llm.model.trim().is_empty() {
            return Err(invalid(
                "LLM model must not be empty",
                "Set llm.model or KBCHAT_LLM_MODEL",
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(
                "LLM temperature must be between 0.0 and 2.0",
                "Set llm.temperature to a value in range",
            ));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(invalid(
                "Embedding dimensions and batch_size must be greater than 0",
                "Set embedding.dimensions and embedding.batch_size to positive values",
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(invalid(
                "Retrieval top_k must be greater than 0",
                "Set retrieval.top_k to a positive value",
            ));
        }

        if self.retry.timeout_ms == 0 {
            return Err(invalid(
                "Retry timeout_ms must be greater than 0",
                "Set retry.timeout_ms to a positive value",
            ));
        }

        if self.indexing.chunk_size == 0 || self.indexing.chunk_overlap >= self.indexing.chunk_size
        {
            return Err(invalid(
                "Indexing chunk_overlap must be smaller than a non-zero chunk_size",
                "Check indexing.chunk_size and indexing.chunk_overlap",
            ));
        }

        if self.indexing.max_upload_bytes == 0 {
            return Err(invalid(
                "Indexing max_upload_bytes must be greater than 0",
                "Set indexing.max_upload_bytes to a positive value",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = KbChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retry.policy().max_attempts(), 3);
        assert_eq!(config.retry.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn overlap_must_be_below_chunk_size() {
        let mut config = KbChatConfig::default();
        config.indexing.chunk_overlap = config.indexing.chunk_size;
        assert!(matches!(config.validate(), Err(KbChatError::Config { .. })));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: KbChatConfig = toml::from_str(
            r#"
            [retrieval]
            top_k = 5

            [vector_index]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.vector_index.backend, VectorBackend::Memory);
        assert_eq!(config.llm.model, "deepseek/deepseek-r1-0528");
        assert_eq!(config.indexing.chunk_size, 1000);
    }
}
