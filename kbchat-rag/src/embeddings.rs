//! Embedding generation and in-memory vector storage
//!
//! [`OpenAiEmbedder`] calls an OpenAI-compatible `/embeddings` endpoint. The in-memory
//! index and registry serve development setups and tests where no vector service exists.

use crate::http::{status_error, transport_error};
use kbchat_core::{
    async_trait, not_found_error, tenant_index_name, Embedder, EmbeddingConfig, ErrorContext,
    IndexResolver, IndexedChunk, KbChatError, KbChatResult, ScoredChunk, VectorIndex,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "embeddings";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding client for OpenAI-compatible APIs
pub struct OpenAiEmbedder {
    client: Client,
    config: EmbeddingConfig,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig, timeout: Duration) -> KbChatResult<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(KbChatError::Config {
                message: "Embedding API key not configured".to_string(),
                source: None,
                context: ErrorContext::new(COMPONENT)
                    .with_operation("new")
                    .with_suggestion("Set OPENROUTER_API_KEY or embedding.api_key"),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KbChatError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new(COMPONENT).with_operation("new"),
            })?;

        info!(
            model = %config.model,
            base_url = %config.base_url,
            batch_size = config.batch_size,
            "Initialized embedding client"
        );

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    fn embedding_error(&self, message: String) -> KbChatError {
        KbChatError::Embedding {
            message,
            provider: Some(self.config.base_url.clone()),
            context: ErrorContext::new(COMPONENT).with_operation("embed"),
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> KbChatResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: batch,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(COMPONENT, "embed", self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(COMPONENT, "embed", self.timeout, e))?;

        if !status.is_success() {
            return Err(status_error(COMPONENT, "embed", status, &body, |m| {
                self.embedding_error(m)
            }));
        }

        self.decode_response(&body, batch.len())
    }

    /// Order embeddings by input position; every vector must have the configured width
    fn decode_response(&self, body: &str, expected: usize) -> KbChatResult<Vec<Vec<f32>>> {
        let mut parsed: EmbeddingResponse = serde_json::from_str(body)
            .map_err(|e| self.embedding_error(format!("Failed to parse response: {}", e)))?;

        if parsed.data.len() != expected {
            return Err(self.embedding_error(format!(
                "Expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }

        if let Some(bad) = parsed
            .data
            .iter()
            .find(|d| d.embedding.len() != self.config.dimensions)
        {
            return Err(self.embedding_error(format!(
                "Expected {} dimensions, got {}",
                self.config.dimensions,
                bad.embedding.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> KbChatResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.config.batch_size.max(1)).enumerate() {
            debug!(
                batch = batch_index + 1,
                batch_len = batch.len(),
                model = %self.config.model,
                "Calling embedding API"
            );
            embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(embeddings)
    }
}

/// Vector index held in process memory
pub struct InMemoryVectorIndex {
    name: String,
    chunks: RwLock<Vec<IndexedChunk>>,
    dimension: RwLock<Option<usize>>,
}

impl InMemoryVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: RwLock::new(Vec::new()),
            dimension: RwLock::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> KbChatError {
        KbChatError::Internal {
            message: format!("Index {} lock poisoned", self.name),
            source: None,
            context: ErrorContext::new(COMPONENT),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, embedding: &[f32], top_k: usize) -> KbChatResult<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().map_err(|_| self.poisoned())?;

        if let Some(dimension) = *self.dimension.read().map_err(|_| self.poisoned())? {
            if embedding.len() != dimension {
                warn!(
                    index = %self.name,
                    expected = dimension,
                    actual = embedding.len(),
                    "Query embedding dimension mismatch"
                );
                return Ok(Vec::new());
            }
        }

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                score: cosine_similarity(embedding, &chunk.embedding),
                metadata: chunk.metadata.clone(),
            })
            .collect();

        // Sort by similarity (descending)
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn upsert(&self, new_chunks: Vec<IndexedChunk>) -> KbChatResult<()> {
        let mut dimension = self.dimension.write().map_err(|_| self.poisoned())?;
        let mut chunks = self.chunks.write().map_err(|_| self.poisoned())?;
        let count = new_chunks.len();

        for chunk in new_chunks {
            let expected = *dimension.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != expected {
                return Err(KbChatError::Embedding {
                    message: format!(
                        "Embedding dimension mismatch: expected {}, got {}",
                        expected,
                        chunk.embedding.len()
                    ),
                    provider: None,
                    context: ErrorContext::new(COMPONENT)
                        .with_operation("upsert")
                        .with_metadata("index", &self.name),
                });
            }

            match chunks.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => chunks.push(chunk),
            }
        }

        debug!(index = %self.name, added = count, total = chunks.len(), "Upserted chunks");
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> KbChatResult<()> {
        let mut chunks = self.chunks.write().map_err(|_| self.poisoned())?;
        chunks.retain(|c| !ids.contains(&c.id));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Per-tenant in-memory indexes. Tenants must be registered before they resolve.
#[derive(Default)]
pub struct InMemoryIndexRegistry {
    indexes: RwLock<HashMap<String, Arc<InMemoryVectorIndex>>>,
}

impl InMemoryIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the tenant's index, or return the existing one
    pub fn create_index(&self, tenant_id: &str) -> Arc<InMemoryVectorIndex> {
        let name = tenant_index_name(tenant_id);
        let mut indexes = match self.indexes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        indexes
            .entry(name.clone())
            .or_insert_with(|| Arc::new(InMemoryVectorIndex::new(name)))
            .clone()
    }
}

#[async_trait]
impl IndexResolver for InMemoryIndexRegistry {
    async fn resolve(&self, tenant_id: &str) -> KbChatResult<Arc<dyn VectorIndex>> {
        let name = tenant_index_name(tenant_id);
        let indexes = self.indexes.read().map_err(|_| KbChatError::Internal {
            message: "Index registry lock poisoned".to_string(),
            source: None,
            context: ErrorContext::new(COMPONENT),
        })?;

        match indexes.get(&name) {
            Some(index) => Ok(index.clone() as Arc<dyn VectorIndex>),
            None => Err(not_found_error!(name, COMPONENT)),
        }
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            id: id.to_string(),
            text: text.to_string(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    fn embedder(dimensions: usize) -> OpenAiEmbedder {
        let config = EmbeddingConfig {
            dimensions,
            api_key: Some("test-key".to_string()),
            ..EmbeddingConfig::default()
        };
        OpenAiEmbedder::new(config, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn response_is_reordered_by_index() {
        let body = r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#;
        let embeddings = embedder(2).decode_response(body, 2).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn response_with_wrong_width_is_rejected() {
        let body = r#"{"data":[{"embedding":[1.0,0.0,0.0],"index":0}]}"#;
        let err = embedder(2).decode_response(body, 1).unwrap_err();
        assert!(matches!(err, KbChatError::Embedding { .. }));

        let err = embedder(3).decode_response(body, 2).unwrap_err();
        assert!(matches!(err, KbChatError::Embedding { .. }));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = OpenAiEmbedder::new(EmbeddingConfig::default(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, KbChatError::Config { .. }));
    }

    #[tokio::test]
    async fn query_returns_most_similar_first() {
        let index = InMemoryVectorIndex::new("company-acme");
        index
            .upsert(vec![
                chunk("a", "hours", vec![1.0, 0.0]),
                chunk("b", "pricing", vec![0.0, 1.0]),
                chunk("c", "mixed", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_removes() {
        let index = InMemoryVectorIndex::new("company-acme");
        index.upsert(vec![chunk("a", "old", vec![1.0, 0.0])]).await.unwrap();
        index.upsert(vec![chunk("a", "new", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(index.len(), 1);

        let results = index.query(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results[0].text, "new");

        index.delete(&["a".to_string()]).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn upsert_rejects_dimension_mismatch() {
        let index = InMemoryVectorIndex::new("company-acme");
        index.upsert(vec![chunk("a", "x", vec![1.0, 0.0])]).await.unwrap();
        let err = index
            .upsert(vec![chunk("b", "y", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, KbChatError::Embedding { .. }));
    }

    #[tokio::test]
    async fn registry_isolates_tenants() {
        let registry = InMemoryIndexRegistry::new();
        registry
            .create_index("acme")
            .upsert(vec![chunk("a1", "acme secret", vec![1.0, 0.0])])
            .await
            .unwrap();
        registry.create_index("globex");

        let globex = registry.resolve("globex").await.unwrap();
        assert_eq!(globex.name(), "company-globex");
        assert!(globex.query(&[1.0, 0.0], 3).await.unwrap().is_empty());

        let acme = registry.resolve("acme").await.unwrap();
        assert_eq!(acme.query(&[1.0, 0.0], 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let registry = InMemoryIndexRegistry::new();
        let err = match registry.resolve("nobody").await {
            Err(e) => e,
            Ok(_) => panic!("expected NotFound"),
        };
        assert!(matches!(err, KbChatError::NotFound { .. }));
    }
}
