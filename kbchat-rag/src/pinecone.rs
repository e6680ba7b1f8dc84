//! Pinecone REST backend
//!
//! The control plane resolves an index name to its data-plane host. Hosts are cached for the
//! life of the resolver, since an index host never changes once created.

use crate::http::{status_error, transport_error};
use futures::future::try_join_all;
use kbchat_core::{
    async_trait, not_found_error, tenant_index_name, ErrorContext, IndexResolver, IndexedChunk,
    KbChatError, KbChatResult, ScoredChunk, VectorIndex, VectorIndexConfig,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const COMPONENT: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;
/// Metadata key holding the chunk text
const TEXT_KEY: &str = "text";

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

fn retrieval_error(message: String) -> KbChatError {
    KbChatError::Retrieval {
        message,
        source: None,
        context: ErrorContext::new(COMPONENT),
    }
}

/// Resolves tenants to Pinecone indexes
pub struct PineconeIndexResolver {
    client: Client,
    api_key: String,
    control_plane_url: String,
    timeout: Duration,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeIndexResolver {
    pub fn new(config: &VectorIndexConfig, timeout: Duration) -> KbChatResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| KbChatError::Config {
                message: "Pinecone API key not configured".to_string(),
                source: None,
                context: ErrorContext::new(COMPONENT)
                    .with_operation("new")
                    .with_suggestion("Set PINECONE_API_KEY or vector_index.api_key"),
            })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KbChatError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new(COMPONENT).with_operation("new"),
            })?;

        info!(control_plane = %config.control_plane_url, "Initialized Pinecone resolver");

        Ok(Self {
            client,
            api_key,
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            timeout,
            hosts: RwLock::new(HashMap::new()),
        })
    }

    async fn describe_index(&self, name: &str) -> KbChatResult<String> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.control_plane_url, name))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(COMPONENT, "describe_index", self.timeout, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(not_found_error!(name, COMPONENT));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(COMPONENT, "describe_index", self.timeout, e))?;

        if !status.is_success() {
            return Err(status_error(
                COMPONENT,
                "describe_index",
                status,
                &body,
                retrieval_error,
            ));
        }

        let description: IndexDescription = serde_json::from_str(&body)
            .map_err(|e| retrieval_error(format!("Invalid index description: {}", e)))?;

        if description.host.starts_with("http://") || description.host.starts_with("https://") {
            Ok(description.host)
        } else {
            Ok(format!("https://{}", description.host))
        }
    }
}

#[async_trait]
impl IndexResolver for PineconeIndexResolver {
    async fn resolve(&self, tenant_id: &str) -> KbChatResult<Arc<dyn VectorIndex>> {
        let name = tenant_index_name(tenant_id);

        let cached = self.hosts.read().await.get(&name).cloned();
        let host = match cached {
            Some(host) => host,
            None => {
                let host = self.describe_index(&name).await?;
                debug!(index = %name, host = %host, "Resolved index host");
                self.hosts.write().await.insert(name.clone(), host.clone());
                host
            }
        };

        Ok(Arc::new(PineconeIndex {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            host,
            name,
            timeout: self.timeout,
        }))
    }
}

/// Data-plane handle for one Pinecone index
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
    name: String,
    timeout: Duration,
}

impl PineconeIndex {
    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        operation: &str,
        payload: &T,
    ) -> KbChatResult<String> {
        let response = self
            .client
            .post(format!("{}/{}", self.host.trim_end_matches('/'), path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(COMPONENT, operation, self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(COMPONENT, operation, self.timeout, e))?;

        if !status.is_success() {
            return Err(status_error(COMPONENT, operation, status, &body, |m| {
                KbChatError::Retrieval {
                    message: m,
                    source: None,
                    context: ErrorContext::new(COMPONENT)
                        .with_operation(operation)
                        .with_metadata("index", &self.name),
                }
            }));
        }

        Ok(body)
    }
}

/// Flatten Pinecone metadata into string pairs
fn metadata_to_strings(metadata: serde_json::Map<String, Value>) -> HashMap<String, String> {
    metadata
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, embedding: &[f32], top_k: usize) -> KbChatResult<Vec<ScoredChunk>> {
        let request = QueryRequest {
            vector: embedding,
            top_k,
            include_metadata: true,
        };
        let body = self.post("query", "query", &request).await?;
        let response: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| retrieval_error(format!("Invalid query response: {}", e)))?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| {
                let mut metadata = metadata_to_strings(m.metadata.unwrap_or_default());
                let text = metadata.remove(TEXT_KEY).unwrap_or_default();
                ScoredChunk {
                    id: m.id,
                    text,
                    score: m.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> KbChatResult<()> {
        let requests: Vec<UpsertRequest<'_>> = chunks
            .chunks(UPSERT_BATCH_SIZE)
            .map(|batch| UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|chunk| {
                        let mut metadata: HashMap<&str, &str> = chunk
                            .metadata
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str()))
                            .collect();
                        metadata.insert(TEXT_KEY, chunk.text.as_str());
                        UpsertVector {
                            id: &chunk.id,
                            values: &chunk.embedding,
                            metadata,
                        }
                    })
                    .collect(),
            })
            .collect();

        try_join_all(
            requests
                .iter()
                .map(|request| self.post("vectors/upsert", "upsert", request)),
        )
        .await?;

        debug!(index = %self.name, count = chunks.len(), "Upserted vectors");
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> KbChatResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post("vectors/delete", "delete", &DeleteRequest { ids })
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_request_uses_camel_case() {
        let request = QueryRequest {
            vector: &[0.1, 0.2],
            top_k: 3,
            include_metadata: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 3);
        assert_eq!(value["includeMetadata"], true);
    }

    #[test]
    fn metadata_values_are_flattened() {
        let metadata = json!({"text": "Open 9-5", "page": 2, "source": "faq.pdf"});
        let map = metadata_to_strings(metadata.as_object().unwrap().clone());
        assert_eq!(map["text"], "Open 9-5");
        assert_eq!(map["page"], "2");
        assert_eq!(map["source"], "faq.pdf");
    }

    #[test]
    fn resolver_requires_api_key() {
        let config = VectorIndexConfig::default();
        assert!(matches!(
            PineconeIndexResolver::new(&config, Duration::from_secs(30)),
            Err(KbChatError::Config { .. })
        ));
    }
}
