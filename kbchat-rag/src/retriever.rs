//! Document retrieval
//!
//! Embeds a question and fetches the closest chunks from a single tenant's index.

use kbchat_core::{Embedder, ErrorContext, KbChatError, KbChatResult, ScoredChunk, VectorIndex};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Finds relevant chunks in one vector index
pub struct DocumentRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl DocumentRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Retrieve up to `top_k` chunks, most similar first
    pub async fn retrieve(&self, query: &str) -> KbChatResult<Vec<ScoredChunk>> {
        let start_time = Instant::now();

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbChatError::Embedding {
                message: "No embedding returned for query".to_string(),
                provider: None,
                context: ErrorContext::new("retriever").with_operation("retrieve"),
            })?;

        let results = self.index.query(&query_embedding, self.top_k).await?;

        let stats = RetrievalStats::from_results(&results);
        debug!(
            index = %self.index.name(),
            top_k = self.top_k,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "{}",
            stats.summary()
        );

        Ok(results)
    }
}

/// Statistics about one retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalStats {
    pub chunk_count: usize,
    pub best_score: Option<f32>,
    pub context_chars: usize,
}

impl RetrievalStats {
    pub fn from_results(results: &[ScoredChunk]) -> Self {
        Self {
            chunk_count: results.len(),
            best_score: results.iter().map(|r| r.score).reduce(f32::max),
            context_chars: results.iter().map(|r| r.text.len()).sum(),
        }
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        match self.best_score {
            Some(score) => format!(
                "Retrieved {} chunks, best score {:.3}, {} chars of context",
                self.chunk_count, score, self.context_chars
            ),
            None => "Retrieved no chunks".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: text.to_string(),
            text: text.to_string(),
            score,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn stats_summarize_results() {
        let stats = RetrievalStats::from_results(&[scored("abc", 0.4), scored("de", 0.9)]);
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.best_score, Some(0.9));
        assert_eq!(stats.context_chars, 5);
        assert!(stats.summary().contains("2 chunks"));

        assert_eq!(RetrievalStats::from_results(&[]).summary(), "Retrieved no chunks");
    }
}
