//! Ingestion pipeline
//!
//! Load, split, embed, upsert into the tenant index, then record the document row. If the
//! row cannot be recorded the vectors written for it are deleted again.

use crate::loader::{load_document, DocumentKind};
use crate::splitter::RecursiveCharacterSplitter;
use chrono::Utc;
use kbchat_core::{
    log_operation_error, log_operation_start, log_operation_success, performance::measure_async,
    validation_error, CompanyDocument, DocumentStore, Embedder, ErrorContext, IndexResolver,
    IndexedChunk, IndexingConfig, KbChatError, KbChatResult, VectorIndex,
};
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "ingestion";

/// A file received from a client
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Writes uploaded documents into tenant knowledge bases
pub struct IngestionPipeline {
    resolver: Arc<dyn IndexResolver>,
    embedder: Arc<dyn Embedder>,
    documents: Arc<dyn DocumentStore>,
    splitter: RecursiveCharacterSplitter,
    max_upload_bytes: usize,
}

impl IngestionPipeline {
    pub fn new(
        resolver: Arc<dyn IndexResolver>,
        embedder: Arc<dyn Embedder>,
        documents: Arc<dyn DocumentStore>,
        config: &IndexingConfig,
    ) -> KbChatResult<Self> {
        Ok(Self {
            resolver,
            embedder,
            documents,
            splitter: RecursiveCharacterSplitter::from_config(config)?,
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Reject uploads that must not reach any parser or remote service
    pub fn validate(&self, upload: &DocumentUpload) -> KbChatResult<DocumentKind> {
        if upload.bytes.is_empty() {
            return Err(validation_error!("Uploaded file is empty", "file", COMPONENT));
        }

        if upload.bytes.len() > self.max_upload_bytes {
            return Err(validation_error!(
                format!(
                    "File exceeds the {} byte upload limit",
                    self.max_upload_bytes
                ),
                "file",
                COMPONENT
            ));
        }

        DocumentKind::from_mime(&upload.mime_type)
    }

    /// Ingest `upload` into `tenant_id`'s index on behalf of `uploaded_by`
    pub async fn ingest(
        &self,
        tenant_id: &str,
        upload: DocumentUpload,
        uploaded_by: &str,
    ) -> KbChatResult<CompanyDocument> {
        let kind = self.validate(&upload)?;
        log_operation_start!(
            "ingest",
            tenant_id = %tenant_id,
            file_name = %upload.file_name,
            bytes = upload.bytes.len()
        );

        let index = self.resolver.resolve(tenant_id).await?;

        let file_name = upload.file_name.clone();
        let documents = tokio::task::spawn_blocking(move || {
            load_document(kind, &upload.bytes, &upload.file_name)
        })
        .await
        .map_err(|e| KbChatError::Internal {
            message: format!("Document parsing task failed: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new(COMPONENT).with_operation("load"),
        })??;

        let document_id = uuid::Uuid::new_v4().to_string();
        let mut chunks = Vec::new();
        for document in &documents {
            for text in self.splitter.split_text(&document.text) {
                let mut metadata = document.metadata.clone();
                metadata.insert("document_id".to_string(), document_id.clone());
                metadata.insert("company_id".to_string(), tenant_id.to_string());
                metadata.insert("chunk_index".to_string(), chunks.len().to_string());
                chunks.push(IndexedChunk {
                    id: format!("{}-{}", document_id, chunks.len()),
                    text,
                    embedding: Vec::new(),
                    metadata,
                });
            }
        }

        if chunks.is_empty() {
            return Err(validation_error!(
                "No extractable text in uploaded file",
                "file",
                COMPONENT
            ));
        }

        debug!(
            document_id = %document_id,
            source_documents = documents.len(),
            chunks = chunks.len(),
            "Split document"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = measure_async("embed_chunks", self.embedder.embed(&texts)).await?;
        if embeddings.len() != chunks.len() {
            return Err(KbChatError::Embedding {
                message: format!(
                    "Expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
                provider: None,
                context: ErrorContext::new(COMPONENT).with_operation("embed"),
            });
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let chunk_count = chunks.len();
        if let Err(err) = index.upsert(chunks).await {
            log_operation_error!("upsert_chunks", err, document_id = %document_id);
            remove_vectors(index.as_ref(), &ids, &document_id).await;
            return Err(err);
        }

        let record = CompanyDocument {
            id: document_id,
            company_id: tenant_id.to_string(),
            file_name,
            file_type: kind.mime().to_string(),
            chunk_count,
            uploaded_by: uploaded_by.to_string(),
            uploaded_at: Utc::now(),
        };

        if let Err(err) = self.documents.insert(&record).await {
            log_operation_error!("record_document", err, document_id = %record.id);
            remove_vectors(index.as_ref(), &ids, &record.id).await;
            return Err(err);
        }

        log_operation_success!(
            "ingest",
            tenant_id = %tenant_id,
            document_id = %record.id,
            chunks = chunk_count
        );
        Ok(record)
    }
}

async fn remove_vectors(index: &dyn VectorIndex, ids: &[String], document_id: &str) {
    if let Err(cleanup) = index.delete(ids).await {
        warn!(
            document_id = %document_id,
            error = %cleanup,
            "Vector cleanup failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbchat_core::ScoredChunk;
    use kbchat_rag::{InMemoryIndexRegistry, InMemoryVectorIndex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> KbChatResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[derive(Default)]
    struct MemoryDocuments {
        fail: bool,
        rows: Mutex<Vec<CompanyDocument>>,
    }

    #[async_trait]
    impl DocumentStore for MemoryDocuments {
        async fn insert(&self, document: &CompanyDocument) -> KbChatResult<()> {
            if self.fail {
                return Err(kbchat_core::storage_error!("insert failed", "test"));
            }
            self.rows.lock().unwrap().push(document.clone());
            Ok(())
        }

        async fn list_for_company(&self, company_id: &str) -> KbChatResult<Vec<CompanyDocument>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.company_id == company_id)
                .cloned()
                .collect())
        }
    }

    struct Setup {
        registry: Arc<InMemoryIndexRegistry>,
        embedder: Arc<CountingEmbedder>,
        documents: Arc<MemoryDocuments>,
        pipeline: IngestionPipeline,
    }

    fn setup(documents: MemoryDocuments, config: IndexingConfig) -> Setup {
        let registry = Arc::new(InMemoryIndexRegistry::new());
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let documents = Arc::new(documents);
        let pipeline =
            IngestionPipeline::new(registry.clone(), embedder.clone(), documents.clone(), &config)
                .unwrap();
        Setup {
            registry,
            embedder,
            documents,
            pipeline,
        }
    }

    fn text_upload(body: &str) -> DocumentUpload {
        DocumentUpload {
            file_name: "hours.txt".to_string(),
            mime_type: "text/plain".to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn text_upload_is_indexed_and_recorded() {
        let s = setup(MemoryDocuments::default(), IndexingConfig::default());
        let index = s.registry.create_index("acme");

        let document = s
            .pipeline
            .ingest("acme", text_upload("Open 9-5 Monday to Friday"), "owner-1")
            .await
            .unwrap();

        assert_eq!(document.company_id, "acme");
        assert_eq!(document.file_type, "text/plain");
        assert_eq!(document.chunk_count, 1);
        assert_eq!(document.uploaded_by, "owner-1");
        assert_eq!(index.len(), 1);
        assert_eq!(s.documents.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn long_upload_is_split_into_overlapping_chunks() {
        let config = IndexingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            ..IndexingConfig::default()
        };
        let s = setup(MemoryDocuments::default(), config);
        let index = s.registry.create_index("acme");
        let body = "We are open nine to five on weekdays. ".repeat(10);

        let document = s
            .pipeline
            .ingest("acme", text_upload(&body), "owner-1")
            .await
            .unwrap();

        assert!(document.chunk_count > 1);
        assert_eq!(index.len(), document.chunk_count);
        assert_eq!(s.embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_before_embedding() {
        let s = setup(MemoryDocuments::default(), IndexingConfig::default());
        s.registry.create_index("acme");

        let upload = DocumentUpload {
            file_name: "logo.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let err = s.pipeline.ingest("acme", upload, "owner-1").await.unwrap_err();

        assert!(matches!(err, KbChatError::Validation { .. }));
        assert_eq!(s.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_embedding() {
        let config = IndexingConfig {
            max_upload_bytes: 8,
            ..IndexingConfig::default()
        };
        let s = setup(MemoryDocuments::default(), config);
        s.registry.create_index("acme");

        let err = s
            .pipeline
            .ingest("acme", text_upload("more than eight bytes"), "owner-1")
            .await
            .unwrap_err();

        assert!(matches!(err, KbChatError::Validation { .. }));
        assert_eq!(s.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tenant_without_index_is_not_found() {
        let s = setup(MemoryDocuments::default(), IndexingConfig::default());

        let err = s
            .pipeline
            .ingest("nobody", text_upload("hello"), "owner-1")
            .await
            .unwrap_err();

        assert!(matches!(err, KbChatError::NotFound { .. }));
        assert_eq!(s.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_record_removes_vectors() {
        let s = setup(
            MemoryDocuments {
                fail: true,
                ..MemoryDocuments::default()
            },
            IndexingConfig::default(),
        );
        let index = s.registry.create_index("acme");

        let err = s
            .pipeline
            .ingest("acme", text_upload("Open 9-5"), "owner-1")
            .await
            .unwrap_err();

        assert!(matches!(err, KbChatError::Storage { .. }));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn whitespace_only_upload_is_rejected() {
        let s = setup(MemoryDocuments::default(), IndexingConfig::default());
        s.registry.create_index("acme");

        let err = s
            .pipeline
            .ingest("acme", text_upload("   \n\n  "), "owner-1")
            .await
            .unwrap_err();

        assert!(matches!(err, KbChatError::Validation { .. }));
        assert_eq!(s.embedder.calls.load(Ordering::SeqCst), 0);
    }

    /// Writes the first chunk of every upsert, then fails like a rejected batch
    struct PartialWriteIndex {
        inner: Arc<InMemoryVectorIndex>,
    }

    #[async_trait]
    impl VectorIndex for PartialWriteIndex {
        async fn query(&self, embedding: &[f32], top_k: usize) -> KbChatResult<Vec<ScoredChunk>> {
            self.inner.query(embedding, top_k).await
        }

        async fn upsert(&self, mut chunks: Vec<IndexedChunk>) -> KbChatResult<()> {
            chunks.truncate(1);
            self.inner.upsert(chunks).await?;
            Err(kbchat_core::network_error!("batch rejected", "test"))
        }

        async fn delete(&self, ids: &[String]) -> KbChatResult<()> {
            self.inner.delete(ids).await
        }

        fn name(&self) -> &str {
            "partial"
        }
    }

    #[async_trait]
    impl IndexResolver for PartialWriteIndex {
        async fn resolve(&self, _tenant_id: &str) -> KbChatResult<Arc<dyn VectorIndex>> {
            Ok(Arc::new(PartialWriteIndex {
                inner: self.inner.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn failed_upsert_removes_written_chunks() {
        let written = Arc::new(InMemoryVectorIndex::new("acme"));
        let documents = Arc::new(MemoryDocuments::default());
        let config = IndexingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            ..IndexingConfig::default()
        };
        let pipeline = IngestionPipeline::new(
            Arc::new(PartialWriteIndex {
                inner: written.clone(),
            }),
            Arc::new(CountingEmbedder {
                calls: AtomicUsize::new(0),
            }),
            documents.clone(),
            &config,
        )
        .unwrap();

        let body = "We are open nine to five on weekdays. ".repeat(10);
        let err = pipeline
            .ingest("acme", text_upload(&body), "owner-1")
            .await
            .unwrap_err();

        assert!(matches!(err, KbChatError::Network { .. }));
        assert!(written.is_empty());
        assert!(documents.rows.lock().unwrap().is_empty());
    }
}
