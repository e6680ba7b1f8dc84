//! Application state shared by all handlers

use crate::{
    auth::{
        database::DatabaseUserStore,
        jwt,
        users::{UserService, UserStore},
    },
    database::{Database, SqliteChatLogStore, SqliteCompanyStore, SqliteDocumentStore},
    WebConfig, WebError, WebResult,
};
use kbchat_core::{
    ChatLogStore, CompanyStore, DocumentStore, Embedder, GenerativeBackend, IndexResolver,
    KbChatConfig, VectorBackend,
};
use kbchat_indexing::IngestionPipeline;
use kbchat_rag::{
    AnswerOrchestrator, InMemoryIndexRegistry, OpenAiCompatibleClient, OpenAiEmbedder,
    OrchestratorSettings, PineconeIndexResolver,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    pub orchestrator: Arc<AnswerOrchestrator>,
    pub ingestion: Arc<IngestionPipeline>,
    pub user_service: UserService,
    pub chat_log: Arc<dyn ChatLogStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub companies: Arc<dyn CompanyStore>,
    /// Pool checked by the health endpoint
    pub database: Option<Database>,
    /// Set when tenants live in process memory; company accounts get an index on registration
    pub index_registry: Option<Arc<InMemoryIndexRegistry>>,
}

impl AppState {
    /// Build every collaborator from configuration and connect the database
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        check_signing_secret(jwt::configured_secret().is_some(), config.dev_mode)?;

        let mut kb_config = match &config.config_path {
            Some(path) => KbChatConfig::from_file(path)?,
            None => KbChatConfig::default(),
        };
        kb_config.apply_env();
        if let Some(backend) = config.vector_backend {
            kb_config.vector_index.backend = backend;
        }
        kb_config.validate()?;

        let database = Database::connect(&config.database_url).await?;
        let chat_log: Arc<dyn ChatLogStore> = Arc::new(SqliteChatLogStore::new(&database));
        let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(&database));
        let companies: Arc<dyn CompanyStore> = Arc::new(SqliteCompanyStore::new(&database));
        let user_service =
            UserService::new(UserStore::database(DatabaseUserStore::new(&database)));

        if let (Ok(email), Ok(password)) = (
            std::env::var("KBCHAT_ADMIN_EMAIL"),
            std::env::var("KBCHAT_ADMIN_PASSWORD"),
        ) {
            user_service
                .ensure_admin(&email, &password)
                .await
                .map_err(|e| WebError::Config(format!("Failed to create admin user: {}", e)))?;
        }

        let timeout = kb_config.retry.timeout();
        let backend: Arc<dyn GenerativeBackend> =
            Arc::new(OpenAiCompatibleClient::new(kb_config.llm.clone(), timeout)?);
        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAiEmbedder::new(kb_config.embedding.clone(), timeout)?);

        let (resolver, index_registry) = match kb_config.vector_index.backend {
            VectorBackend::Pinecone => {
                let resolver = PineconeIndexResolver::new(&kb_config.vector_index, timeout)?;
                (Arc::new(resolver) as Arc<dyn IndexResolver>, None)
            }
            VectorBackend::Memory => {
                warn!("Using in-memory vector indexes; knowledge bases are lost on restart");
                let registry = Arc::new(InMemoryIndexRegistry::new());
                (registry.clone() as Arc<dyn IndexResolver>, Some(registry))
            }
        };

        let orchestrator = AnswerOrchestrator::new(
            resolver.clone(),
            embedder.clone(),
            backend,
            chat_log.clone(),
        )
        .with_settings(OrchestratorSettings::from(&kb_config));

        let ingestion =
            IngestionPipeline::new(resolver, embedder, documents.clone(), &kb_config.indexing)?;

        info!(
            vector_backend = ?kb_config.vector_index.backend,
            model = %kb_config.llm.model,
            "Application state initialized"
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            ingestion: Arc::new(ingestion),
            user_service,
            chat_log,
            documents,
            companies,
            database: Some(database),
            index_registry,
        })
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: WebConfig,
        orchestrator: AnswerOrchestrator,
        ingestion: IngestionPipeline,
        user_service: UserService,
        chat_log: Arc<dyn ChatLogStore>,
        documents: Arc<dyn DocumentStore>,
        companies: Arc<dyn CompanyStore>,
    ) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            ingestion: Arc::new(ingestion),
            user_service,
            chat_log,
            documents,
            companies,
            database: None,
            index_registry: None,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_index_registry(mut self, registry: Arc<InMemoryIndexRegistry>) -> Self {
        self.index_registry = Some(registry);
        self
    }
}

/// Only development servers may run without `JWT_SECRET`; a generated key changes on restart
fn check_signing_secret(configured: bool, dev_mode: bool) -> WebResult<()> {
    if configured {
        return Ok(());
    }
    if dev_mode {
        warn!("JWT_SECRET is not set; sessions will not survive a restart");
        return Ok(());
    }
    Err(WebError::Config(
        "JWT_SECRET must be set unless running in development mode".to_string(),
    ))
}
