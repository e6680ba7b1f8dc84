//! SQLite persistence for chat logs, document rows and company profiles

use chrono::{DateTime, SecondsFormat, Utc};
use kbchat_core::{
    async_trait, not_found_error, storage_error, AnswerSource, ChatLogRecord, ChatLogStore,
    ChatbotCustomization, Company, CompanyDocument, CompanyStats, CompanyStore, DocumentStore,
    KbChatResult, WidgetAppearance,
};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, info};

use crate::{WebError, WebResult};

const COMPONENT: &str = "database";

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        company_id TEXT,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        company_id TEXT NOT NULL,
        message TEXT NOT NULL,
        response TEXT NOT NULL,
        is_from_knowledge_base INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_chats_company ON chats(company_id, created_at)",
    r#"CREATE TABLE IF NOT EXISTS company_documents (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_type TEXT NOT NULL,
        chunk_count INTEGER NOT NULL,
        uploaded_by TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_documents_company ON company_documents(company_id)",
    r#"CREATE TABLE IF NOT EXISTS companies (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        customization TEXT NOT NULL,
        appearance TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
];

/// Fixed-width timestamps so that text ordering matches time ordering
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> KbChatResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| storage_error!(format!("Invalid timestamp '{}'", value), COMPONENT, e))
}

/// Connection pool with the schema applied
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> WebResult<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| WebError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        // Every connection to `:memory:` is a separate database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| WebError::Database(format!("Failed to connect to database: {}", e)))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| WebError::Database(format!("Failed to create tables: {}", e)))?;
        }
        debug!("Database schema ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: String,
    user_id: String,
    company_id: String,
    message: String,
    response: String,
    is_from_knowledge_base: bool,
    created_at: String,
}

impl ChatRow {
    fn into_record(self) -> KbChatResult<ChatLogRecord> {
        let source = if self.is_from_knowledge_base {
            AnswerSource::KnowledgeBase
        } else {
            AnswerSource::GenerativeModel
        };

        Ok(ChatLogRecord {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            company_id: self.company_id,
            message: self.message,
            response: self.response,
            source,
        })
    }
}

/// `chats` table
#[derive(Debug, Clone)]
pub struct SqliteChatLogStore {
    pool: SqlitePool,
}

impl SqliteChatLogStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl ChatLogStore for SqliteChatLogStore {
    async fn insert(&self, record: &ChatLogRecord) -> KbChatResult<()> {
        sqlx::query(
            "INSERT INTO chats \
             (id, user_id, company_id, message, response, is_from_knowledge_base, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.company_id)
        .bind(&record.message)
        .bind(&record.response)
        .bind(record.source.is_knowledge_base())
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to insert chat log", COMPONENT, e))?;

        Ok(())
    }

    async fn list_for_company(
        &self,
        company_id: &str,
        limit: usize,
    ) -> KbChatResult<Vec<ChatLogRecord>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, user_id, company_id, message, response, is_from_knowledge_base, created_at \
             FROM chats WHERE company_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(company_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to list chat logs", COMPONENT, e))?;

        rows.into_iter().map(ChatRow::into_record).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    company_id: String,
    file_name: String,
    file_type: String,
    chunk_count: i64,
    uploaded_by: String,
    uploaded_at: String,
}

impl DocumentRow {
    fn into_document(self) -> KbChatResult<CompanyDocument> {
        Ok(CompanyDocument {
            uploaded_at: parse_timestamp(&self.uploaded_at)?,
            id: self.id,
            company_id: self.company_id,
            file_name: self.file_name,
            file_type: self.file_type,
            chunk_count: self.chunk_count.max(0) as usize,
            uploaded_by: self.uploaded_by,
        })
    }
}

/// `company_documents` table
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: &CompanyDocument) -> KbChatResult<()> {
        sqlx::query(
            "INSERT INTO company_documents \
             (id, company_id, file_name, file_type, chunk_count, uploaded_by, uploaded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.company_id)
        .bind(&document.file_name)
        .bind(&document.file_type)
        .bind(document.chunk_count as i64)
        .bind(&document.uploaded_by)
        .bind(format_timestamp(&document.uploaded_at))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to insert document", COMPONENT, e))?;

        Ok(())
    }

    async fn list_for_company(&self, company_id: &str) -> KbChatResult<Vec<CompanyDocument>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, company_id, file_name, file_type, chunk_count, uploaded_by, uploaded_at \
             FROM company_documents WHERE company_id = ? ORDER BY uploaded_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to list documents", COMPONENT, e))?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }
}

fn to_json<T: Serialize>(value: &T) -> KbChatResult<String> {
    serde_json::to_string(value)
        .map_err(|e| storage_error!("Failed to encode company settings", COMPONENT, e))
}

fn from_json<T: DeserializeOwned>(value: &str) -> KbChatResult<T> {
    serde_json::from_str(value)
        .map_err(|e| storage_error!("Invalid stored company settings", COMPONENT, e))
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: String,
    name: String,
    customization: String,
    appearance: String,
    created_at: String,
}

impl CompanyRow {
    fn into_company(self) -> KbChatResult<Company> {
        Ok(Company {
            customization: from_json(&self.customization)?,
            appearance: from_json(&self.appearance)?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            name: self.name,
        })
    }
}

/// `companies` table, plus activity counts over `chats` and `company_documents`
#[derive(Debug, Clone)]
pub struct SqliteCompanyStore {
    pool: SqlitePool,
}

impl SqliteCompanyStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    async fn update_column(&self, company_id: &str, column: &str, value: String) -> KbChatResult<()> {
        let sql = format!("UPDATE companies SET {} = ? WHERE id = ?", column);
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(company_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error!("Failed to update company", COMPONENT, e))?;

        if result.rows_affected() == 0 {
            return Err(not_found_error!(format!("company {}", company_id), COMPONENT));
        }
        Ok(())
    }
}

#[async_trait]
impl CompanyStore for SqliteCompanyStore {
    async fn create(&self, company: &Company) -> KbChatResult<()> {
        sqlx::query(
            "INSERT INTO companies (id, name, customization, appearance, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&company.id)
        .bind(&company.name)
        .bind(to_json(&company.customization)?)
        .bind(to_json(&company.appearance)?)
        .bind(format_timestamp(&company.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to insert company", COMPONENT, e))?;

        debug!(company_id = %company.id, "Company created");
        Ok(())
    }

    async fn get(&self, company_id: &str) -> KbChatResult<Option<Company>> {
        let row: Option<CompanyRow> = sqlx::query_as(
            "SELECT id, name, customization, appearance, created_at FROM companies WHERE id = ?",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to load company", COMPONENT, e))?;

        row.map(CompanyRow::into_company).transpose()
    }

    async fn update_customization(
        &self,
        company_id: &str,
        customization: &ChatbotCustomization,
    ) -> KbChatResult<()> {
        self.update_column(company_id, "customization", to_json(customization)?)
            .await
    }

    async fn update_appearance(
        &self,
        company_id: &str,
        appearance: &WidgetAppearance,
    ) -> KbChatResult<()> {
        self.update_column(company_id, "appearance", to_json(appearance)?)
            .await
    }

    async fn list(&self) -> KbChatResult<Vec<Company>> {
        let rows: Vec<CompanyRow> = sqlx::query_as(
            "SELECT id, name, customization, appearance, created_at FROM companies \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to list companies", COMPONENT, e))?;

        rows.into_iter().map(CompanyRow::into_company).collect()
    }

    async fn stats(&self, company_id: &str) -> KbChatResult<CompanyStats> {
        let (documents, chats): (i64, i64) = sqlx::query_as(
            "SELECT \
             (SELECT COUNT(*) FROM company_documents WHERE company_id = ?), \
             (SELECT COUNT(*) FROM chats WHERE company_id = ?)",
        )
        .bind(company_id)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to count company activity", COMPONENT, e))?;

        Ok(CompanyStats {
            documents: documents.max(0) as u64,
            chats: chats.max(0) as u64,
        })
    }
}
