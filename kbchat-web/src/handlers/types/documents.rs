//! Document upload types

use kbchat_core::CompanyDocument;
use serde::Serialize;
use utoipa::ToSchema;

/// Stored document metadata
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentInfo {
    pub id: String,
    pub company_id: String,
    #[schema(example = "opening-hours.pdf")]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub file_type: String,
    pub chunk_count: usize,
    pub uploaded_by: String,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

impl From<CompanyDocument> for DocumentInfo {
    fn from(document: CompanyDocument) -> Self {
        Self {
            id: document.id,
            company_id: document.company_id,
            file_name: document.file_name,
            file_type: document.file_type,
            chunk_count: document.chunk_count,
            uploaded_by: document.uploaded_by,
            uploaded_at: document.uploaded_at,
        }
    }
}

/// Upload response
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub document: DocumentInfo,
}
