//! Document upload and listing

use super::types::{DocumentInfo, ErrorResponse, UploadResponse};
use crate::{auth::CompanyUser, ApiError, AppState};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Json,
};
use kbchat_indexing::DocumentUpload;
use tracing::{debug, info, warn};

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".to_string())
    } else {
        debug!("Rejected multipart body: {}", err);
        ApiError::BadRequest("Invalid multipart body".to_string())
    }
}

/// Ingest a document into the caller's knowledge base
#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "Documents",
    summary = "Upload a document",
    description = "Multipart form with `file` and `companyId`. Accepts pdf, docx, csv, plain text and markdown.",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document ingested", body = UploadResponse),
        (status = 400, description = "Missing field or unsupported file", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the tenant's company account", body = ErrorResponse),
        (status = 404, description = "Tenant has no knowledge base", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_document(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Rejected upload: {}", e);
        ApiError::BadRequest("Invalid multipart body".to_string())
    })?;

    let mut upload = None;
    let mut company_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(DocumentUpload {
                    file_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("companyId") => {
                company_id = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let company_id = company_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let (Some(upload), Some(company_id)) = (upload, company_id) else {
        return Err(ApiError::BadRequest(
            "Missing file or companyId".to_string(),
        ));
    };

    if !user.owns_company(&company_id) {
        warn!(
            user_id = %user.id,
            tenant_id = %company_id,
            "Upload to another company's knowledge base refused"
        );
        return Err(ApiError::Forbidden);
    }

    let document = state.ingestion.ingest(&company_id, upload, &user.id).await?;
    info!(
        document_id = %document.id,
        tenant_id = %company_id,
        chunks = document.chunk_count,
        "Document uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        document: document.into(),
    }))
}

/// Documents ingested for the caller's company
#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Documents",
    summary = "List documents",
    responses(
        (status = 200, description = "Documents for the caller's company", body = [DocumentInfo]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a company account", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    CompanyUser(user): CompanyUser,
) -> Result<Json<Vec<DocumentInfo>>, ApiError> {
    let company_id = user.company_id.unwrap_or_default();
    let documents = state.documents.list_for_company(&company_id).await?;
    Ok(Json(documents.into_iter().map(DocumentInfo::from).collect()))
}
