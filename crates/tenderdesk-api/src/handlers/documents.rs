use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tenderdesk_core::models::{
    Document, DocumentType, Extraction, ModuleType, NewDocument, ReviewDecision,
};
use tenderdesk_core::{AppError, ValidationError};
use tenderdesk_processing::classify;
use tenderdesk_storage::generate_document_key;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{declared_length, multipart_failure, ErrorResponse, HttpAppError};
use crate::state::AppState;

/// A stored extraction attempt with its review routing.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtractionView {
    #[serde(flatten)]
    pub extraction: Extraction,
    pub review: ReviewDecision,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDetails {
    #[serde(flatten)]
    pub document: Document,
    /// Newest first.
    pub extractions: Vec<ExtractionView>,
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    module_type: Option<String>,
    module_id: Option<String>,
    document_type: Option<String>,
    description: Option<String>,
    tags: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            "moduleType" | "module_type" => form.module_type = Some(field.text().await?),
            "moduleId" | "module_id" => form.module_id = Some(field.text().await?),
            "documentType" | "document_type" | "type" => {
                form.document_type = Some(field.text().await?)
            }
            "description" => form.description = Some(field.text().await?),
            "tags" => form.tags = Some(field.text().await?),
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    Ok(form)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_tags(value: Option<String>) -> Vec<String> {
    value
        .map(|tags| {
            tags.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "documents",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document stored", body = Document),
        (status = 400, description = "Invalid form or rejected file", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = read_upload_form(multipart).await.map_err(|e| {
        let max = state.upload_config().max_file_size_bytes;
        multipart_failure(
            e,
            ValidationError::FileTooLarge {
                size: declared_length(&headers).unwrap_or(max + 1),
                max,
            },
        )
    })?;

    let file = form
        .file
        .ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;

    let module_type = non_empty(form.module_type)
        .ok_or_else(|| AppError::InvalidInput("Missing 'moduleType' field".to_string()))?;
    let module_type: ModuleType = module_type
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid moduleType '{}'", module_type)))?;

    let module_id = non_empty(form.module_id)
        .map(|id| {
            Uuid::parse_str(&id)
                .map_err(|_| AppError::InvalidInput(format!("Invalid moduleId '{}'", id)))
        })
        .transpose()?;

    let document_type_override = non_empty(form.document_type)
        .map(|ty| {
            ty.parse::<DocumentType>()
                .map_err(|_| AppError::InvalidInput(format!("Invalid documentType '{}'", ty)))
        })
        .transpose()?;

    let validated = state
        .validator
        .validate(&file.data, &file.file_name, &file.content_type)?;

    let document_type = document_type_override
        .unwrap_or_else(|| classify(&validated.sanitized_name, &validated.mime_type));

    let id = Uuid::new_v4();
    let storage_key = generate_document_key(module_type, id, &validated.sanitized_name);
    let url = state
        .storage
        .put(&storage_key, &file.data, &validated.mime_type)
        .await?;

    let document = NewDocument {
        name: validated.sanitized_name,
        original_name: file.file_name,
        mime_type: validated.mime_type,
        detected_mime_type: validated.detected_mime_type,
        size: validated.size as i64,
        storage_key: storage_key.clone(),
        url,
        document_type,
        module_type,
        module_id,
        description: non_empty(form.description),
        tags: parse_tags(form.tags),
        uploaded_by_id: None,
    }
    .into_document(id, Utc::now());

    if let Err(e) = state.documents.insert(&document).await {
        // Do not leave an orphaned object behind a failed insert.
        let storage = state.storage.clone();
        tokio::spawn(async move {
            if let Err(cleanup_err) = storage.delete(&storage_key).await {
                tracing::debug!(
                    error = %cleanup_err,
                    storage_key = %storage_key,
                    "Failed to clean up stored file after database error"
                );
            }
        });
        return Err(e.into());
    }

    tracing::info!(
        document_id = %document.id,
        file_name = %document.name,
        document_type = %document.document_type,
        module_type = %document.module_type,
        size = document.size,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

async fn extraction_views(
    state: &AppState,
    document_id: Uuid,
) -> Result<Vec<ExtractionView>, HttpAppError> {
    let extractions = state.extractions.list_for_document(document_id).await?;
    Ok(extractions
        .into_iter()
        .map(|extraction| ExtractionView {
            review: state.orchestrator.review_for(&extraction),
            extraction,
        })
        .collect())
}

async fn load_document(state: &AppState, id: Uuid) -> Result<Document, HttpAppError> {
    state
        .documents
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)).into())
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document with its extractions", body = DocumentDetails),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let document = load_document(&state, id).await?;
    let extractions = extraction_views(&state, id).await?;

    Ok(Json(DocumentDetails {
        document,
        extractions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/extractions",
    tag = "extractions",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Extraction attempts, newest first", body = Vec<ExtractionView>),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_extractions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    load_document(&state, id).await?;
    Ok(Json(extraction_views(&state, id).await?))
}
