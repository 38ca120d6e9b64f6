use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use tenderdesk_core::models::BatchResult;
use tenderdesk_core::{AppError, ValidationError};

use crate::error::{declared_length, multipart_failure, ErrorResponse, HttpAppError};
use crate::state::AppState;

async fn read_archive(mut multipart: Multipart) -> Result<Option<Bytes>, MultipartError> {
    let mut archive = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            archive = Some(field.bytes().await?);
        }
    }
    Ok(archive)
}

#[utoipa::path(
    post,
    path = "/api/v1/extractions/batch",
    tag = "batch",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "ZIP archive in the 'file' field"),
    responses(
        (status = 200, description = "Per-file results; individual failures do not fail the batch", body = BatchResult),
        (status = 400, description = "Not a ZIP archive, too large, or no supported entries", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn process_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let archive = read_archive(multipart).await.map_err(|e| {
        let max = state.upload_config().max_archive_size_bytes;
        multipart_failure(
            e,
            ValidationError::ArchiveTooLarge {
                size: declared_length(&headers).unwrap_or(max + 1),
                max,
            },
        )
    })?;

    let archive =
        archive.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;

    tracing::info!(archive_size = archive.len(), "Batch upload received");

    let result = state
        .batch
        .process(archive.to_vec(), state.shutdown.child_token())
        .await?;

    tracing::info!(
        total = result.total_files,
        successful = result.successful,
        failed = result.failed,
        cancelled = result.cancelled,
        "Batch completed"
    );

    Ok(Json(result))
}
