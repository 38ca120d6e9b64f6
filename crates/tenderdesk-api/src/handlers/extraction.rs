use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tenderdesk_core::models::{Extraction, ExtractionType, ReviewDecision};
use tenderdesk_core::AppError;
use tenderdesk_extraction::ExtractionOutcome;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// TENDER, INVOICE, EXPENSE, DELIVERY or GENERAL. Defaults from the
    /// document type when omitted.
    pub extraction_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub extraction: Extraction,
    /// True when a completed extraction was returned without a provider call
    pub cached: bool,
    pub processing_time_ms: i64,
    pub review: ReviewDecision,
}

impl From<ExtractionOutcome> for ExtractResponse {
    fn from(outcome: ExtractionOutcome) -> Self {
        Self {
            extraction: outcome.extraction,
            cached: outcome.cached,
            processing_time_ms: outcome.processing_time_ms,
            review: outcome.review,
        }
    }
}

/// The body is optional, so it is read raw rather than through `Json`.
fn parse_extraction_type(body: &[u8]) -> Result<Option<ExtractionType>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let request: ExtractRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?;

    request
        .extraction_type
        .filter(|ty| !ty.trim().is_empty())
        .map(|ty| {
            ty.trim().parse::<ExtractionType>().map_err(|_| {
                AppError::InvalidInput(format!("Unsupported extraction type '{}'", ty))
            })
        })
        .transpose()
}

#[utoipa::path(
    post,
    path = "/api/v1/documents/{id}/extract",
    tag = "extractions",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    request_body(
        content = ExtractRequest,
        description = "Optional; an empty body uses the default type for the document",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Extraction completed or returned from a previous run", body = ExtractResponse),
        (status = 400, description = "Invalid extraction type", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 409, description = "An extraction for this document is already running", body = ErrorResponse),
        (status = 502, description = "Every provider failed", body = ErrorResponse),
        (status = 504, description = "Provider timed out", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn extract_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let extraction_type = parse_extraction_type(&body)?;
    let outcome = state.orchestrator.extract(id, extraction_type).await?;

    tracing::info!(
        document_id = %id,
        extraction_id = %outcome.extraction.id,
        cached = outcome.cached,
        requires_review = outcome.review.requires_review,
        "Extraction request served"
    );

    Ok(Json(ExtractResponse::from(outcome)))
}
