//! Row types and their conversion to domain models. Enumerations are stored as
//! TEXT and parsed back with `FromStr`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tenderdesk_core::models::{Document, Extraction};
use tenderdesk_core::AppError;
use uuid::Uuid;

pub(crate) const DOCUMENT_COLUMNS: &str = "id, name, original_name, mime_type, detected_mime_type, \
     size, storage_key, url, document_type, module_type, module_id, description, tags, status, \
     uploaded_by_id, created_at, processed_at";

pub(crate) const EXTRACTION_COLUMNS: &str = "id, document_id, extraction_type, provider, model, \
     status, extracted_data, confidence, processing_time_ms, error_message, created_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DocumentRow {
    pub id: Uuid,
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub detected_mime_type: Option<String>,
    pub size: i64,
    pub storage_key: String,
    pub url: String,
    pub document_type: String,
    pub module_type: String,
    pub module_id: Option<Uuid>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub uploaded_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExtractionRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub extraction_type: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub status: String,
    pub extracted_data: Option<serde_json::Value>,
    pub confidence: Option<serde_json::Value>,
    pub processing_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr<Err = anyhow::Error>,
{
    value
        .parse()
        .map_err(|e| AppError::Persistence(format!("Invalid {} '{}': {}", column, value, e)))
}

fn parse_json<T: DeserializeOwned>(
    column: &str,
    value: Option<serde_json::Value>,
) -> Result<Option<T>, AppError> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| AppError::Persistence(format!("Invalid {} JSON: {}", column, e)))
}

impl TryFrom<DocumentRow> for Document {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            name: row.name,
            original_name: row.original_name,
            mime_type: row.mime_type,
            detected_mime_type: row.detected_mime_type,
            size: row.size,
            storage_key: row.storage_key,
            url: row.url,
            document_type: parse_column("document_type", &row.document_type)?,
            module_type: parse_column("module_type", &row.module_type)?,
            module_id: row.module_id,
            description: row.description,
            tags: row.tags,
            status: parse_column("status", &row.status)?,
            uploaded_by_id: row.uploaded_by_id,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}

impl TryFrom<ExtractionRow> for Extraction {
    type Error = AppError;

    fn try_from(row: ExtractionRow) -> Result<Self, Self::Error> {
        Ok(Extraction {
            id: row.id,
            document_id: row.document_id,
            extraction_type: parse_column("extraction_type", &row.extraction_type)?,
            provider: row.provider,
            model: row.model,
            status: parse_column("status", &row.status)?,
            extracted_data: parse_json("extracted_data", row.extracted_data)?,
            confidence: parse_json("confidence", row.confidence)?,
            processing_time_ms: row.processing_time_ms,
            error_message: row.error_message,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}
