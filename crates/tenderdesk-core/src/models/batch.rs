use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::document::DocumentType;
use super::extraction::{Confidence, ExtractedData, ReviewDecision};

/// Outcome for one archive entry. Exactly one of `data` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFileResult {
    pub index: usize,
    pub file_name: String,
    pub document_type: Option<DocumentType>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<ExtractedData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub confidence: Option<Confidence>,
    pub review: Option<ReviewDecision>,
    pub requires_review: bool,
    pub provider: Option<String>,
    pub processing_time_ms: i64,
}

impl BatchFileResult {
    pub fn failure(index: usize, file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            document_type: None,
            success: false,
            data: None,
            error: Some(error.into()),
            confidence: None,
            review: None,
            requires_review: false,
            provider: None,
            processing_time_ms: 0,
        }
    }
}

/// Summary of a batch run. `successful + failed == total_files == results.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub results: Vec<BatchFileResult>,
}

impl BatchResult {
    pub fn from_results(results: Vec<BatchFileResult>, cancelled: bool) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_files: results.len(),
            successful,
            failed: results.len() - successful,
            cancelled,
            results,
        }
    }
}
