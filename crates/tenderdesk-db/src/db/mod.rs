//! Repositories for the data access layer
//!
//! Each trait has a PostgreSQL implementation in its own module; the in-memory
//! store implements all of them behind a single lock.

pub mod document;
pub mod extraction;
pub mod memory;
mod rows;
pub mod transaction;
pub mod usage;

use async_trait::async_trait;
use tenderdesk_core::hooks::{ProviderUsageSummary, UsageRecorder};
use tenderdesk_core::models::{CompletedExtraction, Document, Extraction, ExtractionType};
use tenderdesk_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError>;
}

/// Outcome of trying to start an extraction for a (document, type) pair.
#[derive(Debug, Clone)]
pub enum ClaimResult {
    /// A new PROCESSING attempt was created and the document marked PROCESSING.
    Claimed(Extraction),
    /// A COMPLETED extraction already exists; nothing was written.
    Cached(Extraction),
    /// Another attempt is still PROCESSING; nothing was written.
    InProgress(Extraction),
}

#[async_trait]
pub trait ExtractionRepository: Send + Sync {
    /// Atomically create a PROCESSING attempt unless a PROCESSING or COMPLETED
    /// one already exists for the pair. Implementations must not split this into
    /// a read followed by a write.
    async fn claim(
        &self,
        document_id: Uuid,
        extraction_type: ExtractionType,
    ) -> Result<ClaimResult, AppError>;

    /// Mark the attempt COMPLETED and its document PROCESSED.
    async fn complete(
        &self,
        extraction_id: Uuid,
        result: &CompletedExtraction,
    ) -> Result<Extraction, AppError>;

    /// Mark the attempt and its document FAILED.
    async fn fail(
        &self,
        extraction_id: Uuid,
        error_message: &str,
        processing_time_ms: i64,
    ) -> Result<Extraction, AppError>;

    /// All attempts for a document, newest first.
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Extraction>, AppError>;

    /// Fail attempts left PROCESSING by a previous process. Returns how many
    /// were reset.
    async fn fail_interrupted(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait UsageLogRepository: UsageRecorder {
    async fn summarize(&self) -> Result<Vec<ProviderUsageSummary>, AppError>;
}

pub(crate) const INTERRUPTED_MESSAGE: &str =
    "Extraction interrupted by a service restart; request it again";
