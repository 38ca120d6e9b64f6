//! Extraction Orchestrator
//!
//! Runs the pipeline for a stored document and records the outcome. The claim on
//! the (document, extraction type) pair is what makes repeated and concurrent
//! requests safe: a COMPLETED extraction is returned as-is and a PROCESSING one
//! is reported as a conflict, so providers are called at most once per pair
//! until an attempt fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tenderdesk_core::models::{
    CompletedExtraction, Document, Extraction, ExtractionType, ReviewDecision,
};
use tenderdesk_core::AppError;
use tenderdesk_db::{ClaimResult, DocumentRepository, ExtractionRepository};
use tenderdesk_storage::Storage;
use uuid::Uuid;

use crate::pipeline::{ExtractionPipeline, PipelineInput, PipelineOutput};
use crate::review::route;

/// Attempts at recording a failed extraction before giving up on the row.
const FAIL_RECORD_ATTEMPTS: u32 = 3;
const FAIL_RECORD_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub extraction: Extraction,
    /// True when a previously completed extraction was returned without calling
    /// any provider.
    pub cached: bool,
    pub processing_time_ms: i64,
    pub review: ReviewDecision,
}

#[derive(Clone)]
pub struct ExtractionOrchestrator {
    documents: Arc<dyn DocumentRepository>,
    extractions: Arc<dyn ExtractionRepository>,
    storage: Arc<dyn Storage>,
    pipeline: Arc<ExtractionPipeline>,
}

impl ExtractionOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        extractions: Arc<dyn ExtractionRepository>,
        storage: Arc<dyn Storage>,
        pipeline: Arc<ExtractionPipeline>,
    ) -> Self {
        Self {
            documents,
            extractions,
            storage,
            pipeline,
        }
    }

    /// Review metadata for a stored extraction.
    pub fn review_for(&self, extraction: &Extraction) -> ReviewDecision {
        route(
            extraction.confidence.as_ref(),
            self.pipeline.review_threshold(),
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn extract(
        &self,
        document_id: Uuid,
        extraction_type: Option<ExtractionType>,
    ) -> Result<ExtractionOutcome, AppError> {
        let document = self
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {}", document_id)))?;

        let extraction_type =
            extraction_type.unwrap_or_else(|| ExtractionType::for_document(document.document_type));

        let extraction = match self.extractions.claim(document_id, extraction_type).await? {
            ClaimResult::Cached(existing) => {
                tracing::debug!(extraction_id = %existing.id, "Returning completed extraction");
                return Ok(ExtractionOutcome {
                    review: self.review_for(&existing),
                    processing_time_ms: existing.processing_time_ms.unwrap_or(0),
                    cached: true,
                    extraction: existing,
                });
            }
            ClaimResult::InProgress(existing) => {
                return Err(AppError::Conflict(format!(
                    "{} for document {} is still processing (attempt {})",
                    extraction_type, document_id, existing.id
                )));
            }
            ClaimResult::Claimed(extraction) => extraction,
        };

        // The attempt runs on its own task so that a dropped request cannot leave
        // the claimed row in PROCESSING.
        let extraction_id = extraction.id;
        let this = self.clone();
        let handle =
            tokio::spawn(async move { this.run_claimed(document, extraction).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(extraction_id = %extraction_id, error = %e, "Extraction task aborted");
                let message = format!("Extraction task aborted: {}", e);
                self.record_failure(extraction_id, &message, 0).await;
                Err(AppError::Internal(message))
            }
        }
    }

    async fn run_claimed(
        &self,
        document: Document,
        extraction: Extraction,
    ) -> Result<ExtractionOutcome, AppError> {
        let started = Instant::now();
        let result = self.run_pipeline(&document, extraction.extraction_type).await;
        let processing_time_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(output) => {
                let completed = CompletedExtraction {
                    provider: output.provider,
                    model: output.model,
                    data: output.data,
                    confidence: output.confidence,
                    processing_time_ms,
                };
                let stored = match self.extractions.complete(extraction.id, &completed).await {
                    Ok(stored) => stored,
                    Err(err) => {
                        tracing::error!(
                            document_id = %document.id,
                            extraction_id = %extraction.id,
                            error = %err,
                            "Failed to store extraction result"
                        );
                        self.record_failure(extraction.id, &err.to_string(), processing_time_ms)
                            .await;
                        return Err(err);
                    }
                };

                tracing::info!(
                    document_id = %document.id,
                    extraction_id = %stored.id,
                    provider = %completed.provider,
                    processing_time_ms = processing_time_ms,
                    requires_review = output.review.requires_review,
                    "Extraction completed"
                );

                Ok(ExtractionOutcome {
                    extraction: stored,
                    cached: false,
                    processing_time_ms,
                    review: output.review,
                })
            }
            Err(err) => {
                tracing::warn!(
                    document_id = %document.id,
                    extraction_id = %extraction.id,
                    processing_time_ms = processing_time_ms,
                    error = %err,
                    "Extraction failed"
                );
                self.record_failure(extraction.id, &err.to_string(), processing_time_ms)
                    .await;
                Err(err)
            }
        }
    }

    /// Move a claimed attempt to FAILED so the pair can be requested again.
    /// Retries briefly; if the row still cannot be written it stays PROCESSING
    /// until `fail_interrupted` runs at the next start.
    async fn record_failure(&self, extraction_id: Uuid, message: &str, processing_time_ms: i64) {
        for attempt in 1..=FAIL_RECORD_ATTEMPTS {
            match self
                .extractions
                .fail(extraction_id, message, processing_time_ms)
                .await
            {
                Ok(_) => return,
                Err(e) if attempt < FAIL_RECORD_ATTEMPTS => {
                    tracing::warn!(
                        extraction_id = %extraction_id,
                        attempt,
                        error = %e,
                        "Failed to record extraction failure, retrying"
                    );
                    tokio::time::sleep(FAIL_RECORD_BACKOFF * attempt).await;
                }
                Err(e) => {
                    tracing::error!(
                        extraction_id = %extraction_id,
                        error = %e,
                        "Giving up on recording extraction failure"
                    );
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        document: &Document,
        extraction_type: ExtractionType,
    ) -> Result<PipelineOutput, AppError> {
        let data = self.storage.get(&document.storage_key).await?;

        self.pipeline
            .run(PipelineInput {
                document_id: Some(document.id),
                data: &data,
                mime_type: &document.mime_type,
                url: Some(&document.url),
                extraction_type,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tenderdesk_core::hooks::NoOpUsageRecorder;
    use tenderdesk_core::models::{
        DocumentStatus, DocumentType, ExtractionStatus, ModuleType, NewDocument,
    };
    use tenderdesk_core::ExtractionConfig;
    use tenderdesk_db::InMemoryStore;
    use tenderdesk_providers::test_helpers::{MockProvider, Script};
    use tenderdesk_providers::{FallbackChain, ProviderError};
    use tenderdesk_storage::LocalStorage;
    use tempfile::TempDir;

    const INVOICE_JSON: &str = r#"{"invoiceNumber": "INV-42", "total": 310, "confidence": {"overall": 0.65, "fields": {"total": 0.5}}}"#;

    struct Fixture {
        orchestrator: ExtractionOrchestrator,
        store: Arc<InMemoryStore>,
        provider: Arc<MockProvider>,
        document: Document,
        _dir: TempDir,
    }

    async fn fixture(script: Script) -> Fixture {
        fixture_with(script, |store| store).await
    }

    async fn fixture_with<F>(script: Script, extractions: F) -> Fixture
    where
        F: FnOnce(Arc<InMemoryStore>) -> Arc<dyn ExtractionRepository>,
    {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost/files".to_string())
                .await
                .unwrap(),
        );
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(MockProvider::new("alpha", script));

        let key = "documents/expense/1-invoice.txt";
        let url = storage
            .put(key, b"Invoice INV-42 total 310 MAD", "text/plain")
            .await
            .unwrap();
        let document = NewDocument {
            name: "invoice.txt".to_string(),
            original_name: "invoice.txt".to_string(),
            mime_type: "text/plain".to_string(),
            detected_mime_type: None,
            size: 28,
            storage_key: key.to_string(),
            url,
            document_type: DocumentType::Invoice,
            module_type: ModuleType::Expense,
            module_id: None,
            description: None,
            tags: vec![],
            uploaded_by_id: None,
        }
        .into_document(Uuid::new_v4(), Utc::now());
        DocumentRepository::insert(store.as_ref(), &document)
            .await
            .unwrap();

        let chain = FallbackChain::new(
            vec![provider.clone()],
            Duration::from_secs(5),
            Arc::new(NoOpUsageRecorder),
        );
        let pipeline = ExtractionPipeline::from_config(Arc::new(chain), &ExtractionConfig::default());
        let orchestrator = ExtractionOrchestrator::new(
            store.clone(),
            extractions(store.clone()),
            storage,
            Arc::new(pipeline),
        );

        Fixture {
            orchestrator,
            store,
            provider,
            document,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let f = fixture(Script::Respond(INVOICE_JSON.to_string())).await;

        let first = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.extraction.status, ExtractionStatus::Completed);
        assert_eq!(first.extraction.extraction_type, ExtractionType::Invoice);
        assert_eq!(f.provider.calls(), 1);

        let second = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert!(second.cached);
        assert_eq!(f.provider.calls(), 1);
        assert_eq!(second.extraction.id, first.extraction.id);
        assert_eq!(
            second.extraction.extracted_data,
            first.extraction.extracted_data
        );
        assert_eq!(second.review, first.review);

        let document = f.store.get(f.document.id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Processed);
        assert!(document.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_low_confidence_is_routed_to_review() {
        let f = fixture(Script::Respond(INVOICE_JSON.to_string())).await;

        let outcome = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert!(outcome.review.requires_review);
        assert!(outcome.review.overall_below_threshold);
        assert_eq!(outcome.review.flagged_fields, vec!["total".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_retry_creates_new_attempt() {
        let f = fixture(Script::Fail(ProviderError::Http {
            status: 529,
            body: "overloaded".to_string(),
        }))
        .await;

        let err = f.orchestrator.extract(f.document.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderExhausted { .. }));

        let document = f.store.get(f.document.id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Failed);
        let attempts = f.store.list_for_document(f.document.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, ExtractionStatus::Failed);
        assert!(attempts[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("overloaded"));

        f.provider
            .set_script(Script::Respond(INVOICE_JSON.to_string()));
        let outcome = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert!(!outcome.cached);

        let attempts = f.store.list_for_document(f.document.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].status, ExtractionStatus::Completed);
        assert_eq!(attempts[1].status, ExtractionStatus::Failed);
    }

    #[tokio::test]
    async fn test_in_flight_attempt_is_a_conflict() {
        let f = fixture(Script::Respond(INVOICE_JSON.to_string())).await;
        f.store
            .claim(f.document.id, ExtractionType::Invoice)
            .await
            .unwrap();

        let err = f.orchestrator.extract(f.document.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let f = fixture(Script::Respond(INVOICE_JSON.to_string())).await;

        let err = f
            .orchestrator
            .extract(Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    /// Delegates to the in-memory store but rejects the first writes.
    struct FlakyExtractions {
        inner: Arc<InMemoryStore>,
        complete_failures: AtomicUsize,
        fail_failures: AtomicUsize,
    }

    impl FlakyExtractions {
        fn new(inner: Arc<InMemoryStore>, complete_failures: usize, fail_failures: usize) -> Self {
            Self {
                inner,
                complete_failures: AtomicUsize::new(complete_failures),
                fail_failures: AtomicUsize::new(fail_failures),
            }
        }

        fn take(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait::async_trait]
    impl ExtractionRepository for FlakyExtractions {
        async fn claim(
            &self,
            document_id: Uuid,
            extraction_type: ExtractionType,
        ) -> Result<ClaimResult, AppError> {
            self.inner.claim(document_id, extraction_type).await
        }

        async fn complete(
            &self,
            extraction_id: Uuid,
            result: &CompletedExtraction,
        ) -> Result<Extraction, AppError> {
            if Self::take(&self.complete_failures) {
                return Err(AppError::Persistence("connection reset".to_string()));
            }
            self.inner.complete(extraction_id, result).await
        }

        async fn fail(
            &self,
            extraction_id: Uuid,
            error_message: &str,
            processing_time_ms: i64,
        ) -> Result<Extraction, AppError> {
            if Self::take(&self.fail_failures) {
                return Err(AppError::Persistence("connection reset".to_string()));
            }
            self.inner
                .fail(extraction_id, error_message, processing_time_ms)
                .await
        }

        async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Extraction>, AppError> {
            self.inner.list_for_document(document_id).await
        }

        async fn fail_interrupted(&self) -> Result<u64, AppError> {
            self.inner.fail_interrupted().await
        }
    }

    #[tokio::test]
    async fn test_lost_result_write_leaves_pair_retryable() {
        let f = fixture_with(Script::Respond(INVOICE_JSON.to_string()), |store| {
            Arc::new(FlakyExtractions::new(store, 1, 0))
        })
        .await;

        let err = f.orchestrator.extract(f.document.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        let document = f.store.get(f.document.id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Failed);
        let attempts = f.store.list_for_document(f.document.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, ExtractionStatus::Failed);

        let outcome = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(outcome.extraction.status, ExtractionStatus::Completed);
        assert_eq!(f.provider.calls(), 2);

        let attempts = f.store.list_for_document(f.document.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].status, ExtractionStatus::Completed);
    }

    #[tokio::test]
    async fn test_failure_record_is_retried() {
        let f = fixture_with(
            Script::Fail(ProviderError::Http {
                status: 500,
                body: "upstream error".to_string(),
            }),
            |store| Arc::new(FlakyExtractions::new(store, 0, 2)),
        )
        .await;

        let err = f.orchestrator.extract(f.document.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderExhausted { .. }));

        let attempts = f.store.list_for_document(f.document.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, ExtractionStatus::Failed);

        f.provider
            .set_script(Script::Respond(INVOICE_JSON.to_string()));
        let outcome = f.orchestrator.extract(f.document.id, None).await.unwrap();
        assert_eq!(outcome.extraction.status, ExtractionStatus::Completed);
    }

    #[tokio::test]
    async fn test_explicit_type_is_claimed_separately() {
        let f = fixture(Script::Respond(INVOICE_JSON.to_string())).await;

        f.orchestrator.extract(f.document.id, None).await.unwrap();
        let general = f
            .orchestrator
            .extract(f.document.id, Some(ExtractionType::General))
            .await
            .unwrap();

        assert!(!general.cached);
        assert_eq!(general.extraction.extraction_type, ExtractionType::General);
        assert_eq!(f.provider.calls(), 2);
    }
}
