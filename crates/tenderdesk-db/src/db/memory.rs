//! In-memory implementation of every repository.
//!
//! All state sits behind one mutex, so the extraction claim is a single
//! critical section just like the conditional insert in PostgreSQL.
//!
//! Documents and extraction attempts are kept for the life of the process and
//! are lost on restart. Provider usage is folded into per-provider totals as it
//! arrives; only the most recent [`USAGE_LOG_CAPACITY`] raw attempts are kept.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tenderdesk_core::hooks::{ProviderAttempt, ProviderUsageSummary, UsageRecorder};
use tenderdesk_core::models::{
    CompletedExtraction, Document, DocumentStatus, Extraction, ExtractionStatus, ExtractionType,
};
use tenderdesk_core::AppError;
use uuid::Uuid;

use super::{
    ClaimResult, DocumentRepository, ExtractionRepository, UsageLogRepository,
    INTERRUPTED_MESSAGE,
};

pub const USAGE_LOG_CAPACITY: usize = 1_000;

#[derive(Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    /// Insertion order doubles as creation order.
    extractions: Vec<Extraction>,
    usage_totals: BTreeMap<String, ProviderUsageSummary>,
    recent_usage: VecDeque<ProviderAttempt>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Persistence("in-memory store lock poisoned".to_string()))
    }

    /// Most recent provider attempts, oldest first.
    pub fn usage_log(&self) -> Vec<ProviderAttempt> {
        self.state
            .lock()
            .map(|s| s.recent_usage.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn finish(
        &self,
        extraction_id: Uuid,
        apply: impl FnOnce(&mut Extraction),
        document_status: DocumentStatus,
    ) -> Result<Extraction, AppError> {
        let mut state = self.lock()?;
        let extraction = state
            .extractions
            .iter_mut()
            .find(|e| e.id == extraction_id && e.status == ExtractionStatus::Processing)
            .ok_or_else(|| {
                AppError::Persistence(format!(
                    "Extraction {} is not in PROCESSING state",
                    extraction_id
                ))
            })?;
        apply(extraction);
        let finished = extraction.clone();

        if let Some(document) = state.documents.get_mut(&finished.document_id) {
            document.status = document_status;
            if document_status == DocumentStatus::Processed {
                document.processed_at = finished.completed_at;
            }
        }
        Ok(finished)
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if state.documents.contains_key(&document.id) {
            return Err(AppError::Persistence(format!(
                "Document {} already exists",
                document.id
            )));
        }
        state.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }
}

#[async_trait]
impl ExtractionRepository for InMemoryStore {
    async fn claim(
        &self,
        document_id: Uuid,
        extraction_type: ExtractionType,
    ) -> Result<ClaimResult, AppError> {
        let mut state = self.lock()?;

        if !state.documents.contains_key(&document_id) {
            return Err(AppError::NotFound(format!(
                "Document {} not found",
                document_id
            )));
        }

        let active = state.extractions.iter().find(|e| {
            e.document_id == document_id
                && e.extraction_type == extraction_type
                && matches!(
                    e.status,
                    ExtractionStatus::Processing | ExtractionStatus::Completed
                )
        });
        if let Some(existing) = active {
            return Ok(match existing.status {
                ExtractionStatus::Completed => ClaimResult::Cached(existing.clone()),
                _ => ClaimResult::InProgress(existing.clone()),
            });
        }

        let extraction = Extraction::processing(document_id, extraction_type);
        state.extractions.push(extraction.clone());
        if let Some(document) = state.documents.get_mut(&document_id) {
            document.status = DocumentStatus::Processing;
        }
        Ok(ClaimResult::Claimed(extraction))
    }

    async fn complete(
        &self,
        extraction_id: Uuid,
        result: &CompletedExtraction,
    ) -> Result<Extraction, AppError> {
        self.finish(
            extraction_id,
            |e| {
                e.status = ExtractionStatus::Completed;
                e.provider = Some(result.provider.clone());
                e.model = Some(result.model.clone());
                e.extracted_data = Some(result.data.clone());
                e.confidence = result.confidence.clone();
                e.processing_time_ms = Some(result.processing_time_ms);
                e.error_message = None;
                e.completed_at = Some(Utc::now());
            },
            DocumentStatus::Processed,
        )
    }

    async fn fail(
        &self,
        extraction_id: Uuid,
        error_message: &str,
        processing_time_ms: i64,
    ) -> Result<Extraction, AppError> {
        self.finish(
            extraction_id,
            |e| {
                e.status = ExtractionStatus::Failed;
                e.error_message = Some(error_message.to_string());
                e.processing_time_ms = Some(processing_time_ms);
                e.completed_at = Some(Utc::now());
            },
            DocumentStatus::Failed,
        )
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Extraction>, AppError> {
        Ok(self
            .lock()?
            .extractions
            .iter()
            .rev()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn fail_interrupted(&self) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        let mut reset = Vec::new();
        for extraction in state
            .extractions
            .iter_mut()
            .filter(|e| e.status == ExtractionStatus::Processing)
        {
            extraction.status = ExtractionStatus::Failed;
            extraction.error_message = Some(INTERRUPTED_MESSAGE.to_string());
            extraction.completed_at = Some(Utc::now());
            reset.push(extraction.document_id);
        }
        for id in &reset {
            if let Some(document) = state.documents.get_mut(id) {
                if document.status == DocumentStatus::Processing {
                    document.status = DocumentStatus::Failed;
                }
            }
        }
        Ok(reset.len() as u64)
    }
}

#[async_trait]
impl UsageRecorder for InMemoryStore {
    async fn record_attempt(&self, attempt: &ProviderAttempt) -> Result<(), String> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| "in-memory store lock poisoned".to_string())?;

        state
            .usage_totals
            .entry(attempt.provider.clone())
            .or_insert_with(|| ProviderUsageSummary {
                provider: attempt.provider.clone(),
                ..Default::default()
            })
            .add(attempt);

        if state.recent_usage.len() == USAGE_LOG_CAPACITY {
            state.recent_usage.pop_front();
        }
        state.recent_usage.push_back(attempt.clone());
        Ok(())
    }
}

#[async_trait]
impl UsageLogRepository for InMemoryStore {
    async fn summarize(&self) -> Result<Vec<ProviderUsageSummary>, AppError> {
        Ok(self.lock()?.usage_totals.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tenderdesk_core::hooks::AttemptOutcome;
    use tenderdesk_core::models::{
        Confidence, DocumentType, ExtractedData, ModuleType, NewDocument,
    };

    fn document() -> Document {
        NewDocument {
            name: "invoice.pdf".to_string(),
            original_name: "invoice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            detected_mime_type: Some("application/pdf".to_string()),
            size: 1024,
            storage_key: "documents/general/x-invoice.pdf".to_string(),
            url: "http://localhost/files/x-invoice.pdf".to_string(),
            document_type: DocumentType::Invoice,
            module_type: ModuleType::General,
            module_id: None,
            description: None,
            tags: vec![],
            uploaded_by_id: None,
        }
        .into_document(Uuid::new_v4(), Utc::now())
    }

    fn completed() -> CompletedExtraction {
        CompletedExtraction {
            provider: "anthropic".to_string(),
            model: "claude".to_string(),
            data: ExtractedData::default_for(ExtractionType::Invoice),
            confidence: Some(Confidence::new(Some(0.9), Default::default())),
            processing_time_ms: 42,
        }
    }

    async fn store_with_document() -> (InMemoryStore, Document) {
        let store = InMemoryStore::new();
        let doc = document();
        DocumentRepository::insert(&store, &doc).await.unwrap();
        (store, doc)
    }

    #[tokio::test]
    async fn test_claim_complete_then_cached() {
        let (store, doc) = store_with_document().await;

        let ClaimResult::Claimed(extraction) =
            store.claim(doc.id, ExtractionType::Invoice).await.unwrap()
        else {
            panic!("expected a fresh claim");
        };
        let current = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(current.status, DocumentStatus::Processing);

        let done = store.complete(extraction.id, &completed()).await.unwrap();
        assert_eq!(done.status, ExtractionStatus::Completed);
        let current = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(current.status, DocumentStatus::Processed);
        assert!(current.processed_at.is_some());

        match store.claim(doc.id, ExtractionType::Invoice).await.unwrap() {
            ClaimResult::Cached(cached) => assert_eq!(cached.id, extraction.id),
            other => panic!("expected cached, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_attempt_allows_retry() {
        let (store, doc) = store_with_document().await;

        let ClaimResult::Claimed(first) =
            store.claim(doc.id, ExtractionType::Invoice).await.unwrap()
        else {
            panic!("expected a fresh claim");
        };
        store.fail(first.id, "provider exhausted", 10).await.unwrap();
        let current = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(current.status, DocumentStatus::Failed);

        let ClaimResult::Claimed(second) =
            store.claim(doc.id, ExtractionType::Invoice).await.unwrap()
        else {
            panic!("failed attempts must not block a retry");
        };
        assert_ne!(first.id, second.id);

        let listed = store.list_for_document(doc.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].error_message.as_deref(), Some("provider exhausted"));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_single_winner() {
        let (store, doc) = store_with_document().await;
        let store = Arc::new(store);

        let claims = futures::future::join_all((0..16).map(|_| {
            let store = store.clone();
            async move { store.claim(doc.id, ExtractionType::Invoice).await.unwrap() }
        }))
        .await;

        let winners = claims
            .iter()
            .filter(|c| matches!(c, ClaimResult::Claimed(_)))
            .count();
        let in_progress = claims
            .iter()
            .filter(|c| matches!(c, ClaimResult::InProgress(_)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(in_progress, 15);
    }

    #[tokio::test]
    async fn test_types_are_claimed_independently() {
        let (store, doc) = store_with_document().await;
        assert!(matches!(
            store.claim(doc.id, ExtractionType::Invoice).await.unwrap(),
            ClaimResult::Claimed(_)
        ));
        assert!(matches!(
            store.claim(doc.id, ExtractionType::General).await.unwrap(),
            ClaimResult::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_claim_unknown_document() {
        let store = InMemoryStore::new();
        let err = store
            .claim(Uuid::new_v4(), ExtractionType::General)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fail_interrupted_resets_processing() {
        let (store, doc) = store_with_document().await;
        store.claim(doc.id, ExtractionType::Invoice).await.unwrap();

        assert_eq!(store.fail_interrupted().await.unwrap(), 1);
        let current = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(current.status, DocumentStatus::Failed);
        assert!(matches!(
            store.claim(doc.id, ExtractionType::Invoice).await.unwrap(),
            ClaimResult::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_usage_summary_groups_by_provider() {
        let store = InMemoryStore::new();
        for (provider, outcome) in [
            ("openai", AttemptOutcome::Error),
            ("anthropic", AttemptOutcome::Timeout),
            ("openai", AttemptOutcome::Success),
        ] {
            store
                .record_attempt(&ProviderAttempt {
                    document_id: None,
                    provider: provider.to_string(),
                    model: "m".to_string(),
                    extraction_type: ExtractionType::General,
                    outcome,
                    error: None,
                    input_tokens: 10,
                    output_tokens: 5,
                    latency_ms: 100,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let summary = store.summarize().await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].provider, "anthropic");
        assert_eq!(summary[0].timeouts, 1);
        assert_eq!(summary[1].attempts, 2);
        assert_eq!(summary[1].successes, 1);
        assert_eq!(summary[1].errors, 1);
        assert_eq!(store.usage_log().len(), 3);
    }

    #[tokio::test]
    async fn test_usage_log_is_bounded_but_totals_are_exact() {
        let store = InMemoryStore::new();
        let total = USAGE_LOG_CAPACITY + 25;
        for i in 0..total {
            store
                .record_attempt(&ProviderAttempt {
                    document_id: None,
                    provider: "gemini".to_string(),
                    model: "m".to_string(),
                    extraction_type: ExtractionType::General,
                    outcome: AttemptOutcome::Success,
                    error: None,
                    input_tokens: 1,
                    output_tokens: 1,
                    latency_ms: i as u64,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let log = store.usage_log();
        assert_eq!(log.len(), USAGE_LOG_CAPACITY);
        assert_eq!(log[0].latency_ms, 25);

        let summary = store.summarize().await.unwrap();
        assert_eq!(summary[0].attempts, total as i64);
        assert_eq!(summary[0].input_tokens, total as i64);
    }
}
