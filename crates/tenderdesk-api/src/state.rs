//! Application state shared by every handler.

use std::sync::Arc;

use tenderdesk_core::hooks::UsageRecorder;
use tenderdesk_core::{Config, UploadConfig};
use tenderdesk_db::{
    DocumentRepository, ExtractionRepository, InMemoryStore, UsageLogRepository,
};
use tenderdesk_extraction::{BatchProcessor, ExtractionOrchestrator, ExtractionPipeline};
use tenderdesk_processing::FileValidator;
use tenderdesk_providers::FallbackChain;
use tenderdesk_storage::Storage;
use tokio_util::sync::CancellationToken;

/// Repository handles, backed either by PostgreSQL or by one in-memory store.
#[derive(Clone)]
pub struct Repositories {
    pub documents: Arc<dyn DocumentRepository>,
    pub extractions: Arc<dyn ExtractionRepository>,
    pub usage: Arc<dyn UsageLogRepository>,
    /// Same log as `usage`, seen through the trait the provider chain writes to.
    pub recorder: Arc<dyn UsageRecorder>,
    pub backend: &'static str,
}

impl Repositories {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            documents: store.clone(),
            extractions: store.clone(),
            usage: store.clone(),
            recorder: store,
            backend: "memory",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<dyn DocumentRepository>,
    pub extractions: Arc<dyn ExtractionRepository>,
    pub usage: Arc<dyn UsageLogRepository>,
    pub database_backend: &'static str,
    pub storage: Arc<dyn Storage>,
    pub validator: FileValidator,
    pub chain: Arc<FallbackChain>,
    pub orchestrator: ExtractionOrchestrator,
    pub batch: Arc<BatchProcessor>,
    /// Root token cancelled on shutdown; batch runs observe child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the extraction services around already-built repositories, storage
    /// and provider chain.
    pub fn new(
        config: Config,
        repositories: Repositories,
        storage: Arc<dyn Storage>,
        chain: Arc<FallbackChain>,
    ) -> Self {
        let pipeline = Arc::new(ExtractionPipeline::from_config(
            chain.clone(),
            &config.extraction,
        ));
        let orchestrator = ExtractionOrchestrator::new(
            repositories.documents.clone(),
            repositories.extractions.clone(),
            storage.clone(),
            pipeline.clone(),
        );
        let batch = Arc::new(BatchProcessor::from_config(
            &config.upload,
            &config.extraction,
            pipeline,
        ));

        Self {
            validator: FileValidator::from_config(&config.upload),
            config: Arc::new(config),
            documents: repositories.documents,
            extractions: repositories.extractions,
            usage: repositories.usage,
            database_backend: repositories.backend,
            storage,
            chain,
            orchestrator,
            batch,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.config.upload
    }
}
