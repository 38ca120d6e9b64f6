//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs against the in-memory repositories, local storage in a temp
//! dir and scripted providers, so no database or network is needed.
//! Run with `cargo test -p tenderdesk-api`.

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use tempfile::TempDir;
use tenderdesk_api::constants;
use tenderdesk_api::setup::routes;
use tenderdesk_api::state::{AppState, Repositories};
use tenderdesk_core::{Config, StorageConfig, UploadConfig};
use tenderdesk_db::InMemoryStore;
use tenderdesk_providers::test_helpers::{MockProvider, Script};
use tenderdesk_providers::{AiProvider, FallbackChain};
use tenderdesk_storage::LocalStorage;

/// Test master API key (must match the config built in `setup_test_app`).
pub const TEST_MASTER_API_KEY: &str = "test-master-api-key-at-least-32-characters-long";

/// Provider reply with an overall confidence of 0.65, below the review threshold.
pub const INVOICE_JSON: &str = r#"{"invoiceNumber": "INV-2024-118", "supplier": "Pharma Distrib SARL", "currency": "MAD", "total": 4820.5, "confidence": {"overall": 0.65, "fields": {"total": 0.9}}}"#;

/// Provider reply with an overall confidence of 0.85.
pub const TENDER_JSON: &str = r#"{"reference": "AO-17/2024", "title": "Fourniture de consommables", "organization": "CHU Ibn Rochd", "items": [{"description": "Gants nitrile", "quantity": 500, "unit": "boite"}], "confidence": {"overall": 0.85, "fields": {}}}"#;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub fn bearer() -> String {
    format!("Bearer {}", TEST_MASTER_API_KEY)
}

/// Test application: server, the scripted provider behind it and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub provider: Arc<MockProvider>,
    pub store: Arc<InMemoryStore>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Setup a test app with one provider answering `script`.
pub async fn setup_test_app(script: Script) -> TestApp {
    let provider = Arc::new(MockProvider::new("alpha", script));
    let providers: Vec<Arc<dyn AiProvider>> = vec![provider.clone()];
    setup_test_app_with(provider, providers).await
}

/// Setup a test app around an explicit provider list; `provider` is the one the
/// returned `TestApp` exposes for call counting.
pub async fn setup_test_app_with(
    provider: Arc<MockProvider>,
    providers: Vec<Arc<dyn AiProvider>>,
) -> TestApp {
    build_test_app(provider, providers, UploadConfig::default()).await
}

/// Setup a test app with custom upload limits.
pub async fn setup_test_app_with_upload(script: Script, upload: UploadConfig) -> TestApp {
    let provider = Arc::new(MockProvider::new("alpha", script));
    let providers: Vec<Arc<dyn AiProvider>> = vec![provider.clone()];
    build_test_app(provider, providers, upload).await
}

async fn build_test_app(
    provider: Arc<MockProvider>,
    providers: Vec<Arc<dyn AiProvider>>,
    upload: UploadConfig,
) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let base_url = "http://localhost:3000/files".to_string();

    let config = Config {
        master_api_key: Some(TEST_MASTER_API_KEY.to_string()),
        storage: StorageConfig {
            local_path: temp_dir.path().to_string_lossy().to_string(),
            base_url: base_url.clone(),
        },
        upload,
        ..Config::default()
    };

    let storage = Arc::new(
        LocalStorage::new(temp_dir.path(), base_url)
            .await
            .expect("Failed to create local storage"),
    );

    let store = Arc::new(InMemoryStore::new());
    let repositories = Repositories::in_memory(store.clone());
    let chain = FallbackChain::new(
        providers,
        Duration::from_secs(5),
        repositories.recorder.clone(),
    );

    let state = Arc::new(AppState::new(
        config,
        repositories,
        storage,
        Arc::new(chain),
    ));
    let app = routes::build_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        provider,
        store,
        _temp_dir: temp_dir,
    }
}
