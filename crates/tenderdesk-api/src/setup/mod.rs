//! Application setup and initialization
//!
//! Everything `main` needs to turn a `Config` into a running router, kept out
//! of the binary so the integration tests can build the same router.

pub mod database;
pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use tenderdesk_core::Config;
use tenderdesk_infra::{init_telemetry, LogFormat};
use tenderdesk_providers::build_chain;
use tenderdesk_storage::create_storage;

use crate::error::set_error_details;
use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    let log_format = config
        .log_format
        .parse::<LogFormat>()
        .map_err(|e| anyhow::anyhow!("Invalid LOG_FORMAT: {}", e))?;
    init_telemetry(log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    set_error_details(!config.is_production());

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let repositories = database::setup_repositories(&config).await?;

    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;

    let chain = build_chain(
        &config.providers,
        config.extraction.provider_timeout,
        repositories.recorder.clone(),
    )
    .context("Failed to build provider chain")?;

    tracing::info!(
        providers = chain.provider_count(),
        timeout_secs = chain.timeout().as_secs(),
        "Provider chain ready"
    );

    let state = Arc::new(AppState::new(
        config,
        repositories,
        storage,
        Arc::new(chain),
    ));
    let router = routes::build_router(state.clone());

    Ok((state, router))
}
