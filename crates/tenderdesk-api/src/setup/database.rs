//! Database setup and initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use tenderdesk_core::Config;
use tenderdesk_db::{
    create_pool, run_migrations, ExtractionRepository, InMemoryStore, PgDocumentRepository,
    PgExtractionRepository, PgUsageLogRepository,
};

use crate::state::Repositories;

/// Connect to PostgreSQL and run migrations, or fall back to the in-memory store
/// when no `DATABASE_URL` is configured.
pub async fn setup_repositories(config: &Config) -> Result<Repositories> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory repositories, data is lost on restart");
        return Ok(Repositories::in_memory(Arc::new(InMemoryStore::new())));
    };

    tracing::info!("Connecting to database...");
    let pool = create_pool(database_url, config.db_max_connections).await?;
    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let extractions = Arc::new(PgExtractionRepository::new(pool.clone()));

    // A PROCESSING row left by a previous process would block its pair forever.
    let interrupted = extractions
        .fail_interrupted()
        .await
        .context("Failed to release interrupted extractions")?;
    if interrupted > 0 {
        tracing::warn!(
            count = interrupted,
            "Marked extractions interrupted by a restart as failed"
        );
    }

    let usage = Arc::new(PgUsageLogRepository::new(pool.clone()));

    Ok(Repositories {
        documents: Arc::new(PgDocumentRepository::new(pool)),
        extractions,
        usage: usage.clone(),
        recorder: usage,
        backend: "postgres",
    })
}
