use async_trait::async_trait;
use sqlx::PgPool;
use tenderdesk_core::hooks::{ProviderAttempt, ProviderUsageSummary, UsageRecorder};
use tenderdesk_core::AppError;

use super::UsageLogRepository;

/// Persists every provider attempt made by the fallback chain.
#[derive(Clone)]
pub struct PgUsageLogRepository {
    pool: PgPool,
}

impl PgUsageLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    provider: String,
    attempts: i64,
    successes: i64,
    timeouts: i64,
    errors: i64,
    input_tokens: i64,
    output_tokens: i64,
    avg_latency_ms: f64,
}

#[async_trait]
impl UsageRecorder for PgUsageLogRepository {
    async fn record_attempt(&self, attempt: &ProviderAttempt) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO provider_usage (
                document_id, provider, model, extraction_type, outcome, error,
                input_tokens, output_tokens, latency_ms, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(attempt.document_id)
        .bind(&attempt.provider)
        .bind(&attempt.model)
        .bind(attempt.extraction_type.as_str())
        .bind(attempt.outcome.as_str())
        .bind(&attempt.error)
        .bind(attempt.input_tokens as i32)
        .bind(attempt.output_tokens as i32)
        .bind(attempt.latency_ms as i64)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert provider usage: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl UsageLogRepository for PgUsageLogRepository {
    #[tracing::instrument(skip(self), fields(db.table = "provider_usage", db.operation = "aggregate"))]
    async fn summarize(&self) -> Result<Vec<ProviderUsageSummary>, AppError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                provider,
                COUNT(*) AS attempts,
                COUNT(*) FILTER (WHERE outcome = 'success') AS successes,
                COUNT(*) FILTER (WHERE outcome = 'timeout') AS timeouts,
                COUNT(*) FILTER (WHERE outcome = 'error') AS errors,
                COALESCE(SUM(input_tokens), 0)::BIGINT AS input_tokens,
                COALESCE(SUM(output_tokens), 0)::BIGINT AS output_tokens,
                COALESCE(AVG(latency_ms), 0)::DOUBLE PRECISION AS avg_latency_ms
            FROM provider_usage
            GROUP BY provider
            ORDER BY provider
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProviderUsageSummary {
                provider: r.provider,
                attempts: r.attempts,
                successes: r.successes,
                timeouts: r.timeouts,
                errors: r.errors,
                input_tokens: r.input_tokens,
                output_tokens: r.output_tokens,
                avg_latency_ms: r.avg_latency_ms,
            })
            .collect())
    }
}
