use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tenderdesk_core::models::{
    CompletedExtraction, DocumentStatus, Extraction, ExtractionStatus, ExtractionType,
};
use tenderdesk_core::AppError;
use uuid::Uuid;

use super::rows::{ExtractionRow, EXTRACTION_COLUMNS};
use super::transaction::TransactionGuard;
use super::{ClaimResult, ExtractionRepository, INTERRUPTED_MESSAGE};

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    #[sqlx(flatten)]
    extraction: ExtractionRow,
    claimed: bool,
}

#[derive(Clone)]
pub struct PgExtractionRepository {
    pool: PgPool,
}

impl PgExtractionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn active_for(
        &self,
        document_id: Uuid,
        extraction_type: ExtractionType,
    ) -> Result<Option<Extraction>, AppError> {
        let row = sqlx::query_as::<_, ExtractionRow>(&format!(
            "SELECT {} FROM extractions \
             WHERE document_id = $1 AND extraction_type = $2 \
             AND status IN ('PROCESSING', 'COMPLETED')",
            EXTRACTION_COLUMNS
        ))
        .bind(document_id)
        .bind(extraction_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Extraction::try_from).transpose()
    }

    /// Close an attempt and move its document to the matching terminal status
    /// in one transaction.
    async fn finish(
        &self,
        extraction_id: Uuid,
        update: FinishUpdate<'_>,
    ) -> Result<Extraction, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let now = Utc::now();

        let row = match update {
            FinishUpdate::Completed(result) => {
                sqlx::query_as::<_, ExtractionRow>(&format!(
                    "UPDATE extractions SET status = $2, provider = $3, model = $4, \
                     extracted_data = $5, confidence = $6, processing_time_ms = $7, \
                     error_message = NULL, completed_at = $8 \
                     WHERE id = $1 AND status = 'PROCESSING' RETURNING {}",
                    EXTRACTION_COLUMNS
                ))
                .bind(extraction_id)
                .bind(ExtractionStatus::Completed.as_str())
                .bind(&result.provider)
                .bind(&result.model)
                .bind(Json(&result.data))
                .bind(result.confidence.as_ref().map(Json))
                .bind(result.processing_time_ms)
                .bind(now)
                .fetch_optional(&mut **tx)
                .await?
            }
            FinishUpdate::Failed {
                error_message,
                processing_time_ms,
            } => {
                sqlx::query_as::<_, ExtractionRow>(&format!(
                    "UPDATE extractions SET status = $2, error_message = $3, \
                     processing_time_ms = $4, completed_at = $5 \
                     WHERE id = $1 AND status = 'PROCESSING' RETURNING {}",
                    EXTRACTION_COLUMNS
                ))
                .bind(extraction_id)
                .bind(ExtractionStatus::Failed.as_str())
                .bind(error_message)
                .bind(processing_time_ms)
                .bind(now)
                .fetch_optional(&mut **tx)
                .await?
            }
        };

        let row = row.ok_or_else(|| {
            AppError::Persistence(format!(
                "Extraction {} is not in PROCESSING state",
                extraction_id
            ))
        })?;

        let (document_status, processed_at) = match update {
            FinishUpdate::Completed(_) => (DocumentStatus::Processed, Some(now)),
            FinishUpdate::Failed { .. } => (DocumentStatus::Failed, None),
        };

        sqlx::query(
            "UPDATE documents SET status = $2, processed_at = COALESCE($3, processed_at) \
             WHERE id = $1",
        )
        .bind(row.document_id)
        .bind(document_status.as_str())
        .bind(processed_at)
        .execute(&mut **tx)
        .await?;

        tx.commit().await?;
        Extraction::try_from(row)
    }
}

#[derive(Clone, Copy)]
enum FinishUpdate<'a> {
    Completed(&'a CompletedExtraction),
    Failed {
        error_message: &'a str,
        processing_time_ms: i64,
    },
}

#[async_trait]
impl ExtractionRepository for PgExtractionRepository {
    #[tracing::instrument(skip(self), fields(db.table = "extractions", db.operation = "claim"))]
    async fn claim(
        &self,
        document_id: Uuid,
        extraction_type: ExtractionType,
    ) -> Result<ClaimResult, AppError> {
        // One statement: the insert either wins the partial unique index or
        // yields to the existing PROCESSING/COMPLETED row, and the document is
        // only touched when the insert happened.
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO extractions (id, document_id, extraction_type, status, created_at)
                VALUES ($1, $2, $3, 'PROCESSING', $4)
                ON CONFLICT (document_id, extraction_type)
                    WHERE status IN ('PROCESSING', 'COMPLETED')
                DO NOTHING
                RETURNING {cols}
            ),
            touched AS (
                UPDATE documents SET status = 'PROCESSING'
                WHERE id = $2 AND EXISTS (SELECT 1 FROM inserted)
                RETURNING id
            )
            SELECT {cols}, TRUE AS claimed FROM inserted
            UNION ALL
            SELECT {cols}, FALSE AS claimed FROM extractions
            WHERE document_id = $2 AND extraction_type = $3
              AND status IN ('PROCESSING', 'COMPLETED')
              AND NOT EXISTS (SELECT 1 FROM inserted)
            LIMIT 1
            "#,
            cols = EXTRACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(extraction_type.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        let (extraction, claimed) = match row {
            Some(row) => (Extraction::try_from(row.extraction)?, row.claimed),
            // The conflicting row committed after this statement's snapshot was
            // taken; a fresh read sees it.
            None => match self.active_for(document_id, extraction_type).await? {
                Some(existing) => (existing, false),
                None => {
                    return Err(AppError::Persistence(format!(
                        "Could not claim extraction for document {}",
                        document_id
                    )))
                }
            },
        };

        Ok(match (claimed, extraction.status) {
            (true, _) => ClaimResult::Claimed(extraction),
            (false, ExtractionStatus::Completed) => ClaimResult::Cached(extraction),
            (false, _) => ClaimResult::InProgress(extraction),
        })
    }

    #[tracing::instrument(skip(self, result), fields(db.table = "extractions", db.operation = "update"))]
    async fn complete(
        &self,
        extraction_id: Uuid,
        result: &CompletedExtraction,
    ) -> Result<Extraction, AppError> {
        self.finish(extraction_id, FinishUpdate::Completed(result))
            .await
    }

    #[tracing::instrument(skip(self, error_message), fields(db.table = "extractions", db.operation = "update"))]
    async fn fail(
        &self,
        extraction_id: Uuid,
        error_message: &str,
        processing_time_ms: i64,
    ) -> Result<Extraction, AppError> {
        self.finish(
            extraction_id,
            FinishUpdate::Failed {
                error_message,
                processing_time_ms,
            },
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "extractions", db.operation = "select"))]
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Extraction>, AppError> {
        let rows = sqlx::query_as::<_, ExtractionRow>(&format!(
            "SELECT {} FROM extractions WHERE document_id = $1 \
             ORDER BY created_at DESC, id DESC",
            EXTRACTION_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Extraction::try_from).collect()
    }

    async fn fail_interrupted(&self) -> Result<u64, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let document_ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE extractions SET status = 'FAILED', error_message = $1, completed_at = NOW() \
             WHERE status = 'PROCESSING' RETURNING document_id",
        )
        .bind(INTERRUPTED_MESSAGE)
        .fetch_all(&mut **tx)
        .await?;

        if !document_ids.is_empty() {
            sqlx::query(
                "UPDATE documents SET status = 'FAILED' \
                 WHERE id = ANY($1) AND status = 'PROCESSING'",
            )
            .bind(&document_ids)
            .execute(&mut **tx)
            .await?;
        }

        tx.commit().await?;
        Ok(document_ids.len() as u64)
    }
}
