use async_trait::async_trait;
use sqlx::PgPool;
use tenderdesk_core::models::Document;
use tenderdesk_core::AppError;
use uuid::Uuid;

use super::rows::{DocumentRow, DOCUMENT_COLUMNS};
use super::DocumentRepository;

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    #[tracing::instrument(skip(self, document), fields(
        db.table = "documents",
        db.operation = "insert",
        document_id = %document.id
    ))]
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, name, original_name, mime_type, detected_mime_type, size,
                storage_key, url, document_type, module_type, module_id,
                description, tags, status, uploaded_by_id, created_at, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(document.id)
        .bind(&document.name)
        .bind(&document.original_name)
        .bind(&document.mime_type)
        .bind(&document.detected_mime_type)
        .bind(document.size)
        .bind(&document.storage_key)
        .bind(&document.url)
        .bind(document.document_type.as_str())
        .bind(document.module_type.as_str())
        .bind(document.module_id)
        .bind(&document.description)
        .bind(&document.tags)
        .bind(document.status.as_str())
        .bind(&document.uploaded_by_id)
        .bind(document.created_at)
        .bind(document.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert document");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }
}
