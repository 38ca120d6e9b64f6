//! Batch extraction from ZIP archives
//!
//! Every supported entry goes through validation and the pipeline on its own; a
//! failing entry is reported in its result slot and never aborts the batch. The
//! result list always has one slot per supported entry, in archive order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tenderdesk_core::models::{BatchFileResult, BatchResult, ExtractionType};
use tenderdesk_core::{AppError, ExtractionConfig, UploadConfig};
use tenderdesk_processing::{classify, ArchiveEntry, ArchiveReader, FileValidator};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{ExtractionPipeline, PipelineInput};

const CANCELLED_MESSAGE: &str = "Batch cancelled before this file was processed";

pub struct BatchProcessor {
    validator: FileValidator,
    archive: ArchiveReader,
    pipeline: Arc<ExtractionPipeline>,
    concurrency: usize,
    file_timeout: Duration,
}

impl BatchProcessor {
    pub fn new(
        validator: FileValidator,
        archive: ArchiveReader,
        pipeline: Arc<ExtractionPipeline>,
        concurrency: usize,
        file_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            archive,
            pipeline,
            concurrency: concurrency.max(1),
            file_timeout,
        }
    }

    pub fn from_config(
        upload: &UploadConfig,
        extraction: &ExtractionConfig,
        pipeline: Arc<ExtractionPipeline>,
    ) -> Self {
        let file_timeout = extraction.file_timeout(pipeline.chain().provider_count());
        Self::new(
            FileValidator::from_config(upload),
            ArchiveReader::from_config(upload),
            pipeline,
            extraction.batch_concurrency,
            file_timeout,
        )
    }

    /// Extract every supported entry of `archive`.
    ///
    /// Fails only when the archive itself is unacceptable. Once `cancel` fires no
    /// new entry is started; entries already running finish or time out.
    #[tracing::instrument(skip(self, archive, cancel), fields(archive_size = archive.len()))]
    pub async fn process(
        &self,
        archive: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, AppError> {
        let entries = self.archive.unpack_async(archive).await?;
        let total = entries.len();
        tracing::info!(
            files = total,
            concurrency = self.concurrency,
            file_timeout_secs = self.file_timeout.as_secs(),
            "Starting batch extraction"
        );

        let results: Vec<(BatchFileResult, bool)> = stream::iter(entries.into_iter().enumerate())
            .map(|(index, entry)| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (BatchFileResult::failure(index, entry.name, CANCELLED_MESSAGE), true);
                    }
                    (self.process_entry(index, entry).await, false)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let cancelled = results.iter().any(|(_, skipped)| *skipped);
        let result = BatchResult::from_results(
            results.into_iter().map(|(r, _)| r).collect(),
            cancelled,
        );

        tracing::info!(
            total = result.total_files,
            successful = result.successful,
            failed = result.failed,
            cancelled = result.cancelled,
            "Batch extraction finished"
        );
        Ok(result)
    }

    async fn process_entry(&self, index: usize, entry: ArchiveEntry) -> BatchFileResult {
        let started = Instant::now();

        if let Some(err) = entry.read_error {
            tracing::warn!(file_name = %entry.name, error = %err, "Archive entry unreadable");
            return BatchFileResult::failure(index, entry.name, format!("Unreadable entry: {}", err));
        }

        // The archive reader caps what it decompresses, so the declared size is
        // checked first.
        let checked = self
            .validator
            .validate_file_size(usize::try_from(entry.size).unwrap_or(usize::MAX))
            .and_then(|_| {
                self.validator
                    .validate(&entry.data, &entry.name, &entry.mime_type)
            });
        let validated = match checked {
            Ok(validated) => validated,
            Err(err) => {
                tracing::info!(file_name = %entry.name, rule = err.rule(), "Batch entry rejected");
                return BatchFileResult::failure(index, entry.name, err.to_string());
            }
        };

        let document_type = classify(&validated.sanitized_name, &validated.mime_type);
        let extraction_type = ExtractionType::for_document(document_type);

        let run = self.pipeline.run(PipelineInput {
            document_id: None,
            data: &entry.data,
            mime_type: &validated.mime_type,
            url: None,
            extraction_type,
        });
        let outcome = match tokio::time::timeout(self.file_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ExtractionTimeout {
                seconds: self.file_timeout.as_secs(),
            }),
        };
        let processing_time_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(output) => {
                tracing::info!(
                    file_name = %validated.sanitized_name,
                    provider = %output.provider,
                    processing_time_ms = processing_time_ms,
                    requires_review = output.review.requires_review,
                    "Batch entry extracted"
                );
                BatchFileResult {
                    index,
                    file_name: validated.sanitized_name,
                    document_type: Some(document_type),
                    success: true,
                    data: Some(output.data),
                    error: None,
                    confidence: output.confidence,
                    requires_review: output.review.requires_review,
                    review: Some(output.review),
                    provider: Some(output.provider),
                    processing_time_ms,
                }
            }
            Err(err) => {
                tracing::warn!(
                    file_name = %validated.sanitized_name,
                    processing_time_ms = processing_time_ms,
                    error = %err,
                    "Batch entry failed"
                );
                let mut result =
                    BatchFileResult::failure(index, validated.sanitized_name, err.to_string());
                result.document_type = Some(document_type);
                result.processing_time_ms = processing_time_ms;
                result
            }
        }
    }
}
