//! Single-document extraction pipeline
//!
//! extract content -> provider chain -> parse -> route. The pipeline holds no
//! persistent state; the orchestrator and the batch processor both drive it.

use std::sync::Arc;

use tenderdesk_core::models::{Confidence, ExtractedData, ExtractionType, ReviewDecision};
use tenderdesk_core::{AppError, ExtractionConfig};
use tenderdesk_processing::{ContentExtractor, EncodedImage};
use tenderdesk_providers::prompt::instruction_for;
use tenderdesk_providers::{FallbackChain, ProviderInput, ProviderRequest};
use uuid::Uuid;

use crate::parser::parse_output;
use crate::review::route;

/// One document's bytes and what to extract from them.
#[derive(Debug, Clone)]
pub struct PipelineInput<'a> {
    pub document_id: Option<Uuid>,
    pub data: &'a [u8],
    pub mime_type: &'a str,
    /// Stored URL, forwarded to vision providers next to the inline bytes.
    pub url: Option<&'a str>,
    pub extraction_type: ExtractionType,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub provider: String,
    pub model: String,
    pub data: ExtractedData,
    pub confidence: Option<Confidence>,
    pub review: ReviewDecision,
    pub warnings: Vec<String>,
    pub used_vision: bool,
}

pub struct ExtractionPipeline {
    extractor: ContentExtractor,
    chain: Arc<FallbackChain>,
    review_threshold: f64,
    max_tokens: u32,
}

impl ExtractionPipeline {
    pub fn new(
        extractor: ContentExtractor,
        chain: Arc<FallbackChain>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            extractor,
            chain,
            review_threshold: config.review_threshold,
            max_tokens: config.max_tokens,
        }
    }

    pub fn from_config(chain: Arc<FallbackChain>, config: &ExtractionConfig) -> Self {
        Self::new(ContentExtractor::new(config.min_text_chars), chain, config)
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    #[tracing::instrument(
        skip(self, input),
        fields(
            document_id = ?input.document_id,
            mime_type = %input.mime_type,
            extraction_type = %input.extraction_type
        )
    )]
    pub async fn run(&self, input: PipelineInput<'_>) -> Result<PipelineOutput, AppError> {
        let content = self.extractor.extract(input.data, input.mime_type).await;

        let provider_input = if content.sufficient {
            ProviderInput::Text(content.text)
        } else if input.mime_type.starts_with("text/") {
            return Err(AppError::InvalidInput(
                "Document contains no readable text".to_string(),
            ));
        } else {
            // Scanned PDFs, images and anything without a text layer go to a
            // vision provider as the original bytes.
            let encoded = content
                .images
                .into_iter()
                .next()
                .unwrap_or_else(|| EncodedImage::from_bytes(input.mime_type, input.data));
            ProviderInput::Document {
                media_type: encoded.media_type,
                data: Some(encoded.data),
                url: input.url.map(str::to_string),
            }
        };
        let used_vision = provider_input.is_vision();

        let request = ProviderRequest {
            document_id: input.document_id,
            extraction_type: input.extraction_type,
            instruction: instruction_for(input.extraction_type),
            input: provider_input,
            max_tokens: self.max_tokens,
        };

        let outcome = self.chain.run(&request).await?;
        let parsed = parse_output(&outcome.response.content, input.extraction_type);
        if !parsed.warnings.is_empty() {
            tracing::warn!(
                provider = %outcome.provider,
                warnings = ?parsed.warnings,
                "Provider output partially defaulted"
            );
        }

        let review = route(parsed.confidence.as_ref(), self.review_threshold);

        Ok(PipelineOutput {
            provider: outcome.provider,
            model: outcome.model,
            data: parsed.data,
            confidence: parsed.confidence,
            review,
            warnings: parsed.warnings,
            used_vision,
        })
    }
}
