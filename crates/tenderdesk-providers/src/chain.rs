//! Provider fallback chain
//!
//! Providers are tried in configured order. A provider that times out or fails
//! is never retried; the chain moves on to the next capable provider. Every
//! attempt is reported to the usage recorder whatever its outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tenderdesk_core::hooks::{AttemptOutcome, ProviderAttempt, UsageRecorder};
use tenderdesk_core::AppError;
use tenderdesk_infra::RateLimiter;

use crate::provider::{
    AiProvider, ProviderError, ProviderInfo, ProviderInput, ProviderRequest, ProviderResponse,
};

/// Result of a successful chain run.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub provider: String,
    pub model: String,
    pub response: ProviderResponse,
    pub latency_ms: u64,
    /// Every attempt made, in order, the successful one last.
    pub attempts: Vec<ProviderAttempt>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("No AI provider could complete the extraction: {hint}")]
    Exhausted {
        hint: String,
        attempts: Vec<ProviderAttempt>,
    },
}

impl ChainError {
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            ChainError::Exhausted { attempts, .. } => attempts,
        }
    }
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Exhausted { hint, .. } => AppError::ProviderExhausted { hint },
        }
    }
}

pub struct FallbackChain {
    providers: Vec<Arc<dyn AiProvider>>,
    timeout: Duration,
    limiter: Option<Arc<RateLimiter>>,
    recorder: Arc<dyn UsageRecorder>,
}

impl FallbackChain {
    pub fn new(
        providers: Vec<Arc<dyn AiProvider>>,
        timeout: Duration,
        recorder: Arc<dyn UsageRecorder>,
    ) -> Self {
        Self {
            providers,
            timeout,
            limiter: None,
            recorder,
        }
    }

    /// Share a per-provider call-rate limiter across every run of this chain.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Configured providers in chain order.
    pub fn describe(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(|p| p.info()).collect()
    }

    pub async fn run(&self, request: &ProviderRequest) -> Result<ChainOutcome, ChainError> {
        let capable: Vec<&Arc<dyn AiProvider>> = self
            .providers
            .iter()
            .filter(|p| p.capabilities().supports(&request.input))
            .collect();

        if capable.is_empty() {
            let hint = missing_capability_hint(&request.input, self.providers.is_empty());
            tracing::warn!(
                document_id = ?request.document_id,
                media_type = %request.input.media_type(),
                hint = %hint,
                "No capable AI provider for request"
            );
            return Err(ChainError::Exhausted {
                hint,
                attempts: Vec::new(),
            });
        }

        let mut attempts = Vec::with_capacity(capable.len());
        let mut failures = Vec::with_capacity(capable.len());

        for provider in capable {
            if let Some(limiter) = &self.limiter {
                limiter.acquire(provider.name()).await;
            }

            let started = Instant::now();
            let result = match tokio::time::timeout(self.timeout, provider.invoke(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            let attempt = attempt_record(provider.as_ref(), request, &result, latency_ms);
            self.record(&attempt).await;
            attempts.push(attempt);

            match result {
                Ok(response) => {
                    tracing::info!(
                        document_id = ?request.document_id,
                        provider = %provider.name(),
                        model = %provider.model(),
                        latency_ms = latency_ms,
                        input_tokens = response.input_tokens,
                        output_tokens = response.output_tokens,
                        "AI provider call succeeded"
                    );
                    return Ok(ChainOutcome {
                        provider: provider.name().to_string(),
                        model: provider.model().to_string(),
                        response,
                        latency_ms,
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        document_id = ?request.document_id,
                        provider = %provider.name(),
                        model = %provider.model(),
                        latency_ms = latency_ms,
                        error = %err,
                        "AI provider call failed, falling back"
                    );
                    failures.push(format!("{}: {}", provider.name(), err));
                }
            }
        }

        Err(ChainError::Exhausted {
            hint: format!(
                "all configured providers failed ({}); retry later or configure another provider",
                failures.join("; ")
            ),
            attempts,
        })
    }

    async fn record(&self, attempt: &ProviderAttempt) {
        if let Err(e) = self.recorder.record_attempt(attempt).await {
            tracing::warn!(
                provider = %attempt.provider,
                error = %e,
                "Failed to record provider usage"
            );
        }
    }
}

fn attempt_record(
    provider: &dyn AiProvider,
    request: &ProviderRequest,
    result: &Result<ProviderResponse, ProviderError>,
    latency_ms: u64,
) -> ProviderAttempt {
    let (outcome, error, input_tokens, output_tokens) = match result {
        Ok(r) => (AttemptOutcome::Success, None, r.input_tokens, r.output_tokens),
        Err(e @ ProviderError::Timeout(_)) => (AttemptOutcome::Timeout, Some(e.to_string()), 0, 0),
        Err(e) => (AttemptOutcome::Error, Some(e.to_string()), 0, 0),
    };

    ProviderAttempt {
        document_id: request.document_id,
        provider: provider.name().to_string(),
        model: provider.model().to_string(),
        extraction_type: request.extraction_type,
        outcome,
        error,
        input_tokens,
        output_tokens,
        latency_ms,
        created_at: Utc::now(),
    }
}

fn missing_capability_hint(input: &ProviderInput, none_configured: bool) -> String {
    if none_configured {
        return "no AI provider configured; set ANTHROPIC_API_KEY, OPENAI_API_KEY or GEMINI_API_KEY"
            .to_string();
    }
    match input.media_type() {
        "application/pdf" => {
            "no vision-capable provider configured for scanned PDFs; configure Anthropic or Gemini"
                .to_string()
        }
        m if m.starts_with("image/") => {
            "no vision-capable provider configured for images; configure Anthropic, OpenAI or Gemini"
                .to_string()
        }
        "text/plain" => "no text-capable provider configured".to_string(),
        other => format!(
            "no configured provider can read {}; convert the document to PDF and upload it again",
            other
        ),
    }
}
