use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tenderdesk_core::hooks::UsageRecorder;
use tenderdesk_core::{ProviderKind, ProvidersConfig};
use tenderdesk_infra::RateLimiter;

use crate::anthropic::AnthropicProvider;
use crate::chain::FallbackChain;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use crate::provider::AiProvider;

/// Build the fallback chain once at startup. Providers without usable
/// credentials are left out entirely.
pub fn build_chain(
    config: &ProvidersConfig,
    timeout: Duration,
    recorder: Arc<dyn UsageRecorder>,
) -> anyhow::Result<FallbackChain> {
    let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

    for kind in config.configured() {
        let creds = config.credentials(kind);
        let Some(api_key) = creds.api_key.clone() else {
            continue;
        };
        let provider: Arc<dyn AiProvider> = match kind {
            ProviderKind::Anthropic => Arc::new(
                AnthropicProvider::new(api_key, creds.model.clone(), creds.base_url.clone())
                    .context("Failed to create Anthropic provider")?,
            ),
            ProviderKind::OpenAi => Arc::new(
                OpenAiProvider::new(api_key, creds.model.clone(), creds.base_url.clone())
                    .context("Failed to create OpenAI provider")?,
            ),
            ProviderKind::Gemini => Arc::new(
                GeminiProvider::new(api_key, creds.model.clone(), creds.base_url.clone())
                    .context("Failed to create Gemini provider")?,
            ),
        };
        tracing::info!(provider = %kind, model = %creds.model, "AI provider enabled");
        providers.push(provider);
    }

    if providers.is_empty() {
        tracing::warn!("No AI provider configured; extraction requests will fail");
    }

    let mut chain = FallbackChain::new(providers, timeout, recorder);
    if config.rate_limit_per_minute > 0 {
        chain = chain.with_rate_limiter(Arc::new(RateLimiter::per_minute(
            config.rate_limit_per_minute,
        )));
    }
    Ok(chain)
}
