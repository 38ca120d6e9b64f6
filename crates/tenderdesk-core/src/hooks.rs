//! Hooks for recording provider usage
//!
//! The fallback chain reports every provider attempt through [`UsageRecorder`].
//! The database crate persists them; tests and deployments without a database use
//! the no-op recorder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ExtractionType;

/// How a single provider attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Error => "error",
        }
    }
}

/// One provider invocation, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderAttempt {
    pub document_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub extraction_type: ExtractionType,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Aggregated usage of one provider, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsageSummary {
    pub provider: String,
    pub attempts: i64,
    pub successes: i64,
    pub timeouts: i64,
    pub errors: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub avg_latency_ms: f64,
}

impl ProviderUsageSummary {
    /// Fold one attempt into the running totals.
    pub fn add(&mut self, attempt: &ProviderAttempt) {
        let previous = self.attempts as f64;
        self.attempts += 1;
        match attempt.outcome {
            AttemptOutcome::Success => self.successes += 1,
            AttemptOutcome::Timeout => self.timeouts += 1,
            AttemptOutcome::Error => self.errors += 1,
        }
        self.input_tokens += i64::from(attempt.input_tokens);
        self.output_tokens += i64::from(attempt.output_tokens);
        self.avg_latency_ms =
            (self.avg_latency_ms * previous + attempt.latency_ms as f64) / self.attempts as f64;
    }
}

#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Persist one attempt. Failures are reported to the caller, which logs them
    /// without affecting the extraction.
    async fn record_attempt(&self, attempt: &ProviderAttempt) -> Result<(), String>;
}

/// Recorder that drops every attempt.
pub struct NoOpUsageRecorder;

#[async_trait]
impl UsageRecorder for NoOpUsageRecorder {
    async fn record_attempt(&self, _attempt: &ProviderAttempt) -> Result<(), String> {
        Ok(())
    }
}
