//! Scripted providers and an in-memory usage recorder for tests.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `test-helpers` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tenderdesk_core::hooks::{ProviderAttempt, UsageRecorder};

use crate::provider::{
    AiProvider, ProviderCapabilities, ProviderError, ProviderRequest, ProviderResponse,
};

/// What a [`MockProvider`] does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(String),
    Fail(ProviderError),
    /// Never completes; only a chain timeout ends the call.
    Hang,
}

pub struct MockProvider {
    name: String,
    model: String,
    capabilities: ProviderCapabilities,
    script: Mutex<Script>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl MockProvider {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            model: format!("{}-model", name),
            capabilities: ProviderCapabilities {
                text: true,
                image_vision: true,
                pdf_vision: true,
            },
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn text_only(mut self) -> Self {
        self.capabilities = ProviderCapabilities {
            text: true,
            image_vision: false,
            pdf_vision: false,
        };
        self
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Respond(content) => Ok(ProviderResponse {
                content,
                input_tokens: 100,
                output_tokens: 20,
            }),
            Script::Fail(err) => Err(err),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Keeps every recorded attempt in memory.
#[derive(Default)]
pub struct RecordingUsageRecorder {
    attempts: tokio::sync::Mutex<Vec<ProviderAttempt>>,
    fail: bool,
}

impl RecordingUsageRecorder {
    /// A recorder whose writes always fail.
    pub fn failing() -> Self {
        Self {
            attempts: Default::default(),
            fail: true,
        }
    }

    pub async fn attempts(&self) -> Vec<ProviderAttempt> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait]
impl UsageRecorder for RecordingUsageRecorder {
    async fn record_attempt(&self, attempt: &ProviderAttempt) -> Result<(), String> {
        if self.fail {
            return Err("usage log unavailable".to_string());
        }
        self.attempts.lock().await.push(attempt.clone());
        Ok(())
    }
}
