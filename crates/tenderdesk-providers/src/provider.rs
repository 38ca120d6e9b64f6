//! Provider abstraction
//!
//! Every AI backend is reached through [`AiProvider`]. Adapters translate a
//! [`ProviderRequest`] into their wire format and return raw model text; parsing
//! the text into structured data happens elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tenderdesk_core::models::ExtractionType;
use uuid::Uuid;

/// What kinds of input a provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub text: bool,
    pub image_vision: bool,
    pub pdf_vision: bool,
}

impl ProviderCapabilities {
    pub fn supports(&self, input: &ProviderInput) -> bool {
        match input {
            ProviderInput::Text(_) => self.text,
            ProviderInput::Document { media_type, .. } if media_type.starts_with("image/") => {
                self.image_vision
            }
            ProviderInput::Document { media_type, .. } if media_type == "application/pdf" => {
                self.pdf_vision
            }
            ProviderInput::Document { .. } => false,
        }
    }
}

/// Content sent to the provider together with the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderInput {
    /// Extracted text layer.
    Text(String),
    /// The raw document for vision models: inline base64 data, a URL, or both.
    Document {
        media_type: String,
        data: Option<String>,
        url: Option<String>,
    },
}

impl ProviderInput {
    pub fn media_type(&self) -> &str {
        match self {
            ProviderInput::Text(_) => "text/plain",
            ProviderInput::Document { media_type, .. } => media_type,
        }
    }

    pub fn is_vision(&self) -> bool {
        matches!(self, ProviderInput::Document { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Only used to attribute usage log entries.
    pub document_id: Option<Uuid>,
    pub extraction_type: ExtractionType,
    pub instruction: String,
    pub input: ProviderInput,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Static description of a configured provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable provider name, used as rate-limit key and in usage logs.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Run one completion. Implementations must not retry internally.
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            model: self.model().to_string(),
            capabilities: self.capabilities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(media_type: &str) -> ProviderInput {
        ProviderInput::Document {
            media_type: media_type.to_string(),
            data: Some("AAAA".to_string()),
            url: None,
        }
    }

    #[test]
    fn test_capabilities_gate_inputs() {
        let text_only = ProviderCapabilities {
            text: true,
            image_vision: false,
            pdf_vision: false,
        };
        assert!(text_only.supports(&ProviderInput::Text("x".to_string())));
        assert!(!text_only.supports(&document("image/png")));

        let images = ProviderCapabilities {
            text: true,
            image_vision: true,
            pdf_vision: false,
        };
        assert!(images.supports(&document("image/jpeg")));
        assert!(!images.supports(&document("application/pdf")));

        let all = ProviderCapabilities {
            text: true,
            image_vision: true,
            pdf_vision: true,
        };
        assert!(all.supports(&document("application/pdf")));
        assert!(!all.supports(&document("application/msword")));
    }
}
