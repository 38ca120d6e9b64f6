//! Anthropic Messages API adapter

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, send_json};
use crate::provider::{
    AiProvider, ProviderCapabilities, ProviderError, ProviderInput, ProviderRequest,
    ProviderResponse,
};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Debug for AnthropicProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<MessageParam<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageParam<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: Source<'a> },
    Document { source: Source<'a> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Source<'a> {
    Base64 { media_type: &'a str, data: &'a str },
    Url { url: &'a str },
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlockResponse>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn content_blocks<'a>(
        request: &'a ProviderRequest,
    ) -> Result<Vec<ContentBlock<'a>>, ProviderError> {
        let mut blocks = Vec::with_capacity(2);
        match &request.input {
            ProviderInput::Text(text) => blocks.push(ContentBlock::Text { text }),
            ProviderInput::Document {
                media_type,
                data,
                url,
            } => {
                let source = match (data, url) {
                    (Some(data), _) => Source::Base64 { media_type, data },
                    (None, Some(url)) => Source::Url { url },
                    (None, None) => {
                        return Err(ProviderError::Unsupported(
                            "document has neither inline data nor URL".to_string(),
                        ))
                    }
                };
                if media_type.starts_with("image/") {
                    blocks.push(ContentBlock::Image { source });
                } else if media_type == "application/pdf" {
                    blocks.push(ContentBlock::Document { source });
                } else {
                    return Err(ProviderError::Unsupported(format!(
                        "Anthropic cannot read {}",
                        media_type
                    )));
                }
            }
        }
        blocks.push(ContentBlock::Text {
            text: "Extract the data as instructed and reply with the JSON object only.",
        });
        Ok(blocks)
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            text: true,
            image_vision: true,
            pdf_vision: true,
        }
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.instruction,
            messages: vec![MessageParam {
                role: "user",
                content: Self::content_blocks(request)?,
            }],
        };

        let parsed: MessagesResponse = send_json(
            self.http_client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body),
        )
        .await?;

        let content: String = parsed
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        Ok(ProviderResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
