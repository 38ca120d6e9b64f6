//! OpenAI Chat Completions adapter
//!
//! Images are sent inline as data URIs. The chat endpoint does not read PDF
//! files, so scanned PDFs are left to other providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, send_json};
use crate::provider::{
    AiProvider, ProviderCapabilities, ProviderError, ProviderInput, ProviderRequest,
    ProviderResponse,
};

pub struct OpenAiProvider {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn user_content(input: &ProviderInput) -> Result<Vec<ContentPart<'_>>, ProviderError> {
        match input {
            ProviderInput::Text(text) => Ok(vec![ContentPart::Text { text }]),
            ProviderInput::Document {
                media_type,
                data,
                url,
            } if media_type.starts_with("image/") => {
                let url = match (data, url) {
                    (Some(data), _) => format!("data:{};base64,{}", media_type, data),
                    (None, Some(url)) => url.clone(),
                    (None, None) => {
                        return Err(ProviderError::Unsupported(
                            "image has neither inline data nor URL".to_string(),
                        ))
                    }
                };
                Ok(vec![
                    ContentPart::Text {
                        text: "The document is attached as an image.",
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url },
                    },
                ])
            }
            ProviderInput::Document { media_type, .. } => Err(ProviderError::Unsupported(
                format!("OpenAI chat cannot read {}", media_type),
            )),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            text: true,
            image_vision: true,
            pdf_vision: false,
        }
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ContentPart::Text {
                        text: &request.instruction,
                    }],
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_content(&request.input)?,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let parsed: ChatResponse = send_json(
            self.http_client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response contained no message".to_string())
            })?;

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(ProviderResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tenderdesk_core::models::ExtractionType;

    fn request(input: ProviderInput) -> ProviderRequest {
        ProviderRequest {
            document_id: None,
            extraction_type: ExtractionType::Expense,
            instruction: "Extract the receipt".to_string(),
            input,
            max_tokens: 512,
        }
    }

    #[tokio::test]
    async fn test_invoke_sends_image_as_data_uri() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test-openai-key")
            .match_body(Matcher::Regex(
                r#""url":"data:image/png;base64,iVBORw0=""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"{\"merchant\":\"Pharma Plus\"}"}}],"usage":{"prompt_tokens":50,"completion_tokens":12}}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiProvider::new(
            "sk-test-openai-key".to_string(),
            "gpt-test".to_string(),
            server.url(),
        )
        .unwrap();

        let response = provider
            .invoke(&request(ProviderInput::Document {
                media_type: "image/png".to_string(),
                data: Some("iVBORw0=".to_string()),
                url: None,
            }))
            .await
            .unwrap();

        assert_eq!(response.content, r#"{"merchant":"Pharma Plus"}"#);
        assert_eq!(response.input_tokens, 50);
        assert_eq!(response.output_tokens, 12);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("key".to_string(), "m".to_string(), server.url()).unwrap();
        let err = provider
            .invoke(&request(ProviderInput::Text("receipt".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_pdf_is_not_supported() {
        let provider = OpenAiProvider::new(
            "key".to_string(),
            "m".to_string(),
            "http://127.0.0.1:9".to_string(),
        )
        .unwrap();
        let pdf = ProviderInput::Document {
            media_type: "application/pdf".to_string(),
            data: Some("JVBERg==".to_string()),
            url: None,
        };
        assert!(!provider.capabilities().supports(&pdf));
        assert!(OpenAiProvider::user_content(&pdf).is_err());
    }
}
