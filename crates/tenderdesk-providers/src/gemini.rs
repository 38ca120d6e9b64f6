//! Google Gemini generateContent adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, send_json};
use crate::provider::{
    AiProvider, ProviderCapabilities, ProviderError, ProviderInput, ProviderRequest,
    ProviderResponse,
};

pub struct GeminiProvider {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
    FileData { file_data: FileData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parts(input: &ProviderInput) -> Result<Vec<GeminiPart<'_>>, ProviderError> {
        match input {
            ProviderInput::Text(text) => Ok(vec![GeminiPart::Text { text }]),
            ProviderInput::Document {
                media_type,
                data,
                url,
            } => {
                if !media_type.starts_with("image/") && media_type != "application/pdf" {
                    return Err(ProviderError::Unsupported(format!(
                        "Gemini cannot read {}",
                        media_type
                    )));
                }
                let part = match (data, url) {
                    (Some(data), _) => GeminiPart::InlineData {
                        inline_data: InlineData { mime_type: media_type, data },
                    },
                    (None, Some(url)) => GeminiPart::FileData {
                        file_data: FileData {
                            mime_type: media_type,
                            file_uri: url,
                        },
                    },
                    (None, None) => {
                        return Err(ProviderError::Unsupported(
                            "document has neither inline data nor URL".to_string(),
                        ))
                    }
                };
                Ok(vec![part])
            }
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
        let body = GenerateRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: &request.instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: Self::parts(&request.input)?,
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: request.max_tokens,
                response_mime_type: "application/json",
            },
        };

        let parsed: GenerateResponse = send_json(
            self.http_client
                .post(format!(
                    "{}/v1beta/models/{}:generateContent",
                    self.base_url, self.model
                ))
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        let content: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no candidate text in response".to_string(),
            ));
        }

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(ProviderResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
