use crate::http::{self, encode_path_segment, HttpError};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image bytes sent inline with a request, still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("invalid provider endpoint: {0}")]
    Endpoint(String),
    #[error("provider returned no content{}", .0.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default())]
    Empty(Option<String>),
    #[error("provider returned invalid JSON: {0}")]
    InvalidJson(String),
    #[error("response did not match schema: {0}")]
    Schema(String),
}

impl ProviderError {
    pub fn code(&self) -> &str {
        match self {
            ProviderError::Http(e) => e.code(),
            ProviderError::Endpoint(_) => "bad_request",
            ProviderError::Empty(_) => "empty_response",
            ProviderError::InvalidJson(_) | ProviderError::Schema(_) => "schema_violation",
        }
    }
}

/// A hosted generative model. Implemented by [`GeminiClient`]; tests substitute fakes.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// One schema-constrained request; returns the decoded JSON object.
    async fn generate_object(
        &self,
        model: &str,
        prompt: &str,
        image: &InlineImage,
        schema: &Value,
    ) -> Result<Value, ProviderError>;

    /// Plain text round trip.
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

// Gemini wire types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: Blob<'a> },
}

#[derive(Debug, Serialize)]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> Result<String, ProviderError> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            encode_path_segment(model)
        );
        url::Url::parse(&raw)
            .map(|u| u.to_string())
            .map_err(|e| ProviderError::Endpoint(format!("{}: {}", raw, e)))
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<String, ProviderError> {
        let url = self.endpoint(model)?;
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| ProviderError::Endpoint(format!("invalid api key header: {}", e)))?;
        headers.insert("x-goog-api-key", key);

        debug!("generateContent model={}", model);
        let body = http::post_json(&self.client, &url, headers, request).await?;
        let resp: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidJson(e.to_string()))?;
        first_candidate_text(resp)
    }
}

fn first_candidate_text(resp: GenerateContentResponse) -> Result<String, ProviderError> {
    let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = resp.candidates.into_iter().next() else {
        warn!("generateContent returned no candidates");
        return Err(ProviderError::Empty(block_reason));
    };
    let finish_reason = candidate.finish_reason;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ProviderError::Empty(finish_reason.or(block_reason)));
    }
    Ok(text)
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate_object(
        &self,
        model: &str,
        prompt: &str,
        image: &InlineImage,
        schema: &Value,
    ) -> Result<Value, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };
        let text = self.generate(model, &request).await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidJson(e.to_string()))
    }

    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text { text: prompt }],
            }],
            generation_config: None,
        };
        self.generate(model, &request).await
    }
}
