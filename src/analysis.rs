//! Image analysis: rate-limit gate, structured generation and text cleanup.

use crate::config::Config;
use crate::http;
use crate::provider::{GeminiClient, GenerativeProvider, InlineImage, ProviderError};
use crate::ratelimit::{KvSlidingWindow, LimiterError, RateLimiter, RATE_LIMIT_IDENTIFIER};
use base64::Engine;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const TITLE_MAX_LEN: usize = 30;
pub const CAPTION_MAX_LEN: usize = 60;
pub const TAGS_MAX: usize = 3;
pub const CONNECTION_TEST_PROMPT: &str = "Test connection";

pub const AI_IMAGE_PROMPT: &str = "Analyze this image and provide the following details in JSON format:\n\
- A concise title in 3 words or less\n\
- A brief caption in 6 words or less without punctuation\n\
- Up to 3 keywords describing key elements, avoiding adjectives and adverbs\n\
- A brief semantic description without introductory phrases";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub title: String,
    pub caption: String,
    pub tags: Vec<String>,
    pub semantic_description: String,
}

impl ImageAnalysis {
    /// Decode a provider reply and enforce the bounds the schema declares.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        let analysis: ImageAnalysis =
            serde_json::from_value(value).map_err(|e| ProviderError::Schema(e.to_string()))?;
        if analysis.title.chars().count() > TITLE_MAX_LEN {
            return Err(ProviderError::Schema(format!(
                "title exceeds {} characters",
                TITLE_MAX_LEN
            )));
        }
        if analysis.caption.chars().count() > CAPTION_MAX_LEN {
            return Err(ProviderError::Schema(format!(
                "caption exceeds {} characters",
                CAPTION_MAX_LEN
            )));
        }
        if analysis.tags.len() > TAGS_MAX {
            return Err(ProviderError::Schema(format!(
                "more than {} tags",
                TAGS_MAX
            )));
        }
        Ok(analysis)
    }

    fn cleaned(self) -> Self {
        Self {
            title: clean_up_ai_text(&self.title),
            caption: clean_up_ai_text(&self.caption),
            tags: self
                .tags
                .iter()
                .map(|t| clean_up_ai_text(t))
                .filter(|t| !t.is_empty())
                .collect(),
            semantic_description: clean_up_ai_text(&self.semantic_description),
        }
    }
}

/// Response schema sent with every image request.
pub fn image_analysis_schema() -> Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A concise title for the image in 3 words or less"
            },
            "caption": {
                "type": "STRING",
                "description": "A brief caption for the image in 6 words or less, without punctuation"
            },
            "tags": {
                "type": "ARRAY",
                "items": {"type": "STRING"},
                "maxItems": TAGS_MAX,
                "description": "Up to 3 keywords describing the image, avoiding adjectives and adverbs"
            },
            "semanticDescription": {
                "type": "STRING",
                "description": "A brief description of the image without introductory phrases"
            }
        },
        "required": ["title", "caption", "tags", "semanticDescription"]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    RateLimitBackend,
    RateLimitExceeded,
    Provider,
}

impl AnalysisErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            AnalysisErrorKind::RateLimitBackend => "rate_limit_backend",
            AnalysisErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            AnalysisErrorKind::Provider => "provider",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to rate limit OpenAI")]
    RateLimitBackend(#[source] LimiterError),
    #[error("OpenAI rate limit exceeded")]
    RateLimitExceeded,
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl AnalysisError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            AnalysisError::RateLimitBackend(_) => AnalysisErrorKind::RateLimitBackend,
            AnalysisError::RateLimitExceeded => AnalysisErrorKind::RateLimitExceeded,
            AnalysisError::Provider(_) => AnalysisErrorKind::Provider,
        }
    }
}

/// Whether requests reach the provider at all.
#[derive(Clone)]
pub enum TextGeneration {
    Disabled,
    Enabled {
        provider: Arc<dyn GenerativeProvider>,
        model: String,
    },
}

impl TextGeneration {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TextGeneration::Enabled { .. })
    }
}

#[derive(Clone)]
pub struct AnalysisService {
    limiter: Option<Arc<dyn RateLimiter>>,
    generation: TextGeneration,
}

impl AnalysisService {
    pub fn new(limiter: Option<Arc<dyn RateLimiter>>, generation: TextGeneration) -> Self {
        Self {
            limiter,
            generation,
        }
    }

    /// Wire the HTTP-backed limiter and provider from configuration.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let client = http::build_client(cfg)?;
        let limiter = cfg.kv.clone().map(|kv| {
            Arc::new(KvSlidingWindow::new(client.clone(), kv)) as Arc<dyn RateLimiter>
        });
        let generation = match (&cfg.gemini_api_key, cfg.ai_text_generation_enabled) {
            (Some(key), true) => TextGeneration::Enabled {
                provider: Arc::new(GeminiClient::new(
                    client,
                    cfg.gemini_api_url.clone(),
                    key.clone(),
                )),
                model: cfg.model.clone(),
            },
            _ => TextGeneration::Disabled,
        };
        info!(
            "AI text generation {}; rate limiting {}",
            if generation.is_enabled() { "enabled" } else { "disabled" },
            if limiter.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self::new(limiter, generation))
    }

    pub fn generation(&self) -> &TextGeneration {
        &self.generation
    }

    async fn check_rate_limit(&self) -> Result<(), AnalysisError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        let decision = limiter.limit(RATE_LIMIT_IDENTIFIER).await.map_err(|e| {
            error!("Failed to rate limit OpenAI: {}", e);
            AnalysisError::RateLimitBackend(e)
        })?;
        if !decision.success {
            error!(
                "OpenAI rate limit exceeded (resets at {})",
                decision.reset_at().unwrap_or_default()
            );
            return Err(AnalysisError::RateLimitExceeded);
        }
        Ok(())
    }

    pub async fn generate_image_analysis(
        &self,
        image_base64: &str,
    ) -> Result<ImageAnalysis, AnalysisError> {
        self.check_rate_limit().await?;
        let TextGeneration::Enabled { provider, model } = &self.generation else {
            return Ok(ImageAnalysis::default());
        };
        info!("Generating AI image analysis with {}", model);
        let image = InlineImage {
            mime_type: mime_type_for_base64(image_base64).to_string(),
            data: remove_base64_prefix(image_base64).to_string(),
        };
        let value = provider
            .generate_object(model, AI_IMAGE_PROMPT, &image, &image_analysis_schema())
            .await?;
        Ok(ImageAnalysis::from_value(value)?.cleaned())
    }

    /// Health check: same gate, then a minimal text round trip.
    /// `None` when generation is disabled.
    pub async fn test_connection(&self) -> Result<Option<String>, AnalysisError> {
        self.check_rate_limit().await?;
        match &self.generation {
            TextGeneration::Enabled { provider, model } => {
                let text = provider.generate_text(model, CONNECTION_TEST_PROMPT).await?;
                Ok(Some(text))
            }
            TextGeneration::Disabled => Ok(None),
        }
    }
}

fn data_uri_parts(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_lowercase()) {
        return None;
    }
    Some((subtype, payload))
}

/// Strip a `data:image/<type>;base64,` prefix if there is one.
pub fn remove_base64_prefix(input: &str) -> &str {
    data_uri_parts(input).map(|(_, payload)| payload).unwrap_or(input)
}

pub fn mime_type_for_base64(input: &str) -> &'static str {
    if let Some((subtype, _)) = data_uri_parts(input) {
        return match subtype {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "image/jpeg",
        };
    }
    // Sniff magic bytes from the first base64 quantum.
    let head: String = input.chars().take(16).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&head)
        .unwrap_or_default();
    match bytes.as_slice() {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

const FIELD_LABELS: [&str; 5] = ["title", "caption", "tags", "description", "semantic description"];

/// Normalize raw model text: single line, no quotes or labels, no trailing period.
pub fn clean_up_ai_text(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ").replace('"', "");
    let mut s = flat.trim();
    if let Some((label, rest)) = s.split_once(':') {
        if FIELD_LABELS.contains(&label.trim().to_ascii_lowercase().as_str()) {
            s = rest.trim();
        }
    }
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_suffix('.') {
        Some(stripped) if !stripped.ends_with('.') => stripped.trim_end().to_string(),
        _ => collapsed,
    }
}
