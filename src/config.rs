use std::env;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection details for the Redis REST store backing the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvConfig {
    pub url: String,
    pub token: String,
}

/// Runtime configuration for the AI helpers.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub ai_text_generation_enabled: bool,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub model: String,
    pub kv: Option<KvConfig>,
    pub user_agent: String,
    pub timeout_secs: Option<u64>,
}


pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - GEMINI_SECRET_KEY [required when generation is enabled]
    /// - AI_TEXT_GENERATION_ENABLED (default: true iff GEMINI_SECRET_KEY is set)
    /// - AI_MODEL (or OPENAI_MODEL) (default: gemini-1.5-flash)
    /// - GEMINI_API_URL (default: https://generativelanguage.googleapis.com)
    /// - KV_REST_API_URL + KV_REST_API_TOKEN (rate limiting applies only when both are set)
    /// - AI_HTTP_TIMEOUT_SECS (default: no timeout)
    /// - PHOTO_AI_USER_AGENT (default: photo-ai-mcp/<version>)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading values through `get`.
    /// Blank values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|s| !s.trim().is_empty());
        let gemini_api_key = non_empty("GEMINI_SECRET_KEY");

        let ai_text_generation_enabled = match non_empty("AI_TEXT_GENERATION_ENABLED") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| format!("Invalid AI_TEXT_GENERATION_ENABLED value: {}", raw))?,
            None => gemini_api_key.is_some(),
        };
        if ai_text_generation_enabled && gemini_api_key.is_none() {
            return Err("AI text generation is enabled but GEMINI_SECRET_KEY is missing".into());
        }

        let model = non_empty("AI_MODEL")
            .or_else(|| non_empty("OPENAI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let gemini_api_url = non_empty("GEMINI_API_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let kv = match (non_empty("KV_REST_API_URL"), non_empty("KV_REST_API_TOKEN")) {
            (Some(url), Some(token)) => Some(KvConfig {
                url: url.trim_end_matches('/').to_string(),
                token,
            }),
            _ => None,
        };

        let timeout_secs = match non_empty("AI_HTTP_TIMEOUT_SECS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid AI_HTTP_TIMEOUT_SECS value: {}", raw))?,
            ),
            None => None,
        };
        let default_ua = format!("photo-ai-mcp/{}", env!("CARGO_PKG_VERSION"));
        let user_agent = non_empty("PHOTO_AI_USER_AGENT").unwrap_or(default_ua);

        Ok(Self {
            ai_text_generation_enabled,
            gemini_api_key,
            gemini_api_url,
            model,
            kv,
            user_agent,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_key() {
        let cfg = load(&[]).unwrap();
        assert!(!cfg.ai_text_generation_enabled);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.gemini_api_url, DEFAULT_GEMINI_API_URL);
        assert!(cfg.kv.is_none());
        assert!(cfg.timeout_secs.is_none());
        assert!(cfg.user_agent.starts_with("photo-ai-mcp/"));
    }

    #[test]
    fn key_enables_generation_by_default() {
        let cfg = load(&[("GEMINI_SECRET_KEY", "k"), ("GEMINI_API_URL", "http://x/")]).unwrap();
        assert!(cfg.ai_text_generation_enabled);
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(cfg.gemini_api_url, "http://x");

        let off = load(&[("GEMINI_SECRET_KEY", "k"), ("AI_TEXT_GENERATION_ENABLED", "false")]).unwrap();
        assert!(!off.ai_text_generation_enabled);
    }

    #[test]
    fn model_fallback_chain() {
        assert_eq!(load(&[("OPENAI_MODEL", "m2")]).unwrap().model, "m2");
        let both = load(&[("AI_MODEL", "m1"), ("OPENAI_MODEL", "m2")]).unwrap();
        assert_eq!(both.model, "m1");
        assert_eq!(load(&[("AI_MODEL", "  ")]).unwrap().model, DEFAULT_MODEL);
    }

    #[test]
    fn kv_needs_url_and_token() {
        assert!(load(&[("KV_REST_API_URL", "http://kv")]).unwrap().kv.is_none());
        assert!(load(&[("KV_REST_API_TOKEN", "t")]).unwrap().kv.is_none());
        let cfg = load(&[("KV_REST_API_URL", "http://kv/"), ("KV_REST_API_TOKEN", "t")]).unwrap();
        assert_eq!(
            cfg.kv,
            Some(KvConfig { url: "http://kv".into(), token: "t".into() })
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("AI_TEXT_GENERATION_ENABLED", "maybe")]).unwrap_err();
        assert!(err.contains("AI_TEXT_GENERATION_ENABLED"));
        let err = load(&[("AI_TEXT_GENERATION_ENABLED", "true")]).unwrap_err();
        assert!(err.contains("GEMINI_SECRET_KEY"));
        let err = load(&[("AI_HTTP_TIMEOUT_SECS", "ten")]).unwrap_err();
        assert_eq!(err, "Invalid AI_HTTP_TIMEOUT_SECS value: ten");
        assert_eq!(load(&[("AI_HTTP_TIMEOUT_SECS", "15")]).unwrap().timeout_secs, Some(15));
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
