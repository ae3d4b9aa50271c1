use crate::config::KvConfig;
use crate::http::{self, HttpError};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Single global counter: every caller of the service shares one quota.
pub const RATE_LIMIT_IDENTIFIER: &str = "openai-image-query";
pub const RATE_LIMIT_MAX_QUERIES_PER_HOUR: u32 = 100;
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const KEY_PREFIX: &str = "@upstash/ratelimit";

// Weighted two-bucket sliding window. Replies -1 when rejected, otherwise the
// remaining quota after counting this request.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local currentKey  = KEYS[1]
local previousKey = KEYS[2]
local tokens      = tonumber(ARGV[1])
local now         = tonumber(ARGV[2])
local window      = tonumber(ARGV[3])
local incrementBy = tonumber(ARGV[4])

local requestsInCurrentWindow = redis.call("GET", currentKey)
if requestsInCurrentWindow == false then
  requestsInCurrentWindow = 0
end
local requestsInPreviousWindow = redis.call("GET", previousKey)
if requestsInPreviousWindow == false then
  requestsInPreviousWindow = 0
end
local percentageInCurrent = ( now % window ) / window
requestsInPreviousWindow = math.floor(( 1 - percentageInCurrent ) * requestsInPreviousWindow)
if requestsInPreviousWindow + requestsInCurrentWindow >= tokens then
  return -1
end

local newValue = redis.call("INCRBY", currentKey, incrementBy)
if newValue == incrementBy then
  redis.call("PEXPIRE", currentKey, window * 2 + 1000)
end
return tokens - ( newValue + requestsInPreviousWindow )
"#;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch millis at which the current window ends.
    pub reset: i64,
}

impl RateLimitDecision {
    pub fn reset_at(&self) -> Option<String> {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(self.reset).map(|t| t.to_rfc3339())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("store error: {0}")]
    Store(String),
    #[error("unexpected store reply: {0}")]
    InvalidReply(String),
}

/// Consulted once before every provider call.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn limit(&self, identifier: &str) -> Result<RateLimitDecision, LimiterError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowKeys {
    pub current: String,
    pub previous: String,
    pub index: i64,
}

pub fn window_keys(prefix: &str, identifier: &str, now_ms: i64, window_ms: i64) -> WindowKeys {
    let index = now_ms.div_euclid(window_ms);
    WindowKeys {
        current: format!("{}:{}:{}", prefix, identifier, index),
        previous: format!("{}:{}:{}", prefix, identifier, index - 1),
        index,
    }
}

pub fn decision_from_reply(reply: i64, limit: u32, index: i64, window_ms: i64) -> RateLimitDecision {
    RateLimitDecision {
        success: reply != -1,
        limit,
        remaining: reply.clamp(0, limit as i64) as u32,
        reset: (index + 1) * window_ms,
    }
}

#[derive(Debug, Deserialize)]
struct KvReply {
    result: Option<serde_json::Value>,
    error: Option<String>,
}

/// Sliding-window limiter evaluated inside a Redis REST store
/// (Upstash / Vercel KV wire format).
#[derive(Debug, Clone)]
pub struct KvSlidingWindow {
    client: Client,
    kv: KvConfig,
    quota: u32,
    window: Duration,
    prefix: String,
}

impl KvSlidingWindow {
    pub fn new(client: Client, kv: KvConfig) -> Self {
        Self {
            client,
            kv,
            quota: RATE_LIMIT_MAX_QUERIES_PER_HOUR,
            window: RATE_LIMIT_WINDOW,
            prefix: KEY_PREFIX.to_string(),
        }
    }

    pub async fn limit_at(
        &self,
        identifier: &str,
        now_ms: i64,
    ) -> Result<RateLimitDecision, LimiterError> {
        let window_ms = self.window.as_millis() as i64;
        let keys = window_keys(&self.prefix, identifier, now_ms, window_ms);
        let command = vec![
            "EVAL".to_string(),
            SLIDING_WINDOW_SCRIPT.to_string(),
            "2".to_string(),
            keys.current.clone(),
            keys.previous.clone(),
            self.quota.to_string(),
            now_ms.to_string(),
            window_ms.to_string(),
            "1".to_string(),
        ];

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.kv.token))
            .map_err(|e| LimiterError::Store(format!("invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        let text = http::post_json(&self.client, &self.kv.url, headers, &command).await?;
        let reply: KvReply = serde_json::from_str(&text)
            .map_err(|e| LimiterError::InvalidReply(format!("{}: {}", e, text)))?;
        if let Some(err) = reply.error {
            return Err(LimiterError::Store(err));
        }
        let remaining = reply
            .result
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| LimiterError::InvalidReply(text.clone()))?;

        let decision = decision_from_reply(remaining, self.quota, keys.index, window_ms);
        debug!(
            "rate limit {} -> success={} remaining={}",
            keys.current, decision.success, decision.remaining
        );
        Ok(decision)
    }
}

#[async_trait]
impl RateLimiter for KvSlidingWindow {
    async fn limit(&self, identifier: &str) -> Result<RateLimitDecision, LimiterError> {
        self.limit_at(identifier, chrono::Utc::now().timestamp_millis())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    #[test]
    fn keys_follow_window_index() {
        let k = window_keys(KEY_PREFIX, RATE_LIMIT_IDENTIFIER, 2 * HOUR_MS + 5, HOUR_MS);
        assert_eq!(k.index, 2);
        assert_eq!(k.current, "@upstash/ratelimit:openai-image-query:2");
        assert_eq!(k.previous, "@upstash/ratelimit:openai-image-query:1");
    }

    #[test]
    fn rejected_reply_maps_to_failure() {
        let d = decision_from_reply(-1, 100, 3, HOUR_MS);
        assert!(!d.success);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.reset, 4 * HOUR_MS);
    }

    #[test]
    fn accepted_reply_keeps_remaining() {
        let d = decision_from_reply(42, 100, 0, HOUR_MS);
        assert!(d.success);
        assert_eq!(d.remaining, 42);
        assert_eq!(d.limit, 100);
        assert_eq!(d.reset_at().as_deref(), Some("1970-01-01T01:00:00+00:00"));
    }
}
