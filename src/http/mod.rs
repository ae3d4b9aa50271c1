use crate::config::Config;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("upstream returned {code}: {message}")]
    Status { code: String, message: String },
}

impl HttpError {
    pub fn code(&self) -> &str {
        match self {
            HttpError::Transport(_) => "upstream_error",
            HttpError::Status { code, .. } => code,
        }
    }
}

impl From<ErrorInfo> for HttpError {
    fn from(info: ErrorInfo) -> Self {
        HttpError::Status {
            code: info.code,
            message: info.message,
        }
    }
}

/// Shared client for the provider and the KV store. No timeout unless configured.
pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    let mut builder = Client::builder().user_agent(cfg.user_agent.clone()).use_rustls_tls();
    if let Some(secs) = cfg.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ErrorInfo {
    let code = match status {
        StatusCode::BAD_REQUEST => "bad_request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::TOO_MANY_REQUESTS => "rate_limited",
        s if s.is_server_error() => "upstream_error",
        _ => "server_error",
    };
    ErrorInfo {
        code: code.to_string(),
        message,
    }
}

/// POST a JSON body and return the raw response text on 2xx.
/// Single attempt: callers surface failures instead of retrying.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    mut headers: HeaderMap,
    body: &B,
) -> Result<String, HttpError> {
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    let res = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            warn!("POST error sending request: {}", e);
            HttpError::Transport(e.to_string())
        })?;

    let status = res.status();
    let text = res.text().await.map_err(|e| {
        warn!("POST error reading response body: {}", e);
        HttpError::Transport(e.to_string())
    })?;
    if status.is_success() {
        debug!("POST {} -> {}", redact(url), status);
        return Ok(text);
    }
    warn!("POST {} failed with status {}", redact(url), status);
    Err(map_status_to_error(status, text).into())
}

// Drop query strings so keys passed as parameters never reach the logs.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_matrix() {
        assert_eq!(
            map_status_to_error(StatusCode::BAD_REQUEST, "".into()).code,
            "bad_request"
        );
        assert_eq!(
            map_status_to_error(StatusCode::UNAUTHORIZED, "".into()).code,
            "unauthorized"
        );
        assert_eq!(
            map_status_to_error(StatusCode::FORBIDDEN, "".into()).code,
            "forbidden"
        );
        assert_eq!(
            map_status_to_error(StatusCode::NOT_FOUND, "".into()).code,
            "not_found"
        );
        let rl = map_status_to_error(StatusCode::TOO_MANY_REQUESTS, "".into());
        assert_eq!(rl.code, "rate_limited");
        let s5 = map_status_to_error(StatusCode::BAD_GATEWAY, "".into());
        assert_eq!(s5.code, "upstream_error");
    }

    #[test]
    fn http_error_codes() {
        let e: HttpError = map_status_to_error(StatusCode::FORBIDDEN, "nope".into()).into();
        assert_eq!(e.code(), "forbidden");
        assert_eq!(HttpError::Transport("x".into()).code(), "upstream_error");
    }

    #[test]
    fn redacts_query() {
        assert_eq!(redact("https://h/p?key=secret"), "https://h/p");
        assert_eq!(redact("https://h/p"), "https://h/p");
    }
}
