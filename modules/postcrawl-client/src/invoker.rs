use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use crate::error::{
    ErrorResponse, PostCrawlError, Result, DEFAULT_AUTH_MESSAGE, DEFAULT_CREDITS_MESSAGE,
    DEFAULT_RATE_LIMIT_MESSAGE,
};
use crate::rate_limit::header_u64;
use crate::transport::{HttpRequest, RawResponse, Transport, TransportError};

const CLIENT_USER_AGENT: &str = concat!("postcrawl-rust/", env!("CARGO_PKG_VERSION"));

static RE_CREDITS_REQUIRED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)required:\s*(\d+)").unwrap());
static RE_CREDITS_AVAILABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)available:\s*(\d+)").unwrap());

/// Issues exactly one HTTP call and classifies the outcome. No retries, no
/// rate-limit bookkeeping.
pub struct Invoker {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl Invoker {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            PostCrawlError::validation("API key contains invalid header characters", Vec::new())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        Ok(headers)
    }

    /// Send `body` as JSON to `path`. A 2xx response is returned as-is; every
    /// other outcome becomes the matching `PostCrawlError`.
    pub async fn invoke<B: Serialize + ?Sized>(
        &self,
        transport: &dyn Transport,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        let payload = serde_json::to_vec(body).map_err(|e| {
            PostCrawlError::validation(format!("Failed to serialize request: {e}"), Vec::new())
        })?;

        debug!(%method, url = %url, "PostCrawl request");

        let request = HttpRequest {
            method,
            url,
            headers: self.headers()?,
            body: payload,
            timeout: self.timeout,
        };

        let response = match transport.send(request).await {
            Ok(response) => response,
            Err(TransportError::Timeout(source)) => {
                return Err(PostCrawlError::timeout(Some(source)))
            }
            Err(TransportError::Connection(source)) => return Err(PostCrawlError::network(source)),
        };

        if (200..300).contains(&response.status) {
            debug!(status = response.status, "PostCrawl response");
            return Ok(response);
        }

        Err(classify_response(&response))
    }
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) fn classify_response(response: &RawResponse) -> PostCrawlError {
    let parsed: Option<ErrorResponse> = serde_json::from_str(&response.body).ok();
    let request_id = parsed.as_ref().and_then(|b| b.request_id.clone());
    let status = response.status;

    match status {
        401 => PostCrawlError::Authentication {
            message: message_or(&parsed, DEFAULT_AUTH_MESSAGE),
            request_id,
        },
        403 => {
            let message = message_or(&parsed, DEFAULT_CREDITS_MESSAGE);
            PostCrawlError::InsufficientCredits {
                credits_required: capture_u64(&RE_CREDITS_REQUIRED, &message),
                credits_available: capture_u64(&RE_CREDITS_AVAILABLE, &message),
                message,
                request_id,
            }
        }
        429 => PostCrawlError::RateLimit {
            message: message_or(&parsed, DEFAULT_RATE_LIMIT_MESSAGE),
            request_id,
            retry_after: header_u64(&response.headers, "retry-after"),
        },
        _ if status == 422 || parsed.as_ref().is_some_and(is_validation_body) => {
            let message = message_or(&parsed, "Validation failed");
            PostCrawlError::Validation {
                message,
                request_id,
                status: Some(status),
                details: parsed.and_then(|b| b.details).unwrap_or_default(),
            }
        }
        _ => match parsed {
            Some(body) => PostCrawlError::Api {
                status,
                message: body.message,
                request_id,
                body: None,
            },
            None => {
                let text = response.body.trim();
                let message = if text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    text.to_string()
                };
                PostCrawlError::Api {
                    status,
                    message,
                    request_id: None,
                    body: Some(response.body.clone()),
                }
            }
        },
    }
}

fn is_validation_body(body: &ErrorResponse) -> bool {
    body.error == "validation_error" || body.details.as_ref().is_some_and(|d| !d.is_empty())
}

fn message_or(parsed: &Option<ErrorResponse>, default: &str) -> String {
    parsed
        .as_ref()
        .map(|b| b.message.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
