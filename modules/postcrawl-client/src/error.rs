use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostCrawlError>;

/// Boxed underlying transport failure carried by `Network` and `Timeout`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) const DEFAULT_AUTH_MESSAGE: &str = "Invalid or missing API key";
pub(crate) const DEFAULT_CREDITS_MESSAGE: &str = "Insufficient credits";
pub(crate) const DEFAULT_RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded";
pub(crate) const DEFAULT_TIMEOUT_MESSAGE: &str = "Request timed out";

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Structured error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

/// Every failure the client can surface.
///
/// `Validation`, `Authentication`, `InsufficientCredits`, `RateLimit` and `Api`
/// happen after the server answered and are never retried. `Network` and
/// `Timeout` mean the exchange never completed; those are retried.
#[derive(Debug, Error)]
pub enum PostCrawlError {
    #[error("{message}")]
    Validation {
        message: String,
        request_id: Option<String>,
        /// `None` when the failure was raised locally before any request.
        status: Option<u16>,
        details: Vec<ErrorDetail>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        request_id: Option<String>,
    },

    #[error("{message}")]
    InsufficientCredits {
        message: String,
        request_id: Option<String>,
        credits_required: Option<u64>,
        credits_available: Option<u64>,
    },

    #[error("{message}")]
    RateLimit {
        message: String,
        request_id: Option<String>,
        /// Seconds, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        request_id: Option<String>,
        /// Raw response text when it was not a structured error body.
        body: Option<String>,
    },

    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl PostCrawlError {
    /// Local validation failure, raised before any network I/O.
    pub fn validation(message: impl Into<String>, details: Vec<ErrorDetail>) -> Self {
        PostCrawlError::Validation {
            message: message.into(),
            request_id: None,
            status: None,
            details,
        }
    }

    pub fn network(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        PostCrawlError::Network {
            message: format!("Network error: {source}"),
            source: Some(source),
        }
    }

    pub fn timeout(source: Option<BoxError>) -> Self {
        PostCrawlError::Timeout {
            message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
            source,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PostCrawlError::Validation { message, .. }
            | PostCrawlError::Authentication { message, .. }
            | PostCrawlError::InsufficientCredits { message, .. }
            | PostCrawlError::RateLimit { message, .. }
            | PostCrawlError::Api { message, .. }
            | PostCrawlError::Network { message, .. }
            | PostCrawlError::Timeout { message, .. } => message,
        }
    }

    /// HTTP status associated with the failure. `None` for pre-response
    /// failures and for locally raised validation errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PostCrawlError::Validation { status, .. } => *status,
            PostCrawlError::Authentication { .. } => Some(401),
            PostCrawlError::InsufficientCredits { .. } => Some(403),
            PostCrawlError::RateLimit { .. } => Some(429),
            PostCrawlError::Api { status, .. } => Some(*status),
            PostCrawlError::Network { .. } | PostCrawlError::Timeout { .. } => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            PostCrawlError::Validation { request_id, .. }
            | PostCrawlError::Authentication { request_id, .. }
            | PostCrawlError::InsufficientCredits { request_id, .. }
            | PostCrawlError::RateLimit { request_id, .. }
            | PostCrawlError::Api { request_id, .. } => request_id.as_deref(),
            PostCrawlError::Network { .. } | PostCrawlError::Timeout { .. } => None,
        }
    }

    /// Field-level details of a validation failure; empty for every other kind.
    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            PostCrawlError::Validation { details, .. } => details,
            _ => &[],
        }
    }

    /// True for failures that happened after the server responded.
    pub fn is_api_error(&self) -> bool {
        !self.is_network()
    }

    /// True for `Network` and its `Timeout` specialisation.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            PostCrawlError::Network { .. } | PostCrawlError::Timeout { .. }
        )
    }

    /// Whether the retry coordinator may try the call again.
    pub fn is_transient(&self) -> bool {
        self.is_network()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = PostCrawlError::Api {
            status: 500,
            message: "Something went wrong".into(),
            request_id: Some("req_123".into()),
            body: None,
        };
        assert_eq!(err.to_string(), "Something went wrong");
        assert_eq!(err.request_id(), Some("req_123"));
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn api_level_kinds_carry_fixed_status() {
        let auth = PostCrawlError::Authentication {
            message: DEFAULT_AUTH_MESSAGE.into(),
            request_id: None,
        };
        let credits = PostCrawlError::InsufficientCredits {
            message: DEFAULT_CREDITS_MESSAGE.into(),
            request_id: None,
            credits_required: Some(100),
            credits_available: Some(50),
        };
        let rate = PostCrawlError::RateLimit {
            message: DEFAULT_RATE_LIMIT_MESSAGE.into(),
            request_id: Some("req_rate_123".into()),
            retry_after: Some(60),
        };

        assert_eq!(auth.status_code(), Some(401));
        assert_eq!(credits.status_code(), Some(403));
        assert_eq!(rate.status_code(), Some(429));
        for err in [&auth, &credits, &rate] {
            assert!(err.is_api_error());
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn local_validation_keeps_ordered_details() {
        let err = PostCrawlError::validation(
            "Validation failed",
            vec![
                ErrorDetail::new("query", "required", "Query is required"),
                ErrorDetail::new("results", "out_of_range", "Results must be between 1 and 100"),
            ],
        );
        assert_eq!(err.status_code(), None);
        assert_eq!(err.details().len(), 2);
        assert_eq!(err.details()[0].field, "query");
        assert_eq!(err.details()[1].field, "results");
    }

    #[test]
    fn timeout_is_a_network_failure() {
        let err = PostCrawlError::timeout(None);
        assert_eq!(err.message(), "Request timed out");
        assert!(err.is_network());
        assert!(err.is_transient());
        assert!(!err.is_api_error());
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn network_failure_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = PostCrawlError::network(io);
        assert!(err.to_string().starts_with("Network error"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.status_code(), None);
        assert!(err.details().is_empty());
    }

    #[test]
    fn error_response_minimal_body() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"error":"server_error","message":"Internal server error"}"#)
                .unwrap();
        assert_eq!(body.error, "server_error");
        assert!(body.request_id.is_none());
        assert!(body.details.is_none());
    }
}
