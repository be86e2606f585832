use std::sync::RwLock;

use reqwest::header::HeaderMap;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Server-reported rate-limit state as of the last call that carried any of
/// the rate-limit headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Unix epoch seconds at which the window resets.
    pub reset: Option<u64>,
    pub retry_after: Option<u64>,
}

impl RateLimitSnapshot {
    /// Parse a snapshot from response headers. Returns `None` when the response
    /// carries none of the recognised headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let present = [LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER, RETRY_AFTER_HEADER]
            .iter()
            .any(|name| headers.contains_key(*name));
        if !present {
            return None;
        }

        Some(Self {
            limit: header_u64(headers, LIMIT_HEADER),
            remaining: header_u64(headers, REMAINING_HEADER),
            reset: header_u64(headers, RESET_HEADER),
            retry_after: header_u64(headers, RETRY_AFTER_HEADER),
        })
    }
}

/// Integer value of a header; missing or unparseable values yield `None`.
pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Holds the latest snapshot. Updates replace the whole value under one write
/// lock so concurrent readers never see a mix of two responses.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    current: RwLock<RateLimitSnapshot>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, headers: &HeaderMap) {
        let Some(next) = RateLimitSnapshot::from_headers(headers) else {
            return;
        };
        tracing::debug!(
            limit = ?next.limit,
            remaining = ?next.remaining,
            reset = ?next.reset,
            "Rate limit updated"
        );
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
