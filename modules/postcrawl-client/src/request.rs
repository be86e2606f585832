use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorDetail, PostCrawlError, Result};
use crate::types::SocialPlatform;

const MAX_URLS: usize = 100;
const MAX_RESULTS: u32 = 100;
const INVALID_PARAMETERS: &str = "Invalid request parameters";

/// Shape of the `raw` field in extract responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Raw,
    Markdown,
}

/// Server-side pruning of comment trees. Unset fields are left to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    /// Maximum comments kept per depth tier, keyed by depth ("0", "1", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_limits: Option<BTreeMap<String, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_high_quality_threads: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub social_platforms: Vec<SocialPlatform>,
    pub query: String,
    pub results: u32,
    pub page: u32,
}

impl SearchRequest {
    pub fn new(social_platforms: Vec<SocialPlatform>, query: impl Into<String>) -> Self {
        Self {
            social_platforms,
            query: query.into(),
            results: 10,
            page: 1,
        }
    }

    pub fn with_results(mut self, results: u32) -> Self {
        self.results = results;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut details = Vec::new();
        check_search(&self.social_platforms, &self.query, self.results, self.page, &mut details);
        finish(details)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub urls: Vec<String>,
    pub include_comments: bool,
    pub response_mode: ResponseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_filter_config: Option<CommentFilterConfig>,
}

impl ExtractRequest {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            include_comments: false,
            response_mode: ResponseMode::Raw,
            comment_filter_config: None,
        }
    }

    pub fn with_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_comment_filter(mut self, config: CommentFilterConfig) -> Self {
        self.comment_filter_config = Some(config);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut details = Vec::new();
        check_urls(&self.urls, &mut details);
        finish(details)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAndExtractRequest {
    pub social_platforms: Vec<SocialPlatform>,
    pub query: String,
    pub results: u32,
    pub page: u32,
    pub include_comments: bool,
    pub response_mode: ResponseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_filter_config: Option<CommentFilterConfig>,
}

impl SearchAndExtractRequest {
    pub fn new(social_platforms: Vec<SocialPlatform>, query: impl Into<String>) -> Self {
        Self {
            social_platforms,
            query: query.into(),
            results: 10,
            page: 1,
            include_comments: false,
            response_mode: ResponseMode::Raw,
            comment_filter_config: None,
        }
    }

    pub fn with_results(mut self, results: u32) -> Self {
        self.results = results;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_comment_filter(mut self, config: CommentFilterConfig) -> Self {
        self.comment_filter_config = Some(config);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut details = Vec::new();
        check_search(&self.social_platforms, &self.query, self.results, self.page, &mut details);
        finish(details)
    }
}

fn check_search(
    platforms: &[SocialPlatform],
    query: &str,
    results: u32,
    page: u32,
    details: &mut Vec<ErrorDetail>,
) {
    if platforms.is_empty() {
        details.push(ErrorDetail::new(
            "social_platforms",
            "too_small",
            "At least one social platform is required",
        ));
    }
    if query.trim().is_empty() {
        details.push(ErrorDetail::new("query", "invalid_value", "Query cannot be empty"));
    }
    if !(1..=MAX_RESULTS).contains(&results) {
        details.push(ErrorDetail::new(
            "results",
            "out_of_range",
            format!("Results must be between 1 and {MAX_RESULTS}"),
        ));
    }
    if page == 0 {
        details.push(ErrorDetail::new("page", "out_of_range", "Page must be at least 1"));
    }
}

fn check_urls(urls: &[String], details: &mut Vec<ErrorDetail>) {
    if urls.is_empty() {
        details.push(ErrorDetail::new("urls", "too_small", "At least one URL is required"));
        return;
    }
    if urls.len() > MAX_URLS {
        details.push(ErrorDetail::new(
            "urls",
            "too_big",
            format!("Cannot process more than {MAX_URLS} URLs at once"),
        ));
    }
    for (i, raw) in urls.iter().enumerate() {
        let valid = url::Url::parse(raw)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
        if !valid {
            details.push(ErrorDetail::new(
                format!("urls.{i}"),
                "invalid_url",
                format!("Invalid URL: {raw}"),
            ));
        }
    }
}

fn finish(details: Vec<ErrorDetail>) -> Result<()> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(PostCrawlError::validation(INVALID_PARAMETERS, details))
    }
}
