//! Turns response bodies into typed records.
//!
//! Search hits map field-for-field. Extracted items are resolved one by one:
//! the `source` tag picks the single platform shape to try, and anything that
//! does not fit is kept as an untyped value instead of failing the call.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PostCrawlError, Result};
use crate::transport::RawResponse;
use crate::types::{ExtractedPost, RawPost, RedditPost, SearchResult, SocialPlatform, TiktokPost};

pub fn resolve_search_results(response: &RawResponse) -> Result<Vec<SearchResult>> {
    serde_json::from_str(&response.body)
        .map_err(|e| decode_error(response, "search", e))
}

pub fn resolve_extracted_posts(response: &RawResponse) -> Result<Vec<ExtractedPost>> {
    let items: Vec<Value> =
        serde_json::from_str(&response.body).map_err(|e| decode_error(response, "extract", e))?;
    Ok(items.into_iter().map(resolve_extracted_item).collect())
}

/// Resolve one element of an extract response. Never fails.
///
/// A non-null `error` wins over any payload: the payload is kept untyped.
pub fn resolve_extracted_item(item: Value) -> ExtractedPost {
    let Value::Object(mut fields) = item else {
        return ExtractedPost {
            url: String::new(),
            source: String::new(),
            raw: Some(RawPost::Untyped(item)),
            markdown: None,
            error: None,
            extra: Map::new(),
        };
    };

    let url = take_string(&mut fields, "url").unwrap_or_default();
    let source = take_string(&mut fields, "source").unwrap_or_default();
    let markdown = take_string(&mut fields, "markdown");
    let error = take_string(&mut fields, "error");

    let raw = fields
        .remove("raw")
        .filter(|raw| !raw.is_null())
        .map(|raw| {
            if error.is_some() {
                RawPost::Untyped(raw)
            } else {
                resolve_raw(&source, raw)
            }
        });

    ExtractedPost {
        url,
        source,
        raw,
        markdown,
        error,
        extra: fields,
    }
}

/// Try the shape named by `source`, and only that one.
pub fn resolve_raw(source: &str, raw: Value) -> RawPost {
    match SocialPlatform::from_tag(source) {
        Some(SocialPlatform::Reddit) => match RedditPost::deserialize(&raw) {
            Ok(post) => RawPost::Reddit(post),
            Err(e) => {
                debug!(source, error = %e, "Payload does not match Reddit post shape");
                RawPost::Untyped(raw)
            }
        },
        Some(SocialPlatform::Tiktok) => match TiktokPost::deserialize(&raw) {
            Ok(post) => RawPost::Tiktok(post),
            Err(e) => {
                debug!(source, error = %e, "Payload does not match TikTok post shape");
                RawPost::Untyped(raw)
            }
        },
        None => RawPost::Untyped(raw),
    }
}

/// Remove a string field. Non-string values are put back so they still show
/// up in `extra`.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

fn decode_error(response: &RawResponse, what: &str, err: serde_json::Error) -> PostCrawlError {
    PostCrawlError::Api {
        status: response.status,
        message: format!("Failed to decode {what} response: {err}"),
        request_id: None,
        body: Some(response.body.clone()),
    }
}
