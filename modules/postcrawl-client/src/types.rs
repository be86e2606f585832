use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// --- Platforms ---

/// The social platforms the API can search and extract from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Reddit,
    Tiktok,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Reddit => "reddit",
            SocialPlatform::Tiktok => "tiktok",
        }
    }

    /// Parse the `source` tag carried by extracted items.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "reddit" => Some(SocialPlatform::Reddit),
            "tiktok" => Some(SocialPlatform::Tiktok),
            _ => None,
        }
    }
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Search ---

/// A single search hit. Flat, no platform-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// --- Reddit ---

/// A Reddit post as returned in `raw` by the extract endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditPost {
    pub id: String,
    pub name: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub subreddit_name: String,
    pub upvotes: f64,
    pub downvotes: f64,
    pub score: f64,
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<RedditComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditComment {
    pub id: String,
    pub text: String,
    pub score: f64,
    pub upvotes: f64,
    pub downvotes: f64,
    pub created_at: String,
    pub parent_id: String,
    pub permalink: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub replies: Vec<RedditComment>,
}

// --- TikTok ---

/// A TikTok video post as returned in `raw` by the extract endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiktokPost {
    pub id: String,
    pub username: String,
    pub url: String,
    pub description: String,
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hashtags: Vec<String>,
    /// Display string, e.g. "1.2M".
    pub likes: String,
    pub total_comments: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<TiktokComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiktokComment {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub likes: f64,
    pub username: String,
    pub nickname: String,
    pub avatar_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub replies: Vec<TiktokComment>,
}

/// An absent or `null` list is the same as an empty one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Extraction ---

/// The `raw` payload of an extracted item after resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawPost {
    Reddit(RedditPost),
    Tiktok(TiktokPost),
    /// The payload did not match the shape its `source` tag promised, or the
    /// item reported an error. Kept exactly as received.
    Untyped(Value),
}

/// One item of an extract or search-and-extract response.
///
/// Deserialization never fails: an element that does not fit is preserved as
/// an untyped `raw` value (see `resolver::resolve_extracted_item`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct ExtractedPost {
    pub url: String,
    /// Platform tag as sent by the server ("reddit", "tiktok").
    pub source: String,
    pub raw: Option<RawPost>,
    pub markdown: Option<String>,
    pub error: Option<String>,
    /// Envelope keys this client does not model (`title`, `author`, ...), and
    /// envelope keys whose value had the wrong type.
    pub extra: Map<String, Value>,
}

impl Serialize for ExtractedPost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        // A key present in `extra` is written from there, never twice.
        let typed = |key: &str| !self.extra.contains_key(key);
        if typed("url") {
            map.serialize_entry("url", &self.url)?;
        }
        if typed("source") {
            map.serialize_entry("source", &self.source)?;
        }
        map.serialize_entry("raw", &self.raw)?;
        if typed("markdown") {
            map.serialize_entry("markdown", &self.markdown)?;
        }
        if typed("error") {
            map.serialize_entry("error", &self.error)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl From<Value> for ExtractedPost {
    fn from(value: Value) -> Self {
        crate::resolver::resolve_extracted_item(value)
    }
}

impl ExtractedPost {
    pub fn platform(&self) -> Option<SocialPlatform> {
        SocialPlatform::from_tag(&self.source)
    }

    pub fn is_reddit_post(&self) -> bool {
        self.reddit_post().is_some()
    }

    pub fn is_tiktok_post(&self) -> bool {
        self.tiktok_post().is_some()
    }

    pub fn reddit_post(&self) -> Option<&RedditPost> {
        match &self.raw {
            Some(RawPost::Reddit(post)) => Some(post),
            _ => None,
        }
    }

    pub fn tiktok_post(&self) -> Option<&TiktokPost> {
        match &self.raw {
            Some(RawPost::Tiktok(post)) => Some(post),
            _ => None,
        }
    }

    /// The raw payload when it could not be typed.
    pub fn untyped(&self) -> Option<&Value> {
        match &self.raw {
            Some(RawPost::Untyped(value)) => Some(value),
            _ => None,
        }
    }

    pub fn extra_field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
