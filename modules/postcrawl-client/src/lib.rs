//! Client for the PostCrawl API: search Reddit and TikTok, and extract posts
//! (with their comment trees) from URLs.
//!
//! ```no_run
//! use postcrawl_client::{PostCrawlClient, SearchRequest, SocialPlatform};
//!
//! # async fn run() -> postcrawl_client::Result<()> {
//! let client = PostCrawlClient::new("sk_your_api_key")?;
//! let hits = client
//!     .search(&SearchRequest::new(vec![SocialPlatform::Reddit], "rust async"))
//!     .await?;
//! for hit in hits {
//!     println!("{} {}", hit.title, hit.url);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod invoker;
pub mod rate_limit;
pub mod request;
pub mod resolver;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{ClientBuilder, PostCrawlClient};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{ErrorDetail, ErrorResponse, PostCrawlError, Result};
pub use rate_limit::RateLimitSnapshot;
pub use request::{
    CommentFilterConfig, ExtractRequest, ResponseMode, SearchAndExtractRequest, SearchRequest,
};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpTransport, RawResponse, Transport, TransportError};
pub use types::{
    ExtractedPost, RawPost, RedditComment, RedditPost, SearchResult, SocialPlatform,
    TiktokComment, TiktokPost,
};
