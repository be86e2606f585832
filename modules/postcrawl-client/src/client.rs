use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{PostCrawlError, Result};
use crate::invoker::Invoker;
use crate::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::request::{ExtractRequest, SearchAndExtractRequest, SearchRequest};
use crate::resolver;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::types::{ExtractedPost, SearchResult};

type Connector = Arc<dyn Fn(&ClientConfig) -> Result<Arc<dyn Transport>> + Send + Sync>;

/// The three API operations and their paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Search,
    Extract,
    SearchAndExtract,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Search => "/v1/search",
            Endpoint::Extract => "/v1/extract",
            Endpoint::SearchAndExtract => "/v1/search-and-extract",
        }
    }
}

enum TransportSlot {
    Idle,
    Open(Arc<dyn Transport>),
    Closed,
}

/// Counts calls currently running so `close` can wait for them.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    closing: AtomicBool,
    idle: Notify,
}

impl InFlight {
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct CallGuard<'a>(&'a InFlight);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

fn closed_error() -> PostCrawlError {
    PostCrawlError::Network {
        message: "Network error: client is closed".to_string(),
        source: None,
    }
}

/// Client for the PostCrawl search and extraction API.
///
/// Every operation comes in two forms: `async` and `_blocking`. The blocking
/// form runs the async one to completion on a single-worker runtime private to
/// this client, so it must not be called from inside an async context.
///
/// The HTTP transport is created on the first call and shared by all calls.
/// `close` releases it after in-flight calls finish; dropping the client
/// releases it too.
pub struct PostCrawlClient {
    config: ClientConfig,
    invoker: Invoker,
    retry: RetryPolicy,
    rate_limits: RateLimitTracker,
    connector: Connector,
    transport: Mutex<TransportSlot>,
    in_flight: InFlight,
    runtime: OnceLock<tokio::runtime::Runtime>,
}

pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Use this transport instead of the default reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<PostCrawlClient> {
        let connector: Connector = match self.transport {
            Some(transport) => Arc::new(move |_: &ClientConfig| Ok(Arc::clone(&transport))),
            None => Arc::new(|config: &ClientConfig| {
                let transport =
                    HttpTransport::new(config.timeout).map_err(PostCrawlError::network)?;
                Ok(Arc::new(transport) as Arc<dyn Transport>)
            }),
        };
        PostCrawlClient::with_connector(self.config, connector)
    }
}

impl PostCrawlClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            config: ClientConfig::new(api_key),
            transport: None,
        }
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder {
            config,
            transport: None,
        }
        .build()
    }

    fn with_connector(config: ClientConfig, connector: Connector) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            invoker: Invoker::new(&config.base_url, &config.api_key, config.timeout),
            retry: RetryPolicy::new(config.max_retries, config.retry_delay),
            config,
            rate_limits: RateLimitTracker::new(),
            connector,
            transport: Mutex::new(TransportSlot::Idle),
            in_flight: InFlight::default(),
            runtime: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Rate-limit state reported by the most recent successful call.
    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.rate_limits.snapshot()
    }

    /// Whether the transport has been acquired and not yet released.
    pub fn is_connected(&self) -> bool {
        matches!(*self.lock_slot(), TransportSlot::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        self.in_flight.closing.load(Ordering::SeqCst)
    }

    /// Search social platforms.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        request.validate()?;
        info!(
            query = %request.query,
            results = request.results,
            page = request.page,
            "PostCrawl search"
        );

        let response = self.dispatch(Endpoint::Search, request).await?;
        let results = resolver::resolve_search_results(&response)?;
        info!(count = results.len(), "Search complete");
        Ok(results)
    }

    /// Extract content from post URLs.
    pub async fn extract(&self, request: &ExtractRequest) -> Result<Vec<ExtractedPost>> {
        request.validate()?;
        info!(urls = request.urls.len(), "PostCrawl extract");

        let response = self.dispatch(Endpoint::Extract, request).await?;
        let posts = resolver::resolve_extracted_posts(&response)?;
        info!(count = posts.len(), "Extract complete");
        Ok(posts)
    }

    /// Search, then extract every hit, in one request.
    pub async fn search_and_extract(
        &self,
        request: &SearchAndExtractRequest,
    ) -> Result<Vec<ExtractedPost>> {
        request.validate()?;
        info!(
            query = %request.query,
            results = request.results,
            page = request.page,
            "PostCrawl search-and-extract"
        );

        let response = self.dispatch(Endpoint::SearchAndExtract, request).await?;
        let posts = resolver::resolve_extracted_posts(&response)?;
        info!(count = posts.len(), "Search-and-extract complete");
        Ok(posts)
    }

    pub fn search_blocking(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.block_on(self.search(request))
    }

    pub fn extract_blocking(&self, request: &ExtractRequest) -> Result<Vec<ExtractedPost>> {
        self.block_on(self.extract(request))
    }

    pub fn search_and_extract_blocking(
        &self,
        request: &SearchAndExtractRequest,
    ) -> Result<Vec<ExtractedPost>> {
        self.block_on(self.search_and_extract(request))
    }

    /// Stop accepting calls, wait for in-flight ones, then release the
    /// transport. Calling it again is a no-op.
    pub async fn close(&self) {
        self.in_flight.closing.store(true, Ordering::SeqCst);
        self.in_flight.wait_idle().await;

        let previous = std::mem::replace(&mut *self.lock_slot(), TransportSlot::Closed);
        if let TransportSlot::Open(_) = previous {
            info!("PostCrawl client closed");
        }
    }

    pub fn close_blocking(&self) -> Result<()> {
        self.block_on(async {
            self.close().await;
            Ok(())
        })
    }

    async fn dispatch<B>(&self, endpoint: Endpoint, body: &B) -> Result<RawResponse>
    where
        B: Serialize + Sync,
    {
        let (_guard, transport) = self.begin_call()?;
        let transport: &dyn Transport = transport.as_ref();
        let path = endpoint.path();

        let response = self
            .retry
            .execute(|| self.invoker.invoke(transport, Method::POST, path, body))
            .await?;

        self.rate_limits.update(&response.headers);
        Ok(response)
    }

    fn begin_call(&self) -> Result<(CallGuard<'_>, Arc<dyn Transport>)> {
        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        let guard = CallGuard(&self.in_flight);
        if self.in_flight.closing.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        let transport = self.acquire_transport()?;
        Ok((guard, transport))
    }

    fn acquire_transport(&self) -> Result<Arc<dyn Transport>> {
        let mut slot = self.lock_slot();
        match &*slot {
            TransportSlot::Open(transport) => return Ok(Arc::clone(transport)),
            TransportSlot::Closed => return Err(closed_error()),
            TransportSlot::Idle => {}
        }

        let transport = (self.connector)(&self.config)?;
        debug!(base_url = %self.config.base_url, "Transport acquired");
        *slot = TransportSlot::Open(Arc::clone(&transport));
        Ok(transport)
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, TransportSlot> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn block_on<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.runtime.get().is_none() {
            // A worker thread keeps pooled connections alive between blocking
            // calls, so async calls can reuse them.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("postcrawl-blocking")
                .enable_all()
                .build()
                .map_err(PostCrawlError::network)?;
            // Another thread may have won the race; its runtime is kept.
            let _ = self.runtime.set(runtime);
        }
        match self.runtime.get() {
            Some(runtime) => runtime.block_on(future),
            None => Err(PostCrawlError::network("blocking runtime unavailable")),
        }
    }
}

impl Drop for PostCrawlClient {
    fn drop(&mut self) {
        // shutdown_background is safe even when dropped inside another runtime.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
