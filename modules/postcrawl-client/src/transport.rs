use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use thiserror::Error;

use crate::error::BoxError;

/// One fully-prepared HTTP exchange, built by the invoker.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// Whatever the server answered, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Failure to complete the exchange at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(#[source] BoxError),

    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),
}

/// The network seam. `HttpTransport` is the production implementation; tests
/// substitute a scripted one.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let resp = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout)
            .body(request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.text().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(Box::new(err))
    } else {
        TransportError::Connection(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_not_a_timeout() {
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let request = HttpRequest {
            method: Method::POST,
            url: "http://127.0.0.1:1/v1/search".to_string(),
            headers: HeaderMap::new(),
            body: b"{}".to_vec(),
            timeout: Duration::from_secs(5),
        };

        match transport.send(request).await {
            Err(TransportError::Connection(_)) => {}
            other => panic!("expected Connection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silent_server_is_a_timeout() {
        // Accepted by the backlog, never answered.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let request = HttpRequest {
            method: Method::POST,
            url: format!("http://{addr}/v1/search"),
            headers: HeaderMap::new(),
            body: b"{}".to_vec(),
            timeout: Duration::from_millis(200),
        };

        match transport.send(request).await {
            Err(TransportError::Timeout(_)) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
        drop(listener);
    }
}
