use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Bounded retry with a fixed pause, applied only to transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Run `make_call` until it succeeds, fails with a non-transient error, or
    /// `max_retries` retries have been spent. Each attempt gets a fresh future
    /// from `make_call`.
    ///
    /// The pause is a plain `tokio::time::sleep`: dropping the returned future
    /// while it waits stops the loop without another attempt.
    pub async fn execute<T, F, Fut>(&self, mut make_call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            match make_call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
