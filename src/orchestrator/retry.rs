use crate::config::FetchConfig;
use crate::model::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Timeout, bounded retries and backoff for one outbound request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
    pub retry_delay: Duration,
    pub jitter_ms: u64,
}

impl RetryPolicy {
    pub fn new(cfg: &FetchConfig) -> Self {
        Self {
            timeout: cfg.request_timeout(),
            max_retries: cfg.max_retries,
            rate_limit_backoff: Duration::from_millis(cfg.rate_limit_backoff_ms),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            jitter_ms: cfg.jitter_ms,
        }
    }

    /// Wait before retry number `attempt` (1-based). Rate limits back off
    /// linearly from a longer base, other transient errors double each time.
    pub fn backoff_for(&self, err: &FetchError, attempt: u32) -> Duration {
        let base = match err {
            FetchError::RateLimited => self.rate_limit_backoff.checked_mul(attempt),
            _ => self
                .retry_delay
                .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
        }
        .unwrap_or(Duration::MAX);
        if self.jitter_ms == 0 {
            base
        } else {
            base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=self.jitter_ms)))
        }
    }

    /// Runs `op` under the timeout, retrying transient failures. `NotFound`
    /// is returned at once; other errors after `max_retries` extra attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff_for(&err, attempt);
                    warn!(
                        "⚠ {} for {} (retry {}/{} in {:?})",
                        err, label, attempt, self.max_retries, wait
                    );
                    sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
