//! Transport retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use sonde_types::ModelError;

/// Bounds on transport retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// How many times a retryable failure is retried (total attempts are
    /// one more than this).
    pub max_transport_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transport_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(retry);
        let jitter_cap = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter = Duration::from_millis(rand::rng().random_range(0..jitter_cap));
        exp + jitter
    }
}

/// Run `attempt` until it succeeds, fails terminally, or the retry budget
/// is spent. Jitter only delays retries; it never changes outcomes.
pub(crate) async fn with_transport_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut attempt: F,
) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retries < policy.max_transport_retries => {
                let delay = policy.backoff(retries);
                retries += 1;
                tracing::warn!(
                    error = %e,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "{what} failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
