use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff: Duration,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(2000),
            attempt_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or `max_retries` transient
/// failures have been retried. Each attempt is bounded by `attempt_timeout`;
/// an elapsed timeout counts as a transient failure.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(FetchError::Transient(format!(
                "timed out after {:.0}s",
                policy.attempt_timeout.as_secs_f64()
            ))),
        };

        match result {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; backing off {:.1}s",
                    label,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
