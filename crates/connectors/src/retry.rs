//! Exponential backoff with jitter for retriable connector failures.
//! Non-retriable errors surface immediately; retriable ones are retried up
//! to a bounded attempt count before giving up (§4.5, §7).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::connector::ConnectorError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(16));
        let capped = exp.min(self.max_delay.as_millis());
        let jitter_frac: f64 = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = (capped as f64 * jitter_frac) as u64;
        Duration::from_millis(jittered)
    }
}

/// Run `op` up to `policy.max_attempts` times. A `Permanent` error returns
/// immediately on the first attempt; a `Retriable` error is retried with
/// backoff until attempts are exhausted, at which point the last error is
/// returned to the caller (who classifies it as an item error for Sync, or
/// a retriable-run outcome for Card Discovery, per §7).
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut op: F) -> Result<T, ConnectorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectorError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retriable() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}
