//! Bounded retry with exponential backoff for store reads.
//!
//! Writes are never routed through here: a retried insert whose first attempt
//! actually reached the server would duplicate the message.

use crate::error::ChatResult;
use log::warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Randomise each delay by ±30%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned as-is.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, what: &str, mut op: F) -> ChatResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChatResult<T>>,
{
    let mut attempt = 0;
    let mut backoff = config.initial_backoff;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = calculate_backoff(backoff, config.jitter);
                warn!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    what, e, attempt, config.max_retries, delay
                );
                tokio::time::sleep(delay).await;

                backoff = Duration::from_millis(
                    ((backoff.as_millis() as f64 * config.backoff_multiplier)
                        .min(config.max_backoff.as_millis() as f64)) as u64,
                );
            }
            Err(e) => return Err(e),
        }
    }
}

fn calculate_backoff(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    } else {
        base
    }
}
