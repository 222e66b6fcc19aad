use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::provider::ProviderError;

/// Explicit retry policy consumed by the generic executor below, instead of
/// backoff logic scattered through each adapter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; useful for tests and health probes
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// initial_delay * multiplier^attempt, plus up to 20% jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let millis = if self.jitter && base > 0.0 {
            base + rand::thread_rng().gen_range(0.0..base * 0.2)
        } else {
            base
        };
        Duration::from_millis(millis as u64)
    }

    /// Run `op`, sleeping between attempts while failures stay retryable.
    /// Health accounting is the caller's concern; the executor only decides
    /// whether another attempt happens.
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "Retryable failure [{}] on attempt {}: {}. Backing off {}ms",
                        name,
                        attempt + 1,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
