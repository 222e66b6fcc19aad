use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use vela_core::provider::ProviderError;
use vela_core::retry::RetryPolicy;

use crate::gateway::{classify, GatewayRequest, ProviderGateway};
use crate::health::HealthTracker;
use crate::rate_limit::RateLimiter;

/// The sequence every adapter shares: rate-limit admission, gateway call,
/// error classification, retry with backoff, health accounting. Only the
/// request/response translation varies per provider.
pub(crate) struct UpstreamExecutor {
    pub provider: &'static str,
    pub gateway: Arc<dyn ProviderGateway>,
    pub rate_limiter: Arc<RateLimiter>,
    pub retry: RetryPolicy,
    pub health: HealthTracker,
}

impl UpstreamExecutor {
    pub(crate) fn new(
        provider: &'static str,
        gateway: Arc<dyn ProviderGateway>,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            gateway,
            rate_limiter,
            retry,
            health: HealthTracker::new(provider),
        }
    }

    /// Execute one upstream request. Admission denial never contacts the
    /// source; every attempted call updates the health counters. Returns the
    /// raw payload and the elapsed time of the winning attempt.
    pub(crate) async fn execute(
        &self,
        request: GatewayRequest,
    ) -> Result<(Value, u64), ProviderError> {
        let key = format!("{}:search", self.provider);
        if !self.rate_limiter.try_acquire(&key).await {
            return Err(ProviderError::RateLimited {
                provider: self.provider.to_string(),
            });
        }

        let health = &self.health;
        let provider = self.provider;
        let gateway = &self.gateway;
        self.retry
            .run(provider, || {
                let request = request.clone();
                let gateway = Arc::clone(gateway);
                async move {
                    let started = Instant::now();
                    match gateway.fetch(request).await {
                        Ok(value) => Ok((value, started.elapsed().as_millis() as u64)),
                        Err(err) => {
                            let classified = classify(provider, err);
                            health
                                .record_failure(
                                    started.elapsed().as_millis() as u64,
                                    &classified.to_string(),
                                )
                                .await;
                            Err(classified)
                        }
                    }
                }
            })
            .await
    }

    pub(crate) async fn record_success(&self, elapsed_ms: u64) {
        self.health.record_success(elapsed_ms).await;
    }

    pub(crate) async fn record_failure(&self, elapsed_ms: u64, err: &ProviderError) {
        self.health.record_failure(elapsed_ms, &err.to_string()).await;
    }

    /// Liveness probe; bypasses rate limiting and health accounting
    pub(crate) async fn ping(&self, request: GatewayRequest) -> bool {
        match self.gateway.fetch(request).await {
            Ok(_) => true,
            Err(err) => {
                debug!("Health probe [{}] failed: {}", self.provider, err);
                false
            }
        }
    }
}

/// Parse an ISO-8601 duration like "PT7H30M" or "P1DT2H" into minutes
pub(crate) fn parse_iso_duration(value: &str) -> Option<u32> {
    let rest = value.strip_prefix('P')?;
    let (day_part, time_part) = match rest.split_once('T') {
        Some((days, time)) => (days, time),
        None => (rest, ""),
    };

    let mut minutes: u32 = 0;
    if !day_part.is_empty() {
        let days: u32 = day_part.strip_suffix('D')?.parse().ok()?;
        minutes += days * 24 * 60;
    }

    let mut number = String::new();
    for c in time_part.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let parsed: u32 = number.parse().ok()?;
            number.clear();
            match c {
                'H' => minutes += parsed * 60,
                'M' => minutes += parsed,
                'S' => {}
                _ => return None,
            }
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(minutes)
}

/// Parse a decimal money string like "450.00" into minor units
pub(crate) fn parse_money(value: &str) -> Option<i64> {
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, "0"),
    };
    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        2 => frac.parse().ok()?,
        _ => frac[..2].parse().ok()?,
    };
    Some(whole * 100 + cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT7H"), Some(420));
        assert_eq!(parse_iso_duration("PT7H30M"), Some(450));
        assert_eq!(parse_iso_duration("PT45M"), Some(45));
        assert_eq!(parse_iso_duration("P1DT2H"), Some(1560));
        assert_eq!(parse_iso_duration("nonsense"), None);
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("450.00"), Some(45000));
        assert_eq!(parse_money("450"), Some(45000));
        assert_eq!(parse_money("0.5"), Some(50));
        assert_eq!(parse_money("1299.99"), Some(129999));
        assert_eq!(parse_money("abc"), None);
    }
}
