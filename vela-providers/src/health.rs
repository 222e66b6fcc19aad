use chrono::Utc;
use tokio::sync::RwLock;

use vela_core::provider::{ProviderHealthRecord, ProviderStatus};

// An adapter is reported unhealthy once half its calls fail
const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// Interior-mutable health counters for one adapter instance. Written after
/// every upstream attempt, read by health-check callers concurrently.
pub struct HealthTracker {
    provider: String,
    record: RwLock<ProviderHealthRecord>,
}

impl HealthTracker {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            record: RwLock::new(ProviderHealthRecord::default()),
        }
    }

    pub async fn record_success(&self, elapsed_ms: u64) {
        self.record.write().await.record_success(elapsed_ms);
    }

    pub async fn record_failure(&self, elapsed_ms: u64, error: &str) {
        self.record.write().await.record_failure(elapsed_ms, error);
    }

    pub async fn snapshot(&self) -> ProviderHealthRecord {
        self.record.read().await.clone()
    }

    pub async fn status(&self) -> ProviderStatus {
        let record = self.record.read().await;
        ProviderStatus {
            provider: self.provider.clone(),
            is_healthy: record.error_rate() < UNHEALTHY_ERROR_RATE,
            last_successful_request: record.last_success,
            error_rate: record.error_rate(),
            average_response_time_ms: record.average_response_time_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_tracker_is_healthy() {
        let tracker = HealthTracker::new("amadeus");
        let status = tracker.status().await;
        assert!(status.is_healthy);
        assert_eq!(status.error_rate, 0.0);
        assert!(status.last_successful_request.is_none());
    }

    #[tokio::test]
    async fn test_failures_flip_health() {
        let tracker = HealthTracker::new("amadeus");
        tracker.record_success(100).await;
        tracker.record_failure(200, "status 503").await;
        tracker.record_failure(250, "status 503").await;

        let status = tracker.status().await;
        assert!(!status.is_healthy);
        assert!(status.error_rate > UNHEALTHY_ERROR_RATE);
        assert_eq!(tracker.snapshot().await.total_requests, 3);
    }
}
