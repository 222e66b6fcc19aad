use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 3600;

/// Ceilings applied to every rate-limit key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_minute: 30,
            per_hour: 500,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    bucket: i64,
    count: u32,
}

impl Window {
    fn new(bucket: i64) -> Self {
        Self { bucket, count: 0 }
    }

    // Bucket rollover is lazy: whoever touches the window next resets it
    fn roll(&mut self, bucket: i64) {
        if self.bucket != bucket {
            self.bucket = bucket;
            self.count = 0;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyWindows {
    minute: Window,
    hour: Window,
}

/// Dual fixed-window admission control, shared by every adapter instance of
/// the same provider. A request is admitted only when both the per-minute
/// and per-hour windows still have capacity.
pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<String, KeyWindows>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admission check without consuming capacity
    pub async fn check_limit(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let state = Self::rolled(&mut windows, key, Utc::now().timestamp());
        state.minute.count < self.settings.per_minute && state.hour.count < self.settings.per_hour
    }

    /// Consume one unit of capacity in both windows
    pub async fn increment(&self, key: &str) {
        let mut windows = self.windows.lock().await;
        let state = Self::rolled(&mut windows, key, Utc::now().timestamp());
        state.minute.count += 1;
        state.hour.count += 1;
    }

    /// Check and consume in one critical section. Adapters call this so two
    /// concurrent searches cannot both pass a check against the same slot.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let settings = self.settings;
        let state = Self::rolled(&mut windows, key, Utc::now().timestamp());
        if state.minute.count >= settings.per_minute || state.hour.count >= settings.per_hour {
            warn!(
                "Rate limit [{}] denied: {}/min of {}, {}/hr of {}",
                key, state.minute.count, settings.per_minute, state.hour.count, settings.per_hour
            );
            return false;
        }
        state.minute.count += 1;
        state.hour.count += 1;
        true
    }

    /// Capacity left in the tighter of the two windows
    pub async fn remaining(&self, key: &str) -> u32 {
        let mut windows = self.windows.lock().await;
        let settings = self.settings;
        let state = Self::rolled(&mut windows, key, Utc::now().timestamp());
        let minute_left = settings.per_minute.saturating_sub(state.minute.count);
        let hour_left = settings.per_hour.saturating_sub(state.hour.count);
        minute_left.min(hour_left)
    }

    fn rolled<'a>(
        windows: &'a mut HashMap<String, KeyWindows>,
        key: &str,
        now_secs: i64,
    ) -> &'a mut KeyWindows {
        let minute_bucket = now_secs / MINUTE_SECS;
        let hour_bucket = now_secs / HOUR_SECS;
        let state = windows.entry(key.to_string()).or_insert_with(|| KeyWindows {
            minute: Window::new(minute_bucket),
            hour: Window::new(hour_bucket),
        });
        state.minute.roll(minute_bucket);
        state.hour.roll(hour_bucket);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, per_hour: u32) -> RateLimiter {
        RateLimiter::new(RateLimitSettings {
            per_minute,
            per_hour,
        })
    }

    #[tokio::test]
    async fn test_denies_once_minute_ceiling_reached() {
        let limiter = limiter(2, 100);
        assert!(limiter.try_acquire("amadeus:search").await);
        assert!(limiter.try_acquire("amadeus:search").await);
        assert!(!limiter.try_acquire("amadeus:search").await);
        assert!(!limiter.check_limit("amadeus:search").await);
    }

    #[tokio::test]
    async fn test_hour_ceiling_binds_independently() {
        let limiter = limiter(100, 3);
        for _ in 0..3 {
            assert!(limiter.try_acquire("sabre:search").await);
        }
        assert!(!limiter.try_acquire("sabre:search").await);
    }

    #[tokio::test]
    async fn test_remaining_decreases_monotonically() {
        let limiter = limiter(5, 100);
        let mut previous = limiter.remaining("amadeus:search").await;
        assert_eq!(previous, 5);
        for _ in 0..5 {
            limiter.increment("amadeus:search").await;
            let current = limiter.remaining("amadeus:search").await;
            assert!(current < previous);
            previous = current;
        }
        assert_eq!(previous, 0);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let limiter = limiter(1, 10);
        assert!(limiter.try_acquire("amadeus:search").await);
        assert!(!limiter.try_acquire("amadeus:search").await);
        // A different provider key has its own windows
        assert!(limiter.try_acquire("sabre:search").await);
    }

    #[tokio::test]
    async fn test_minute_rollover_resets_count() {
        let limiter = limiter(1, 100);
        assert!(limiter.try_acquire("amadeus:search").await);
        assert!(!limiter.check_limit("amadeus:search").await);

        // Force the stored bucket into the past; next access rolls it over
        {
            let mut windows = limiter.windows.lock().await;
            let state = windows.get_mut("amadeus:search").unwrap();
            state.minute.bucket -= 2;
        }
        assert!(limiter.check_limit("amadeus:search").await);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_respect_ceiling() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter(10, 100));
        let mut handles = Vec::new();
        for _ in 0..25 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(
                async move { limiter.try_acquire("shared").await },
            ));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
