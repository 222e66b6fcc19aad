use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use vela_core::criteria::SearchCriteria;
use vela_core::flight::FlightResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<FlightResult>,
    expires_at: DateTime<Utc>,
}

/// Content-addressed cache of per-provider normalized results, keyed by a
/// fingerprint of the search request. Expiry is lazy TTL; there is no LRU.
/// Concurrent identical writes are last-writer-wins, which is fine because
/// values for the same key are equivalent.
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Deterministic fingerprint of a normalized request. Airport codes are
    /// trimmed and uppercased, the departure date is truncated to the day,
    /// and passenger counts participate so a family-of-five search never
    /// reuses a solo traveller's entry.
    pub fn fingerprint(criteria: &SearchCriteria, provider: &str) -> String {
        format!(
            "search:{}:{}:{}:{}:{}:{}-{}-{}",
            criteria.origin.trim().to_uppercase(),
            criteria.destination.trim().to_uppercase(),
            criteria.departure_date,
            criteria.cabin_class.code(),
            provider,
            criteria.passengers.adults,
            criteria.passengers.children,
            criteria.passengers.infants,
        )
    }

    pub async fn get(&self, key: &str) -> Option<Vec<FlightResult>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Utc::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired; drop it so the table does not accumulate stale entries
        self.entries.write().await.remove(key);
        debug!("Cache entry [{}] expired", key);
        None
    }

    pub async fn set(&self, key: &str, value: Vec<FlightResult>, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry for a route, e.g. after a schedule change upstream
    pub async fn invalidate_route(&self, origin: &str, destination: &str) -> usize {
        let prefix = format!(
            "search:{}:{}:",
            origin.trim().to_uppercase(),
            destination.trim().to_uppercase()
        );
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
