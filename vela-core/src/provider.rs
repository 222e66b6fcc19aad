use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::criteria::SearchCriteria;
use crate::flight::FlightResult;

/// Provider-scoped failures. The orchestrator records these against the
/// search and keeps going; they never fail the search on their own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limit exceeded for provider [{provider}]")]
    RateLimited { provider: String },
    #[error("Provider [{provider}] unavailable: {reason}")]
    Unavailable { provider: String, reason: String },
    #[error("Provider [{provider}] rejected the request (status {status}): {reason}")]
    Rejected {
        provider: String,
        status: u16,
        reason: String,
    },
    #[error("Malformed response from provider [{provider}]: {reason}")]
    MalformedResponse { provider: String, reason: String },
    #[error("Search timeout for provider [{provider}]")]
    Timeout { provider: String },
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Invalid configuration for provider [{provider}]: {reason}")]
    InvalidConfig { provider: String, reason: String },
}

impl ProviderError {
    /// Whether a retry could plausibly succeed. 429s, 5xx-class outages and
    /// timeouts qualify; upstream rejections and malformed payloads do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Unavailable { .. }
                | ProviderError::Timeout { .. }
        )
    }
}

/// Per-provider counters, mutated after every upstream attempt
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderHealthRecord {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_response_time_ms: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderHealthRecord {
    pub fn record_success(&mut self, elapsed_ms: u64) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_response_time_ms += elapsed_ms;
        self.last_success = Some(Utc::now());
    }

    pub fn record_failure(&mut self, elapsed_ms: u64, error: &str) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.total_response_time_ms += elapsed_ms;
        self.last_error = Some(error.to_string());
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }

    pub fn average_response_time_ms(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_response_time_ms as f64 / self.total_requests as f64
    }
}

/// Point-in-time health snapshot exposed by an adapter
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub is_healthy: bool,
    pub last_successful_request: Option<DateTime<Utc>>,
    pub error_rate: f64,
    pub average_response_time_ms: f64,
}

/// Runtime-adjustable subset of an adapter's configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfigPatch {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Capability implemented once per upstream flight-data source. Each call to
/// `search` consults the rate limiter, translates the request, retries per
/// the adapter's policy and normalizes the raw payload.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Execute one provider search and normalize the response
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<FlightResult>, ProviderError>;

    /// Cheap liveness probe against the upstream source
    async fn health_check(&self) -> bool;

    /// Health snapshot derived from accumulated counters
    async fn status(&self) -> ProviderStatus;

    async fn validate_config(&self) -> bool;

    async fn update_config(&self, patch: ProviderConfigPatch) -> Result<(), ProviderError>;
}
