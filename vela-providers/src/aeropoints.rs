use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use vela_core::criteria::SearchCriteria;
use vela_core::flight::{Availability, FlightResult, PointsOption, PriceInfo, RouteSegment};
use vela_core::provider::{
    ProviderAdapter, ProviderConfigPatch, ProviderError, ProviderStatus,
};
use vela_core::retry::RetryPolicy;

use crate::base::UpstreamExecutor;
use crate::gateway::{GatewayRequest, ProviderGateway};
use crate::rate_limit::RateLimiter;

pub const PROVIDER: &str = "aeropoints";

#[derive(Debug, Clone)]
pub struct AeropointsConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for AeropointsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.aeropoints.io".to_string(),
            timeout_ms: 8_000,
        }
    }
}

// ============================================================================
// Raw wire shape (award availability)
// ============================================================================

#[derive(Debug, Deserialize)]
struct AwardResponse {
    results: Vec<RawAward>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAward {
    id: String,
    program: String,
    miles: u64,
    taxes: RawTaxes,
    /// What the same seat would cost in cash, minor units
    cash_price: i64,
    currency: String,
    seats_available: i32,
    booking_class: String,
    flights: Vec<RawFlight>,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTaxes {
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlight {
    origin: String,
    destination: String,
    departs_at: DateTime<Utc>,
    arrives_at: DateTime<Utc>,
    duration_minutes: u32,
    airline: String,
    flight_number: String,
    aircraft: Option<String>,
}

/// Award-availability adapter; the only source that emits points options
pub struct AeropointsAdapter {
    config: RwLock<AeropointsConfig>,
    upstream: UpstreamExecutor,
}

impl AeropointsAdapter {
    pub fn new(
        config: AeropointsConfig,
        gateway: Arc<dyn ProviderGateway>,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            upstream: UpstreamExecutor::new(PROVIDER, gateway, rate_limiter, retry),
        }
    }

    fn build_request(criteria: &SearchCriteria) -> GatewayRequest {
        let mut request = GatewayRequest::get("/v1/awards/search")
            .with_query("from", criteria.origin.trim().to_uppercase())
            .with_query("to", criteria.destination.trim().to_uppercase())
            .with_query("date", criteria.departure_date)
            .with_query("cabin", criteria.cabin_class.code())
            .with_query("travellers", criteria.passengers.total());
        if criteria.flexible_dates {
            request = request.with_query("flex", "true");
        }
        request
    }

    fn normalize(raw: Value) -> Result<Vec<FlightResult>, ProviderError> {
        let response: AwardResponse =
            serde_json::from_value(raw).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        response.results.into_iter().map(normalize_award).collect()
    }
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::MalformedResponse {
        provider: PROVIDER.to_string(),
        reason: reason.into(),
    }
}

fn normalize_award(award: RawAward) -> Result<FlightResult, ProviderError> {
    let first = award
        .flights
        .first()
        .ok_or_else(|| malformed(format!("award {} has no flights", award.id)))?;
    let airline = first.airline.clone();
    let flight_number = first.flight_number.clone();

    let segments: Vec<RouteSegment> = award
        .flights
        .iter()
        .map(|f| RouteSegment {
            origin: f.origin.clone(),
            destination: f.destination.clone(),
            departure: f.departs_at,
            arrival: f.arrives_at,
            duration_minutes: f.duration_minutes,
            aircraft: f.aircraft.clone(),
        })
        .collect();

    let flown: u32 = segments.iter().map(|s| s.duration_minutes).sum();
    let layover_minutes: i64 = segments
        .windows(2)
        .map(|pair| (pair[1].departure - pair[0].arrival).num_minutes().max(0))
        .sum();

    let result = FlightResult {
        id: format!("{}-{}", PROVIDER, award.id),
        airline,
        flight_number,
        segments,
        price: PriceInfo {
            amount: award.cash_price,
            currency: award.currency.clone(),
            taxes_and_fees: award.taxes.amount,
            points_options: vec![PointsOption {
                program: award.program.clone(),
                points: award.miles,
                fees_amount: award.taxes.amount,
                fees_currency: award.taxes.currency.clone(),
            }],
        },
        availability: Availability {
            seats_remaining: award.seats_available,
            booking_class: award.booking_class.clone(),
            fare_restrictions: Some("Award fare; changes per program rules".to_string()),
        },
        total_duration_minutes: flown + layover_minutes as u32,
        layover_count: award.flights.len() as u32 - 1,
        total_layover_minutes: (layover_minutes > 0).then_some(layover_minutes as u32),
        score: award.score,
    };

    if !result.route_is_contiguous() {
        return Err(malformed(format!(
            "non-contiguous route in award {}",
            award.id
        )));
    }
    Ok(result)
}

#[async_trait]
impl ProviderAdapter for AeropointsAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<FlightResult>, ProviderError> {
        let request = Self::build_request(criteria);
        let (raw, elapsed_ms) = self.upstream.execute(request).await?;
        match Self::normalize(raw) {
            Ok(results) => {
                self.upstream.record_success(elapsed_ms).await;
                info!(
                    "Provider [{}] returned {} awards in {}ms",
                    PROVIDER,
                    results.len(),
                    elapsed_ms
                );
                Ok(results)
            }
            Err(err) => {
                self.upstream.record_failure(elapsed_ms, &err).await;
                Err(err)
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.upstream.ping(GatewayRequest::get("/v1/status")).await
    }

    async fn status(&self) -> ProviderStatus {
        self.upstream.health.status().await
    }

    async fn validate_config(&self) -> bool {
        let config = self.config.read().await;
        !config.api_key.is_empty() && config.base_url.starts_with("http") && config.timeout_ms > 0
    }

    async fn update_config(&self, patch: ProviderConfigPatch) -> Result<(), ProviderError> {
        let mut config = self.config.write().await;
        if let Some(api_key) = patch.api_key {
            config.api_key = api_key;
        }
        if let Some(base_url) = patch.base_url {
            if !base_url.starts_with("http") {
                return Err(ProviderError::InvalidConfig {
                    provider: PROVIDER.to_string(),
                    reason: format!("bad base_url '{}'", base_url),
                });
            }
            config.base_url = base_url;
        }
        if let Some(timeout_ms) = patch.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        Ok(())
    }
}
