use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use vela_core::criteria::SearchCriteria;
use vela_core::flight::{Availability, FlightResult, PriceInfo, RouteSegment};
use vela_core::provider::{
    ProviderAdapter, ProviderConfigPatch, ProviderError, ProviderStatus,
};

/// What a [`MockAdapter`] does when its search is invoked
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Results(Vec<FlightResult>),
    Fail(ProviderError),
    /// Fail the first `failures` calls, then succeed
    FailThenSucceed {
        failures: usize,
        results: Vec<FlightResult>,
    },
}

/// Scripted adapter for tests and local wiring, in the spirit of a stub
/// payment gateway: deterministic, no network, observable call count.
pub struct MockAdapter {
    name: String,
    delay: Duration,
    outcome: MockOutcome,
    calls: AtomicUsize,
    healthy: bool,
}

impl MockAdapter {
    pub fn new(name: &str, delay: Duration, outcome: MockOutcome) -> Self {
        Self {
            name: name.to_string(),
            delay,
            outcome,
            calls: AtomicUsize::new(0),
            healthy: true,
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// How many times `search` has been invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<FlightResult>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            MockOutcome::Results(results) => Ok(results.clone()),
            MockOutcome::Fail(err) => Err(err.clone()),
            MockOutcome::FailThenSucceed { failures, results } => {
                if call < *failures {
                    Err(ProviderError::Unavailable {
                        provider: self.name.clone(),
                        reason: "scripted failure".to_string(),
                    })
                } else {
                    Ok(results.clone())
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            provider: self.name.clone(),
            is_healthy: self.healthy,
            last_successful_request: None,
            error_rate: 0.0,
            average_response_time_ms: self.delay.as_millis() as f64,
        }
    }

    async fn validate_config(&self) -> bool {
        true
    }

    async fn update_config(&self, _patch: ProviderConfigPatch) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Minimal direct JFK→LHR result for tests; price and score vary per call
pub fn sample_flight(id: &str, price_amount: i64, duration_minutes: u32) -> FlightResult {
    let departure = Utc.with_ymd_and_hms(2026, 9, 14, 8, 0, 0).unwrap();
    FlightResult {
        id: id.to_string(),
        airline: "BA".to_string(),
        flight_number: "BA178".to_string(),
        segments: vec![RouteSegment {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure,
            arrival: departure + chrono::Duration::minutes(duration_minutes as i64),
            duration_minutes,
            aircraft: Some("77W".to_string()),
        }],
        price: PriceInfo {
            amount: price_amount,
            currency: "USD".to_string(),
            taxes_and_fees: price_amount / 10,
            points_options: Vec::new(),
        },
        availability: Availability {
            seats_remaining: 9,
            booking_class: "Y".to_string(),
            fare_restrictions: None,
        },
        total_duration_minutes: duration_minutes,
        layover_count: 0,
        total_layover_minutes: None,
        score: None,
    }
}
