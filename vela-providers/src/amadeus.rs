use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use vela_core::criteria::SearchCriteria;
use vela_core::flight::{Availability, FlightResult, PriceInfo, RouteSegment};
use vela_core::provider::{
    ProviderAdapter, ProviderConfigPatch, ProviderError, ProviderStatus,
};
use vela_core::retry::RetryPolicy;

use crate::base::{parse_iso_duration, parse_money, UpstreamExecutor};
use crate::gateway::{GatewayRequest, ProviderGateway};
use crate::rate_limit::RateLimiter;

pub const PROVIDER: &str = "amadeus";

#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.amadeus.com".to_string(),
            timeout_ms: 10_000,
        }
    }
}

// ============================================================================
// Raw wire shape (Flight Offers Search)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ShoppingResponse {
    data: Vec<RawOffer>,
}

#[derive(Debug, Deserialize)]
struct RawOffer {
    id: String,
    itineraries: Vec<RawItinerary>,
    price: RawPrice,
    #[serde(rename = "validatingAirlineCodes", default)]
    validating_airline_codes: Vec<String>,
    #[serde(rename = "numberOfBookableSeats", default)]
    number_of_bookable_seats: i32,
    #[serde(rename = "travelerPricings", default)]
    traveler_pricings: Vec<RawTravelerPricing>,
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    duration: String,
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    departure: RawEndpoint,
    arrival: RawEndpoint,
    #[serde(rename = "carrierCode")]
    carrier_code: String,
    number: String,
    duration: String,
    aircraft: Option<RawAircraft>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    #[serde(rename = "iataCode")]
    iata_code: String,
    at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct RawAircraft {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    currency: String,
    total: String,
    base: String,
}

#[derive(Debug, Deserialize)]
struct RawTravelerPricing {
    #[serde(rename = "fareDetailsBySegment", default)]
    fare_details_by_segment: Vec<RawFareDetails>,
}

#[derive(Debug, Deserialize)]
struct RawFareDetails {
    class: Option<String>,
    #[serde(rename = "brandedFare")]
    branded_fare: Option<String>,
}

/// GDS adapter speaking the Amadeus flight-offers dialect
pub struct AmadeusAdapter {
    config: RwLock<AmadeusConfig>,
    upstream: UpstreamExecutor,
}

impl AmadeusAdapter {
    pub fn new(
        config: AmadeusConfig,
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
        let mut request = GatewayRequest::get("/v2/shopping/flight-offers")
            .with_query("originLocationCode", criteria.origin.trim().to_uppercase())
            .with_query(
                "destinationLocationCode",
                criteria.destination.trim().to_uppercase(),
            )
            .with_query("departureDate", criteria.departure_date)
            .with_query("adults", criteria.passengers.adults)
            .with_query("travelClass", criteria.cabin_class.code());
        if let Some(return_date) = criteria.return_date {
            request = request.with_query("returnDate", return_date);
        }
        if criteria.passengers.children > 0 {
            request = request.with_query("children", criteria.passengers.children);
        }
        if criteria.passengers.infants > 0 {
            request = request.with_query("infants", criteria.passengers.infants);
        }
        request
    }

    fn normalize(raw: Value) -> Result<Vec<FlightResult>, ProviderError> {
        let response: ShoppingResponse =
            serde_json::from_value(raw).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let mut results = Vec::with_capacity(response.data.len());
        for offer in response.data {
            results.push(normalize_offer(offer)?);
        }
        Ok(results)
    }
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::MalformedResponse {
        provider: PROVIDER.to_string(),
        reason: reason.into(),
    }
}

fn normalize_offer(offer: RawOffer) -> Result<FlightResult, ProviderError> {
    let mut segments = Vec::new();
    let mut total_duration = 0u32;
    for itinerary in &offer.itineraries {
        total_duration += parse_iso_duration(&itinerary.duration)
            .ok_or_else(|| malformed(format!("bad itinerary duration '{}'", itinerary.duration)))?;
        for raw in &itinerary.segments {
            segments.push(RouteSegment {
                origin: raw.departure.iata_code.clone(),
                destination: raw.arrival.iata_code.clone(),
                departure: raw.departure.at.and_utc(),
                arrival: raw.arrival.at.and_utc(),
                duration_minutes: parse_iso_duration(&raw.duration)
                    .ok_or_else(|| malformed(format!("bad segment duration '{}'", raw.duration)))?,
                aircraft: raw.aircraft.as_ref().map(|a| a.code.clone()),
            });
        }
    }

    let first_raw = offer
        .itineraries
        .iter()
        .flat_map(|i| i.segments.iter())
        .next()
        .ok_or_else(|| malformed("offer without segments"))?;
    let airline = offer
        .validating_airline_codes
        .first()
        .cloned()
        .unwrap_or_else(|| first_raw.carrier_code.clone());
    let flight_number = format!("{}{}", first_raw.carrier_code, first_raw.number);

    let total = parse_money(&offer.price.total)
        .ok_or_else(|| malformed(format!("bad price '{}'", offer.price.total)))?;
    let base = parse_money(&offer.price.base).unwrap_or(total);

    let flown: u32 = segments.iter().map(|s| s.duration_minutes).sum();
    let layover_count = segments.len() as u32 - 1;

    let booking_class = offer
        .traveler_pricings
        .first()
        .and_then(|tp| tp.fare_details_by_segment.first())
        .and_then(|fd| fd.class.clone())
        .unwrap_or_else(|| "Y".to_string());
    let fare_restrictions = offer
        .traveler_pricings
        .first()
        .and_then(|tp| tp.fare_details_by_segment.first())
        .and_then(|fd| fd.branded_fare.clone());

    let result = FlightResult {
        id: format!("{}-{}", PROVIDER, offer.id),
        airline,
        flight_number,
        segments,
        price: PriceInfo {
            amount: total,
            currency: offer.price.currency,
            taxes_and_fees: (total - base).max(0),
            points_options: Vec::new(),
        },
        availability: Availability {
            seats_remaining: offer.number_of_bookable_seats,
            booking_class,
            fare_restrictions,
        },
        total_duration_minutes: total_duration,
        layover_count,
        total_layover_minutes: total_duration.checked_sub(flown).filter(|m| *m > 0),
        score: None,
    };

    if !result.route_is_contiguous() {
        return Err(malformed(format!("non-contiguous route in offer {}", offer.id)));
    }
    Ok(result)
}

#[async_trait]
impl ProviderAdapter for AmadeusAdapter {
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
                    "Provider [{}] returned {} offers in {}ms",
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
        self.upstream
            .ping(GatewayRequest::get("/v1/reference-data/airlines").with_query("airlineCodes", "BA"))
            .await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::rate_limit::RateLimitSettings;
    use serde_json::json;

    struct CannedGateway {
        payload: Value,
    }

    #[async_trait]
    impl ProviderGateway for CannedGateway {
        async fn fetch(&self, _request: GatewayRequest) -> Result<Value, GatewayError> {
            Ok(self.payload.clone())
        }
    }

    fn offer_payload() -> Value {
        json!({
            "data": [{
                "id": "17",
                "itineraries": [{
                    "duration": "PT9H15M",
                    "segments": [
                        {
                            "departure": { "iataCode": "JFK", "at": "2026-09-14T18:00:00" },
                            "arrival": { "iataCode": "KEF", "at": "2026-09-14T23:30:00" },
                            "carrierCode": "FI",
                            "number": "614",
                            "duration": "PT5H30M",
                            "aircraft": { "code": "76W" }
                        },
                        {
                            "departure": { "iataCode": "KEF", "at": "2026-09-15T01:00:00" },
                            "arrival": { "iataCode": "LHR", "at": "2026-09-15T03:15:00" },
                            "carrierCode": "FI",
                            "number": "450",
                            "duration": "PT2H15M",
                            "aircraft": { "code": "75T" }
                        }
                    ]
                }],
                "price": { "currency": "USD", "total": "487.60", "base": "401.00" },
                "validatingAirlineCodes": ["FI"],
                "numberOfBookableSeats": 5,
                "travelerPricings": [{
                    "fareDetailsBySegment": [{ "class": "S", "brandedFare": "ECOLIGHT" }]
                }]
            }]
        })
    }

    fn adapter(payload: Value) -> AmadeusAdapter {
        AmadeusAdapter::new(
            AmadeusConfig {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
            Arc::new(CannedGateway { payload }),
            Arc::new(RateLimiter::new(RateLimitSettings::default())),
            RetryPolicy::none(),
        )
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            return_date: None,
            passengers: Default::default(),
            cabin_class: vela_core::criteria::CabinClass::Economy,
            flexible_dates: false,
        }
    }

    #[tokio::test]
    async fn test_normalizes_offer_payload() {
        let results = adapter(offer_payload()).search(&criteria()).await.unwrap();
        assert_eq!(results.len(), 1);

        let flight = &results[0];
        assert_eq!(flight.id, "amadeus-17");
        assert_eq!(flight.airline, "FI");
        assert_eq!(flight.flight_number, "FI614");
        assert_eq!(flight.segments.len(), 2);
        assert_eq!(flight.price.amount, 48760);
        assert_eq!(flight.price.taxes_and_fees, 8660);
        assert_eq!(flight.total_duration_minutes, 555);
        assert_eq!(flight.layover_count, 1);
        // 9h15m total minus 7h45m flown leaves a 90 minute layover
        assert_eq!(flight.total_layover_minutes, Some(90));
        assert_eq!(flight.availability.booking_class, "S");
        assert!(flight.route_is_contiguous());
    }

    #[tokio::test]
    async fn test_rejects_garbage_payload() {
        let err = adapter(json!({ "unexpected": true }))
            .search(&criteria())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_rejects_broken_route() {
        let mut payload = offer_payload();
        payload["data"][0]["itineraries"][0]["segments"][1]["departure"]["iataCode"] =
            json!("CDG");
        let err = adapter(payload).search(&criteria()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_denies_without_upstream_call() {
        let adapter = AmadeusAdapter::new(
            AmadeusConfig::default(),
            Arc::new(CannedGateway {
                payload: offer_payload(),
            }),
            Arc::new(RateLimiter::new(RateLimitSettings {
                per_minute: 0,
                per_hour: 0,
            })),
            RetryPolicy::none(),
        );
        let err = adapter.search(&criteria()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        // Nothing reached the upstream, so no attempt was recorded
        assert_eq!(adapter.upstream.health.snapshot().await.total_requests, 0);
    }

    #[tokio::test]
    async fn test_config_patch() {
        let adapter = adapter(offer_payload());
        assert!(adapter.validate_config().await);

        adapter
            .update_config(ProviderConfigPatch {
                base_url: Some("https://test.api.amadeus.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            adapter.config.read().await.base_url,
            "https://test.api.amadeus.com"
        );

        let err = adapter
            .update_config(ProviderConfigPatch {
                base_url: Some("ftp://nope".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig { .. }));
    }
}
