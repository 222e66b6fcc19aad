use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::info;

use vela_core::criteria::SearchCriteria;
use vela_core::flight::{Availability, FlightResult, PriceInfo, RouteSegment};
use vela_core::provider::{
    ProviderAdapter, ProviderConfigPatch, ProviderError, ProviderStatus,
};
use vela_core::retry::RetryPolicy;

use crate::base::UpstreamExecutor;
use crate::gateway::{GatewayRequest, ProviderGateway};
use crate::rate_limit::RateLimiter;

pub const PROVIDER: &str = "sabre";

#[derive(Debug, Clone)]
pub struct SabreConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for SabreConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: "https://api.sabre.com".to_string(),
            timeout_ms: 12_000,
        }
    }
}

// ============================================================================
// Raw wire shape (itinerary groups with scheduled legs)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ShopResponse {
    #[serde(rename = "itineraryGroups")]
    itinerary_groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    itineraries: Vec<RawItinerary>,
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    id: u64,
    legs: Vec<RawLeg>,
    #[serde(rename = "pricingInformation")]
    pricing_information: Vec<RawPricing>,
    #[serde(rename = "seatsRemaining", default)]
    seats_remaining: i32,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    #[serde(rename = "elapsedTime")]
    elapsed_time: u32,
    schedules: Vec<RawSchedule>,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    departure: RawStop,
    arrival: RawStop,
    carrier: RawCarrier,
    #[serde(rename = "elapsedTime")]
    elapsed_time: u32,
    #[serde(rename = "aircraftType")]
    aircraft_type: Option<String>,
    #[serde(rename = "bookingClass", default)]
    booking_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStop {
    airport: String,
    #[serde(rename = "dateTime")]
    date_time: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct RawCarrier {
    marketing: String,
    #[serde(rename = "marketingFlightNumber")]
    marketing_flight_number: u32,
}

#[derive(Debug, Deserialize)]
struct RawPricing {
    fare: RawFare,
}

#[derive(Debug, Deserialize)]
struct RawFare {
    #[serde(rename = "totalFare")]
    total_fare: RawTotalFare,
    #[serde(rename = "fareConstruction", default)]
    fare_construction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTotalFare {
    #[serde(rename = "totalPrice")]
    total_price: f64,
    #[serde(rename = "totalTaxAmount", default)]
    total_tax_amount: f64,
    currency: String,
}

/// GDS adapter speaking the Sabre itinerary-group dialect
pub struct SabreAdapter {
    config: RwLock<SabreConfig>,
    upstream: UpstreamExecutor,
}

impl SabreAdapter {
    pub fn new(
        config: SabreConfig,
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
        // Sabre shops via a POSTed request document rather than query params
        let mut origin_destinations = vec![json!({
            "origin": criteria.origin.trim().to_uppercase(),
            "destination": criteria.destination.trim().to_uppercase(),
            "departureDate": criteria.departure_date,
        })];
        if let Some(return_date) = criteria.return_date {
            origin_destinations.push(json!({
                "origin": criteria.destination.trim().to_uppercase(),
                "destination": criteria.origin.trim().to_uppercase(),
                "departureDate": return_date,
            }));
        }
        GatewayRequest::post(
            "/v4/offers/shop",
            json!({
                "originDestinations": origin_destinations,
                "passengers": {
                    "adults": criteria.passengers.adults,
                    "children": criteria.passengers.children,
                    "infants": criteria.passengers.infants,
                },
                "cabin": criteria.cabin_class.code(),
                "flexibleDates": criteria.flexible_dates,
            }),
        )
    }

    fn normalize(raw: Value) -> Result<Vec<FlightResult>, ProviderError> {
        let response: ShopResponse =
            serde_json::from_value(raw).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let mut results = Vec::new();
        for group in response.itinerary_groups {
            for itinerary in group.itineraries {
                results.push(normalize_itinerary(itinerary)?);
            }
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

fn normalize_itinerary(itinerary: RawItinerary) -> Result<FlightResult, ProviderError> {
    let mut segments = Vec::new();
    let mut booking_class = None;
    // Connection time only counts within a leg; the stay between an
    // outbound and a return leg is not a layover
    let mut layover_minutes: i64 = 0;
    for leg in &itinerary.legs {
        let mut previous_arrival: Option<chrono::DateTime<chrono::Utc>> = None;
        for schedule in &leg.schedules {
            if booking_class.is_none() {
                booking_class = schedule.booking_class.clone();
            }
            let departure = schedule.departure.date_time.and_utc();
            let arrival = schedule.arrival.date_time.and_utc();
            if let Some(previous) = previous_arrival {
                layover_minutes += (departure - previous).num_minutes().max(0);
            }
            previous_arrival = Some(arrival);
            segments.push(RouteSegment {
                origin: schedule.departure.airport.clone(),
                destination: schedule.arrival.airport.clone(),
                departure,
                arrival,
                duration_minutes: schedule.elapsed_time,
                aircraft: schedule.aircraft_type.clone(),
            });
        }
    }

    if segments.is_empty() {
        return Err(malformed(format!(
            "itinerary {} has no schedules",
            itinerary.id
        )));
    }
    let first_carrier = itinerary
        .legs
        .iter()
        .flat_map(|l| l.schedules.iter())
        .next()
        .map(|s| (s.carrier.marketing.clone(), s.carrier.marketing_flight_number))
        .ok_or_else(|| malformed("itinerary without carrier"))?;

    let pricing = itinerary
        .pricing_information
        .first()
        .ok_or_else(|| malformed(format!("itinerary {} has no pricing", itinerary.id)))?;
    let total = (pricing.fare.total_fare.total_price * 100.0).round() as i64;
    let taxes = (pricing.fare.total_fare.total_tax_amount * 100.0).round() as i64;

    let result = FlightResult {
        id: format!("{}-{}", PROVIDER, itinerary.id),
        airline: first_carrier.0.clone(),
        flight_number: format!("{}{}", first_carrier.0, first_carrier.1),
        segments,
        price: PriceInfo {
            amount: total,
            currency: pricing.fare.total_fare.currency.clone(),
            taxes_and_fees: taxes,
            points_options: Vec::new(),
        },
        availability: Availability {
            seats_remaining: itinerary.seats_remaining,
            booking_class: booking_class.unwrap_or_else(|| "Y".to_string()),
            fare_restrictions: pricing.fare.fare_construction.clone(),
        },
        total_duration_minutes: itinerary.legs.iter().map(|l| l.elapsed_time).sum(),
        layover_count: itinerary
            .legs
            .iter()
            .map(|l| l.schedules.len().saturating_sub(1) as u32)
            .sum(),
        total_layover_minutes: (layover_minutes > 0).then_some(layover_minutes as u32),
        score: None,
    };

    if !result.route_is_contiguous() {
        return Err(malformed(format!(
            "non-contiguous route in itinerary {}",
            itinerary.id
        )));
    }
    Ok(result)
}

#[async_trait]
impl ProviderAdapter for SabreAdapter {
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
                    "Provider [{}] returned {} itineraries in {}ms",
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
            .ping(GatewayRequest::get("/v1/lists/utilities/airlines"))
            .await
    }

    async fn status(&self) -> ProviderStatus {
        self.upstream.health.status().await
    }

    async fn validate_config(&self) -> bool {
        let config = self.config.read().await;
        !config.client_id.is_empty()
            && !config.client_secret.is_empty()
            && config.base_url.starts_with("http")
            && config.timeout_ms > 0
    }

    async fn update_config(&self, patch: ProviderConfigPatch) -> Result<(), ProviderError> {
        let mut config = self.config.write().await;
        if let Some(api_key) = patch.api_key {
            config.client_secret = api_key;
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

    struct CannedGateway {
        payload: Value,
    }

    #[async_trait]
    impl ProviderGateway for CannedGateway {
        async fn fetch(&self, _request: GatewayRequest) -> Result<Value, GatewayError> {
            Ok(self.payload.clone())
        }
    }

    fn shop_payload() -> Value {
        json!({
            "itineraryGroups": [{
                "itineraries": [{
                    "id": 3,
                    "legs": [{
                        "elapsedTime": 415,
                        "schedules": [
                            {
                                "departure": { "airport": "JFK", "dateTime": "2026-09-14T21:30:00" },
                                "arrival": { "airport": "LHR", "dateTime": "2026-09-15T09:25:00" },
                                "carrier": { "marketing": "AA", "marketingFlightNumber": 100 },
                                "elapsedTime": 415,
                                "aircraftType": "77W",
                                "bookingClass": "V"
                            }
                        ]
                    }],
                    "pricingInformation": [{
                        "fare": {
                            "totalFare": {
                                "totalPrice": 512.40,
                                "totalTaxAmount": 88.20,
                                "currency": "USD"
                            },
                            "fareConstruction": "NONREF/CHGFEE"
                        }
                    }],
                    "seatsRemaining": 3
                }]
            }]
        })
    }

    fn adapter(payload: Value) -> SabreAdapter {
        SabreAdapter::new(
            SabreConfig {
                client_id: "vela".to_string(),
                client_secret: "secret".to_string(),
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
    async fn test_normalizes_shop_payload() {
        let results = adapter(shop_payload()).search(&criteria()).await.unwrap();
        assert_eq!(results.len(), 1);

        let flight = &results[0];
        assert_eq!(flight.id, "sabre-3");
        assert_eq!(flight.airline, "AA");
        assert_eq!(flight.flight_number, "AA100");
        assert_eq!(flight.price.amount, 51240);
        assert_eq!(flight.price.taxes_and_fees, 8820);
        assert_eq!(flight.layover_count, 0);
        assert_eq!(flight.total_layover_minutes, None);
        assert_eq!(flight.total_duration_minutes, 415);
        assert_eq!(flight.availability.booking_class, "V");
        assert_eq!(
            flight.availability.fare_restrictions.as_deref(),
            Some("NONREF/CHGFEE")
        );
    }

    #[tokio::test]
    async fn test_empty_groups_yield_no_results() {
        let results = adapter(json!({ "itineraryGroups": [] }))
            .search(&criteria())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_missing_pricing_is_malformed() {
        let mut payload = shop_payload();
        payload["itineraryGroups"][0]["itineraries"][0]["pricingInformation"] = json!([]);
        let err = adapter(payload).search(&criteria()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn test_round_trip_request_has_both_directions() {
        let mut c = criteria();
        c.return_date = chrono::NaiveDate::from_ymd_opt(2026, 9, 21);
        let request = SabreAdapter::build_request(&c);
        let body = request.body.unwrap();
        assert_eq!(body["originDestinations"].as_array().unwrap().len(), 2);
        assert_eq!(body["originDestinations"][1]["origin"], "LHR");
    }
}
