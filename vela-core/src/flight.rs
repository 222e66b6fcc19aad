use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One flown leg of an itinerary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSegment {
    pub origin: String,
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub duration_minutes: u32,
    pub aircraft: Option<String>,
}

/// Mileage-program redemption alternative for a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsOption {
    pub program: String,
    pub points: u64,
    /// Cash co-pay (taxes and carrier fees) in minor units
    pub fees_amount: i64,
    pub fees_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Total cash price in minor units (cents)
    pub amount: i64,
    pub currency: String,
    pub taxes_and_fees: i64,
    #[serde(default)]
    pub points_options: Vec<PointsOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub seats_remaining: i32,
    pub booking_class: String,
    pub fare_restrictions: Option<String>,
}

/// Normalized shape every provider adapter must emit, regardless of the
/// upstream wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightResult {
    pub id: String,
    pub airline: String,
    pub flight_number: String,
    pub segments: Vec<RouteSegment>,
    pub price: PriceInfo,
    pub availability: Availability,
    pub total_duration_minutes: u32,
    pub layover_count: u32,
    pub total_layover_minutes: Option<u32>,
    /// Desirability score 0-100, when the source computes one
    pub score: Option<f64>,
}

impl FlightResult {
    /// Segment i's destination must equal segment i+1's origin, and times
    /// must be non-decreasing along the route.
    pub fn route_is_contiguous(&self) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        self.segments.windows(2).all(|pair| {
            pair[0].destination == pair[1].origin && pair[0].arrival <= pair[1].departure
        })
    }

    pub fn is_direct(&self) -> bool {
        self.layover_count == 0
    }

    pub fn departure(&self) -> Option<DateTime<Utc>> {
        self.segments.first().map(|s| s.departure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn segment(origin: &str, destination: &str, dep_hour: u32, arr_hour: u32) -> RouteSegment {
        RouteSegment {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure: Utc.with_ymd_and_hms(2026, 9, 14, dep_hour, 0, 0).unwrap(),
            arrival: Utc.with_ymd_and_hms(2026, 9, 14, arr_hour, 0, 0).unwrap(),
            duration_minutes: (arr_hour - dep_hour) * 60,
            aircraft: None,
        }
    }

    fn result_with_segments(segments: Vec<RouteSegment>) -> FlightResult {
        FlightResult {
            id: "f1".to_string(),
            airline: "BA".to_string(),
            flight_number: "BA178".to_string(),
            segments,
            price: PriceInfo {
                amount: 45000,
                currency: "USD".to_string(),
                taxes_and_fees: 6200,
                points_options: Vec::new(),
            },
            availability: Availability {
                seats_remaining: 4,
                booking_class: "Y".to_string(),
                fare_restrictions: None,
            },
            total_duration_minutes: 420,
            layover_count: 0,
            total_layover_minutes: None,
            score: None,
        }
    }

    #[test]
    fn test_contiguous_route() {
        let result = result_with_segments(vec![
            segment("JFK", "KEF", 8, 12),
            segment("KEF", "LHR", 14, 17),
        ]);
        assert!(result.route_is_contiguous());
    }

    #[test]
    fn test_broken_route_rejected() {
        let result = result_with_segments(vec![
            segment("JFK", "KEF", 8, 12),
            segment("CDG", "LHR", 14, 17),
        ]);
        assert!(!result.route_is_contiguous());
    }

    #[test]
    fn test_time_travel_rejected() {
        let result = result_with_segments(vec![
            segment("JFK", "KEF", 8, 12),
            segment("KEF", "LHR", 10, 13),
        ]);
        assert!(!result.route_is_contiguous());
    }

    #[test]
    fn test_empty_route_rejected() {
        let result = result_with_segments(Vec::new());
        assert!(!result.route_is_contiguous());
    }
}
