use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vela_core::flight::FlightResult;

/// Independently toggled predicates, combined as a conjunction. Pure and
/// order-independent so callers can run this outside the orchestrator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    /// Maximum cash price in minor units
    pub max_price: Option<i64>,
    pub max_total_duration_minutes: Option<u32>,
    /// 0 means direct flights only
    pub max_layovers: Option<u32>,
    pub departure_after: Option<DateTime<Utc>>,
    pub departure_before: Option<DateTime<Utc>>,
    pub aircraft: Option<String>,
    /// Allow-list of marketing carriers (alliance membership resolved upstream)
    pub airlines: Option<Vec<String>>,
}

impl FilterSpec {
    fn matches(&self, flight: &FlightResult) -> bool {
        if let Some(max_price) = self.max_price {
            if flight.price.amount > max_price {
                return false;
            }
        }
        if let Some(max_duration) = self.max_total_duration_minutes {
            if flight.total_duration_minutes > max_duration {
                return false;
            }
        }
        if let Some(max_layovers) = self.max_layovers {
            if flight.layover_count > max_layovers {
                return false;
            }
        }
        if let Some(after) = self.departure_after {
            match flight.departure() {
                Some(departure) if departure >= after => {}
                _ => return false,
            }
        }
        if let Some(before) = self.departure_before {
            match flight.departure() {
                Some(departure) if departure <= before => {}
                _ => return false,
            }
        }
        if let Some(aircraft) = &self.aircraft {
            let found = flight
                .segments
                .iter()
                .any(|s| s.aircraft.as_deref() == Some(aircraft.as_str()));
            if !found {
                return false;
            }
        }
        if let Some(airlines) = &self.airlines {
            if !airlines.iter().any(|a| a == &flight.airline) {
                return false;
            }
        }
        true
    }
}

pub fn apply_filters(results: &[FlightResult], spec: &FilterSpec) -> Vec<FlightResult> {
    results
        .iter()
        .filter(|flight| spec.matches(flight))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Price,
    Duration,
    Score,
}

impl SortKey {
    /// Price and duration read best ascending; scores descending
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortKey::Price | SortKey::Duration => SortOrder::Ascending,
            SortKey::Score => SortOrder::Descending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::Duration => "duration",
            SortKey::Score => "score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Stable sort over the chosen key; equal keys keep their original relative
/// order. Results without a score sort after scored ones regardless of order.
pub fn sort_flights(results: &mut [FlightResult], key: SortKey, order: SortOrder) {
    use std::cmp::Ordering;

    results.sort_by(|a, b| {
        let natural = match key {
            SortKey::Price => a.price.amount.cmp(&b.price.amount),
            SortKey::Duration => a.total_duration_minutes.cmp(&b.total_duration_minutes),
            SortKey::Score => {
                // Unscored entries stay last in either direction
                return match (a.score, b.score) {
                    (Some(x), Some(y)) => {
                        let scored = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                        match order {
                            SortOrder::Ascending => scored,
                            SortOrder::Descending => scored.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
            }
        };
        match order {
            SortOrder::Ascending => natural,
            SortOrder::Descending => natural.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_providers::mock::sample_flight;

    fn flights() -> Vec<FlightResult> {
        vec![
            sample_flight("a", 50000, 400),
            sample_flight("b", 20000, 600),
            sample_flight("c", 50000, 500),
        ]
    }

    #[test]
    fn test_price_sort_is_stable() {
        let mut results = flights();
        sort_flights(&mut results, SortKey::Price, SortOrder::Ascending);
        let ids: Vec<&str> = results.iter().map(|f| f.id.as_str()).collect();
        // The two 500-priced entries keep their original relative order
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duration_sort() {
        let mut results = flights();
        sort_flights(&mut results, SortKey::Duration, SortOrder::Ascending);
        let ids: Vec<&str> = results.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_score_sort_descending_puts_unscored_last() {
        let mut results = flights();
        results[0].score = Some(40.0);
        results[1].score = Some(90.0);
        // results[2] stays unscored
        sort_flights(&mut results, SortKey::Score, SortKey::Score.default_order());
        let ids: Vec<&str> = results.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_filters_compose_as_conjunction() {
        let mut results = flights();
        results[1].layover_count = 1;

        let direct_only = FilterSpec {
            max_layovers: Some(0),
            ..Default::default()
        };
        let cheap = FilterSpec {
            max_price: Some(40000),
            ..Default::default()
        };
        let both = FilterSpec {
            max_layovers: Some(0),
            max_price: Some(40000),
            ..Default::default()
        };

        // Order of application does not change the final set
        let one_way = apply_filters(&apply_filters(&results, &direct_only), &cheap);
        let other_way = apply_filters(&apply_filters(&results, &cheap), &direct_only);
        let combined = apply_filters(&results, &both);

        let ids = |set: &[FlightResult]| -> Vec<String> {
            set.iter().map(|f| f.id.clone()).collect()
        };
        assert_eq!(ids(&one_way), ids(&other_way));
        assert_eq!(ids(&one_way), ids(&combined));
        assert!(combined.is_empty());
    }

    #[test]
    fn test_airline_and_aircraft_filters() {
        let results = flights();
        let ba_only = FilterSpec {
            airlines: Some(vec!["BA".to_string()]),
            aircraft: Some("77W".to_string()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&results, &ba_only).len(), 3);

        let lufthansa = FilterSpec {
            airlines: Some(vec!["LH".to_string()]),
            ..Default::default()
        };
        assert!(apply_filters(&results, &lufthansa).is_empty());
    }

    #[test]
    fn test_departure_window_filter() {
        let results = flights();
        let in_window = FilterSpec {
            departure_after: Some(chrono::Utc::now() - chrono::Duration::days(365 * 5)),
            departure_before: Some(chrono::Utc::now() + chrono::Duration::days(365 * 5)),
            ..Default::default()
        };
        assert_eq!(apply_filters(&results, &in_window).len(), 3);

        let past_only = FilterSpec {
            departure_before: Some(chrono::Utc::now() - chrono::Duration::days(365 * 5)),
            ..Default::default()
        };
        assert!(apply_filters(&results, &past_only).is_empty());
    }
}
