use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    /// Stable token used in cache fingerprints and provider requests
    pub fn code(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerCounts {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl PassengerCounts {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

impl Default for PassengerCounts {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

/// What the traveller asked for. Immutable once a search begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    #[serde(default)]
    pub passengers: PassengerCounts,
    pub cabin_class: CabinClass,
    #[serde(default)]
    pub flexible_dates: bool,
}

impl SearchCriteria {
    pub fn validate(&self) -> Result<(), String> {
        validate_airport_code(&self.origin)?;
        validate_airport_code(&self.destination)?;
        if self.origin.trim().eq_ignore_ascii_case(self.destination.trim()) {
            return Err("Origin and destination must differ".to_string());
        }
        if self.passengers.adults == 0 {
            return Err("At least one adult passenger is required".to_string());
        }
        if self.passengers.infants > self.passengers.adults {
            return Err("Each infant must be accompanied by an adult".to_string());
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err("Return date cannot precede departure date".to_string());
            }
        }
        Ok(())
    }
}

fn validate_airport_code(code: &str) -> Result<(), String> {
    let trimmed = code.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("Invalid airport code: {}", code));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            return_date: None,
            passengers: PassengerCounts::default(),
            cabin_class: CabinClass::Economy,
            flexible_dates: false,
        }
    }

    #[test]
    fn test_valid_criteria() {
        assert!(criteria().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_airport_code() {
        let mut c = criteria();
        c.origin = "NEWYORK".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_same_origin_destination() {
        let mut c = criteria();
        c.destination = " jfk ".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_return_before_departure() {
        let mut c = criteria();
        c.return_date = NaiveDate::from_ymd_opt(2026, 9, 1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_unaccompanied_infants() {
        let mut c = criteria();
        c.passengers = PassengerCounts {
            adults: 1,
            children: 0,
            infants: 2,
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_criteria_deserialization() {
        let json = r#"
            {
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": "2026-09-14",
                "cabin_class": "PREMIUM_ECONOMY"
            }
        "#;
        let c: SearchCriteria = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(c.cabin_class, CabinClass::PremiumEconomy);
        assert_eq!(c.passengers.adults, 1);
        assert!(!c.flexible_dates);
    }
}
