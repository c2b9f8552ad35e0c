//! Value objects for the produce domain.

use serde::{Deserialize, Serialize};

/// Identifier of the farmer who owns a produce listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmerId(String);

impl FarmerId {
    /// Creates a new farmer ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FarmerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FarmerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FarmerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A price in minor currency units.
///
/// Any integer can be represented; the aggregate decides which ones are
/// acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Creates a price from minor units.
    pub fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns true if the price is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Price {
    fn from(minor_units: i64) -> Self {
        Self(minor_units)
    }
}

/// Lifecycle status of a produce listing.
///
/// `Active` is part of the vocabulary but no event moves a listing into it;
/// listings stay `Registered` until they are deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProduceStatus {
    Registered,
    Active,
    Inactive,
}

impl ProduceStatus {
    /// Returns true if quality and price may still change.
    pub fn is_mutable(&self) -> bool {
        !matches!(self, ProduceStatus::Inactive)
    }

    /// Returns the status as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProduceStatus::Registered => "REGISTERED",
            ProduceStatus::Active => "ACTIVE",
            ProduceStatus::Inactive => "INACTIVE",
        }
    }
}

impl std::fmt::Display for ProduceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_positivity() {
        assert!(Price::new(1).is_positive());
        assert!(!Price::new(0).is_positive());
        assert!(!Price::new(-10).is_positive());
    }

    #[test]
    fn price_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Price::new(250)).unwrap(), "250");
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_string(&ProduceStatus::Inactive).unwrap(),
            "\"INACTIVE\""
        );
        let parsed: ProduceStatus = serde_json::from_str("\"REGISTERED\"").unwrap();
        assert_eq!(parsed, ProduceStatus::Registered);
        assert_eq!(ProduceStatus::Active.to_string(), "ACTIVE");
    }

    #[test]
    fn only_inactive_is_frozen() {
        assert!(ProduceStatus::Registered.is_mutable());
        assert!(ProduceStatus::Active.is_mutable());
        assert!(!ProduceStatus::Inactive.is_mutable());
    }

    #[test]
    fn farmer_id_conversions() {
        let id = FarmerId::from("farmer-1");
        assert_eq!(id.as_str(), "farmer-1");
        assert_eq!(id, FarmerId::new(String::from("farmer-1")));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"farmer-1\"");
    }
}
