//! Nominatim API Data Transfer Objects
//!
//! These types match what `/search?format=json&addressdetails=1` returns.
//! DO NOT use these types outside the nominatim module - convert to domain types.

use serde::{Deserialize, Serialize};

/// One search result (the endpoint returns a bare JSON array of these)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Place {
    pub place_id: Option<u64>,
    pub display_name: Option<String>,
    /// Present because we request `addressdetails=1`
    pub address: Option<Address>,
}

/// Structured address breakdown
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Address {
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let json = r#"[
            {
                "place_id": 307401744,
                "licence": "Data © OpenStreetMap contributors, ODbL 1.0.",
                "osm_type": "relation",
                "lat": "36.1672559",
                "lon": "-115.148516",
                "display_name": "Las Vegas, Clark County, Nevada, United States",
                "address": {
                    "city": "Las Vegas",
                    "county": "Clark County",
                    "state": "Nevada",
                    "ISO3166-2-lvl4": "US-NV",
                    "country": "United States",
                    "country_code": "us"
                }
            }
        ]"#;

        let places: Vec<Place> = serde_json::from_str(json).unwrap();

        assert_eq!(places.len(), 1);
        let address = places[0].address.as_ref().unwrap();
        assert_eq!(address.state.as_deref(), Some("Nevada"));
        assert_eq!(address.country_code.as_deref(), Some("us"));
    }

    #[test]
    fn test_parse_place_without_address() {
        let places: Vec<Place> =
            serde_json::from_str(r#"[{"place_id": 1, "display_name": "Somewhere"}]"#).unwrap();
        assert!(places[0].address.is_none());
    }
}
