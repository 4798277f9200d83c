//! Google Geocoding API Data Transfer Objects
//!
//! DO NOT use these types outside the google module - convert to domain types.

use serde::{Deserialize, Serialize};

/// Geocode response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodeResponse {
    /// "OK", "ZERO_RESULTS", "REQUEST_DENIED", ...
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodeResult {
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}
