//! Mapbox Geocoding API Data Transfer Objects
//!
//! DO NOT use these types outside the mapbox module - convert to domain types.

use serde::{Deserialize, Serialize};

/// GeoJSON feature collection returned by forward geocoding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Feature {
    pub id: String,
    pub text: Option<String>,
    pub place_name: Option<String>,
    /// Parent features, most specific first (postcode, district, region, country)
    #[serde(default)]
    pub context: Vec<ContextItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextItem {
    /// e.g. "region.9425" - the prefix is the feature type
    pub id: String,
    pub text: String,
    pub short_code: Option<String>,
}
