//! Adapter layer: Convert Google Geocoding DTOs to domain models

use super::dto;
use crate::enrichment::domain::{AttributeResult, ProviderError};

const STATE_COMPONENT: &str = "administrative_area_level_1";

/// Map a geocode response to the state of its first result.
pub fn to_result(response: &dto::GeocodeResponse) -> AttributeResult {
    let detail = || {
        format!(
            "{}{}",
            response.status,
            response
                .error_message
                .as_deref()
                .map(|m| format!(": {}", m))
                .unwrap_or_default()
        )
    };

    match response.status.as_str() {
        "OK" => state_of(response),
        "ZERO_RESULTS" => AttributeResult::NotFound,
        "REQUEST_DENIED" => AttributeResult::Error(ProviderError::Auth(detail())),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
            AttributeResult::Error(ProviderError::RateLimited(detail()))
        }
        "UNKNOWN_ERROR" => AttributeResult::Error(ProviderError::Transient(detail())),
        _ => AttributeResult::Error(ProviderError::InvalidResponse(detail())),
    }
}

fn state_of(response: &dto::GeocodeResponse) -> AttributeResult {
    let state = response
        .results
        .first()
        .into_iter()
        .flat_map(|r| r.address_components.iter())
        .find(|c| c.types.iter().any(|t| t == STATE_COMPONENT))
        .map(|c| c.long_name.as_str());

    match state {
        Some(state) => AttributeResult::found([state]),
        None => AttributeResult::NotFound,
    }
}
