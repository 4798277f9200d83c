//! Adapter layer: Convert Last.fm DTOs to domain models

use super::dto;
use crate::enrichment::domain::{AttributeResult, ProviderError};

/// Top `max_tags` tag names of the artist.
pub fn to_result(info: &dto::ArtistInfo, max_tags: usize) -> AttributeResult {
    AttributeResult::found(
        info.tags
            .as_slice()
            .iter()
            .take(max_tags)
            .map(|t| t.name.as_str()),
    )
}

/// Map a Last.fm error code onto the domain result.
pub fn error_result(error: &dto::ApiError) -> AttributeResult {
    let detail = format!("Last.fm error {}: {}", error.error, error.message);
    match error.error {
        // Artist not found
        6 => AttributeResult::NotFound,
        // Invalid key, suspended key, auth failure, invalid session
        4 | 9 | 10 | 26 => AttributeResult::Error(ProviderError::Auth(detail)),
        29 => AttributeResult::Error(ProviderError::RateLimited(detail)),
        // Operation failed, service offline, temporarily unavailable
        8 | 11 | 16 => AttributeResult::Error(ProviderError::Transient(detail)),
        _ => AttributeResult::Error(ProviderError::InvalidResponse(detail)),
    }
}
