//! Adapter layer: Convert Nominatim DTOs to domain models

use super::dto;
use crate::enrichment::domain::AttributeResult;

/// The top result's state, if it has one.
///
/// Nominatim ranks by importance and we only ask for one result, so the
/// first place is the match.
pub fn to_result(places: &[dto::Place]) -> AttributeResult {
    let state = places
        .first()
        .and_then(|p| p.address.as_ref())
        .and_then(|a| a.state.as_deref());

    match state {
        Some(state) => AttributeResult::found([state]),
        None => AttributeResult::NotFound,
    }
}
