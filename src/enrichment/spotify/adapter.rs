//! Adapter layer: Convert Spotify DTOs to domain models

use super::dto;
use crate::enrichment::domain::{AttributeResult, EntityName, fold_name};

/// Genres of the artist that best matches `query`.
///
/// Prefers an exact (case-folded) name match among the returned items and
/// otherwise trusts Spotify's ranking.
pub fn to_result(response: &dto::SearchResponse, query: &EntityName) -> AttributeResult {
    let items = response
        .artists
        .as_ref()
        .map(|p| p.items.as_slice())
        .unwrap_or_default();

    let wanted = fold_name(query.as_str());
    let artist = items
        .iter()
        .find(|a| fold_name(&a.name) == wanted)
        .or_else(|| items.first());

    match artist {
        Some(artist) => AttributeResult::found(&artist.genres),
        None => AttributeResult::NotFound,
    }
}
