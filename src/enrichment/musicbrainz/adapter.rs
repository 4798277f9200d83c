//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! This isolates API changes - if MusicBrainz changes their response format,
//! only this file and dto.rs need to change.

use super::dto;
use crate::enrichment::domain::{AttributeResult, EntityName, fold_name};

/// Convert an artist search response into genres for `query`.
///
/// `max_tags` caps the number of genres; `min_score` is the relevance a hit
/// needs when its name does not match the query exactly.
pub fn to_result(
    response: &dto::ArtistSearchResponse,
    query: &EntityName,
    max_tags: usize,
    min_score: u32,
) -> AttributeResult {
    let Some(artist) = best_match(&response.artists, query, min_score) else {
        return AttributeResult::NotFound;
    };

    AttributeResult::found(extract_genres(&artist.tags, max_tags))
}

/// Pick the hit we trust for this query
///
/// Exact (case-folded) name matches win; otherwise the top hit is used only
/// if MusicBrainz itself is confident about it.
fn best_match<'a>(
    artists: &'a [dto::ArtistHit],
    query: &EntityName,
    min_score: u32,
) -> Option<&'a dto::ArtistHit> {
    let wanted = fold_name(query.as_str());

    artists
        .iter()
        .find(|a| fold_name(&a.name) == wanted)
        .or_else(|| {
            artists
                .first()
                .filter(|a| a.score.unwrap_or(0) >= min_score)
        })
}

/// Extract genres from MusicBrainz tags, sorted by vote count (most popular first)
/// Takes the top `max_tags` tags to avoid noise from low-confidence tags
fn extract_genres(tags: &[dto::Tag], max_tags: usize) -> Vec<String> {
    let mut sorted_tags: Vec<_> = tags.iter().filter(|t| t.count > 0).collect();
    // Stable sort keeps API order for equal counts
    sorted_tags.sort_by(|a, b| b.count.cmp(&a.count));

    sorted_tags
        .into_iter()
        .take(max_tags)
        .map(|t| t.name.clone())
        .collect()
}
