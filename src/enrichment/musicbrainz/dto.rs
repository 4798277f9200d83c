//! MusicBrainz API Data Transfer Objects
//!
//! These types match EXACTLY what the MusicBrainz API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the musicbrainz module - convert to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search
//!
//! We only use the /artist search endpoint.

use serde::{Deserialize, Serialize};

/// Artist search response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistSearchResponse {
    /// Total number of hits for the query
    #[serde(default)]
    pub count: u32,
    /// Hits, best first
    #[serde(default)]
    pub artists: Vec<ArtistHit>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtistHit {
    /// MusicBrainz artist ID
    pub id: String,
    /// Official artist name
    pub name: String,
    /// Search relevance (0-100)
    pub score: Option<u32>,
    /// Sort name (e.g., "Beatles, The")
    pub sort_name: Option<String>,
    /// Artist type (Person, Group, etc.)
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    /// Disambiguation comment
    pub disambiguation: Option<String>,
    /// Community tags with vote counts
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Folksonomy tag
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tag {
    /// Net vote count (can be negative)
    pub count: i32,
    /// Tag name, lower case
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "created": "2025-06-01T10:00:00.000Z",
            "count": 2,
            "offset": 0,
            "artists": [
                {
                    "id": "cc197bad-dc9c-440d-a5b5-d52ba2e14234",
                    "type": "Group",
                    "score": 100,
                    "name": "Coldplay",
                    "sort-name": "Coldplay",
                    "country": "GB",
                    "tags": [
                        {"count": 12, "name": "alternative rock"},
                        {"count": 20, "name": "pop rock"}
                    ]
                },
                {
                    "id": "b0a1a3c5-0000-0000-0000-000000000000",
                    "score": 61,
                    "name": "Coldplay Tribute"
                }
            ]
        }"#;

        let response: ArtistSearchResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.count, 2);
        assert_eq!(response.artists.len(), 2);
        assert_eq!(response.artists[0].sort_name.as_deref(), Some("Coldplay"));
        assert_eq!(response.artists[0].artist_type.as_deref(), Some("Group"));
        assert_eq!(response.artists[0].tags[1].count, 20);
        assert!(response.artists[1].tags.is_empty());
    }

    #[test]
    fn test_parse_empty_response() {
        let response: ArtistSearchResponse =
            serde_json::from_str(r#"{"count": 0, "offset": 0, "artists": []}"#).unwrap();
        assert!(response.artists.is_empty());
    }
}
