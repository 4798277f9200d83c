//! Spotify API Data Transfer Objects
//!
//! DO NOT use these types outside the spotify module - convert to domain types.

use serde::{Deserialize, Serialize};

/// Client-credentials token response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    /// Lifetime in seconds (3600 in practice)
    pub expires_in: u64,
}

/// `/search?type=artist` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub artists: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paging {
    #[serde(default)]
    pub items: Vec<Artist>,
    pub total: Option<u32>,
}

/// Full artist object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
}
