//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use async_trait::async_trait;

use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for the MusicBrainz artist search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicBrainzConfig {
    pub base_url: String,
    /// Genres kept per artist
    pub max_tags: usize,
    /// Relevance a non-exact hit needs to be accepted
    pub min_score: u32,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            max_tags: 5,
            min_score: 90,
        }
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    config: MusicBrainzConfig,
    max_requests_per_second: Option<u32>,
}

impl MusicBrainzClient {
    /// Create a new client
    pub fn new(config: MusicBrainzConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(1),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let config = MusicBrainzConfig {
            base_url: base_url.into(),
            ..MusicBrainzConfig::default()
        };
        Self::new(config, &HttpSettings::default()).expect("Failed to build HTTP client")
    }

    /// Override the documented 1 req/sec ceiling.
    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    /// Search artists by name
    async fn search_artist(&self, name: &str) -> Result<dto::ArtistSearchResponse, ProviderError> {
        let url = format!("{}/artist", self.config.base_url);
        let query = format!("artist:\"{}\"", name.replace('"', "\\\""));

        let response = self
            .http_client
            .get(&url)
            .query(&[("query", query.as_str()), ("fmt", "json"), ("limit", "5")])
            .send()
            .await
            .map_err(http::transport_error)?;

        // MusicBrainz answers 503 when a client exceeds its rate limit
        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(ProviderError::RateLimited(
                "MusicBrainz returned 503 (rate limit exceeded)".to_string(),
            ));
        }

        http::read_json(response).await
    }
}

#[async_trait]
impl AttributeProvider for MusicBrainzClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::MusicBrainz,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: false,
        }
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.search_artist(name.trimmed()).await {
            Ok(response) => adapter::to_result(
                &response,
                name,
                self.config.max_tags,
                self.config.min_score,
            ),
            Err(e) => {
                tracing::debug!("MusicBrainz search for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}
