//! Last.fm HTTP client

use async_trait::async_trait;

use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for the Last.fm API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFmConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_tags: usize,
}

impl LastFmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://ws.audioscrobbler.com/2.0/".to_string(),
            api_key: api_key.into(),
            max_tags: 5,
        }
    }
}

/// Last.fm API client
pub struct LastFmClient {
    http_client: reqwest::Client,
    config: LastFmConfig,
    max_requests_per_second: Option<u32>,
}

impl LastFmClient {
    /// Fails with `MissingCredentials` when the API key is blank.
    pub fn new(config: LastFmConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "Last.fm requires an API key".to_string(),
            ));
        }

        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(5),
        })
    }

    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    async fn get_info(&self, artist: &str) -> Result<dto::GetInfoResponse, ProviderError> {
        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&[
                ("method", "artist.getinfo"),
                ("artist", artist),
                ("api_key", self.config.api_key.as_str()),
                ("autocorrect", "1"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(http::transport_error)?;

        // Error envelopes are more specific than the status code, so try them first
        if let Ok(parsed @ dto::GetInfoResponse::Error(_)) =
            serde_json::from_str::<dto::GetInfoResponse>(&body)
        {
            return Ok(parsed);
        }
        if let Some(err) = http::classify_status(status, &body) {
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AttributeProvider for LastFmClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::LastFm,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: true,
        }
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.get_info(name.trimmed()).await {
            Ok(dto::GetInfoResponse::Info(envelope)) => {
                adapter::to_result(&envelope.artist, self.config.max_tags)
            }
            Ok(dto::GetInfoResponse::Error(error)) => adapter::error_result(&error),
            Err(e) => {
                tracing::debug!("Last.fm lookup for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}
