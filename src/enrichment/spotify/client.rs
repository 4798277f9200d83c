//! Spotify HTTP client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use tokio::sync::Mutex;

use super::token::AccessToken;
use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for the Spotify Web API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    config: SpotifyConfig,
    max_requests_per_second: Option<u32>,
    /// Held across the exchange so concurrent callers share one token request
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    /// Fails with `MissingCredentials` when either half of the app credentials is blank.
    pub fn new(config: SpotifyConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        if config.client_id.trim().is_empty() || config.client_secret.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "Spotify requires a client ID and client secret".to_string(),
            ));
        }

        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(10),
            token: Mutex::new(None),
        })
    }

    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    fn basic_credentials(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Return a fresh bearer token, exchanging credentials if needed.
    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value().to_string());
        }

        let issued_at = Instant::now();
        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(reqwest::header::AUTHORIZATION, self.basic_credentials())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(http::transport_error)?;

        // Bad client credentials come back as 400 invalid_client
        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth(format!(
                "Spotify token exchange rejected ({}): {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: dto::TokenResponse = http::read_json(response).await?;
        tracing::debug!("Obtained Spotify token valid for {}s", token.expires_in);

        let access = AccessToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
            issued_at,
        );
        let value = access.value().to_string();
        *cached = Some(access);
        Ok(value)
    }

    async fn search_artist(&self, name: &str) -> Result<dto::SearchResponse, ProviderError> {
        let token = self.bearer_token().await?;
        let url = format!("{}/search", self.config.api_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("q", name), ("type", "artist"), ("limit", "5")])
            .send()
            .await
            .map_err(http::transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token revoked or expired early; the next attempt exchanges a new one
            *self.token.lock().await = None;
            return Err(ProviderError::Transient(
                "Spotify rejected the access token".to_string(),
            ));
        }

        http::read_json(response).await
    }
}

#[async_trait]
impl AttributeProvider for SpotifyClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::Spotify,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: true,
        }
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.search_artist(name.trimmed()).await {
            Ok(response) => adapter::to_result(&response, name),
            Err(e) => {
                tracing::debug!("Spotify search for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}
