//! Mapbox Geocoding HTTP client

use async_trait::async_trait;

use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, Country, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for Mapbox forward geocoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapboxConfig {
    pub base_url: String,
    pub access_token: String,
    /// Sent as the `country` filter; `None` searches worldwide
    pub country: Option<Country>,
}

impl MapboxConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string(),
            access_token: access_token.into(),
            country: Some(Country::UNITED_STATES),
        }
    }

    pub fn with_country(mut self, country: Option<Country>) -> Self {
        self.country = country;
        self
    }
}

/// Mapbox API client
pub struct MapboxClient {
    http_client: reqwest::Client,
    config: MapboxConfig,
    max_requests_per_second: Option<u32>,
}

impl MapboxClient {
    /// Fails with `MissingCredentials` when the token is blank.
    pub fn new(config: MapboxConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        if config.access_token.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "Mapbox requires an access token".to_string(),
            ));
        }

        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(10),
        })
    }

    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    /// The query is a path segment, so it must be percent-encoded
    fn url_for(&self, city: &str) -> String {
        format!(
            "{}/{}.json",
            self.config.base_url,
            urlencoding::encode(city)
        )
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("access_token", self.config.access_token.clone()),
            ("types", "place".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = self.config.country {
            params.push(("country", country.scope()));
        }
        params
    }

    async fn forward(&self, city: &str) -> Result<dto::FeatureCollection, ProviderError> {
        let response = self
            .http_client
            .get(self.url_for(city))
            .query(&self.query_params())
            .send()
            .await
            .map_err(http::transport_error)?;

        http::read_json(response).await
    }
}

#[async_trait]
impl AttributeProvider for MapboxClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::Mapbox,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: true,
        }
    }

    fn cache_scope(&self) -> String {
        self.config.country.map(|c| c.scope()).unwrap_or_default()
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.forward(name.trimmed()).await {
            Ok(collection) => adapter::to_result(&collection),
            Err(e) => {
                tracing::debug!("Mapbox geocode for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}
