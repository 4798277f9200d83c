//! Google Geocoding HTTP client

use async_trait::async_trait;

use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, Country, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for Google Geocoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: String,
    /// Appended to every query as "{city}, {ISO code}"; `None` searches worldwide
    pub country: Option<Country>,
}

impl GoogleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/geocode".to_string(),
            api_key: api_key.into(),
            country: Some(Country::UNITED_STATES),
        }
    }

    pub fn with_country(mut self, country: Option<Country>) -> Self {
        self.country = country;
        self
    }
}

/// Google Geocoding API client
pub struct GoogleClient {
    http_client: reqwest::Client,
    config: GoogleConfig,
    max_requests_per_second: Option<u32>,
}

impl GoogleClient {
    /// Fails with `MissingCredentials` when the API key is blank.
    pub fn new(config: GoogleConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "Google Geocoding requires an API key".to_string(),
            ));
        }

        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(25),
        })
    }

    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    fn address_for(&self, city: &str) -> String {
        match self.config.country {
            Some(country) => format!("{}, {}", city, country.code()),
            None => city.to_string(),
        }
    }

    async fn geocode(&self, city: &str) -> Result<dto::GeocodeResponse, ProviderError> {
        let url = format!("{}/json", self.config.base_url);
        let address = self.address_for(city);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("address", address.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(http::transport_error)?;

        http::read_json(response).await
    }
}

#[async_trait]
impl AttributeProvider for GoogleClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::Google,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: true,
        }
    }

    fn cache_scope(&self) -> String {
        self.config.country.map(|c| c.scope()).unwrap_or_default()
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.geocode(name.trimmed()).await {
            Ok(response) => adapter::to_result(&response),
            Err(e) => {
                tracing::debug!("Google geocode for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}
