//! Nominatim HTTP client

use async_trait::async_trait;

use super::{adapter, dto};
use crate::enrichment::domain::{AttributeResult, Country, EntityName, ProviderError, ProviderId};
use crate::enrichment::http::{self, HttpSettings};
use crate::enrichment::traits::{AttributeProvider, ProviderInfo};

/// Connection settings for Nominatim search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominatimConfig {
    pub base_url: String,
    /// Appended to every query as "{city}, {country name}"; `None` searches worldwide
    pub country: Option<Country>,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            country: Some(Country::UNITED_STATES),
        }
    }
}

impl NominatimConfig {
    pub fn with_country(mut self, country: Option<Country>) -> Self {
        self.country = country;
        self
    }
}

/// Nominatim API client
pub struct NominatimClient {
    http_client: reqwest::Client,
    config: NominatimConfig,
    max_requests_per_second: Option<u32>,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig, settings: &HttpSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::build_client(settings)?,
            config,
            max_requests_per_second: Some(1),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let config = NominatimConfig {
            base_url: base_url.into(),
            ..NominatimConfig::default()
        };
        Self::new(config, &HttpSettings::default()).expect("Failed to build HTTP client")
    }

    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second;
        self
    }

    fn query_for(&self, city: &str) -> String {
        match self.config.country {
            Some(country) => format!("{}, {}", city, country.name()),
            None => city.to_string(),
        }
    }

    async fn search(&self, city: &str) -> Result<Vec<dto::Place>, ProviderError> {
        let url = format!("{}/search", self.config.base_url);
        let q = self.query_for(city);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", q.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(http::transport_error)?;

        http::read_json(response).await
    }
}

#[async_trait]
impl AttributeProvider for NominatimClient {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::Nominatim,
            max_requests_per_second: self.max_requests_per_second,
            requires_credentials: false,
        }
    }

    fn cache_scope(&self) -> String {
        self.config.country.map(|c| c.scope()).unwrap_or_default()
    }

    async fn resolve(&self, name: &EntityName) -> AttributeResult {
        match self.search(name.trimmed()).await {
            Ok(places) => adapter::to_result(&places),
            Err(e) => {
                tracing::debug!("Nominatim search for '{}' failed: {}", name, e);
                AttributeResult::Error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_includes_country() {
        let client = NominatimClient::with_base_url("http://localhost:8080");
        assert_eq!(client.query_for("Las Vegas"), "Las Vegas, United States");
        assert_eq!(client.cache_scope(), "us");
    }

    #[test]
    fn test_query_for_other_country() {
        let config = NominatimConfig::default().with_country(Some("Canada".parse().unwrap()));
        let client = NominatimClient::new(config, &HttpSettings::default()).unwrap();
        assert_eq!(client.query_for("Montreal"), "Montreal, Canada");
        assert_eq!(client.cache_scope(), "ca");

        let worldwide = NominatimClient::new(
            NominatimConfig::default().with_country(None),
            &HttpSettings::default(),
        )
        .unwrap();
        assert_eq!(worldwide.query_for("Montreal"), "Montreal");
        assert_eq!(worldwide.cache_scope(), "");
    }

    #[test]
    fn test_info() {
        let client = NominatimClient::with_base_url("http://localhost:8080");
        assert_eq!(client.id(), ProviderId::Nominatim);
        assert_eq!(client.info().max_requests_per_second, Some(1));
        assert_eq!(
            client.with_rate_limit(None).info().max_requests_per_second,
            None
        );
    }
}
