//! Shared HTTP plumbing for provider clients.
//!
//! Every client maps transport failures and status codes through
//! [`classify_status`] so the error taxonomy is identical across providers.

use std::time::Duration;

use reqwest::StatusCode;

use super::domain::ProviderError;

/// User agent string - Nominatim and MusicBrainz reject anonymous clients
pub const USER_AGENT: &str = concat!(
    "ConcertEnricher/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/concert-enricher)"
);

/// Settings shared by every outbound client
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Build a reqwest client with gzip, user agent and request timeout.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .gzip(true)
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout)
        .build()
        .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {}", e)))
}

/// Map a non-success status to the provider error taxonomy.
///
/// Returns `None` for success statuses. 404 is reported as `InvalidResponse`
/// here; adapters that treat 404 as "no match" check for it first.
pub fn classify_status(status: StatusCode, body: &str) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }

    let detail = format!(
        "HTTP {}: {}{}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        snippet(body)
    );

    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => ProviderError::Transient(detail),
        s if s.is_server_error() => ProviderError::Transient(detail),
        _ => ProviderError::InvalidResponse(detail),
    })
}

/// Map a reqwest transport error.
pub fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::InvalidResponse(err.to_string())
    } else {
        ProviderError::Transient(err.to_string())
    }
}

/// Read the body, classify the status, then decode JSON.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if let Some(err) = classify_status(status, &body) {
        return Err(err);
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" - {}", trimmed.chars().take(200).collect::<String>())
    }
}
