//! Provider configuration.
//!
//! A [`Provider`] is an immutable bundle of everything needed to talk to one
//! external source: its endpoint, credentials and request ceiling. Credentials
//! are resolved once at the entry point and passed in here; nothing below
//! this layer reads the environment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{Country, ProviderError, ProviderId};
use super::google::{GoogleClient, GoogleConfig};
use super::http::HttpSettings;
use super::lastfm::{LastFmClient, LastFmConfig};
use super::mapbox::{MapboxClient, MapboxConfig};
use super::musicbrainz::{MusicBrainzClient, MusicBrainzConfig};
use super::nominatim::{NominatimClient, NominatimConfig};
use super::spotify::{SpotifyClient, SpotifyConfig};
use super::traits::AttributeProvider;

/// API credentials for the providers that need them.
///
/// Also the `[credentials]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub mapbox_access_token: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub lastfm_api_key: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Credentials {
    /// Fill any field missing here from `fallback`.
    pub fn or(self, fallback: &Credentials) -> Credentials {
        let pick = |mine: Option<String>, theirs: &Option<String>| {
            if non_blank(&mine).is_some() {
                mine
            } else {
                theirs.clone()
            }
        };

        Credentials {
            google_api_key: pick(self.google_api_key, &fallback.google_api_key),
            mapbox_access_token: pick(self.mapbox_access_token, &fallback.mapbox_access_token),
            spotify_client_id: pick(self.spotify_client_id, &fallback.spotify_client_id),
            spotify_client_secret: pick(
                self.spotify_client_secret,
                &fallback.spotify_client_secret,
            ),
            lastfm_api_key: pick(self.lastfm_api_key, &fallback.lastfm_api_key),
        }
    }

    /// Whether everything `provider` needs is present.
    pub fn has(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::Nominatim | ProviderId::MusicBrainz => true,
            ProviderId::Google => non_blank(&self.google_api_key).is_some(),
            ProviderId::Mapbox => non_blank(&self.mapbox_access_token).is_some(),
            ProviderId::Spotify => {
                non_blank(&self.spotify_client_id).is_some()
                    && non_blank(&self.spotify_client_secret).is_some()
            }
            ProviderId::LastFm => non_blank(&self.lastfm_api_key).is_some(),
        }
    }
}

/// Per-provider connection settings; each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Nominatim(NominatimConfig),
    Google(GoogleConfig),
    Mapbox(MapboxConfig),
    MusicBrainz(MusicBrainzConfig),
    Spotify(SpotifyConfig),
    LastFm(LastFmConfig),
}

impl ProviderConfig {
    /// Build the config for `id` from resolved credentials.
    ///
    /// Geocoders are restricted to `country` (`None` searches worldwide);
    /// music catalogs ignore it.
    pub fn from_credentials(
        id: ProviderId,
        credentials: &Credentials,
        country: Option<Country>,
    ) -> Result<Self, ProviderError> {
        let missing = || {
            ProviderError::MissingCredentials(format!(
                "{} is not configured (see `check-config`)",
                id.display_name()
            ))
        };
        if !credentials.has(id) {
            return Err(missing());
        }

        let value = |field: &Option<String>| non_blank(field).unwrap_or_default().to_string();

        Ok(match id {
            ProviderId::Nominatim => {
                ProviderConfig::Nominatim(NominatimConfig::default().with_country(country))
            }
            ProviderId::Google => ProviderConfig::Google(
                GoogleConfig::new(value(&credentials.google_api_key)).with_country(country),
            ),
            ProviderId::Mapbox => ProviderConfig::Mapbox(
                MapboxConfig::new(value(&credentials.mapbox_access_token)).with_country(country),
            ),
            ProviderId::MusicBrainz => ProviderConfig::MusicBrainz(MusicBrainzConfig::default()),
            ProviderId::Spotify => ProviderConfig::Spotify(SpotifyConfig::new(
                value(&credentials.spotify_client_id),
                value(&credentials.spotify_client_secret),
            )),
            ProviderId::LastFm => {
                ProviderConfig::LastFm(LastFmConfig::new(value(&credentials.lastfm_api_key)))
            }
        })
    }

    pub fn id(&self) -> ProviderId {
        match self {
            ProviderConfig::Nominatim(_) => ProviderId::Nominatim,
            ProviderConfig::Google(_) => ProviderId::Google,
            ProviderConfig::Mapbox(_) => ProviderId::Mapbox,
            ProviderConfig::MusicBrainz(_) => ProviderId::MusicBrainz,
            ProviderConfig::Spotify(_) => ProviderId::Spotify,
            ProviderConfig::LastFm(_) => ProviderId::LastFm,
        }
    }

    /// Documented sustained ceiling of the public API.
    pub fn default_rate_limit(&self) -> Option<u32> {
        Some(match self {
            ProviderConfig::Nominatim(_) | ProviderConfig::MusicBrainz(_) => 1,
            ProviderConfig::Google(_) => 25,
            ProviderConfig::Mapbox(_) => 10,
            ProviderConfig::Spotify(_) => 10,
            ProviderConfig::LastFm(_) => 5,
        })
    }
}

/// A configured provider, ready to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub config: ProviderConfig,
    /// `None` means unbounded
    pub max_requests_per_second: Option<u32>,
}

impl Provider {
    pub fn new(config: ProviderConfig) -> Self {
        let max_requests_per_second = config.default_rate_limit();
        Self {
            config,
            max_requests_per_second,
        }
    }

    /// Override the request ceiling; zero means unbounded.
    pub fn with_rate_limit(mut self, max_requests_per_second: Option<u32>) -> Self {
        self.max_requests_per_second = max_requests_per_second.filter(|rps| *rps > 0);
        self
    }

    pub fn id(&self) -> ProviderId {
        self.config.id()
    }

    /// Build the HTTP client for this provider.
    pub fn connect(&self, settings: &HttpSettings) -> Result<Arc<dyn AttributeProvider>, ProviderError> {
        let rps = self.max_requests_per_second;

        Ok(match &self.config {
            ProviderConfig::Nominatim(c) => {
                Arc::new(NominatimClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
            ProviderConfig::Google(c) => {
                Arc::new(GoogleClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
            ProviderConfig::Mapbox(c) => {
                Arc::new(MapboxClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
            ProviderConfig::MusicBrainz(c) => {
                Arc::new(MusicBrainzClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
            ProviderConfig::Spotify(c) => {
                Arc::new(SpotifyClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
            ProviderConfig::LastFm(c) => {
                Arc::new(LastFmClient::new(c.clone(), settings)?.with_rate_limit(rps))
            }
        })
    }
}
