//! Internal domain models for attribute lookups.
//!
//! These types are OUR types - they don't change when external APIs change.
//! Every provider response gets converted into an [`AttributeResult`] by
//! that provider's adapter.

use std::fmt;
use std::str::FromStr;

/// A non-empty entity key (artist name, city name), kept exactly as given.
///
/// Uniqueness is case-sensitive: "Coldplay" and "coldplay" are different
/// keys. Providers decide for themselves how to normalize a name into a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityName(String);

/// Rejected entity name (empty or whitespace only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Entity name must not be empty")]
pub struct InvalidName;

impl EntityName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidName> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name without surrounding whitespace, for building queries.
    pub fn trimmed(&self) -> &str {
        self.0.trim()
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EntityName {
    type Error = InvalidName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for EntityName {
    type Error = InvalidName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Case-folded comparison key used by adapters when matching candidates.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// What kind of attribute an enrichment derives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// City name -> US state
    CityState,
    /// Artist name -> genres
    ArtistGenre,
}

/// Identifier of an external data source.
///
/// Stored in the cache next to every entry, so the string forms must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    Nominatim,
    Google,
    Mapbox,
    MusicBrainz,
    Spotify,
    LastFm,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::Nominatim,
        ProviderId::Google,
        ProviderId::Mapbox,
        ProviderId::MusicBrainz,
        ProviderId::Spotify,
        ProviderId::LastFm,
    ];

    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Nominatim => "nominatim",
            ProviderId::Google => "google",
            ProviderId::Mapbox => "mapbox",
            ProviderId::MusicBrainz => "musicbrainz",
            ProviderId::Spotify => "spotify",
            ProviderId::LastFm => "lastfm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Nominatim => "OpenStreetMap Nominatim",
            ProviderId::Google => "Google Geocoding",
            ProviderId::Mapbox => "Mapbox Geocoding",
            ProviderId::MusicBrainz => "MusicBrainz",
            ProviderId::Spotify => "Spotify Web API",
            ProviderId::LastFm => "Last.fm",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            ProviderId::Nominatim | ProviderId::Google | ProviderId::Mapbox => Domain::CityState,
            ProviderId::MusicBrainz | ProviderId::Spotify | ProviderId::LastFm => {
                Domain::ArtistGenre
            }
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized provider identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "nominatim" => ProviderId::Nominatim,
            "google" => ProviderId::Google,
            "mapbox" => ProviderId::Mapbox,
            "musicbrainz" => ProviderId::MusicBrainz,
            "spotify" => ProviderId::Spotify,
            "lastfm" | "last.fm" => ProviderId::LastFm,
            other => return Err(UnknownProvider(other.to_string())),
        })
    }
}

/// Countries a geocoder query can be restricted to: (ISO 3166-1 alpha-2, name)
const COUNTRIES: &[(&str, &str)] = &[
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("CZ", "Czech Republic"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("HU", "Hungary"),
    ("IE", "Ireland"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("SE", "Sweden"),
    ("US", "United States"),
    ("ZA", "South Africa"),
];

/// A country geocoder queries are restricted to.
///
/// Nominatim wants the name, Google and Mapbox the ISO code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Country {
    code: &'static str,
    name: &'static str,
}

impl Country {
    pub const UNITED_STATES: Country = Country {
        code: "US",
        name: "United States",
    };

    /// ISO 3166-1 alpha-2 code, upper case
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// English short name, as it appears in concert data
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cache scope for answers restricted to this country.
    pub fn scope(&self) -> String {
        self.code.to_ascii_lowercase()
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Country that is neither a known name nor a known ISO code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown country: '{0}' (use an English name or ISO 3166 code, e.g. \"Canada\" or \"CA\")")]
pub struct UnknownCountry(pub String);

impl FromStr for Country {
    type Err = UnknownCountry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        let aliases = [("USA", "US"), ("UK", "GB"), ("United States of America", "US")];
        let wanted = aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(wanted))
            .map(|(_, code)| *code)
            .unwrap_or(wanted);

        COUNTRIES
            .iter()
            .find(|(code, name)| code.eq_ignore_ascii_case(wanted) || name.eq_ignore_ascii_case(wanted))
            .map(|&(code, name)| Country { code, name })
            .ok_or_else(|| UnknownCountry(s.to_string()))
    }
}

/// Outcome of resolving one name against one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeResult {
    /// Confident match; most relevant value first, no duplicates
    Found(Vec<String>),
    /// The provider affirmatively has no match
    NotFound,
    /// The call could not be completed
    Error(ProviderError),
}

impl AttributeResult {
    /// Build a `Found` from raw provider values.
    ///
    /// Values are trimmed, blanks dropped and duplicates removed keeping the
    /// first occurrence. Nothing left means `NotFound`.
    pub fn found<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for value in values {
            let value = value.as_ref().trim();
            if value.is_empty() || cleaned.iter().any(|v| v == value) {
                continue;
            }
            cleaned.push(value.to_string());
        }

        if cleaned.is_empty() {
            AttributeResult::NotFound
        } else {
            AttributeResult::Found(cleaned)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, AttributeResult::Found(_))
    }

    pub fn values(&self) -> Option<&[String]> {
        match self {
            AttributeResult::Found(values) => Some(values),
            _ => None,
        }
    }

    pub fn status(&self) -> LookupStatus {
        match self {
            AttributeResult::Found(_) => LookupStatus::Found,
            AttributeResult::NotFound => LookupStatus::NotFound,
            AttributeResult::Error(_) => LookupStatus::Error,
        }
    }
}

/// Status column of a cached lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    Found,
    NotFound,
    Error,
}

impl LookupStatus {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::Found => "found",
            LookupStatus::NotFound => "not_found",
            LookupStatus::Error => "error",
        }
    }

    /// Get symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            LookupStatus::Found => "✓",
            LookupStatus::NotFound => "✗",
            LookupStatus::Error => "!",
        }
    }
}

impl FromStr for LookupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(LookupStatus::Found),
            "not_found" => Ok(LookupStatus::NotFound),
            "error" => Ok(LookupStatus::Error),
            other => Err(format!("unknown lookup status '{}'", other)),
        }
    }
}

/// Errors a provider call can end with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Transient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Storage tag for [`ProviderError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    RateLimited,
    Auth,
    InvalidResponse,
    MissingCredentials,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Auth => "auth",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::MissingCredentials => "missing_credentials",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "rate_limited" => ErrorKind::RateLimited,
            "auth" => ErrorKind::Auth,
            "invalid_response" => ErrorKind::InvalidResponse,
            "missing_credentials" => ErrorKind::MissingCredentials,
            "unavailable" => ErrorKind::Unavailable,
            _ => ErrorKind::Transient,
        })
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Transient => ProviderError::Transient(message),
            ErrorKind::RateLimited => ProviderError::RateLimited(message),
            ErrorKind::Auth => ProviderError::Auth(message),
            ErrorKind::InvalidResponse => ProviderError::InvalidResponse(message),
            ErrorKind::MissingCredentials => ProviderError::MissingCredentials(message),
            ErrorKind::Unavailable => ProviderError::Unavailable(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Transient(_) => ErrorKind::Transient,
            ProviderError::RateLimited(_) => ErrorKind::RateLimited,
            ProviderError::Auth(_) => ErrorKind::Auth,
            ProviderError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            ProviderError::MissingCredentials(_) => ErrorKind::MissingCredentials,
            ProviderError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transient(m)
            | ProviderError::RateLimited(m)
            | ProviderError::Auth(m)
            | ProviderError::InvalidResponse(m)
            | ProviderError::MissingCredentials(m)
            | ProviderError::Unavailable(m) => m,
        }
    }

    /// Worth another attempt after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient(_) | ProviderError::RateLimited(_)
        )
    }

    /// Credentials problem: the provider is unusable for the rest of the run
    pub fn disables_provider(&self) -> bool {
        matches!(
            self,
            ProviderError::Auth(_) | ProviderError::MissingCredentials(_)
        )
    }
}
