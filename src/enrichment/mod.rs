//! Enrichment module - resolves entity names to attribute values through
//! external providers.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Names, results and provider errors
//! - **API DTOs** (`<provider>/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain results
//! - **Clients** - HTTP clients for external APIs
//! - **Provider** - Credentials and per-provider configuration
//! - **Service** - Cache, pacing, retries and fallback chains
//!
//! Geocoders (Nominatim, Google, Mapbox) map a city to its state or
//! province. Music sources (MusicBrainz, Spotify, Last.fm) map an artist to
//! genres.
//!
//! # Usage
//!
//! ```ignore
//! use enrichment::{LookupService, Provider, ProviderConfig, ProviderId};
//!
//! let cache = PersistentCache::open(&PersistentCache::default_path()).await?;
//! let nominatim = Provider::new(ProviderConfig::from_credentials(
//!     ProviderId::Nominatim,
//!     &credentials,
//!     Some(Country::UNITED_STATES),
//! )?);
//! let service = LookupService::new(cache)
//!     .with_provider(nominatim.connect(&HttpSettings::default())?);
//!
//! let state = service.lookup(&EntityName::new("Reno")?, ProviderId::Nominatim).await;
//! ```

pub mod domain;
pub mod http;
pub mod provider;
pub mod rate_limit;
pub mod service;
pub mod traits;

pub mod google;
pub mod lastfm;
pub mod mapbox;
pub mod musicbrainz;
pub mod nominatim;
pub mod spotify;

pub use domain::{
    AttributeResult, Country, Domain, EntityName, ErrorKind, LookupStatus, ProviderError, ProviderId,
};
pub use http::HttpSettings;
pub use provider::{Credentials, Provider, ProviderConfig};
pub use service::{FallbackOutcome, LookupOptions, LookupService, RetryPolicy};
pub use traits::AttributeProvider;
