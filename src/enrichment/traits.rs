//! The provider seam.
//!
//! Every external source implements [`AttributeProvider`]. The lookup service
//! only ever talks to `Arc<dyn AttributeProvider>`, so tests substitute the
//! mock implementations below for the real HTTP clients.
//!
//! # Example
//!
//! ```ignore
//! use concert_enricher::enrichment::traits::AttributeProvider;
//!
//! async fn first_genre(provider: &dyn AttributeProvider, artist: &EntityName) -> Option<String> {
//!     provider.resolve(artist).await.values().map(|v| v[0].clone())
//! }
//! ```

use async_trait::async_trait;

use super::domain::{AttributeResult, EntityName, ProviderId};

/// Static facts about a provider, reported without any network traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: ProviderId,
    /// Sustained ceiling; `None` means unbounded
    pub max_requests_per_second: Option<u32>,
    pub requires_credentials: bool,
}

/// Resolves an entity name to attribute values through one external source.
///
/// Contract for implementations:
/// - exactly one lookup request per call (a credential exchange may precede it)
/// - no internal retries; the lookup service owns retry policy
/// - query normalization (trimming, case folding) happens here
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    fn info(&self) -> ProviderInfo;

    async fn resolve(&self, name: &EntityName) -> AttributeResult;

    /// Qualifier that changes what `resolve` answers for the same name, such
    /// as the country a geocoder is restricted to. Cached answers are keyed
    /// by it, so an empty scope means the answer depends on the name alone.
    fn cache_scope(&self) -> String {
        String::new()
    }

    fn id(&self) -> ProviderId {
        self.info().id
    }
}
