//! Lookup service - orchestrates cache, pacing and provider calls
//!
//! This is the high-level API for resolving a name:
//! 1. Check the persistent cache (negative and error entries count as hits)
//! 2. Wait for the provider's rate limiter
//! 3. Call the provider, retrying transient failures with backoff
//! 4. Store the answer before returning it
//!
//! Concurrent lookups of the same `(provider, name)` are serialized, so a
//! cache miss triggers at most one provider call no matter how many callers
//! race for it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::cache::PersistentCache;
use crate::enrichment::domain::{AttributeResult, EntityName, ProviderError, ProviderId};
use crate::enrichment::rate_limit::RateLimiter;
use crate::enrichment::traits::AttributeProvider;

/// Retry behaviour for retryable provider errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries
    pub max_attempts: u32,
    /// Backoff base for transient failures, doubled per attempt
    pub base_delay: Duration,
    /// Backoff base after the provider said "slow down"
    pub rate_limit_delay: Duration,
    /// Upper bound on any single backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            rate_limit_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, with up to 25% random jitter.
    pub fn delay_for(&self, error: &ProviderError, attempt: u32) -> Duration {
        let base = match error {
            ProviderError::RateLimited(_) => self.rate_limit_delay,
            _ => self.base_delay,
        };
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = base.saturating_mul(1u32 << exponent).min(self.max_delay);

        let jitter_cap = (delay.as_millis() / 4) as u64;
        let jitter = if jitter_cap > 0 {
            rand::rng().random_range(0..=jitter_cap)
        } else {
            0
        };
        delay + Duration::from_millis(jitter)
    }
}

/// Per-call switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Ignore any cached answer and ask the provider again
    pub bypass_cache: bool,
    /// Treat cached `Error` entries as misses
    pub retry_cached_errors: bool,
}

/// One failed step of a fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub result: AttributeResult,
}

/// Result of [`LookupService::lookup_with_fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome {
    /// `Found` from the first provider that had an answer, otherwise `NotFound`
    pub result: AttributeResult,
    /// The provider that produced `Found`
    pub provider: Option<ProviderId>,
    /// Providers tried before (or instead of) the successful one
    pub attempts: Vec<ProviderAttempt>,
}

impl FallbackOutcome {
    /// Human-readable summary of why nothing was found.
    pub fn reason(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers tried".to_string();
        }

        self.attempts
            .iter()
            .map(|a| match &a.result {
                AttributeResult::Error(e) => format!("{}: {}", a.provider, e),
                AttributeResult::NotFound => format!("{}: not found", a.provider),
                AttributeResult::Found(_) => format!("{}: found", a.provider),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

struct ProviderSlot {
    provider: Arc<dyn AttributeProvider>,
    limiter: RateLimiter,
    /// Fixed for the provider's lifetime, so read once at registration
    scope: String,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;
type LookupKey = (ProviderId, EntityName);

/// Service for resolving names through cached, paced providers
pub struct LookupService {
    cache: PersistentCache,
    providers: HashMap<ProviderId, ProviderSlot>,
    retry: RetryPolicy,
    in_flight: parking_lot::Mutex<HashMap<LookupKey, KeyLock>>,
    /// Providers switched off by a credentials failure, for the service's lifetime
    disabled: parking_lot::Mutex<HashMap<ProviderId, ProviderError>>,
}

/// Releases the in-flight entry when the last holder is done
struct InFlight<'a> {
    service: &'a LookupService,
    key: LookupKey,
    lock: KeyLock,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.service.in_flight.lock();
        // One reference lives in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.key);
        }
    }
}

impl LookupService {
    /// Create a service with no providers registered
    pub fn new(cache: PersistentCache) -> Self {
        Self {
            cache,
            providers: HashMap::new(),
            retry: RetryPolicy::default(),
            in_flight: parking_lot::Mutex::new(HashMap::new()),
            disabled: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a provider, replacing any earlier one with the same id.
    ///
    /// Its rate limiter is sized from `info().max_requests_per_second`.
    pub fn register(&mut self, provider: Arc<dyn AttributeProvider>) {
        let info = provider.info();
        let limiter = RateLimiter::new(info.id, info.max_requests_per_second);
        tracing::debug!(
            "Registered provider {} (at least {:?} between requests)",
            info.id,
            limiter.min_interval()
        );
        let scope = provider.cache_scope();
        self.providers.insert(
            info.id,
            ProviderSlot {
                provider,
                limiter,
                scope,
            },
        );
    }

    pub fn with_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_registered(&self, provider: ProviderId) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Providers switched off by credential failures, with the error that did it.
    pub fn disabled_providers(&self) -> Vec<(ProviderId, ProviderError)> {
        let mut disabled: Vec<_> = self
            .disabled
            .lock()
            .iter()
            .map(|(id, e)| (*id, e.clone()))
            .collect();
        disabled.sort_by_key(|(id, _)| *id);
        disabled
    }

    /// Resolve `name` through one provider, using the cache.
    pub async fn lookup(&self, name: &EntityName, provider: ProviderId) -> AttributeResult {
        self.lookup_with(name, provider, LookupOptions::default())
            .await
    }

    /// Resolve `name` ignoring any cached answer, then overwrite the cache.
    pub async fn lookup_fresh(&self, name: &EntityName, provider: ProviderId) -> AttributeResult {
        let opts = LookupOptions {
            bypass_cache: true,
            ..LookupOptions::default()
        };
        self.lookup_with(name, provider, opts).await
    }

    pub async fn lookup_with(
        &self,
        name: &EntityName,
        provider: ProviderId,
        opts: LookupOptions,
    ) -> AttributeResult {
        let in_flight = self.enter(provider, name);
        let _guard = in_flight.lock.lock().await;
        self.lookup_locked(name, provider, opts).await
    }

    /// Try `chain` in order and stop at the first `Found`.
    pub async fn lookup_with_fallback(
        &self,
        name: &EntityName,
        chain: &[ProviderId],
    ) -> FallbackOutcome {
        self.fallback_with(name, chain, LookupOptions::default())
            .await
    }

    pub async fn fallback_with(
        &self,
        name: &EntityName,
        chain: &[ProviderId],
        opts: LookupOptions,
    ) -> FallbackOutcome {
        let mut attempts = Vec::new();

        for &provider in chain {
            let result = self.lookup_with(name, provider, opts).await;
            if result.is_found() {
                return FallbackOutcome {
                    result,
                    provider: Some(provider),
                    attempts,
                };
            }
            attempts.push(ProviderAttempt { provider, result });
        }

        FallbackOutcome {
            result: AttributeResult::NotFound,
            provider: None,
            attempts,
        }
    }

    fn enter(&self, provider: ProviderId, name: &EntityName) -> InFlight<'_> {
        let key = (provider, name.clone());
        let lock = Arc::clone(self.in_flight.lock().entry(key.clone()).or_default());
        InFlight {
            service: self,
            key,
            lock,
        }
    }

    async fn lookup_locked(
        &self,
        name: &EntityName,
        provider: ProviderId,
        opts: LookupOptions,
    ) -> AttributeResult {
        let slot = self.providers.get(&provider);
        let scope = slot.map(|s| s.scope.as_str()).unwrap_or_default();

        if !opts.bypass_cache {
            match self.cache.get(name, provider, scope).await {
                Ok(Some(entry)) => {
                    let stale = opts.retry_cached_errors
                        && matches!(entry.result, AttributeResult::Error(_));
                    if !stale {
                        tracing::trace!("Cache hit for {} via {}", name, provider);
                        return entry.result;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Cache read failed for '{}': {}", name, e),
            }
        }

        if let Some(err) = self.disabled.lock().get(&provider).cloned() {
            return AttributeResult::Error(err);
        }

        let Some(slot) = slot else {
            return AttributeResult::Error(ProviderError::Unavailable(format!(
                "{} is not configured",
                provider.display_name()
            )));
        };

        let result = self.resolve_with_retry(slot, name).await;

        if let AttributeResult::Error(e) = &result
            && e.disables_provider()
        {
            tracing::warn!("Disabling {} for this run: {}", provider, e);
            self.disabled.lock().insert(provider, e.clone());
            return result;
        }

        if let Err(e) = self.cache.put(name, provider, scope, &result).await {
            tracing::warn!("Failed to cache result for '{}': {}", name, e);
        }

        result
    }

    async fn resolve_with_retry(&self, slot: &ProviderSlot, name: &EntityName) -> AttributeResult {
        let mut attempt = 1;
        loop {
            slot.limiter.acquire().await;
            let result = slot.provider.resolve(name).await;

            match &result {
                AttributeResult::Error(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(e, attempt);
                    tracing::debug!(
                        "{} failed for '{}' (attempt {}/{}), retrying in {:?}: {}",
                        slot.limiter.provider(),
                        name,
                        attempt,
                        self.retry.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::enrichment::traits::mocks::MockProvider;
    use crate::test_utils::temp_cache;

    fn name(s: &str) -> EntityName {
        EntityName::new(s).unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            rate_limit_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            rate_limit_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(1500),
        };
        let transient = ProviderError::Transient("x".into());
        let limited = ProviderError::RateLimited("x".into());

        let first = policy.delay_for(&transient, 1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        let third = policy.delay_for(&transient, 3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
        assert!(policy.delay_for(&limited, 1) >= Duration::from_millis(1000));
        assert!(policy.delay_for(&limited, 8) <= Duration::from_millis(1500 + 375));
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::found(ProviderId::MusicBrainz, &["pop", "rock"]));
        let service = LookupService::new(cache).with_provider(mock.clone());

        let first = service.lookup(&name("Coldplay"), ProviderId::MusicBrainz).await;
        let second = service.lookup(&name("Coldplay"), ProviderId::MusicBrainz).await;

        assert_eq!(first, second);
        assert_eq!(first, AttributeResult::Found(vec!["pop".into(), "rock".into()]));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::not_found(ProviderId::Nominatim));
        let service = LookupService::new(cache.clone()).with_provider(mock.clone());

        assert_eq!(
            service.lookup(&name("Atlantis"), ProviderId::Nominatim).await,
            AttributeResult::NotFound
        );
        assert_eq!(
            service.lookup(&name("Atlantis"), ProviderId::Nominatim).await,
            AttributeResult::NotFound
        );
        assert_eq!(mock.calls(), 1);

        let entry = cache
            .get(&name("Atlantis"), ProviderId::Nominatim, "")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.result, AttributeResult::NotFound);
    }

    #[tokio::test]
    async fn test_cache_persists_across_services() {
        let (cache, _dir) = temp_cache().await;
        let first = Arc::new(MockProvider::found(ProviderId::Google, &["Nevada"]));
        LookupService::new(cache.clone())
            .with_provider(first.clone())
            .lookup(&name("Reno"), ProviderId::Google)
            .await;

        let second = Arc::new(MockProvider::found(ProviderId::Google, &["Elsewhere"]));
        let result = LookupService::new(cache)
            .with_provider(second.clone())
            .lookup(&name("Reno"), ProviderId::Google)
            .await;

        assert_eq!(result, AttributeResult::Found(vec!["Nevada".into()]));
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_answers_are_kept_apart_by_scope() {
        let (cache, _dir) = temp_cache().await;
        let us = Arc::new(MockProvider::found(ProviderId::Nominatim, &["Oregon"]).with_scope("us"));
        LookupService::new(cache.clone())
            .with_provider(us.clone())
            .lookup(&name("Portland"), ProviderId::Nominatim)
            .await;

        let au = Arc::new(MockProvider::found(ProviderId::Nominatim, &["Victoria"]).with_scope("au"));
        let result = LookupService::new(cache.clone())
            .with_provider(au.clone())
            .lookup(&name("Portland"), ProviderId::Nominatim)
            .await;

        assert_eq!(result, AttributeResult::Found(vec!["Victoria".into()]));
        assert_eq!(au.calls(), 1);
        let entry = cache
            .get(&name("Portland"), ProviderId::Nominatim, "us")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.result, AttributeResult::Found(vec!["Oregon".into()]));
    }

    #[tokio::test]
    async fn test_lookup_fresh_overwrites() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::sequence(
            ProviderId::LastFm,
            vec![AttributeResult::NotFound, AttributeResult::found(["jazz"])],
        ));
        let service = LookupService::new(cache).with_provider(mock.clone());
        let n = name("Kamasi Washington");

        assert_eq!(service.lookup(&n, ProviderId::LastFm).await, AttributeResult::NotFound);
        assert!(service.lookup_fresh(&n, ProviderId::LastFm).await.is_found());
        // Plain lookup now sees the refreshed entry
        assert!(service.lookup(&n, ProviderId::LastFm).await.is_found());
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::sequence(
            ProviderId::Spotify,
            vec![
                AttributeResult::Error(ProviderError::Transient("timeout".into())),
                AttributeResult::Error(ProviderError::RateLimited("429".into())),
                AttributeResult::found(["indie"]),
            ],
        ));
        let service = LookupService::new(cache)
            .with_retry_policy(fast_retry())
            .with_provider(mock.clone());

        let result = service.lookup(&name("Phoebe Bridgers"), ProviderId::Spotify).await;

        assert_eq!(result, AttributeResult::Found(vec!["indie".into()]));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_cache_the_error() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::failing(
            ProviderId::MusicBrainz,
            ProviderError::Transient("connection reset".into()),
        ));
        let service = LookupService::new(cache.clone())
            .with_retry_policy(fast_retry())
            .with_provider(mock.clone());
        let n = name("Somebody");

        let result = service.lookup(&n, ProviderId::MusicBrainz).await;
        assert!(matches!(result, AttributeResult::Error(ProviderError::Transient(_))));
        assert_eq!(mock.calls(), 3);

        // Cached errors are hits by default...
        service.lookup(&n, ProviderId::MusicBrainz).await;
        assert_eq!(mock.calls(), 3);

        // ...unless the caller asks to retry them
        let opts = LookupOptions {
            retry_cached_errors: true,
            ..LookupOptions::default()
        };
        service.lookup_with(&n, ProviderId::MusicBrainz, opts).await;
        assert_eq!(mock.calls(), 6);
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::failing(
            ProviderId::Google,
            ProviderError::InvalidResponse("garbage".into()),
        ));
        let service = LookupService::new(cache)
            .with_retry_policy(fast_retry())
            .with_provider(mock.clone());

        service.lookup(&name("Dayton"), ProviderId::Google).await;
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_error_disables_provider() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(MockProvider::failing(
            ProviderId::LastFm,
            ProviderError::Auth("Invalid API key".into()),
        ));
        let service = LookupService::new(cache.clone())
            .with_retry_policy(fast_retry())
            .with_provider(mock.clone());

        let first = service.lookup(&name("A"), ProviderId::LastFm).await;
        let second = service.lookup(&name("B"), ProviderId::LastFm).await;

        assert!(matches!(first, AttributeResult::Error(ProviderError::Auth(_))));
        assert!(matches!(second, AttributeResult::Error(ProviderError::Auth(_))));
        assert_eq!(mock.calls(), 1);
        assert_eq!(service.disabled_providers().len(), 1);
        // Credential failures say nothing about the name, so they are not cached
        assert!(cache.get(&name("A"), ProviderId::LastFm, "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_unavailable() {
        let (cache, _dir) = temp_cache().await;
        let service = LookupService::new(cache);

        let result = service.lookup(&name("Austin"), ProviderId::Mapbox).await;

        assert!(matches!(result, AttributeResult::Error(ProviderError::Unavailable(_))));
        assert!(!service.is_registered(ProviderId::Mapbox));
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_found() {
        let (cache, _dir) = temp_cache().await;
        let first = Arc::new(MockProvider::not_found(ProviderId::MusicBrainz));
        let second = Arc::new(MockProvider::found(ProviderId::Spotify, &["k-pop"]));
        let third = Arc::new(MockProvider::found(ProviderId::LastFm, &["pop"]));
        let service = LookupService::new(cache)
            .with_provider(first.clone())
            .with_provider(second.clone())
            .with_provider(third.clone());

        let outcome = service
            .lookup_with_fallback(
                &name("NewJeans"),
                &[ProviderId::MusicBrainz, ProviderId::Spotify, ProviderId::LastFm],
            )
            .await;

        assert_eq!(outcome.result, AttributeResult::Found(vec!["k-pop".into()]));
        assert_eq!(outcome.provider, Some(ProviderId::Spotify));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].provider, ProviderId::MusicBrainz);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_all_fail() {
        let (cache, _dir) = temp_cache().await;
        let service = LookupService::new(cache)
            .with_retry_policy(RetryPolicy::none())
            .with_provider(Arc::new(MockProvider::not_found(ProviderId::Nominatim)))
            .with_provider(Arc::new(MockProvider::failing(
                ProviderId::Google,
                ProviderError::Transient("timeout".into()),
            )));

        let outcome = service
            .lookup_with_fallback(&name("Nowhere"), &[ProviderId::Nominatim, ProviderId::Google])
            .await;

        assert_eq!(outcome.result, AttributeResult::NotFound);
        assert_eq!(outcome.provider, None);
        assert_eq!(outcome.attempts.len(), 2);
        let reason = outcome.reason();
        assert!(reason.contains("nominatim: not found"));
        assert!(reason.contains("google: Network error: timeout"));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_call_provider_once() {
        let (cache, _dir) = temp_cache().await;
        let mock = Arc::new(
            MockProvider::found(ProviderId::Nominatim, &["Texas"])
                .with_delay(Duration::from_millis(50)),
        );
        let service = Arc::new(LookupService::new(cache).with_provider(mock.clone()));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service.lookup(&name("Austin"), ProviderId::Nominatim).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_found());
        }
        assert_eq!(mock.calls(), 1);
        assert!(service.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_lookups_respect_rate_limit() {
        let (cache, _dir) = temp_cache().await;
        let paced = Arc::new(MockProvider::not_found(ProviderId::Google).with_rate_limit(20));
        let service = LookupService::new(cache).with_provider(paced.clone());

        let start = Instant::now();
        for city in ["A", "B", "C", "D", "E"] {
            service.lookup(&name(city), ProviderId::Google).await;
        }

        assert_eq!(paced.calls(), 5);
        assert!(start.elapsed() + Duration::from_millis(3) >= Duration::from_millis(200));
    }
}
