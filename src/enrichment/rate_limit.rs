//! Per-provider request pacing.
//!
//! Free tiers (Nominatim, MusicBrainz) allow one request per second; paid
//! tiers are effectively unbounded. Backpressure is pure delay: `acquire`
//! never fails, it only waits.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Gcra};

use super::domain::ProviderId;

type DirectLimiter = Gcra<NotKeyed, InMemoryState, DefaultClock>;

/// Paces requests to one provider.
///
/// Burst is fixed at one cell, so any two granted acquisitions are at least
/// `1 / max_requests_per_second` apart, whatever the number of callers.
pub struct RateLimiter {
    provider: ProviderId,
    limiter: Option<DirectLimiter>,
    max_requests_per_second: Option<NonZeroU32>,
}

impl RateLimiter {
    /// `None` (or zero) means no pacing at all.
    pub fn new(provider: ProviderId, max_requests_per_second: Option<u32>) -> Self {
        let max_requests_per_second = max_requests_per_second.and_then(NonZeroU32::new);
        let limiter = max_requests_per_second
            .map(|rps| Gcra::direct(Quota::per_second(rps).allow_burst(NonZeroU32::MIN)));

        Self {
            provider,
            limiter,
            max_requests_per_second,
        }
    }

    /// Wait until the next request to this provider is allowed.
    ///
    /// Dropping the returned future abandons the wait without consuming a slot.
    pub async fn acquire(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        if limiter.check().is_ok() {
            return;
        }

        tracing::trace!("Pacing request to {}", self.provider);
        limiter.until_ready().await;
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Minimum spacing between two granted acquisitions.
    pub fn min_interval(&self) -> Duration {
        match self.max_requests_per_second {
            Some(rps) => Duration::from_secs(1) / rps.get(),
            None => Duration::ZERO,
        }
    }
}
