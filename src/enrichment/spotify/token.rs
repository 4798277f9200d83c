//! Cached client-credentials token.

use std::time::{Duration, Instant};

/// Tokens are refreshed this long before Spotify says they expire
pub(super) const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub(super) struct AccessToken {
    value: String,
    refresh_at: Instant,
}

impl AccessToken {
    pub(super) fn new(value: String, expires_in: Duration, issued_at: Instant) -> Self {
        Self {
            value,
            refresh_at: issued_at + expires_in.saturating_sub(REFRESH_MARGIN),
        }
    }

    pub(super) fn value(&self) -> &str {
        &self.value
    }

    pub(super) fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}
