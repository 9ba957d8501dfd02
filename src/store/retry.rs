//! Backoff policy for transient store failures.
//!
//! Transient means HTTP 429 or any 5xx. The delay doubles each attempt up to
//! a cap, with random jitter on top to avoid synchronized retries. When the
//! store sends a `Retry-After` header (either form of RFC 7231), the larger of
//! the computed backoff and the server's wish is honored.

use std::time::{Duration, SystemTime};

use rand::Rng;
use tracing::debug;

use crate::config::RetrySettings;

/// Backoff multiplier applied per attempt.
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Maximum random jitter added to each delay.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Retry policy for store mutations and listing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy from the configured tunables. `max_attempts` counts
    /// the initial attempt and is clamped to at least 1.
    #[must_use]
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
        }
    }

    /// Maximum number of attempts, initial attempt included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True when the status is worth another attempt.
    #[must_use]
    pub fn is_transient(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Delay before the next attempt, after `attempt` (1-indexed) failed.
    /// A parsed `Retry-After` value overrides the backoff when larger.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.calculate_backoff(attempt);
        let delay = match retry_after {
            Some(server_wish) => backoff.max(server_wish),
            None => backoff,
        };
        debug!(attempt, delay_ms = delay.as_millis(), "backing off");
        delay
    }

    /// `min(base * multiplier^(attempt-1), max) + jitter`.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * BACKOFF_MULTIPLIER.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let capped = Duration::from_millis(capped_ms as u64);
        capped + jitter()
    }
}

/// Random jitter between 0 and [`MAX_JITTER`].
#[allow(clippy::cast_possible_truncation)]
fn jitter() -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Parses a `Retry-After` header value: delta-seconds or an HTTP-date.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = httpdate::parse_http_date(trimmed).ok()?;
    when.duration_since(SystemTime::now()).ok()
}
