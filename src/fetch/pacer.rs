//! Per-domain request pacing.
//!
//! Every outbound request waits until at least the configured delay has
//! elapsed since the previous request to the same domain. Requests to
//! different domains never wait on each other. This exists to stay under the
//! counterpart services' informal rate tolerance, not for correctness.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Per-domain pacer. Wrap in `Arc` and share across components so the
/// resolver and the catalog downloads pace against the same clock.
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    disabled: bool,
    /// Arc lets the per-domain state be cloned out before awaiting, keeping
    /// the map shard lock from being held across an await point.
    domains: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RequestPacer {
    /// Creates a pacer with the given minimum per-domain spacing.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            disabled: delay.is_zero(),
            domains: DashMap::new(),
        }
    }

    /// Creates a pacer that never delays (for tests and `--pacing-ms 0`).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits until a request to `url`'s domain is allowed, then records the
    /// request time. URLs without a parseable host share one bucket.
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);
        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last_request = state.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(domain = %domain, wait_ms = wait.as_millis(), "pacing request");
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| "(unparsed)".to_string())
}
