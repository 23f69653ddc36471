// src/core/scanner/mod.rs

// One module per probe. Each exposes a unit struct implementing `Probe`; the registry
// decides which of them run.
pub mod ads_scanner;
pub mod contacts_scanner;
pub mod dns_scanner;
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod hosting_scanner;
pub mod performance_scanner;
pub mod security_scanner;
pub mod ssl_scanner;
pub mod whois_scanner;
pub mod wordpress_scanner;

use reqwest::header::HeaderMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::debug;

use crate::core::net::http::{FetchError, HttpFetcher};

/// Tracks the time a probe has left. Inner operations use `limit` so that none of them
/// outlives the probe's own budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    deadline: Instant,
}

impl Budget {
    pub(crate) fn new(budget: Duration) -> Self {
        Self { deadline: Instant::now() + budget }
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// `min(default, remaining)`.
    pub(crate) fn limit(&self, default: Duration) -> Duration {
        default.min(self.remaining())
    }

    /// Runs `fut` for at most `min(default, remaining)`; `None` on timeout.
    pub(crate) async fn within<F: Future>(&self, default: Duration, fut: F) -> Option<F::Output> {
        timeout(self.limit(default), fut).await.ok()
    }
}

/// Response headers of the site root: HEAD first, GET when HEAD is refused.
pub(crate) async fn root_headers(http: &HttpFetcher, domain: &str, limit: Duration) -> Result<HeaderMap, FetchError> {
    let started = Instant::now();
    match http.head(domain, limit).await {
        Ok(head) => Ok(head.headers),
        Err(e) => {
            debug!(domain, error = %e, "HEAD failed, retrying with GET.");
            let page = http.fetch(domain, "/", limit.saturating_sub(started.elapsed())).await?;
            Ok(page.headers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_limits_to_remaining_time() {
        let budget = Budget::new(Duration::from_millis(50));
        assert!(budget.limit(Duration::from_secs(10)) <= Duration::from_millis(50));
        assert_eq!(budget.limit(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn within_returns_none_on_timeout() {
        let budget = Budget::new(Duration::from_millis(20));
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert!(budget.within(Duration::from_secs(5), slow).await.is_none());
        assert_eq!(budget.within(Duration::from_secs(1), async { 7 }).await, Some(7));
    }
}
