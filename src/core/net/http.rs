// src/core/net/http.rs

use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::AuditConfig;

/// Schemes tried in order for every fetch.
const SCHEMES: [&str; 2] = ["https", "http"];

/// Upper bound on attempts within a single scheme.
const MAX_ATTEMPTS_PER_SCHEME: usize = 3;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("no usable response from {domain}{path}: {reason}")]
    Unreachable {
        domain: String,
        path: String,
        reason: String,
    },

    #[error("deadline exhausted before {domain}{path} answered")]
    DeadlineExhausted { domain: String, path: String },
}

/// A page that answered with a non-error status and a non-empty body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Response metadata from a HEAD request.
#[derive(Debug, Clone)]
pub struct FetchedHead {
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Fetches pages from audited sites, trying `https` then `http`.
///
/// Certificate verification is disabled on this client only. It inspects arbitrary
/// third-party sites and must read pages served with self-signed or expired certificates.
/// Nothing else in the service uses this client.
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
}

enum Attempt<T> {
    Done(T),
    RetryAgent(String),
    NextScheme(String),
}

impl HttpFetcher {
    pub fn new(config: &AuditConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::limited(10))
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
        })
    }

    /// GETs `path` on `domain`. Succeeds on the first status < 400 with a non-empty body.
    ///
    /// Blocked responses (403, 429, 503) rotate to the next User-Agent. Connection errors
    /// and other error statuses move to the next scheme.
    pub async fn fetch(&self, domain: &str, path: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.with_fallback(domain, path, timeout, Method::GET, |response| async move {
            let status = response.status();
            let final_url = response.url().clone();
            let headers = response.headers().clone();
            match response.text().await {
                Ok(body) if !body.trim().is_empty() => Ok(FetchedPage { body, final_url, status, headers }),
                Ok(_) => Err("empty body".to_string()),
                Err(e) => Err(format!("failed to read body: {e}")),
            }
        })
        .await
    }

    /// HEADs the site root to read its response headers.
    pub async fn head(&self, domain: &str, timeout: Duration) -> Result<FetchedHead, FetchError> {
        self.with_fallback(domain, "/", timeout, Method::HEAD, |response| async move {
            Ok(FetchedHead {
                final_url: response.url().clone(),
                status: response.status(),
                headers: response.headers().clone(),
            })
        })
        .await
    }

    async fn with_fallback<T, F, Fut>(
        &self,
        domain: &str,
        path: &str,
        timeout: Duration,
        method: Method,
        read: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = Result<T, String>>,
    {
        let deadline = Instant::now() + timeout;
        let mut last_reason = String::from("no attempt made");

        for scheme in SCHEMES {
            let url = format!("{scheme}://{domain}{path}");
            for agent in self.agents() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(FetchError::DeadlineExhausted {
                        domain: domain.to_string(),
                        path: path.to_string(),
                    });
                }

                match self.attempt(&url, &method, agent, remaining, &read).await {
                    Attempt::Done(value) => return Ok(value),
                    Attempt::RetryAgent(reason) => {
                        debug!(url = %url, reason = %reason, "Blocked, rotating User-Agent.");
                        last_reason = reason;
                    }
                    Attempt::NextScheme(reason) => {
                        debug!(url = %url, reason = %reason, "Fetch attempt failed.");
                        last_reason = reason;
                        break;
                    }
                }
            }
        }

        Err(FetchError::Unreachable {
            domain: domain.to_string(),
            path: path.to_string(),
            reason: last_reason,
        })
    }

    async fn attempt<T, F, Fut>(
        &self,
        url: &str,
        method: &Method,
        agent: &str,
        remaining: Duration,
        read: &F,
    ) -> Attempt<T>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = Result<T, String>>,
    {
        let response = match self
            .client
            .request(method.clone(), url)
            .header(USER_AGENT, agent)
            .timeout(remaining)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::NextScheme(e.to_string()),
        };

        let status = response.status();
        if is_blocked(status) {
            return Attempt::RetryAgent(format!("status {status}"));
        }
        if status.as_u16() >= 400 {
            return Attempt::NextScheme(format!("status {status}"));
        }
        match read(response).await {
            Ok(value) => Attempt::Done(value),
            Err(reason) => Attempt::NextScheme(reason),
        }
    }

    fn agents(&self) -> impl Iterator<Item = &str> {
        self.user_agents
            .iter()
            .map(String::as_str)
            .take(MAX_ATTEMPTS_PER_SCHEME)
    }
}

fn is_blocked(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Reads a header as text, if present and valid UTF-8.
pub fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn blocked_statuses_rotate_agents() {
        assert!(is_blocked(StatusCode::FORBIDDEN));
        assert!(is_blocked(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_blocked(StatusCode::NOT_FOUND));
    }

    #[test]
    fn agent_rotation_is_bounded() {
        let mut config = AuditConfig::default();
        config.user_agents = (0..6).map(|i| format!("agent-{i}")).collect();
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.agents().count(), MAX_ATTEMPTS_PER_SCHEME);
    }

    #[test]
    fn header_text_ignores_blank_values() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx/1.25.3"));
        headers.insert("x-powered-by", HeaderValue::from_static("  "));
        assert_eq!(header_text(&headers, "server").as_deref(), Some("nginx/1.25.3"));
        assert_eq!(header_text(&headers, "x-powered-by"), None);
        assert_eq!(header_text(&headers, "via"), None);
    }

    #[tokio::test]
    async fn zero_timeout_exhausts_deadline_without_network() {
        let fetcher = HttpFetcher::new(&AuditConfig::default()).unwrap();
        let err = fetcher.fetch("example.com", "/", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, FetchError::DeadlineExhausted { .. }));
    }
}
