//! HTTP client for the upstream listing API
//!
//! Provides a thin client that handles:
//! - Bearer credential attachment
//! - Outbound rate limiting
//! - One short `Retry-After` wait on 429
//! - Status classification into the crate error taxonomy
//!
//! A single call here is a single attempt. Transport retries belong to
//! `pagination::RetryPolicy`.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{apply_bearer, Credential};
use crate::error::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upstream API root
pub const DEFAULT_BASE_URL: &str = "https://oauth.reddit.com";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Longest `Retry-After` we are willing to sleep through on a 429
    pub max_retry_after: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            rate_limit: Some(RateLimiterConfig::default()),
            max_retry_after: Duration::from_secs(5),
            user_agent: format!("listing-relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Set the longest honoured `Retry-After`
    pub fn max_retry_after(mut self, wait: Duration) -> Self {
        self.config.max_retry_after = wait;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, sent in insertion order
    pub query: Vec<(String, String)>,
}

/// HTTP client for authenticated GETs against the listing API
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make an authenticated GET request
    ///
    /// Returns the response only for 2xx statuses; everything else is mapped
    /// through [`Error::from_status`].
    pub async fn get(
        &self,
        path: &str,
        config: &RequestConfig,
        credential: &Credential,
    ) -> Result<Response> {
        let full_url = self.build_url(path);
        let timeout = self.config.timeout;
        let mut waited_for_rate_limit = false;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.get(&full_url).timeout(timeout);
            if !config.query.is_empty() {
                req = req.query(&config.query);
            }
            req = apply_bearer(req, credential);

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(Error::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(e) => return Err(Error::network(e.to_string())),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = extract_retry_after(&response);
                if !waited_for_rate_limit
                    && Duration::from_secs(retry_after) <= self.config.max_retry_after
                {
                    warn!("Rate limited (429) on {full_url}, waiting {retry_after}s");
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    waited_for_rate_limit = true;
                    continue;
                }
                return Err(Error::RateLimited {
                    retry_after_seconds: retry_after,
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                debug!("Request to {full_url} failed with {}", status.as_u16());
                return Err(Error::from_status(status.as_u16(), truncate(&body, 512)));
            }

            debug!("Request succeeded: GET {full_url}");
            return Ok(response);
        }
    }

    /// Make an authenticated GET request and parse the body as JSON
    ///
    /// A body that is not JSON is a `MalformedResponse`.
    pub async fn get_json(
        &self,
        path: &str,
        config: &RequestConfig,
        credential: &Credential,
    ) -> Result<Value> {
        let response = self.get(path, config, credential).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::malformed(format!("response is not JSON: {e}")))
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map_or(60, |secs| secs.ceil() as u64)
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod client_unit_tests {
    use super::*;

    #[test]
    fn test_build_url_joins_slashes() {
        let client = HttpClient::with_config(
            HttpClientConfig::builder()
                .base_url("https://api.example.com/")
                .no_rate_limit()
                .build(),
        )
        .unwrap();

        assert_eq!(
            client.build_url("/user/alice/saved"),
            "https://api.example.com/user/alice/saved"
        );
        assert_eq!(
            client.build_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
