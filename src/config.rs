//! Runtime settings
//!
//! Settings are read from an optional YAML file, then selected values are
//! overridden from the environment. Every section is optional:
//!
//! ```yaml
//! api:
//!   base_url: https://oauth.reddit.com
//!   page_size: 100
//!   timeout_secs: 20
//!   requests_per_minute: 60
//!   burst: 10
//! retry:
//!   max_retries: 3
//!   backoff: exponential
//!   initial_backoff_ms: 250
//!   max_backoff_ms: 10000
//! notifications:
//!   ttl_ms: 3000
//! server:
//!   bind: 127.0.0.1:8787
//! ```

use crate::error::{Error, Result};
use crate::fetch::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::http::{HttpClientConfig, RateLimiterConfig, DEFAULT_BASE_URL};
use crate::notify::DEFAULT_TTL;
use crate::pagination::{ControllerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding `api.base_url`
pub const BASE_URL_ENV_VAR: &str = "LISTING_RELAY_BASE_URL";

// ============================================================================
// Settings
// ============================================================================

/// Complete runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upstream API
    pub api: ApiSettings,
    /// Transport retry policy
    pub retry: RetryPolicy,
    /// Notification queue
    pub notifications: NotificationSettings,
    /// Relay server
    pub server: ServerSettings,
}

/// Upstream API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// API root
    pub base_url: String,
    /// Custom user agent
    pub user_agent: Option<String>,
    /// Items per page, at most 100
    pub page_size: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Sustained request budget; 0 disables rate limiting
    pub requests_per_minute: u32,
    /// Burst allowance
    pub burst: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        let limits = RateLimiterConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 20,
            requests_per_minute: limits.requests_per_minute,
            burst: limits.burst,
        }
    }
}

/// Notification queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// How long a notification stays visible
    pub ttl_ms: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
        }
    }
}

/// Relay server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read settings file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate settings from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings for a run: file (if any), then environment
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV_VAR).filter(|u| !u.trim().is_empty()) {
            debug!(base_url = %url, "Base URL overridden from environment");
            self.api.base_url = url.trim().to_string();
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)?;

        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "api.page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::invalid_value("api.timeout_secs", "must be positive"));
        }
        if self.notifications.ttl_ms == 0 {
            return Err(Error::invalid_value(
                "notifications.ttl_ms",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// HTTP client configuration
    pub fn to_http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.api.base_url)
            .timeout(Duration::from_secs(self.api.timeout_secs));

        builder = if self.api.requests_per_minute == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::new(
                self.api.requests_per_minute,
                self.api.burst,
            ))
        };
        if let Some(agent) = &self.api.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    /// Pagination controller configuration
    pub fn to_controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            page_size: self.api.page_size,
            retry: self.retry.clone(),
            ..ControllerConfig::default()
        }
    }

    /// Notification time-to-live
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notifications.ttl_ms)
    }
}
