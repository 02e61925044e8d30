//! Error types for listing-relay
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Fetch failures are additionally classified into an [`ErrorKind`] which
//! drives retry and escalation decisions in the pagination controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for listing-relay
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Credential Errors
    // ============================================================================
    #[error("No credential supplied for '{resource}'")]
    MissingCredential { resource: String },

    #[error("Credential rejected by upstream (HTTP {status})")]
    Unauthorized { status: u16 },

    // ============================================================================
    // Upstream Errors
    // ============================================================================
    #[error("Upstream server error (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Upstream rejected request (HTTP {status}): {body}")]
    ClientError { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// Classification of a failed page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No credential was available; nothing was sent
    MissingCredential,
    /// Upstream rejected the credential (401/403/419)
    Unauthorized,
    /// Upstream failed (5xx, or rate limiting we could not wait out)
    ServerError,
    /// Transport failure or timeout
    NetworkError,
    /// Body did not have the listing shape
    MalformedResponse,
    /// Any other 4xx
    ClientError,
    /// Local failures (config, io, ...)
    Internal,
}

impl ErrorKind {
    /// Stable name used in logs and relay responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ServerError => "server_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::ClientError => "client_error",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a missing credential error
    pub fn missing_credential(resource: impl Into<String>) -> Self {
        Self::MissingCredential {
            resource: resource.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Build the error for a non-success HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 | 419 => Self::Unauthorized { status },
            500..=599 => Self::ServerError { status, body },
            _ => Self::ClientError { status, body },
        }
    }

    /// Classify this error for retry/escalation decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredential { .. } => ErrorKind::MissingCredential,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::ServerError { .. } | Error::RateLimited { .. } => ErrorKind::ServerError,
            Error::Network { .. } | Error::Timeout { .. } => ErrorKind::NetworkError,
            Error::MalformedResponse { .. } | Error::JsonParse(_) => ErrorKind::MalformedResponse,
            Error::ClientError { .. } => ErrorKind::ClientError,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only transport failures are retried. Server errors are surfaced so the
    /// consumer can offer a manual retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::NetworkError
    }

    /// Check if the upstream rejected the credential
    pub fn is_auth_rejection(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Error::from_status(status.as_u16(), err.to_string())
        } else {
            Error::network(err.to_string())
        }
    }
}

/// Cloneable summary of an error, kept in pagination state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Classification
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
    /// Upstream HTTP status, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        let status = match err {
            Error::Unauthorized { status }
            | Error::ServerError { status, .. }
            | Error::ClientError { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status,
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result type alias for listing-relay
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
