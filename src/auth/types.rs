//! Credential types
//!
//! A credential is an opaque OAuth bearer token. It is never logged.

use crate::error::{Error, Result};

/// Environment variable consulted for a bearer token
pub const TOKEN_ENV_VAR: &str = "LISTING_RELAY_TOKEN";

/// Opaque OAuth bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap a bearer token
    ///
    /// Surrounding whitespace is trimmed; an empty token is rejected.
    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::invalid_value("credential", "empty bearer token"));
        }
        Ok(Self { token })
    }

    /// Read the token from [`TOKEN_ENV_VAR`], if set and non-empty
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .and_then(|t| Self::bearer(t).ok())
    }

    /// Parse an inbound `Authorization` header value (`Bearer <token>`)
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Self::bearer(token).ok()
    }

    /// The raw token
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}
