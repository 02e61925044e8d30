//! Known paginated resources
//!
//! Maps the listings an activity dashboard reads onto upstream endpoint
//! paths. Anything else can still be addressed with [`Resource::Custom`].

use crate::error::{Error, Result};
use crate::pagination::ResourceKey;
use std::fmt;
use std::str::FromStr;

/// Endpoint returning per-community karma; not paginated
pub const KARMA_PATH: &str = "api/v1/me/karma";

/// A paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Items the user saved
    Saved {
        /// Account name
        user: String,
    },
    /// Posts the user submitted
    Submitted {
        /// Account name
        user: String,
    },
    /// Comments the user wrote
    Comments {
        /// Account name
        user: String,
    },
    /// Communities the caller subscribes to
    Subscribed,
    /// Any other listing path
    Custom(String),
}

impl Resource {
    /// Saved items of `user`
    pub fn saved(user: impl Into<String>) -> Self {
        Self::Saved { user: user.into() }
    }

    /// Submitted posts of `user`
    pub fn submitted(user: impl Into<String>) -> Self {
        Self::Submitted { user: user.into() }
    }

    /// Comments of `user`
    pub fn comments(user: impl Into<String>) -> Self {
        Self::Comments { user: user.into() }
    }

    /// Endpoint path, relative to the API base URL
    pub fn resource_id(&self) -> String {
        match self {
            Self::Saved { user } => format!("user/{user}/saved"),
            Self::Submitted { user } => format!("user/{user}/submitted"),
            Self::Comments { user } => format!("user/{user}/comments"),
            Self::Subscribed => "subreddits/mine/subscriber".to_string(),
            Self::Custom(path) => path.trim_matches('/').to_string(),
        }
    }

    /// Pagination key with no extra parameters
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_id())
    }

    /// The three listings that make up a user's activity
    pub fn activity(user: &str) -> [Self; 3] {
        [Self::saved(user), Self::submitted(user), Self::comments(user)]
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved { user } => write!(f, "saved:{user}"),
            Self::Submitted { user } => write!(f, "submitted:{user}"),
            Self::Comments { user } => write!(f, "comments:{user}"),
            Self::Subscribed => f.write_str("subscribed"),
            Self::Custom(path) => f.write_str(path),
        }
    }
}

impl FromStr for Resource {
    type Err = Error;

    /// Parse `saved:<user>`, `submitted:<user>`, `comments:<user>`,
    /// `subscribed`, or a relative path containing `/`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "subscribed" {
            return Ok(Self::Subscribed);
        }

        // Paths only: the bearer token must never be sent to another host
        if s.contains("://") {
            return Err(Error::invalid_value(
                "resource",
                format!("'{s}' must be a path relative to the API, not a URL"),
            ));
        }

        // `kind:user` shorthand; a `/` before the colon makes it a path
        let shorthand = s.split_once(':').filter(|(kind, _)| !kind.contains('/'));
        if let Some((kind, user)) = shorthand {
            if user.is_empty() || user.contains('/') {
                return Err(Error::invalid_value(
                    "resource",
                    format!("'{s}' needs an account name after ':'"),
                ));
            }
            return match kind {
                "saved" => Ok(Self::saved(user)),
                "submitted" => Ok(Self::submitted(user)),
                "comments" => Ok(Self::comments(user)),
                other => Err(Error::invalid_value(
                    "resource",
                    format!("unknown listing '{other}' (expected saved, submitted or comments)"),
                )),
            };
        }

        if s.contains('/') {
            return Ok(Self::Custom(s.to_string()));
        }

        Err(Error::invalid_value(
            "resource",
            format!("'{s}' is not a known listing or a path"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("saved:alice", "user/alice/saved")]
    #[test_case("submitted:bob", "user/bob/submitted")]
    #[test_case("comments:carol", "user/carol/comments")]
    #[test_case("subscribed", "subreddits/mine/subscriber")]
    #[test_case("/r/rust/new/", "r/rust/new")]
    #[test_case("r/rust/comments/abc:def", "r/rust/comments/abc:def")]
    fn test_parse_resource(input: &str, path: &str) {
        let resource: Resource = input.parse().unwrap();
        assert_eq!(resource.resource_id(), path);
    }

    #[test_case("saved:")]
    #[test_case("likes:alice")]
    #[test_case("saved:a/b")]
    #[test_case("nonsense")]
    #[test_case("https://evil.example/steal")]
    #[test_case("r/x/https://evil.example")]
    fn test_parse_rejects(input: &str) {
        assert!(input.parse::<Resource>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for resource in Resource::activity("alice") {
            let parsed: Resource = resource.to_string().parse().unwrap();
            assert_eq!(parsed, resource);
        }
    }

    #[test]
    fn test_key_has_no_params() {
        let key = Resource::saved("alice").key();
        assert_eq!(key.resource_id, "user/alice/saved");
        assert!(key.params.is_empty());
    }
}
