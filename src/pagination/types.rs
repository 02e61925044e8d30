//! Pagination types
//!
//! State, snapshots and outcomes shared by the controller and its consumers.

use crate::error::ErrorInfo;
use crate::fetch::DEFAULT_PAGE_SIZE;
use crate::types::{BackoffType, Item, Params};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of one paginated view: a resource plus its parameters
///
/// Two keys with the same resource but different parameters are unrelated
/// and never share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Opaque resource identifier (endpoint path)
    pub resource_id: String,
    /// Query parameters
    #[serde(default)]
    pub params: Params,
}

impl ResourceKey {
    /// Key with no parameters
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            params: Params::new(),
        }
    }

    /// Key with parameters
    pub fn with_params(resource_id: impl Into<String>, params: Params) -> Self {
        Self {
            resource_id: resource_id.into(),
            params,
        }
    }

    /// Add one parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.resource_id)?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

/// Lifecycle phase of a paginated view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Ready to fetch the next page
    #[default]
    Idle,
    /// A page request is in flight
    Fetching,
    /// No more pages; terminal
    Exhausted,
    /// A fetch failed; terminal until reset
    Failed,
}

/// Progress of one paginated view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    /// Current phase
    pub phase: Phase,
    /// Cursor for the next page
    pub cursor: Option<String>,
    /// Set once the listing has been fully read
    pub exhausted: bool,
    /// Set while a request is outstanding
    pub in_flight: bool,
    /// Last failure, when `phase == Failed`
    pub error: Option<ErrorInfo>,
    /// Successfully merged pages
    pub pages_fetched: u32,
    /// Consecutive pages that admitted no new items
    pub stale_pages: u32,
}

impl PaginationState {
    /// Initial state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no further fetch will happen without a reset
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Exhausted | Phase::Failed)
    }
}

/// Point-in-time copy of a view's items and state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    /// The view
    pub key: ResourceKey,
    /// Accumulated items, in order of first arrival
    pub items: Vec<Item>,
    /// Pagination state
    pub state: PaginationState,
}

impl CollectionSnapshot {
    /// Ids in order
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of an incremental "load more" call
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A page was merged and more are available
    Snapshot(CollectionSnapshot),
    /// Another request for this view is already in flight; nothing was sent
    InFlight(CollectionSnapshot),
    /// The listing is fully read
    Exhausted(CollectionSnapshot),
    /// The upstream rejected the credential; sign-out has been requested
    AuthExpired(ErrorInfo),
    /// The view failed; reset to try again
    Failed(ErrorInfo),
    /// The request was cancelled and its result discarded
    Cancelled,
}

impl LoadOutcome {
    /// The snapshot carried by this outcome, if any
    pub fn snapshot(&self) -> Option<&CollectionSnapshot> {
        match self {
            Self::Snapshot(s) | Self::InFlight(s) | Self::Exhausted(s) => Some(s),
            _ => None,
        }
    }
}

/// Event emitted by a drain run
#[derive(Debug, Clone, PartialEq)]
pub enum DrainEvent {
    /// A page was merged; more follow
    Snapshot(CollectionSnapshot),
    /// Final event: the listing is fully read
    Exhausted(CollectionSnapshot),
    /// Final event: the credential was rejected
    AuthExpired(ErrorInfo),
    /// Final event: the run failed
    Failed(ErrorInfo),
    /// Final event: another operation held the view, nothing was fetched
    Busy(CollectionSnapshot),
    /// Final event: the run was cancelled
    Cancelled,
}

impl DrainEvent {
    /// Whether this event ends the run
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }
}

/// Retry policy for transport failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff curve
    pub backoff: BackoffType,
    /// First delay
    #[serde(with = "millis", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,
    /// Delay ceiling
    #[serde(with = "millis", rename = "max_backoff_ms")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffType::Exponential,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate backoff delay for a given attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Retry policy for transport failures
    pub retry: RetryPolicy,
    /// Consecutive no-new-item pages that end a listing
    pub stale_page_limit: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            stale_page_limit: 2,
        }
    }
}

/// State change published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerEvent {
    /// The view that changed
    pub key: ResourceKey,
    /// Its new state
    pub state: PaginationState,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
