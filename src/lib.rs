// Allow common clippy pedantic lints that are not critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # listing-relay
//!
//! Cursor-paginated listing client for activity dashboards, with a
//! self-expiring notification queue and a thin token relay.
//!
//! ## Features
//!
//! - **Page fetching**: one bounded, authenticated request per page, with
//!   failures classified for retry and escalation
//! - **Deduplication**: insertion-ordered collections where the first
//!   occurrence of an id wins
//! - **Pagination control**: drain-all and load-more modes with single-flight,
//!   cancellation and a guard against cycling cursors
//! - **Notifications**: ordered, auto-expiring messages on an injected clock
//! - **Relay server**: forwards a browser's bearer token to the upstream API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use listing_relay::{
//!     Credential, HttpClient, HttpClientConfig, HttpPageFetcher, PaginationController,
//!     Resource, Result,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Arc::new(HttpClient::with_config(HttpClientConfig::default())?);
//!     let controller = Arc::new(PaginationController::new(HttpPageFetcher::new(client)));
//!
//!     let token = Credential::bearer("...")?;
//!     let saved = controller
//!         .drain_all(Resource::saved("alice").key(), Some(token))
//!         .await?;
//!     println!("{} saved items", saved.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 CLI  /  Relay server (axum)                  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┴────────────────────────────────┐
//! │                   PaginationController                       │
//! │   drain / load more · single-flight · cancel · escalation    │
//! └──────┬──────────────────────┬──────────────────────┬─────────┘
//!        │                      │                      │
//! ┌──────┴──────┐      ┌────────┴───────┐     ┌────────┴─────────┐
//! │ PageFetcher │      │  Deduplicator  │     │ NotificationQueue│
//! │ HTTP · auth │      │  Collection    │     │ clock · reaper   │
//! │ rate limit  │      │                │     │                  │
//! └─────────────┘      └────────────────┘     └──────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: document error variant fields, then drop this allow

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and fetch failure classification
pub mod error;

/// Common types and type aliases
pub mod types;

/// Bearer credentials and the sign-out hook
pub mod auth;

/// HTTP client with rate limiting
pub mod http;

/// Listing envelope decoding
pub mod listing;

/// Page fetching
pub mod fetch;

/// Deduplicating collections
pub mod dedup;

/// Pagination controller
pub mod pagination;

/// Self-expiring notification queue
pub mod notify;

/// Known listing endpoints
pub mod resources;

/// Activity statistics
pub mod aggregate;

/// Runtime settings
pub mod config;

/// Command-line interface and relay server
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorInfo, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{Credential, SignOutHook};
pub use dedup::{merge, Collection};
pub use fetch::{HttpPageFetcher, PageFetcher, PageRequest};
pub use http::{HttpClient, HttpClientConfig};
pub use notify::{NotificationKind, NotificationQueue};
pub use pagination::{
    CollectionSnapshot, DrainEvent, LoadOutcome, PaginationController, PaginationState, Phase,
    ResourceKey,
};
pub use resources::Resource;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
