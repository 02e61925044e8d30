//! HTTP client module
//!
//! Provides the authenticated GET client used by the page fetcher and the
//! relay server.
//!
//! # Features
//!
//! - **Bearer Auth**: every request carries the caller's credential
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Classification**: statuses map onto the crate error taxonomy

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig, DEFAULT_BASE_URL};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
