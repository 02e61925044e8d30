//! Pagination module
//!
//! Drives cursor-paginated listings in two modes:
//!
//! - **Drain**: fetch every page until the listing is exhausted, streaming a
//!   snapshot after each page. Used when a complete set is needed, e.g. to
//!   compute aggregate statistics.
//! - **Incremental**: fetch one more page per explicit "load more" call.
//!
//! # State machine
//!
//! ```text
//! Idle ──load/drain──▶ Fetching ──page with cursor──▶ Idle
//!                         │──no cursor / empty / stale──▶ Exhausted
//!                         └──error──▶ Failed   (terminal until reset)
//! ```

mod controller;
mod types;

pub use controller::PaginationController;
pub(crate) use controller::error_from_info;
pub use types::{
    CollectionSnapshot, ControllerConfig, ControllerEvent, DrainEvent, LoadOutcome,
    PaginationState, Phase, ResourceKey, RetryPolicy,
};
