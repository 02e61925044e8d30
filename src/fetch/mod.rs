//! Page fetcher module
//!
//! A [`PageFetcher`] performs exactly one request for one page of a
//! cursor-paginated resource. It does not retry and does not touch shared
//! state; retry and bookkeeping live in the pagination controller.

mod fetcher;

pub use fetcher::{HttpPageFetcher, PageFetcher, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[cfg(test)]
mod tests;
