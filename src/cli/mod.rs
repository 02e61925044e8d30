//! CLI module
//!
//! Command-line interface over the listing client and the relay server.
//!
//! # Commands
//!
//! - `page` - Fetch one page of a listing
//! - `drain` - Fetch every page of a listing
//! - `summary` - Summarize a user's activity
//! - `serve` - Start the token relay server

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands};
pub use runner::Runner;
pub use server::{router, serve, serve_on, AppState};
