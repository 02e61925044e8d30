//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Cursor-paginated listing client and token relay
#[derive(Parser, Debug)]
#[command(name = "listing-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Bearer token (falls back to LISTING_RELAY_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a single page
    Page {
        /// Listing: saved:<user>, submitted:<user>, comments:<user>,
        /// subscribed, or a raw path
        resource: String,

        /// Cursor of the page to fetch
        #[arg(long)]
        after: Option<String>,

        /// Extra query parameter (key=value), repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Fetch every page of a listing
    Drain {
        /// Listing: saved:<user>, submitted:<user>, comments:<user>,
        /// subscribed, or a raw path
        resource: String,

        /// Extra query parameter (key=value), repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Summarize a user's saved, submitted and comment activity
    Summary {
        /// Account name
        user: String,

        /// Number of top items to include
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Start the token relay server
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drain_with_params() {
        let cli = Cli::try_parse_from([
            "listing-relay",
            "--token",
            "abc",
            "drain",
            "saved:alice",
            "-p",
            "type=links",
            "--param",
            "sort=new",
            "--max-pages",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.token.as_deref(), Some("abc"));
        match cli.command {
            Commands::Drain {
                resource,
                params,
                max_pages,
            } => {
                assert_eq!(resource, "saved:alice");
                assert_eq!(params, vec!["type=links", "sort=new"]);
                assert_eq!(max_pages, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["listing-relay", "serve", "-v", "-C", "relay.yaml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("relay.yaml")));
        assert!(matches!(cli.command, Commands::Serve { bind: None }));
    }

    #[test]
    fn test_summary_defaults() {
        let cli = Cli::try_parse_from(["listing-relay", "summary", "alice"]).unwrap();
        assert!(matches!(cli.command, Commands::Summary { top: 5, .. }));
    }
}
