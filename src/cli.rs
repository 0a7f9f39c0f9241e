//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Crawl an OPDS book catalog into PostgreSQL.
///
/// Without a subcommand a fresh crawl of both configured feed trees runs to
/// completion. Crawl roots and the database connection come from the
/// environment: FEED_AUTHORS, FEED_SERIES, DATABASE_URL, LOG_LEVEL,
/// LOG_FORMAT.
#[derive(Parser, Debug)]
#[command(name = "bookcrawler")]
#[command(version, about)]
#[command(after_help = "Exit codes:\n  0 = clean completion\n  1 = unresumable error or invalid configuration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replay fail records captured by earlier runs.
    Resume {
        /// Only replay fails recorded at or before this UTC time
        /// ("YYYY-MM-DD HH:MM:SS"). Defaults to one hour ago.
        #[arg(value_name = "TIMESTAMP")]
        not_after: Option<String>,
    },
}
