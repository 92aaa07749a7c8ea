//! Command-line interface definitions for the harvest pipeline.
//!
//! Each pipeline stage is a subcommand; stages communicate only through the
//! persisted interchange files, so they can be run (and re-run) separately.

use clap::{Parser, Subcommand};

/// Command-line arguments for the harvest pipeline.
///
/// # Examples
///
/// ```sh
/// # Scrape detail pages listed in university_urls.csv
/// uni_harvest extract
///
/// # Mine deadline pages, then classify and fold in the results
/// uni_harvest deadlines
/// uni_harvest reconcile
///
/// # Retry only what is still unresolved
/// uni_harvest deadlines --retry-only
///
/// # Build and inspect the final dataset
/// uni_harvest merge
/// uni_harvest show --page 0
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "UNI_HARVEST_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch university detail pages and extract structured records
    Extract {
        /// CSV of detail page URLs (`Url` column); defaults to the configured list
        #[arg(short, long)]
        urls: Option<String>,
    },

    /// Fetch one faculty roster page and extract its members
    Faculty {
        /// Roster page URL
        #[arg(short, long)]
        url: String,

        /// University display name the roster belongs to
        #[arg(short, long)]
        affiliation: String,

        /// Append to the existing faculty dataset instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Search for and mine application deadline pages
    Deadlines {
        /// Mine only the entities on the persisted retry list
        #[arg(long)]
        retry_only: bool,
    },

    /// Classify the latest run and fold successes into the cumulative store
    Reconcile,

    /// Join universities, deadlines, and faculty into the final dataset
    Merge,

    /// Print one page of the final dataset
    Show {
        /// Zero-based page index
        #[arg(short, long, default_value_t = 0)]
        page: usize,

        /// Universities per page
        #[arg(long, default_value_t = 8)]
        per_page: usize,
    },
}
