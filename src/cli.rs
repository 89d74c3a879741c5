//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// release-ingest - point-in-time earnings release ingestion
///
/// Downloads earnings releases for every company the provider lists,
/// resolves each release to the ticker in effect on its date, and
/// appends it to one flat file per resolved ticker.
///
/// Examples:
///   release-ingest --destination ./data
///   release-ingest --destination ./data --tickers AAPL,MSFT
///   release-ingest --map-files ./data/equity/usa/map_files --rate 5
///   release-ingest --dry-run
///   release-ingest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Root folder for output files
    ///
    /// Releases land in <DESTINATION>/<subfolder>/<ticker>.csv.
    #[arg(short, long, value_name = "DIR", env = "RELEASE_INGEST_DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Only process these tickers (comma-separated)
    ///
    /// Example: --tickers AAPL,MSFT,FB
    #[arg(
        short,
        long,
        value_name = "TICKERS",
        value_delimiter = ',',
        env = "RELEASE_INGEST_TICKERS"
    )]
    pub tickers: Option<Vec<String>>,

    /// Provider API key
    #[arg(long, env = "RELEASE_INGEST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Folder holding point-in-time map files
    #[arg(long, value_name = "DIR")]
    pub map_files: Option<PathBuf>,

    /// Maximum requests per second
    #[arg(long, value_name = "NUM")]
    pub rate: Option<usize>,

    /// Write the release registry as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub registry_out: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .release-ingest.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: fetch the company list and show what would be processed
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .release-ingest.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(rate) = self.rate {
            if rate == 0 {
                return Err("Rate must be at least 1 request per second".to_string());
            }
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref dir) = self.map_files {
            if !dir.is_dir() {
                return Err(format!(
                    "Map file directory does not exist: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
