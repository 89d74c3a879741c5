//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.release-ingest.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".release-ingest.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Provider connection settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Request rate settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Map file settings.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Output layout settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Company filter settings.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root folder for all output.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            verbose: false,
        }
    }
}

fn default_destination() -> PathBuf {
    PathBuf::from("./output")
}

/// Estimates provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. Usually supplied through the environment instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.estimize.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Request rate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per time unit.
    #[serde(default = "default_occurrences")]
    pub occurrences: usize,

    /// Length of the time unit in milliseconds.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            occurrences: default_occurrences(),
            time_unit_ms: default_time_unit_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }
}

fn default_occurrences() -> usize {
    10
}

fn default_time_unit_ms() -> u64 {
    1000
}

/// Map file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Folder of `<ticker>.csv` map files.
    #[serde(default = "default_map_files_dir")]
    pub map_files_dir: PathBuf,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            map_files_dir: default_map_files_dir(),
        }
    }
}

fn default_map_files_dir() -> PathBuf {
    PathBuf::from("./map_files")
}

/// Output layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Subfolder of the destination that receives release files.
    #[serde(default = "default_subfolder")]
    pub subfolder: String,

    /// Where to write the registry JSON, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            subfolder: default_subfolder(),
            registry_file: None,
        }
    }
}

fn default_subfolder() -> String {
    "release".to_string()
}

/// Company filter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only process these tickers. Absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI actually provides a value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref destination) = args.destination {
            self.general.destination = destination.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.provider.base_url = base_url.clone();
        }
        if let Some(ref key) = args.api_key {
            self.provider.api_key = Some(key.clone());
        }
        if let Some(ref dir) = args.map_files {
            self.mapping.map_files_dir = dir.clone();
        }
        if let Some(rate) = args.rate {
            self.rate_limit.occurrences = rate;
            self.rate_limit.time_unit_ms = 1000;
        }
        if let Some(ref path) = args.registry_out {
            self.output.registry_file = Some(path.clone());
        }
        if let Some(ref tickers) = args.tickers {
            self.filter.tickers = Some(tickers.clone());
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Folder receiving the per-ticker release files.
    pub fn output_dir(&self) -> PathBuf {
        self.general.destination.join(&self.output.subfolder)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
