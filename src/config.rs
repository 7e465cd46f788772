//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.skyaudit.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream endpoint settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Pagination settings.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Scoring service settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "skyaudit_report.json".to_string()
}

/// Upstream endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Public feed aggregator (AppView) base URL. Also serves handle
    /// resolution and profile lookups.
    #[serde(default = "default_appview_url")]
    pub appview_url: String,

    /// PLC directory base URL.
    #[serde(default = "default_plc_url")]
    pub plc_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            appview_url: default_appview_url(),
            plc_url: default_plc_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_appview_url() -> String {
    "https://public.api.bsky.app".to_string()
}

fn default_plc_url() -> String {
    "https://plc.directory".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Ceiling on pages walked per collection.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    50
}

/// Scoring service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scoring endpoint URL.
    #[serde(default = "default_scoring_url")]
    pub url: String,

    /// Submit drafts for scoring. When false, windows are returned with
    /// placeholder scores.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            url: default_scoring_url(),
            enabled: true,
        }
    }
}

fn default_scoring_url() -> String {
    "http://localhost:8787/api/score".to_string()
}

fn default_true() -> bool {
    true
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
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".skyaudit.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, and only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.network.timeout_seconds = timeout;
        }
        if let Some(ref url) = args.appview_url {
            self.network.appview_url = url.clone();
        }
        if let Some(ref url) = args.plc_url {
            self.network.plc_url = url.clone();
        }
        if let Some(size) = args.page_size {
            self.pagination.page_size = size;
        }
        if let Some(pages) = args.max_pages {
            self.pagination.max_pages = pages;
        }
        if let Some(ref url) = args.scoring_url {
            self.scoring.url = url.clone();
        }
        if args.no_scoring {
            self.scoring.enabled = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.appview_url, "https://public.api.bsky.app");
        assert_eq!(config.network.plc_url, "https://plc.directory");
        assert_eq!(config.pagination.page_size, 100);
        assert_eq!(config.pagination.max_pages, 50);
        assert!(config.scoring.enabled);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.json"
verbose = true

[network]
plc_url = "https://plc.example"
timeout_seconds = 10

[pagination]
page_size = 25
max_pages = 5

[scoring]
url = "https://scorer.example/api/score"
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.json");
        assert!(config.general.verbose);
        assert_eq!(config.network.plc_url, "https://plc.example");
        assert_eq!(config.network.timeout_seconds, 10);
        assert_eq!(config.pagination.page_size, 25);
        assert_eq!(config.pagination.max_pages, 5);
        assert_eq!(config.scoring.url, "https://scorer.example/api/score");
        assert!(!config.scoring.enabled);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str("[pagination]\npage_size = 10\n").unwrap();
        assert_eq!(config.pagination.page_size, 10);
        assert_eq!(config.pagination.max_pages, 50);
        assert_eq!(config.network.appview_url, "https://public.api.bsky.app");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[network]"));
        assert!(toml_str.contains("[pagination]"));
        assert!(toml_str.contains("[scoring]"));
    }
}
