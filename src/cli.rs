//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Skyaudit - credibility-score aggregation for AT Protocol identities
///
/// Resolves a handle to its DID and hosting PDS, aggregates the
/// account's repository activity over 30- and 90-day windows, and
/// writes scored credibility documents plus a narrative.
///
/// Examples:
///   skyaudit alice.bsky.social
///   skyaudit alice.bsky.social --format markdown -o alice.md
///   skyaudit alice.bsky.social --no-scoring
///   skyaudit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Handle to analyze (e.g. alice.bsky.social)
    #[arg(value_name = "HANDLE", required_unless_present = "init_config")]
    pub handle: Option<String>,

    /// Output file path for the report
    #[arg(
        short,
        long,
        default_value = "skyaudit_report.json",
        value_name = "FILE"
    )]
    pub output: PathBuf,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .skyaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Public AppView base URL (feed aggregator and handle resolution)
    #[arg(long, value_name = "URL", env = "SKYAUDIT_APPVIEW_URL")]
    pub appview_url: Option<String>,

    /// PLC directory base URL
    #[arg(long, value_name = "URL", env = "SKYAUDIT_PLC_URL")]
    pub plc_url: Option<String>,

    /// Scoring service endpoint URL
    #[arg(long, value_name = "URL", env = "SKYAUDIT_SCORING_URL")]
    pub scoring_url: Option<String>,

    /// Skip the external scoring call and emit unscored drafts
    #[arg(long)]
    pub no_scoring: bool,

    /// Records requested per page (1-100)
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<usize>,

    /// Ceiling on pages walked per collection
    #[arg(long, value_name = "COUNT")]
    pub max_pages: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .skyaudit.toml and exit
    #[arg(long)]
    pub init_config: bool,
}

/// Report output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("--verbose and --quiet are mutually exclusive".to_string());
        }

        if let Some(size) = self.page_size {
            if size == 0 || size > 100 {
                return Err("--page-size must be between 1 and 100".to_string());
            }
        }

        if let Some(pages) = self.max_pages {
            if pages == 0 {
                return Err("--max-pages must be at least 1".to_string());
            }
        }

        if let Some(ref handle) = self.handle {
            if !handle.contains('.') {
                return Err(format!(
                    "'{handle}' does not look like a handle (expected e.g. alice.bsky.social)"
                ));
            }
        }

        Ok(())
    }

    /// The handle under audit. Only meaningful after validation.
    pub fn handle(&self) -> &str {
        self.handle.as_deref().unwrap_or_default()
    }

    /// The tracing level derived from the verbosity flags.
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv.iter().copied()).unwrap()
    }

    #[test]
    fn test_minimal_invocation() {
        let args = parse(&["skyaudit", "alice.bsky.social"]);
        assert_eq!(args.handle(), "alice.bsky.social");
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_handle_required_unless_init_config() {
        assert!(Args::try_parse_from(["skyaudit"]).is_err());
        let args = parse(&["skyaudit", "--init-config"]);
        assert!(args.init_config);
    }

    #[test]
    fn test_verbose_quiet_conflict() {
        let args = parse(&["skyaudit", "alice.bsky.social", "-v", "-q"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let args = parse(&["skyaudit", "alice.bsky.social", "--page-size", "0"]);
        assert!(args.validate().is_err());

        let args = parse(&["skyaudit", "alice.bsky.social", "--page-size", "101"]);
        assert!(args.validate().is_err());

        let args = parse(&["skyaudit", "alice.bsky.social", "--page-size", "50"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_bare_word_is_not_a_handle() {
        let args = parse(&["skyaudit", "alice"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_markdown_format() {
        let args = parse(&["skyaudit", "alice.bsky.social", "--format", "markdown"]);
        assert_eq!(args.format, OutputFormat::Markdown);
    }
}
