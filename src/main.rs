//! Skyaudit - credibility-score aggregation for AT Protocol identities
//!
//! A CLI tool that resolves a handle to its DID and hosting PDS,
//! aggregates the account's repository activity over rolling windows,
//! and writes scored credibility documents plus a narrative.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (resolution failure, config error, I/O)

mod analysis;
mod cli;
mod config;
mod error;
mod fetch;
mod http;
mod identity;
mod models;
mod narrative;
mod pipeline;
mod scoring;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("skyaudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_audit(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Audit failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .skyaudit.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".skyaudit.toml");

    if path.exists() {
        eprintln!("⚠️  .skyaudit.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .skyaudit.toml")?;

    println!("✅ Created .skyaudit.toml with default settings.");
    println!("   Edit it to customize endpoints, pagination, and scoring.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete audit workflow.
async fn run_audit(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let handle = args.handle().to_string();

    println!("🔎 Resolving identity: {}", handle);
    if !config.scoring.enabled {
        println!("   Scoring disabled; documents will carry placeholder scores.");
    }

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("valid spinner template"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("aggregating 30- and 90-day windows...");
        Some(pb)
    };

    let outcome = pipeline::resolve(&handle, &config).await;

    if let Some(ref pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = outcome?;

    let output = match args.format {
        OutputFormat::Json => narrative::render_json_report(&outcome)?,
        OutputFormat::Markdown => narrative::render_markdown_report(&outcome),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    let duration = start_time.elapsed().as_secs_f64();
    let content_30 = &outcome.window_30.bluesky_categories.content_activity;
    let content_90 = &outcome.window_90.bluesky_categories.content_activity;

    println!("\n📊 Aggregation Summary:");
    println!("   DID: {}", outcome.identity.did);
    println!("   PDS: {}", outcome.identity.service_endpoint);
    println!(
        "   30d: {} posts | {} records | {}",
        content_30.stats.posts_count, content_30.total_records, content_30.activity_status
    );
    println!(
        "   90d: {} posts | {} records | {}",
        content_90.stats.posts_count, content_90.total_records, content_90.activity_status
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Audit complete! Report saved to: {}",
        args.output.display()
    );

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .skyaudit.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
