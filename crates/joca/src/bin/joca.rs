//! joca - point Jira project leads at whoever is on call.
//!
//! Meant to be run periodically (cron, systemd timer, Kubernetes `CronJob`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use joca::config::DEFAULT_CONFIG_PATH;
use joca::{http_client_builder, init_http_client, Config, SyncOptions, Syncer};

/// Jira On Call Assignee - sync project leads with an on-call calendar.
#[derive(Parser)]
#[command(name = "joca")]
#[command(about = "Set Jira project leads from an on-call iCalendar feed")]
#[command(version)]
#[command(after_help = "\
Exit status:
  0   every project already correct, updated, or (with --dry-run) would be updated
  1   config could not be loaded, a project failed, or Jira rejected a lead update
  71  the HTTP client could not be initialized")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, env = "JOCA_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Resolve and compare leads without updating Jira.
    #[arg(long)]
    dry_run: bool,

    /// Stop the run at the first project whose lead is already correct.
    #[arg(long)]
    stop_on_first_match: bool,

    /// Evaluate the schedule at this RFC 3339 instant instead of now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let http = match init_http_client(http_client_builder(config.timeout)) {
        Ok(client) => client,
        Err(code) => return Ok(ExitCode::from(code)),
    };

    let options = SyncOptions {
        dry_run: cli.dry_run,
        stop_on_first_match: cli.stop_on_first_match,
    };
    let now = cli.at.unwrap_or_else(Utc::now);

    info!(
        projects = config.projects.len(),
        dry_run = options.dry_run,
        at = %now,
        "Starting on-call lead sync"
    );

    let report = Syncer::new(config, http, options).run(now).await;
    Ok(ExitCode::from(report.exit_code()))
}
