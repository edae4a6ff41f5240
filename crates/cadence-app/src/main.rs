//! Cadence application binary.
//!
//! Loads configuration, sets up tracing and answers ledger inspection
//! commands:
//! 1. `stats`, `errors`, `history`, `tags` read the action ledger
//! 2. `check` validates the configuration and shows the derived pacing
//! 3. `init` writes a starter configuration file

mod cli;
mod report;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cadence_core::config::CadenceConfig;
use cadence_core::error::{CadenceError, Result};
use cadence_storage::{ActionLedger, QueryService};

use cli::{CliArgs, Command};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();

    let config = match load_config(&config_file) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(args.log_level.as_deref(), "info");
            tracing::error!(
                path = %config_file.display(),
                error = %e,
                "Failed to load configuration"
            );
            return ExitCode::FAILURE;
        }
    };
    init_tracing(args.log_level.as_deref(), &config.general.log_level);
    tracing::debug!(path = %config_file.display(), "Configuration loaded");

    match run(&args, &config, &config_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Level priority: --log-level > RUST_LOG > config file.
fn init_tracing(level_override: Option<&str>, config_level: &str) {
    let filter = match level_override {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A missing file means defaults; a malformed one is an error.
fn load_config(path: &Path) -> Result<CadenceConfig> {
    if path.exists() {
        CadenceConfig::load(path)
    } else {
        Ok(CadenceConfig::default())
    }
}

fn run(args: &CliArgs, config: &CadenceConfig, config_file: &Path) -> Result<()> {
    match args.command {
        Command::Init { force } => {
            init_config(config_file, force)?;
            println!("Wrote {}", config_file.display());
            return Ok(());
        }
        Command::Check => {
            print!("{}", check_summary(config)?);
            return Ok(());
        }
        _ => {}
    }

    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    let ledger_path = cli::ledger_path(&data_dir);
    let ledger = ActionLedger::open(&ledger_path)?;
    tracing::debug!(path = %ledger_path.display(), "Ledger opened");
    let queries = QueryService::new(ledger.database());

    match args.command {
        Command::Stats { json } => {
            let stats = ledger.get_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report::stats_json(&stats))?);
            } else {
                print!("{}", report::stats_text(&stats));
            }
        }
        Command::Errors { limit } => {
            print!("{}", report::errors_text(&queries.recent_errors(limit)?));
        }
        Command::History { days } => {
            let rows = queries.daily_history(days, chrono::Utc::now())?;
            print!("{}", report::history_text(&rows));
        }
        Command::Tags => print!("{}", report::tags_text(&queries.tag_stats()?)),
        Command::Init { .. } | Command::Check => {}
    }

    drop(queries);
    ledger.close()
}

/// Write a starter configuration. Refuses to overwrite unless `force`.
fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CadenceError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    let mut config = CadenceConfig::default();
    config.run.hashtags = vec!["bookstagram".to_string(), "booklover".to_string()];
    config.save(path)
}

/// Validate `config` and describe the run it would produce.
fn check_summary(config: &CadenceConfig) -> Result<String> {
    config.validate()?;

    let total = config.run.total_daily_quota();
    let min_gap = 86_400.0 / (f64::from(total) + 1.0);
    let avoid = config.run.normalized_avoid_hashtags();
    Ok(format!(
        "Configuration OK\n\
         tags:           {}\n\
         avoid tags:     {}\n\
         daily quota:    {} likes, {} comments\n\
         base gap:       {:.0}s ({:.1} min)\n\
         waking hours:   {:02}:00-{:02}:00\n",
        config.run.normalized_hashtags().join(", "),
        if avoid.is_empty() { "-".to_string() } else { avoid.join(", ") },
        config.run.likes_per_day,
        config.run.comments_per_day,
        min_gap,
        min_gap / 60.0,
        config.pacing.waking_start_hour,
        config.pacing.waking_end_hour,
    ))
}
