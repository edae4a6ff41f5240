//! CLI argument definitions for the Cadence binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CADENCE_CONFIG";

/// Cadence: inspect and configure the paced engagement ledger.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the action ledger.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record counts per action kind.
    Stats {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Most recent error records, newest first.
    Errors {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u64,
    },
    /// Daily action counts.
    History {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Action counts per topic tag.
    Tags,
    /// Validate the configuration and show the resulting pacing.
    Check,
    /// Write a starter configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CADENCE_CONFIG env var > ~/.cadence/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config_path_from(std::env::var(CONFIG_ENV).ok())
    }

    fn config_path_from(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_value.filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > config file value. A leading `~` is
    /// expanded in either case.
    pub fn resolve_data_dir(&self, config_data_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref p) => expand_home(&p.to_string_lossy()),
            None => expand_home(config_data_dir),
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        return home_dir().join(rest);
    }
    if path == "~" {
        return home_dir();
    }
    PathBuf::from(path)
}

/// Ledger file inside a data directory.
pub fn ledger_path(data_dir: &Path) -> PathBuf {
    data_dir.join("cadence.db")
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    home_dir().join(".cadence").join("config.toml")
}
