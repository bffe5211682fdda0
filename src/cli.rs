// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `hostcare`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hostcare",
    version,
    about = "Host maintenance agent driven by command files.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the agent config file (TOML).
    ///
    /// When omitted, built-in defaults are used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Application data root holding `ipc/commands` and `ipc/events`.
    ///
    /// Overrides `[agent].data_root` from the config file.
    #[arg(long, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Scan the commands directory once and exit.
    #[arg(long)]
    pub once: bool,

    /// Simulate every cleanup: report what would be freed, delete nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOSTCARE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
