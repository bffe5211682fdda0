// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod ipc;
pub mod logging;
pub mod tolerant;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{AgentConfig, load_or_default};
use crate::engine::AgentRuntime;
use crate::exec::TokioProcessRunner;
use crate::fs::RealFileSystem;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - executors, dispatcher and command channel
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut config = load_or_default(args.config.as_deref())?;
    apply_cli_overrides(&mut config, &args);

    let runtime = AgentRuntime::from_config(
        &config,
        Arc::new(RealFileSystem),
        Arc::new(TokioProcessRunner::new()),
    )?;
    let mut options = runtime.options();
    options.exit_after_first_scan = args.once;
    let runtime = runtime.with_options(options);

    // Ctrl-C → graceful shutdown.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("shutdown requested");
            cancel.cancel();
        });
    }

    runtime.run(cancel).await
}

/// CLI flags take precedence over the config file.
pub fn apply_cli_overrides(config: &mut AgentConfig, args: &CliArgs) {
    if let Some(root) = &args.data_root {
        config.agent.data_root = Some(root.clone());
    }
    if args.dry_run {
        config.agent.dry_run = true;
    }
}
