// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{AgentConfig, default_data_root};
use crate::engine::dispatch::Dispatcher;
use crate::engine::handlers::{CleanHandler, UpdateHandler};
use crate::exec::cleanup::{CleanupExecutor, target_candidates};
use crate::exec::process::ProcessRunner;
use crate::exec::update::UpdateExecutor;
use crate::fs::FileSystem;
use crate::ipc::channel::CommandChannel;
use crate::ipc::events::{EventSink, FileEventSink};
use crate::ipc::layout::IpcLayout;
use crate::types::CommandType;

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Delay between two scans.
    pub poll_interval: Duration,
    /// Stop after the first scan (used for `--once`).
    pub exit_after_first_scan: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            exit_after_first_scan: false,
        }
    }
}

/// Polling loop around a [`CommandChannel`].
///
/// Scans once immediately, then every `poll_interval` until the token is
/// cancelled. A command that is being handled when cancellation arrives
/// sees the same token and winds down; the loop exits right after.
pub struct AgentRuntime {
    channel: CommandChannel,
    options: RuntimeOptions,
}

impl fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("layout", self.channel.layout())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AgentRuntime {
    pub fn new(channel: CommandChannel, options: RuntimeOptions) -> Self {
        Self { channel, options }
    }

    /// Wire the full agent from configuration, publishing events as files
    /// under `<data_root>/ipc/events`.
    pub fn from_config(
        config: &AgentConfig,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        let layout = IpcLayout::new(data_root(config));
        let events: Arc<dyn EventSink> =
            Arc::new(FileEventSink::new(Arc::clone(&fs), layout.events_dir()));
        Self::from_config_with_events(config, fs, runner, events)
    }

    /// Same as [`AgentRuntime::from_config`] with a caller-provided sink.
    pub fn from_config_with_events(
        config: &AgentConfig,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn ProcessRunner>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let root = data_root(config);
        let layout = IpcLayout::new(&root);
        layout.ensure(fs.as_ref())?;
        info!(root = ?layout.root(), dry_run = config.agent.dry_run, "agent data root ready");

        let cleanup = CleanupExecutor::new(
            Arc::clone(&fs),
            target_candidates(config.cleanup.targets.as_deref(), &root),
        )
        .with_forced_simulation(config.agent.dry_run);
        let update = UpdateExecutor::new(runner, Arc::clone(&fs), config.update.clone());

        let dispatcher = Dispatcher::new(Arc::clone(&events))
            .register(
                CommandType::Clean,
                Arc::new(CleanHandler::new(Arc::new(cleanup), Arc::clone(&events))),
            )
            .register(
                CommandType::UpdateAll,
                Arc::new(UpdateHandler::new(Arc::new(update), Arc::clone(&events))),
            );

        let channel = CommandChannel::new(fs, layout, dispatcher, events)?
            .with_quarantine_after(config.agent.quarantine_after);

        let options = RuntimeOptions {
            poll_interval: Duration::from_millis(config.agent.poll_interval_ms),
            exit_after_first_scan: false,
        };
        Ok(Self::new(channel, options))
    }

    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    pub fn channel_mut(&mut self) -> &mut CommandChannel {
        &mut self.channel
    }

    /// Main loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            commands = ?self.channel.layout().commands_dir(),
            interval_ms = self.options.poll_interval.as_millis() as u64,
            "agent runtime started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.channel.tick(&cancel).await;
            if !report.is_idle() {
                debug!(?report, "scan finished");
            }

            if self.options.exit_after_first_scan {
                info!("single scan requested; stopping runtime");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        info!("runtime exiting");
        Ok(())
    }
}

fn data_root(config: &AgentConfig) -> std::path::PathBuf {
    config
        .agent
        .data_root
        .clone()
        .unwrap_or_else(default_data_root)
}
