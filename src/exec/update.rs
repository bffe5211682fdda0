// src/exec/update.rs

//! Multi-step update orchestration.
//!
//! The pipeline is fixed and ordered:
//! 1. package manager bulk upgrade,
//! 2. antivirus signature update + quick scan (only if the tool is installed),
//! 3. OS update scan, download and install.
//!
//! Each stage is isolated: a failure (spawn error, timeout, cancellation) is
//! recorded in the report and the next stage still runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{StepCommand, UpdateSection};
use crate::exec::env_expand::expand_env;
use crate::exec::process::{ProcessOutput, ProcessRunner};
use crate::fs::FileSystem;

/// Requested update sources. Advisory: the pipeline always runs in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub items_updated: i32,
    pub bytes_downloaded: i64,
    pub sources_done: Vec<String>,
    pub errors: Vec<String>,
}

impl UpdateReport {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} items updated ({})",
            self.items_updated,
            self.sources_done.join(", ")
        );
        if !self.errors.is_empty() {
            line.push_str(&format!("; {} errors: {}", self.errors.len(), self.errors.join("; ")));
        }
        line
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    PackageManager,
    Antivirus,
    OsUpdate,
}

impl UpdateStage {
    pub const ORDER: [UpdateStage; 3] = [
        UpdateStage::PackageManager,
        UpdateStage::Antivirus,
        UpdateStage::OsUpdate,
    ];

    /// Name used as error prefix and as the front-end facing source label.
    pub fn label(self) -> &'static str {
        match self {
            UpdateStage::PackageManager => "winget",
            UpdateStage::Antivirus => "defender",
            UpdateStage::OsUpdate => "windows_update",
        }
    }
}

pub const SOURCE_DEFENDER_DEFS: &str = "defender_defs";
pub const SOURCE_DEFENDER_SCAN: &str = "defender_quickscan";
pub const SOURCE_OS_SCAN: &str = "windows_update_scan";
pub const SOURCE_OS_DOWNLOAD: &str = "windows_update_download";
pub const SOURCE_OS_INSTALL: &str = "windows_update_install";

pub struct UpdateExecutor {
    runner: Arc<dyn ProcessRunner>,
    fs: Arc<dyn FileSystem>,
    steps: UpdateSection,
}

impl std::fmt::Debug for UpdateExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateExecutor")
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl UpdateExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, fs: Arc<dyn FileSystem>, steps: UpdateSection) -> Self {
        Self { runner, fs, steps }
    }

    pub async fn run(&self, request: &UpdateRequest, cancel: &CancellationToken) -> UpdateReport {
        if let Some(sources) = &request.sources {
            debug!(?sources, "requested sources are advisory; running the full pipeline");
        }

        let mut report = UpdateReport::default();
        info!("update pipeline started");

        for stage in UpdateStage::ORDER {
            if cancel.is_cancelled() {
                report.errors.push(format!("{}: cancelled", stage.label()));
                continue;
            }

            let result = match stage {
                UpdateStage::PackageManager => self.package_manager(&mut report, cancel).await,
                UpdateStage::Antivirus => self.antivirus(&mut report, cancel).await,
                UpdateStage::OsUpdate => self.os_update(&mut report, cancel).await,
            };

            if let Err(e) = result {
                warn!(stage = stage.label(), error = %format!("{e:#}"), "update stage failed");
                report.errors.push(format!("{}: {e:#}", stage.label()));
            }
        }

        info!(
            items = report.items_updated,
            sources = ?report.sources_done,
            errors = report.errors.len(),
            "update pipeline finished"
        );
        report
    }

    async fn exec(&self, step: &StepCommand, cancel: &CancellationToken) -> Result<ProcessOutput> {
        let program = expand_env(&step.program);
        let output = self
            .runner
            .run(&program, &step.args, Duration::from_secs(step.timeout_secs), cancel)
            .await?;
        debug!(program = %program, exit_code = output.exit_code, output = %output.output, "step output");
        Ok(output)
    }

    async fn package_manager(&self, report: &mut UpdateReport, cancel: &CancellationToken) -> Result<()> {
        let output = self.exec(&self.steps.package_manager, cancel).await?;
        let label = UpdateStage::PackageManager.label();
        report.sources_done.push(label.to_string());
        if output.success() {
            report.items_updated += 1;
        } else {
            report
                .errors
                .push(format!("{label} returned {}", output.exit_code));
        }
        Ok(())
    }

    async fn antivirus(&self, report: &mut UpdateReport, cancel: &CancellationToken) -> Result<()> {
        let tool = expand_env(&self.steps.antivirus_signatures.program);
        if !self.fs.is_file(Path::new(&tool)) {
            debug!(tool = %tool, "antivirus command-line tool not installed; skipping");
            return Ok(());
        }

        let defs = self.exec(&self.steps.antivirus_signatures, cancel).await?;
        if !defs.success() {
            warn!(exit_code = defs.exit_code, "signature update exited non-zero");
        }
        report.sources_done.push(SOURCE_DEFENDER_DEFS.to_string());

        let scan = self.exec(&self.steps.antivirus_scan, cancel).await?;
        if !scan.success() {
            warn!(exit_code = scan.exit_code, "quick scan exited non-zero");
        }
        report.sources_done.push(SOURCE_DEFENDER_SCAN.to_string());

        report.items_updated += 1;
        Ok(())
    }

    async fn os_update(&self, report: &mut UpdateReport, cancel: &CancellationToken) -> Result<()> {
        let sub_steps = [
            (&self.steps.os_scan, SOURCE_OS_SCAN),
            (&self.steps.os_download, SOURCE_OS_DOWNLOAD),
            (&self.steps.os_install, SOURCE_OS_INSTALL),
        ];

        for (step, source) in sub_steps {
            let output = self.exec(step, cancel).await?;
            if !output.success() {
                warn!(source, exit_code = output.exit_code, "os update step exited non-zero");
            }
            report.sources_done.push(source.to_string());
        }

        report.items_updated += 1;
        Ok(())
    }
}
