// src/ipc/channel.rs

//! File-based command channel.
//!
//! One tick is a full scan of the commands directory. Every candidate file
//! goes through: read, identify, parse, dispatch, publish result, purge.
//! Nothing here returns an error to the caller; each failure mode has a
//! fixed outcome (skip, report, keep for retry) and the scan moves on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::dispatch::Dispatcher;
use crate::fs::FileSystem;
use crate::ipc::events::{AgentEvent, EventSink};
use crate::ipc::identity::extract_identity;
use crate::ipc::layout::{IpcLayout, RESULT_SUFFIX};
use crate::ipc::protocol::{CommandResponse, parse_command};

/// What happened during one tick, per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Identities whose result was published and command files removed.
    pub completed: Vec<String>,
    /// Identities whose result could not be written; kept for retry.
    pub failed_writes: Vec<String>,
    pub malformed: Vec<PathBuf>,
    pub unidentified: Vec<PathBuf>,
    /// Parsed fine but no handler is registered for the type.
    pub unhandled: Vec<PathBuf>,
    pub quarantined: Vec<PathBuf>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.completed.is_empty()
            && self.failed_writes.is_empty()
            && self.malformed.is_empty()
            && self.unidentified.is_empty()
            && self.unhandled.is_empty()
            && self.quarantined.is_empty()
    }
}

/// Consecutive failed attempts on the same, unchanged file contents.
#[derive(Debug)]
struct Strike {
    fingerprint: blake3::Hash,
    attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrikeKind {
    Malformed,
    Unidentified,
}

pub struct CommandChannel {
    fs: Arc<dyn FileSystem>,
    layout: IpcLayout,
    dispatcher: Dispatcher,
    events: Arc<dyn EventSink>,
    quarantine_after: Option<u32>,
    strikes: HashMap<PathBuf, Strike>,
    result_file: GlobMatcher,
}

impl CommandChannel {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        layout: IpcLayout,
        dispatcher: Dispatcher,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Ok(Self {
            fs,
            layout,
            dispatcher,
            events,
            quarantine_after: None,
            strikes: HashMap::new(),
            result_file: name_matcher("*.result*.json")?,
        })
    }

    /// Move malformed or unidentifiable files aside after `n` attempts on
    /// the same contents. `None` keeps them in place forever.
    pub fn with_quarantine_after(mut self, n: Option<u32>) -> Self {
        self.quarantine_after = n;
        self
    }

    pub fn layout(&self) -> &IpcLayout {
        &self.layout
    }

    /// Scan the commands directory once and handle every candidate, in
    /// name order, one at a time.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> TickReport {
        let mut report = TickReport::default();

        let candidates = match self.candidates() {
            Ok(c) => c,
            Err(err) => {
                warn!(dir = ?self.layout.commands_dir(), error = %format!("{err:#}"), "cannot list commands");
                return report;
            }
        };

        for path in &candidates {
            if cancel.is_cancelled() {
                debug!("tick interrupted by cancellation");
                break;
            }
            self.process_file(path, cancel, &mut report).await;
        }

        self.strikes.retain(|p, _| candidates.contains(p));
        report
    }

    /// `*.json` files (any case) that are not result files, sorted.
    fn candidates(&self) -> Result<Vec<PathBuf>> {
        let dir = self.layout.commands_dir();
        if !self.fs.is_dir(dir) {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = self
            .fs
            .read_dir(dir)?
            .into_iter()
            .filter(|p| self.fs.is_file(p))
            .filter(|p| match file_name(p) {
                Some(name) => {
                    name.to_lowercase().ends_with(".json") && !self.result_file.is_match(name)
                }
                None => false,
            })
            .collect();
        files.sort();
        Ok(files)
    }

    async fn process_file(&mut self, path: &Path, cancel: &CancellationToken, report: &mut TickReport) {
        let body = match self.fs.read_to_string(path) {
            Ok(body) => body,
            Err(err) => {
                debug!(path = ?path, error = %format!("{err:#}"), "command not readable yet, skipping");
                return;
            }
        };
        let Some(name) = file_name(path) else {
            return;
        };

        let Some(id) = extract_identity(name, &body) else {
            debug!(path = ?path, "command has no identity, ignoring");
            if !self.strike(path, &body, StrikeKind::Unidentified, report) {
                report.unidentified.push(path.to_path_buf());
            }
            return;
        };

        let request = match parse_command(&body, &id) {
            Ok(request) => request,
            Err(err) => {
                if self.is_new_failure(path, &body) {
                    warn!(path = ?path, id = %id, error = %err, "malformed command");
                    self.events
                        .publish(AgentEvent::error(&format!("Malformed command {name}"), &err));
                } else {
                    debug!(path = ?path, id = %id, "malformed command unchanged since last report");
                }
                if !self.strike(path, &body, StrikeKind::Malformed, report) {
                    report.malformed.push(path.to_path_buf());
                }
                return;
            }
        };
        self.strikes.remove(path);

        let Some(response) = self.dispatcher.dispatch(&request, cancel).await else {
            debug!(path = ?path, kind = %request.kind, "no handler registered, skipping");
            report.unhandled.push(path.to_path_buf());
            return;
        };

        match self.publish_result(&id, &response) {
            Ok(()) => {
                info!(id = %id, kind = %response.kind, success = response.success, "result published");
                self.purge_result_variants(&id);
                self.purge_commands(&id);
                self.remove_processed(path);
                report.completed.push(id);
            }
            Err(err) => {
                warn!(id = %id, error = %format!("{err:#}"), "cannot write result, command kept for retry");
                self.events.publish(AgentEvent::error(
                    &format!("Result write failed for {id}"),
                    format!("{err:#}"),
                ));
                report.failed_writes.push(id);
            }
        }
    }

    /// True when this (path, contents) pair has not failed before.
    fn is_new_failure(&self, path: &Path, body: &str) -> bool {
        let fingerprint = blake3::hash(body.as_bytes());
        self.strikes
            .get(path)
            .is_none_or(|s| s.fingerprint != fingerprint)
    }

    /// Count a failed attempt. Returns true if the file was quarantined.
    fn strike(&mut self, path: &Path, body: &str, kind: StrikeKind, report: &mut TickReport) -> bool {
        let fingerprint = blake3::hash(body.as_bytes());
        let strike = self
            .strikes
            .entry(path.to_path_buf())
            .or_insert(Strike {
                fingerprint,
                attempts: 0,
            });
        if strike.fingerprint != fingerprint {
            strike.fingerprint = fingerprint;
            strike.attempts = 0;
        }
        strike.attempts += 1;
        let attempts = strike.attempts;

        let Some(limit) = self.quarantine_after else {
            return false;
        };
        if attempts < limit {
            return false;
        }

        match self.quarantine(path) {
            Ok(target) => {
                warn!(path = ?path, target = ?target, attempts, kind = ?kind, "command quarantined");
                self.events.publish(AgentEvent::error(
                    "Command quarantined",
                    format!("{} after {attempts} attempts", target.display()),
                ));
                self.strikes.remove(path);
                report.quarantined.push(path.to_path_buf());
                true
            }
            Err(err) => {
                warn!(path = ?path, error = %format!("{err:#}"), "cannot quarantine command");
                false
            }
        }
    }

    fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let dir = self.layout.quarantine_dir();
        self.fs.create_dir_all(dir)?;
        let name = file_name(path).context("command path has no file name")?;
        let mut target = dir.join(name);
        if self.fs.exists(&target) {
            let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f");
            target = dir.join(format!("{stamp}_{name}"));
        }
        self.fs.rename(path, &target)?;
        Ok(target)
    }

    /// Write `<id>.result.tmp` and rename it over `<id>.result.json`.
    fn publish_result(&self, id: &str, response: &CommandResponse) -> Result<()> {
        let body = response.to_json().context("serializing result")?;
        let tmp = self.layout.result_tmp_path(id);
        let target = self.layout.result_path(id);

        self.fs.write(&tmp, body.as_bytes())?;
        if let Err(err) = self.fs.rename(&tmp, &target) {
            let _ = self.fs.remove_file(&tmp);
            return Err(err);
        }
        Ok(())
    }

    /// Delete stale `<id>*.result*.json` files, keeping the canonical one.
    ///
    /// On case-insensitive filesystems a case variant of the canonical name
    /// is the canonical file itself, so it must not be deleted there.
    fn purge_result_variants(&self, id: &str) {
        let canonical = format!("{id}{RESULT_SUFFIX}");
        let pattern = format!("{}*.result*.json", globset::escape(id));
        self.purge_matching(&pattern, |name| {
            if cfg!(windows) {
                !name.eq_ignore_ascii_case(&canonical)
            } else {
                name != canonical
            }
        });
    }

    /// Delete every `<id>*.json` command file. Result files are left alone.
    fn purge_commands(&self, id: &str) {
        let pattern = format!("{}*.json", globset::escape(id));
        self.purge_matching(&pattern, |name| {
            !name.to_lowercase().ends_with(RESULT_SUFFIX)
        });
    }

    /// The file just answered may not be named after its identity.
    fn remove_processed(&self, path: &Path) {
        if !self.fs.is_file(path) {
            return;
        }
        if let Err(err) = self.fs.remove_file(path) {
            warn!(path = ?path, error = %format!("{err:#}"), "cannot remove answered command");
        }
    }

    fn purge_matching(&self, pattern: &str, should_delete: impl Fn(&str) -> bool) {
        let matcher = match name_matcher(pattern) {
            Ok(m) => m,
            Err(err) => {
                warn!(pattern, error = %format!("{err:#}"), "invalid purge pattern");
                return;
            }
        };
        let entries = match self.fs.read_dir(self.layout.commands_dir()) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(error = %format!("{err:#}"), "cannot list commands for purge");
                return;
            }
        };

        for path in entries {
            let Some(name) = file_name(&path) else {
                continue;
            };
            if !matcher.is_match(name) || !should_delete(name) || !self.fs.is_file(&path) {
                continue;
            }
            match self.fs.remove_file(&path) {
                Ok(()) => debug!(path = ?path, "purged"),
                Err(err) => debug!(path = ?path, error = %format!("{err:#}"), "purge failed"),
            }
        }
    }
}

fn name_matcher(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .with_context(|| format!("compiling pattern {pattern:?}"))?;
    Ok(glob.compile_matcher())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
