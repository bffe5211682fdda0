// src/ipc/events.rs

//! Progress and diagnostic events for the front-end.
//!
//! Each event is a standalone JSON file in `ipc/events/`, named so that a
//! lexical sort is chronological:
//!
//! ```text
//! evt_20260119_142501_123_<uuid>.json
//! {"Kind":"CleanupFinished","AtUtc":"2026-01-19T14:25:01.123Z","Message":"..."}
//! ```
//!
//! Publishing never fails from the caller's point of view; a sink that
//! cannot write logs a warning and drops the event.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    CleanupStarted,
    CleanupFinished,
    UpdateStarted,
    UpdateFinished,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentEvent {
    pub kind: EventKind,
    pub at_utc: DateTime<Utc>,
    pub message: String,
}

impl AgentEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            at_utc: Utc::now(),
            message: message.into(),
        }
    }

    pub fn cleanup_started(scope: &str) -> Self {
        Self::new(EventKind::CleanupStarted, format!("Cleanup started ({scope})"))
    }

    pub fn cleanup_finished(files: i64, bytes: i64) -> Self {
        Self::new(
            EventKind::CleanupFinished,
            format!("Cleanup finished: {files} files, {} freed", human_bytes(bytes)),
        )
    }

    pub fn update_started(sources: &str) -> Self {
        Self::new(EventKind::UpdateStarted, format!("Updates started ({sources})"))
    }

    pub fn update_finished(items: i32) -> Self {
        Self::new(
            EventKind::UpdateFinished,
            format!("Updates finished: {items} items updated"),
        )
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(EventKind::Info, text)
    }

    pub fn error(context: &str, err: impl fmt::Display) -> Self {
        Self::new(EventKind::Error, format!("{context}: {err}"))
    }

    /// `evt_<yyyyMMdd_HHmmss_fff>_<uuid>.json`
    pub fn file_name(&self) -> String {
        format!(
            "evt_{}_{}.json",
            self.at_utc.format("%Y%m%d_%H%M%S_%3f"),
            Uuid::new_v4().simple()
        )
    }
}

fn human_bytes(bytes: i64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    format!("{:.1} MB", bytes as f64 / MB)
}

/// Destination for agent events.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn publish(&self, event: AgentEvent);
}

/// Writes one file per event into a directory, via write-then-rename so a
/// reader never sees a partial document.
#[derive(Debug)]
pub struct FileEventSink {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl FileEventSink {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    fn write(&self, event: &AgentEvent) -> anyhow::Result<PathBuf> {
        let body = serde_json::to_vec(event)?;
        let target = self.dir.join(event.file_name());
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        self.fs.write(&tmp, &body)?;
        if let Err(err) = self.fs.rename(&tmp, &target) {
            let _ = self.fs.remove_file(&tmp);
            return Err(err);
        }
        Ok(target)
    }
}

impl EventSink for FileEventSink {
    fn publish(&self, event: AgentEvent) {
        match self.write(&event) {
            Ok(path) => debug!(kind = ?event.kind, path = ?path, "event published"),
            Err(err) => warn!(kind = ?event.kind, error = %format!("{err:#}"), "failed to publish event"),
        }
    }
}
