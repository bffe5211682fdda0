// src/ipc/layout.rs

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::fs::FileSystem;

/// Suffix of the canonical result file: `<id>.result.json`.
pub const RESULT_SUFFIX: &str = ".result.json";

/// Suffix of the scratch file a result is written to before being renamed
/// into place. Deliberately not `.json`, so it is never taken for a command.
pub const RESULT_TMP_SUFFIX: &str = ".result.tmp";

/// Directory layout below the application data root.
///
/// ```text
/// <root>/ipc/commands/              command files, `{id}.json` by convention
/// <root>/ipc/commands/{id}.result.json
/// <root>/ipc/commands/quarantine/   command files given up on
/// <root>/ipc/events/evt_*.json      one file per event
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcLayout {
    root: PathBuf,
    commands: PathBuf,
    events: PathBuf,
    quarantine: PathBuf,
}

impl IpcLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let commands = root.join("ipc").join("commands");
        let events = root.join("ipc").join("events");
        let quarantine = commands.join("quarantine");
        Self {
            root,
            commands,
            events,
            quarantine,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn commands_dir(&self) -> &Path {
        &self.commands
    }

    pub fn events_dir(&self) -> &Path {
        &self.events
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine
    }

    /// Canonical result path for an identity.
    pub fn result_path(&self, id: &str) -> PathBuf {
        self.commands.join(format!("{id}{RESULT_SUFFIX}"))
    }

    pub fn result_tmp_path(&self, id: &str) -> PathBuf {
        self.commands.join(format!("{id}{RESULT_TMP_SUFFIX}"))
    }

    /// Create the command and event directories.
    pub fn ensure(&self, fs: &dyn FileSystem) -> Result<()> {
        fs.create_dir_all(&self.commands)?;
        fs.create_dir_all(&self.events)?;
        Ok(())
    }
}
