// src/exec/cleanup/model.rs

use serde::Serialize;

/// What a cleanup run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRequest {
    /// Free-form intensity label; carried through for logging only.
    pub level: String,
    /// Restrict the run to these group names (case-insensitive). `None` or
    /// an empty list means every configured group.
    pub groups: Option<Vec<String>>,
    /// Compute what would be freed without touching the filesystem.
    pub simulate: bool,
}

pub const DEFAULT_LEVEL: &str = "complet";

impl Default for CleanupRequest {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            groups: None,
            simulate: false,
        }
    }
}

impl CleanupRequest {
    pub fn simulated() -> Self {
        Self {
            simulate: true,
            ..Self::default()
        }
    }

    pub fn for_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: Some(groups.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

/// Aggregate outcome of a cleanup run.
///
/// `groups_done` and `errors` are independent: a group can finish (and be
/// listed) while some of its files failed (and are listed as errors).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub files_deleted: i64,
    pub bytes_freed: i64,
    pub groups_done: Vec<String>,
    pub errors: Vec<String>,
}

impl CleanupReport {
    /// One-line human summary, used as the command result message.
    pub fn summary(&self, simulated: bool) -> String {
        let verb = if simulated { "would free" } else { "freed" };
        let mut line = format!(
            "{} files, {} bytes {} ({} groups)",
            self.files_deleted,
            self.bytes_freed,
            verb,
            self.groups_done.len()
        );
        if !self.errors.is_empty() {
            line.push_str(&format!("; {} errors: {}", self.errors.len(), self.errors.join("; ")));
        }
        line
    }
}
